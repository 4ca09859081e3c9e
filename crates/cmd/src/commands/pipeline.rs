use anyhow::Result;
use diagnostics::*;
use starschema::{Pipeline, PipelineConfig, RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Catalog,
    Events,
    All,
}

/// Run one or both pipelines and print what was written.
pub async fn pipeline_command(config: PipelineConfig, stage: PipelineStage, json: bool) -> Result<()> {
    let pipeline = Pipeline::open(config)?;
    debug!("starting {stage} run {run_id}",
        stage: format!("{:?}", stage), run_id: pipeline.run_id());

    let summary = match stage {
        PipelineStage::Catalog => pipeline.run_catalog().await,
        PipelineStage::Events => pipeline.run_events().await,
        PipelineStage::All => pipeline.run_all().await,
    };
    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            error!("run {run_id} failed: {error}", run_id: pipeline.run_id(), error: e.to_string());
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }
    Ok(())
}

#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = format!("run {}\n", summary.run_id);
    for table in &summary.tables {
        out.push_str(&format!(
            "  {:<10} {:>8} rows {:>6} files {:>6} partitions\n",
            table.table, table.rows, table.files, table.partitions
        ));
    }
    let q = &summary.quality;
    if !q.is_clean() {
        out.push_str("data quality:\n");
        let counters = [
            ("malformed lines", q.malformed_lines),
            ("rejected songs", q.rejected_songs),
            ("conflicting song ids", q.conflicting_song_ids),
            ("rejected artists", q.rejected_artists),
            ("conflicting artist ids", q.conflicting_artist_ids),
            ("non-play events", q.non_play_events),
            ("plays without user", q.plays_without_user),
            ("plays without timestamp", q.plays_without_timestamp),
            ("unmatched plays", q.unmatched_plays),
            ("ambiguous matches", q.ambiguous_matches),
        ];
        for (label, count) in counters.iter().filter(|(_, n)| *n > 0) {
            out.push_str(&format!("  {:<24} {}\n", label, count));
        }
    }
    out
}
