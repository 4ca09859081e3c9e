//! Catalog and events pipelines
//!
//! The catalog pipeline writes Songs and Artists. The events pipeline writes
//! Users and Time, then reads Songs and Artists back from the output
//! location to build SongPlays, so it depends on a completed catalog run.

use crate::catalog::{extract_artists, extract_songs};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::events::{PlayPartition, extract_time, extract_users, select_plays};
use crate::quality::DataQuality;
use crate::records::{CatalogRecord, EventRecord};
use crate::schema_check::{CATALOG_REQUIRED, EVENT_REQUIRED, PLAY_REQUIRED, check_required};
use crate::songplays::{CatalogIndex, build_songplays};
use crate::tables::{ARTISTS, Artist, SONGPLAYS, SONGS, Song, TIME, USERS};
use diagnostics::*;
use lakestore::{Lake, SourceReader, StoreError, TableReader, TableSpec, TableSummary, TableWriter};
use serde::Serialize;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub tables: Vec<TableSummary>,
    pub quality: DataQuality,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.tables.extend(other.tables);
        self.quality.merge(&other.quality);
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.table == name)
    }
}

/// Input and output lakes plus settings for one run.
pub struct Pipeline {
    config: PipelineConfig,
    input: Lake,
    output: Lake,
    run_id: String,
}

impl Pipeline {
    /// Validate `config` and open both locations.
    pub fn open(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let input = Lake::open(&config.input)?;
        let output = Lake::open_for_write(&config.output)?;
        Ok(Self::with_lakes(config, input, output))
    }

    /// Use already opened lakes (tests, embedding).
    #[must_use]
    pub fn with_lakes(config: PipelineConfig, input: Lake, output: Lake) -> Self {
        Pipeline {
            config,
            input,
            output,
            run_id: uuid7::uuid7().to_string(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn output(&self) -> &Lake {
        &self.output
    }

    pub async fn run_catalog(&self) -> Result<RunSummary> {
        info!("catalog pipeline {run_id}: {input} -> {output}",
            run_id: self.run_id.as_str(),
            input: self.input.to_string(),
            output: self.output.to_string());

        let partitions = SourceReader::new(&self.input, self.config.read_parallelism)
            .read::<CatalogRecord>(&self.config.catalog_pattern)
            .await?;

        let mut quality = DataQuality {
            malformed_lines: partitions.iter().map(|p| p.malformed).sum(),
            ..Default::default()
        };
        let records: Vec<&CatalogRecord> = partitions.iter().flat_map(|p| &p.records).collect();
        check_required("catalog", records.iter().copied(), CATALOG_REQUIRED)?;

        let songs = extract_songs(records.iter().copied(), &mut quality);
        let artists = extract_artists(records.iter().copied(), &mut quality);

        let writer = TableWriter::new(&self.output, self.run_id.as_str());
        let tables = vec![
            writer.write(&SONGS, &songs).await?,
            writer.write(&ARTISTS, &artists).await?,
        ];

        quality.log("catalog");
        Ok(RunSummary {
            run_id: self.run_id.clone(),
            tables,
            quality,
        })
    }

    pub async fn run_events(&self) -> Result<RunSummary> {
        info!("events pipeline {run_id}: {input} -> {output}",
            run_id: self.run_id.as_str(),
            input: self.input.to_string(),
            output: self.output.to_string());

        // Fail before any output is touched when the catalog is missing
        let songs: Vec<Song> = self.read_catalog(&SONGS).await?;
        let artists: Vec<Artist> = self.read_catalog(&ARTISTS).await?;

        let sources = SourceReader::new(&self.input, self.config.read_parallelism)
            .read::<EventRecord>(&self.config.events_pattern)
            .await?;

        let mut quality = DataQuality {
            malformed_lines: sources.iter().map(|p| p.malformed).sum(),
            ..Default::default()
        };
        check_required("events", sources.iter().flat_map(|p| &p.records), EVENT_REQUIRED)?;

        let partitions: Vec<PlayPartition> = sources
            .into_iter()
            .map(|p| select_plays(p, self.config.timestamp_precision, &mut quality))
            .collect();
        let plays = || partitions.iter().flat_map(|p| &p.plays);
        check_required("plays", plays().map(|p| &p.event), PLAY_REQUIRED)?;

        debug!("{plays} plays in {objects} objects",
            plays: plays().count(), objects: partitions.len());

        let users = extract_users(plays(), &mut quality);
        let time = extract_time(plays())?;
        let catalog = CatalogIndex::new(&songs, &artists);
        let songplays = build_songplays(&partitions, &catalog, self.config.join, &mut quality)?;

        let writer = TableWriter::new(&self.output, self.run_id.as_str());
        let tables = vec![
            writer.write(&USERS, &users).await?,
            writer.write(&TIME, &time).await?,
            writer.write(&SONGPLAYS, &songplays).await?,
        ];

        if quality.unmatched_plays > 0 {
            info!("{unmatched} of {plays} plays matched no catalog song ({policy} join)",
                unmatched: quality.unmatched_plays,
                plays: plays().count(),
                policy: self.config.join.to_string());
        }
        quality.log("events");
        Ok(RunSummary {
            run_id: self.run_id.clone(),
            tables,
            quality,
        })
    }

    /// Catalog pipeline, then events pipeline.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let mut summary = self.run_catalog().await?;
        summary.merge(self.run_events().await?);
        Ok(summary)
    }

    async fn read_catalog<T>(&self, spec: &TableSpec) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned + lakestore::ForArrow,
    {
        match TableReader::new(&self.output).read::<T>(spec).await {
            Ok(rows) => Ok(rows),
            Err(StoreError::TableNotCommitted { table, location }) => {
                Err(PipelineError::CatalogNotMaterialized { table, location })
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub async fn run_catalog(config: PipelineConfig) -> Result<RunSummary> {
    Pipeline::open(config)?.run_catalog().await
}

pub async fn run_events(config: PipelineConfig) -> Result<RunSummary> {
    Pipeline::open(config)?.run_events().await
}

pub async fn run_all(config: PipelineConfig) -> Result<RunSummary> {
    Pipeline::open(config)?.run_all().await
}
