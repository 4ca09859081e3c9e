use anyhow::{Result, anyhow};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use arrow_csv::WriterBuilder;
use datafusion::datasource::file_format::parquet::ParquetFormat;
use datafusion::datasource::listing::{
    ListingOptions, ListingTable, ListingTableConfig, ListingTableUrl,
};
use datafusion::physical_plan::SendableRecordBatchStream;
use datafusion::prelude::SessionContext;
use diagnostics::*;
use futures::TryStreamExt;
use lakestore::{Lake, TableReader};
use starschema::{ALL_TABLES, fields_for};
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Count,
}

/// Register every committed output table of `lake` with `ctx`.
///
/// Partition columns come back from the directory names with their declared
/// type. Nullable partition columns stay strings, since a null is stored as
/// the `__HIVE_DEFAULT_PARTITION__` directory.
pub async fn register_tables(ctx: &SessionContext, lake: &Lake) -> Result<Vec<&'static str>> {
    if lake.base_url().scheme() != "file" {
        let _ = ctx.register_object_store(lake.base_url(), lake.store().clone());
    }

    let reader = TableReader::new(lake);
    let mut registered = Vec::new();
    for spec in ALL_TABLES {
        if !reader.is_committed(&spec).await? {
            warn!("table {table} has not been written, skipping", table: spec.name);
            continue;
        }
        let fields = fields_for(spec.name)
            .ok_or_else(|| anyhow!("no layout for table {}", spec.name))?;

        let mut partition_cols = Vec::new();
        for column in spec.partition_by {
            let field = fields
                .iter()
                .find(|f| f.name() == column)
                .ok_or_else(|| anyhow!("{} has no column {}", spec.name, column))?;
            let data_type = if field.is_nullable() {
                DataType::Utf8
            } else {
                field.data_type().clone()
            };
            partition_cols.push(((*column).to_string(), data_type));
        }

        let file_fields: Vec<_> = fields
            .iter()
            .filter(|f| !spec.partition_by.contains(&f.name().as_str()))
            .cloned()
            .collect();

        let table_url = ListingTableUrl::parse(lake.url_for(spec.name))?;
        let options = ListingOptions::new(Arc::new(ParquetFormat::default()))
            .with_file_extension(".parquet")
            .with_table_partition_cols(partition_cols);
        let config = ListingTableConfig::new(table_url)
            .with_listing_options(options)
            .with_schema(Arc::new(Schema::new(file_fields)));

        let _ = ctx.register_table(spec.name, Arc::new(ListingTable::try_new(config)?))?;
        debug!("registered {table} at {url}", table: spec.name, url: lake.url_for(spec.name));
        registered.push(spec.name);
    }
    Ok(registered)
}

/// Plan `sql` and start streaming its results.
async fn stream_query(ctx: &SessionContext, sql: &str) -> Result<SendableRecordBatchStream> {
    debug!("executing {sql}", sql: sql);
    let df = ctx
        .sql(sql)
        .await
        .map_err(|e| anyhow!("Invalid query: {}", e))?;
    df.execute_stream()
        .await
        .map_err(|e| anyhow!("Query failed: {}", e))
}

/// Run `sql` and collect all result batches.
pub async fn run_query(ctx: &SessionContext, sql: &str) -> Result<Vec<RecordBatch>> {
    let stream = stream_query(ctx, sql).await?;
    stream
        .try_collect()
        .await
        .map_err(|e| anyhow!("Query failed: {}", e))
}

/// Run `sql` and write its results to `out` in `format`.
pub async fn write_results<W: Write>(
    ctx: &SessionContext,
    sql: &str,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let batches = run_query(ctx, sql).await?;
            if batches.iter().all(|b| b.num_rows() == 0) {
                writeln!(out, "(0 rows)")?;
            } else {
                writeln!(out, "{}", pretty_format_batches(&batches)?)?;
            }
        }
        OutputFormat::Csv => {
            let mut stream = stream_query(ctx, sql).await?;
            let mut writer = WriterBuilder::new().build(&mut *out);
            while let Some(batch) = stream.try_next().await? {
                writer.write(&batch)?;
            }
        }
        OutputFormat::Count => {
            let mut stream = stream_query(ctx, sql).await?;
            let mut total = 0;
            while let Some(batch) = stream.try_next().await? {
                total += batch.num_rows();
            }
            writeln!(out, "{}", total)?;
        }
    }
    Ok(())
}

/// Query the output tables with SQL, printing to stdout.
pub async fn query_command(lake: &Lake, sql: &str, format: OutputFormat) -> Result<()> {
    let ctx = SessionContext::new();
    let tables = register_tables(&ctx, lake).await?;
    if tables.is_empty() {
        return Err(anyhow!("No committed tables at {}", lake));
    }
    write_results(&ctx, sql, format, &mut io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array};
    use lakestore::{StorageConfig, TableWriter};
    use starschema::{SONGPLAYS, SongPlay, USERS, User};

    fn play(id: i64, month: i32, song: Option<&str>) -> SongPlay {
        SongPlay {
            songplay_id: id,
            start_time: 1541105830796 + id,
            user_id: Some(id % 3),
            level: Some("free".into()),
            song_id: song.map(str::to_string),
            artist_id: song.map(|_| "AR1".to_string()),
            session_id: Some(7),
            location: None,
            user_agent: None,
            year: 2018,
            month,
        }
    }

    fn count(batches: &[RecordBatch]) -> i64 {
        batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| a.value(0))
            .unwrap_or(-1)
    }

    async fn seeded(lake: &Lake) -> Result<()> {
        let writer = TableWriter::new(lake, "test");
        let plays = vec![
            play(1, 11, Some("SO1")),
            play(2, 11, None),
            play(3, 12, Some("SO1")),
        ];
        let _ = writer.write(&SONGPLAYS, &plays).await?;
        let users = vec![User {
            user_id: 1,
            first_name: Some("Ava".into()),
            last_name: None,
            gender: None,
            level: Some("free".into()),
        }];
        let _ = writer.write(&USERS, &users).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_query_local_tables() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let lake = Lake::open_for_write(&StorageConfig::local(tmp.path().to_string_lossy()))?;
        seeded(&lake).await?;

        let ctx = SessionContext::new();
        let tables = register_tables(&ctx, &lake).await?;
        assert_eq!(tables, vec!["users", "songplays"]);

        let all = run_query(&ctx, "SELECT COUNT(*) FROM songplays").await?;
        assert_eq!(count(&all), 3);

        // partition column is typed, so numeric comparison works
        let november = run_query(&ctx, "SELECT COUNT(*) FROM songplays WHERE month = 11").await?;
        assert_eq!(count(&november), 2);

        let matched =
            run_query(&ctx, "SELECT COUNT(*) FROM songplays WHERE song_id IS NOT NULL").await?;
        assert_eq!(count(&matched), 2);

        let users = run_query(&ctx, "SELECT COUNT(*) FROM users").await?;
        assert_eq!(count(&users), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_in_memory_tables() -> Result<()> {
        let lake = Lake::in_memory();
        seeded(&lake).await?;
        let ctx = SessionContext::new();
        let _ = register_tables(&ctx, &lake).await?;
        let rows = run_query(&ctx, "SELECT songplay_id FROM songplays ORDER BY songplay_id").await?;
        let total: usize = rows.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);
        assert!(rows.iter().all(|b| b.column(0).null_count() == 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_output_formats() -> Result<()> {
        let lake = Lake::in_memory();
        seeded(&lake).await?;
        let ctx = SessionContext::new();
        let _ = register_tables(&ctx, &lake).await?;
        let sql = "SELECT songplay_id, month FROM songplays ORDER BY songplay_id";

        let mut csv = Vec::new();
        write_results(&ctx, sql, OutputFormat::Csv, &mut csv).await?;
        assert_eq!(String::from_utf8(csv)?, "songplay_id,month\n1,11\n2,11\n3,12\n");

        let mut counted = Vec::new();
        write_results(&ctx, sql, OutputFormat::Count, &mut counted).await?;
        assert_eq!(String::from_utf8(counted)?, "3\n");

        let mut table = Vec::new();
        write_results(&ctx, sql, OutputFormat::Table, &mut table).await?;
        let table = String::from_utf8(table)?;
        assert!(table.contains("songplay_id"));
        assert!(table.contains("| 3 "));

        let mut empty = Vec::new();
        let none = "SELECT songplay_id FROM songplays WHERE month = 1";
        write_results(&ctx, none, OutputFormat::Table, &mut empty).await?;
        assert_eq!(String::from_utf8(empty)?, "(0 rows)\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_sql_is_reported() {
        let ctx = SessionContext::new();
        let err = run_query(&ctx, "SELEC nothing").await.expect_err("parse error");
        assert!(err.to_string().contains("Invalid query"));
    }

    #[tokio::test]
    async fn test_nothing_to_query() {
        let lake = Lake::in_memory();
        let err = query_command(&lake, "SELECT 1", OutputFormat::Count)
            .await
            .expect_err("no tables");
        assert!(err.to_string().contains("No committed tables"));
    }
}
