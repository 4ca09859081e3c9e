use anyhow::Result;
use warehouse::statements::{self, Statement};
use warehouse::{ScriptClient, Warehouse, WarehouseConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WarehouseAction {
    /// DROP TABLE IF EXISTS for every table
    Drop,
    /// CREATE TABLE IF NOT EXISTS for every table
    Create,
    /// Bulk loads into the staging tables
    Copy,
    /// Insert-selects from staging into the final tables
    Insert,
    /// Everything above, in order
    Script,
}

/// Render the statements for `action` as SQL text.
pub async fn render_action(config: WarehouseConfig, action: WarehouseAction) -> Result<String> {
    config.validate()?;
    let statements: Vec<Statement> = match action {
        WarehouseAction::Drop => statements::drop_tables(),
        WarehouseAction::Create => statements::create_tables(),
        WarehouseAction::Copy => statements::copy_staging(&config),
        WarehouseAction::Insert => statements::insert_final(config.join),
        WarehouseAction::Script => {
            let mut warehouse = Warehouse::new(ScriptClient::new(), config)?;
            warehouse.run_all().await?;
            return Ok(warehouse.into_client().render());
        }
    };
    Ok(statements::render(&statements))
}

pub async fn warehouse_command(config: WarehouseConfig, action: WarehouseAction) -> Result<()> {
    print!("{}", render_action(config, action).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use starschema::JoinPolicy;

    fn config() -> WarehouseConfig {
        WarehouseConfig {
            iam_role_arn: "arn:aws:iam::123456789012:role/dwhRole".into(),
            log_data: "s3://udacity-dend/log_data".into(),
            log_jsonpath: "s3://udacity-dend/log_json_path.json".into(),
            song_data: "s3://udacity-dend/song_data".into(),
            region: "us-west-2".into(),
            join: JoinPolicy::Inner,
        }
    }

    #[tokio::test]
    async fn test_render_actions() -> Result<()> {
        let drop = render_action(config(), WarehouseAction::Drop).await?;
        assert!(drop.starts_with("-- staging_events\nDROP TABLE IF EXISTS staging_events;"));

        let insert = render_action(config(), WarehouseAction::Insert).await?;
        assert!(insert.contains("INSERT INTO songplays"));
        assert!(!insert.contains("LEFT JOIN"));

        let script = render_action(config(), WarehouseAction::Script).await?;
        assert!(script.contains(&drop));
        assert!(script.contains("COPY staging_songs"));
        assert!(script.ends_with(&insert));
        Ok(())
    }
}
