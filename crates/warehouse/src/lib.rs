//! Warehouse rendition of the star schema
//!
//! Loads the raw catalog and event JSON into two staging tables with bulk
//! `COPY` statements, then fills the dimension and fact tables with
//! insert-selects that apply the same filter, dedup and join rules as the
//! lake pipelines.

pub mod client;
pub mod config;
pub mod error;
pub mod statements;

pub use client::{ScriptClient, WarehouseClient};
pub use config::WarehouseConfig;
pub use error::{Result, WarehouseError};
pub use statements::Statement;

use diagnostics::*;

pub struct Warehouse<C: WarehouseClient> {
    client: C,
    config: WarehouseConfig,
}

impl<C: WarehouseClient> Warehouse<C> {
    pub fn new(client: C, config: WarehouseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Warehouse { client, config })
    }

    /// Drop and recreate every table.
    pub async fn reset(&mut self) -> Result<()> {
        self.run("drop", statements::drop_tables()).await?;
        self.run("create", statements::create_tables()).await
    }

    pub async fn load_staging(&mut self) -> Result<()> {
        let copies = statements::copy_staging(&self.config);
        self.run("copy", copies).await
    }

    pub async fn insert_final(&mut self) -> Result<()> {
        let inserts = statements::insert_final(self.config.join);
        self.run("insert", inserts).await
    }

    /// Reset, load and insert, stopping at the first failure.
    pub async fn run_all(&mut self) -> Result<()> {
        self.reset().await?;
        self.load_staging().await?;
        self.insert_final().await
    }

    #[must_use]
    pub fn into_client(self) -> C {
        self.client
    }

    async fn run(&mut self, phase: &str, statements: Vec<Statement>) -> Result<()> {
        for statement in &statements {
            debug!("{phase} {name}", phase: phase, name: statement.name);
            if let Err(e) = self.client.execute(statement).await {
                error!("{phase} {name} failed: {error}",
                    phase: phase, name: statement.name, error: e.to_string());
                return Err(e);
            }
        }
        info!("{phase}: {count} statements", phase: phase, count: statements.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use starschema::JoinPolicy;

    fn config() -> WarehouseConfig {
        WarehouseConfig {
            iam_role_arn: "arn:aws:iam::123456789012:role/dwhRole".into(),
            log_data: "s3://udacity-dend/log_data".into(),
            log_jsonpath: "s3://udacity-dend/log_json_path.json".into(),
            song_data: "s3://udacity-dend/song_data".into(),
            region: "us-west-2".into(),
            join: JoinPolicy::Left,
        }
    }

    /// Fails on the statement with the given name in the given phase.
    struct FailingClient {
        seen: Vec<String>,
        fail_on: &'static str,
    }

    #[async_trait]
    impl WarehouseClient for FailingClient {
        async fn execute(&mut self, statement: &Statement) -> Result<()> {
            self.seen.push(statement.name.to_string());
            if statement.sql.starts_with("\nCOPY") && statement.name == self.fail_on {
                return Err(WarehouseError::Execution {
                    statement: statement.name,
                    message: "S3ServiceException: Access Denied".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_all_in_order() -> Result<()> {
        let mut warehouse = Warehouse::new(ScriptClient::new(), config())?;
        warehouse.run_all().await?;
        let client = warehouse.into_client();
        assert_eq!(client.statements().len(), 21);

        let script = client.render();
        let drop = script.find("DROP TABLE IF EXISTS staging_events").unwrap();
        let create = script.find("CREATE TABLE IF NOT EXISTS staging_events").unwrap();
        let copy = script.find("COPY staging_events").unwrap();
        let insert = script.find("INSERT INTO songplays").unwrap();
        assert!(drop < create && create < copy && copy < insert);
        Ok(())
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let client = FailingClient {
            seen: Vec::new(),
            fail_on: "staging_events",
        };
        let mut warehouse = Warehouse::new(client, config()).unwrap();
        let err = warehouse.run_all().await.expect_err("copy fails");
        assert!(matches!(err, WarehouseError::Execution { statement: "staging_events", .. }));

        let seen = warehouse.into_client().seen;
        // 7 drops, 7 creates, then the failing copy
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn test_reset_is_ddl_only() {
        let mut warehouse = Warehouse::new(ScriptClient::new(), config()).unwrap();
        tokio_test::block_on(warehouse.reset()).unwrap();
        let client = warehouse.into_client();
        assert_eq!(client.statements().len(), 14);
        assert!(
            client
                .statements()
                .iter()
                .all(|s| !s.sql.contains("COPY") && !s.sql.contains("INSERT"))
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config();
        bad.iam_role_arn = String::new();
        assert!(Warehouse::new(ScriptClient::new(), bad).is_err());
    }
}
