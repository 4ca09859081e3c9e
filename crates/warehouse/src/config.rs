use crate::error::{Result, WarehouseError};
use serde::Deserialize;
use starschema::JoinPolicy;

/// Bulk-load sources and the role the warehouse assumes to read them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WarehouseConfig {
    pub iam_role_arn: String,
    /// Event log prefix, e.g. `s3://udacity-dend/log_data`
    pub log_data: String,
    /// JSONPaths file mapping event keys to staging columns
    pub log_jsonpath: String,
    pub song_data: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub join: JoinPolicy,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

impl WarehouseConfig {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("iam_role_arn", &self.iam_role_arn),
            ("log_data", &self.log_data),
            ("log_jsonpath", &self.log_jsonpath),
            ("song_data", &self.song_data),
            ("region", &self.region),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(WarehouseError::Config(format!("{} is empty", name)));
            }
            // Values are spliced into single-quoted SQL literals
            if value.contains('\'') {
                return Err(WarehouseError::Config(format!(
                    "{} must not contain a single quote",
                    name
                )));
            }
        }
        if !self.iam_role_arn.starts_with("arn:") {
            return Err(WarehouseError::Config(format!(
                "iam_role_arn '{}' is not an ARN",
                self.iam_role_arn
            )));
        }
        Ok(())
    }
}
