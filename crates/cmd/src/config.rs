//! Configuration file and command line overrides
//!
//! ```yaml
//! input:
//!   url: s3a://udacity-dend/
//!   region: us-west-2
//!   credentials:
//!     access_key_id: AKIA...
//!     secret_access_key: ...
//! output:
//!   url: /data/sparkify
//! join: left
//! timestamp_precision: second
//! log_level: info
//! warehouse:
//!   iam_role_arn: arn:aws:iam::123456789012:role/dwhRole
//!   log_data: s3://udacity-dend/log_data
//!   log_jsonpath: s3://udacity-dend/log_json_path.json
//!   song_data: s3://udacity-dend/song_data
//! ```

use anyhow::{Context, Result, anyhow};
use diagnostics::LogLevel;
use lakestore::StorageConfig;
use serde::Deserialize;
use starschema::PipelineConfig;
use std::path::Path;
use warehouse::WarehouseConfig;

pub const CONFIG_ENV: &str = "TUNELAKE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig =
        serde_yaml_ng::from_str(content).with_context(|| "Failed to parse YAML configuration")?;
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<()> {
    config.pipeline.validate()?;
    if let Some(level) = &config.log_level {
        let _ = level.parse::<LogLevel>().map_err(|e| anyhow!(e))?;
    }
    if let Some(warehouse) = &config.warehouse {
        warehouse.validate()?;
    }
    Ok(())
}

/// The config file, if any, plus `--input`/`--output` overrides.
#[derive(Debug, Default)]
pub struct Settings {
    file: Option<AppConfig>,
    input: Option<String>,
    output: Option<String>,
}

impl Settings {
    pub fn load(path: Option<&Path>, input: Option<String>, output: Option<String>) -> Result<Self> {
        let file = path.map(load_config).transpose()?;
        Ok(Settings {
            file,
            input,
            output,
        })
    }

    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        Settings {
            file: Some(config),
            ..Default::default()
        }
    }

    /// Level from the config file; the command line `-v` takes precedence.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.file
            .as_ref()
            .and_then(|f| f.log_level.as_deref())
            .and_then(|level| level.parse().ok())
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        let config = match &self.file {
            Some(file) => {
                let mut config = file.pipeline.clone();
                if let Some(url) = &self.input {
                    config.input.url = url.clone();
                }
                if let Some(url) = &self.output {
                    config.output.url = url.clone();
                }
                config
            }
            None => {
                let (Some(input), Some(output)) = (&self.input, &self.output) else {
                    return Err(anyhow!(
                        "No configuration: pass --config (or set {}) or both --input and --output",
                        CONFIG_ENV
                    ));
                };
                PipelineConfig::new(
                    StorageConfig::local(input.clone()),
                    StorageConfig::local(output.clone()),
                )
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn output(&self) -> Result<StorageConfig> {
        match (&self.file, &self.output) {
            (Some(file), Some(url)) => Ok(StorageConfig {
                url: url.clone(),
                ..file.pipeline.output.clone()
            }),
            (Some(file), None) => Ok(file.pipeline.output.clone()),
            (None, Some(url)) => Ok(StorageConfig::local(url.clone())),
            (None, None) => Err(anyhow!(
                "No output location: pass --config (or set {}) or --output",
                CONFIG_ENV
            )),
        }
    }

    pub fn warehouse(&self) -> Result<WarehouseConfig> {
        self.file
            .as_ref()
            .and_then(|f| f.warehouse.clone())
            .ok_or_else(|| anyhow!("The configuration has no warehouse section"))
    }
}
