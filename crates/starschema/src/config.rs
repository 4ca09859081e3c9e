//! Pipeline settings

use crate::error::{PipelineError, Result};
use lakestore::StorageConfig;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CATALOG_PATTERN: &str = "song_data/*/*/*/*.json";
pub const DEFAULT_EVENTS_PATTERN: &str = "log_data/*/*/*.json";
pub const DEFAULT_READ_PARALLELISM: usize = 16;

/// What happens to a play event that matches no catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Keep the play with null song_id and artist_id
    #[default]
    Left,
    /// Drop the play
    Inner,
}

impl FromStr for JoinPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(JoinPolicy::Left),
            "inner" => Ok(JoinPolicy::Inner),
            other => Err(PipelineError::Config(format!(
                "unknown join policy '{}' (expected left or inner)",
                other
            ))),
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinPolicy::Left => "left",
            JoinPolicy::Inner => "inner",
        })
    }
}

/// Resolution of the derived `start_time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPrecision {
    /// Keep the event's milliseconds
    Millisecond,
    /// Floor to whole seconds, as the warehouse `ts / 1000` does
    #[default]
    Second,
}

impl FromStr for TimestampPrecision {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "millisecond" | "ms" => Ok(TimestampPrecision::Millisecond),
            "second" | "s" => Ok(TimestampPrecision::Second),
            other => Err(PipelineError::Config(format!(
                "unknown timestamp precision '{}' (expected millisecond or second)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    pub input: StorageConfig,
    pub output: StorageConfig,
    #[serde(default = "default_catalog_pattern")]
    pub catalog_pattern: String,
    #[serde(default = "default_events_pattern")]
    pub events_pattern: String,
    #[serde(default)]
    pub join: JoinPolicy,
    #[serde(default)]
    pub timestamp_precision: TimestampPrecision,
    #[serde(default = "default_read_parallelism")]
    pub read_parallelism: usize,
}

fn default_catalog_pattern() -> String {
    DEFAULT_CATALOG_PATTERN.to_string()
}

fn default_events_pattern() -> String {
    DEFAULT_EVENTS_PATTERN.to_string()
}

fn default_read_parallelism() -> usize {
    DEFAULT_READ_PARALLELISM
}

impl PipelineConfig {
    #[must_use]
    pub fn new(input: StorageConfig, output: StorageConfig) -> Self {
        PipelineConfig {
            input,
            output,
            catalog_pattern: default_catalog_pattern(),
            events_pattern: default_events_pattern(),
            join: JoinPolicy::default(),
            timestamp_precision: TimestampPrecision::default(),
            read_parallelism: DEFAULT_READ_PARALLELISM,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, location) in [("input", &self.input), ("output", &self.output)] {
            if location.url.trim().is_empty() {
                return Err(PipelineError::Config(format!("{} url is empty", name)));
            }
            if let Some(creds) = &location.credentials {
                if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
                    return Err(PipelineError::Config(format!(
                        "{} credentials need both access_key_id and secret_access_key",
                        name
                    )));
                }
            }
        }

        if self.catalog_pattern.trim().is_empty() {
            return Err(PipelineError::Config("catalog_pattern is empty".to_string()));
        }
        if self.events_pattern.trim().is_empty() {
            return Err(PipelineError::Config("events_pattern is empty".to_string()));
        }
        if self.read_parallelism == 0 {
            return Err(PipelineError::Config(
                "read_parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
