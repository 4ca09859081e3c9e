// Error types for the star-schema pipelines

use lakestore::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Required field '{field}' missing from {missing} of {total} {stage} records")]
    Schema {
        stage: &'static str,
        field: &'static str,
        missing: usize,
        total: usize,
    },

    #[error("Catalog output '{table}' is not available at {location}; run the catalog pipeline first")]
    CatalogNotMaterialized { table: String, location: String },

    #[error("Timestamp {ts} ms is outside the representable range")]
    InvalidTimestamp { ts: i64 },

    #[error("songplay id space exhausted at partition {partition}, row {row}")]
    IdSpaceExhausted { partition: usize, row: usize },
}

impl PipelineError {
    /// Source errors: the input location is missing or unreadable.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(self, PipelineError::Store(e) if e.is_source_error())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
