// Error types for lake storage operations

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage location '{url}': {reason}")]
    InvalidLocation { url: String, reason: String },

    #[error("Invalid object pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("No objects match '{pattern}' under {location}")]
    NoMatchingObjects { pattern: String, location: String },

    #[error("Table '{table}' has no committed output at {location}")]
    TableNotCommitted { table: String, location: String },

    #[error("Table '{table}' file {file} lacks column '{column}'")]
    MissingColumn {
        table: String,
        file: String,
        column: String,
    },

    #[error("Partition column '{column}' not in schema of table '{table}'")]
    UnknownPartitionColumn { table: String, column: String },

    #[error("Table '{table}' has {rows} rows, more than one write can index")]
    TooManyRows { table: String, rows: usize },
}

impl StoreError {
    pub fn invalid_location(url: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidLocation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure is the input itself being absent or unreadable.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            StoreError::NoMatchingObjects { .. }
                | StoreError::InvalidLocation { .. }
                | StoreError::ObjectStore(object_store::Error::NotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
