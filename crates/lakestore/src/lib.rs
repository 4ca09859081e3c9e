//! Object-storage plumbing for tunelake
//!
//! - [`Lake`]: an object store and a root prefix, opened from a
//!   [`StorageConfig`] with explicit credentials
//! - [`SourceReader`]: glob-selected, line-delimited JSON input
//! - [`TableWriter`] / [`TableReader`]: Hive-partitioned Parquet output
//!   with whole-table overwrite

pub mod error;
pub mod location;
pub mod parquet;
pub mod partition;
pub mod pattern;
pub mod schema;
pub mod source;
pub mod table;

pub use error::{Result, StoreError};
pub use location::{Credentials, Lake, Secret, StorageConfig};
pub use partition::{DEFAULT_PARTITION, PartitionValue};
pub use pattern::ObjectPattern;
pub use schema::ForArrow;
pub use source::{SourcePartition, SourceReader};
pub use table::{SUCCESS_MARKER, TableReader, TableSpec, TableSummary, TableWriter};
