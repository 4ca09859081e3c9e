//! Hive-style partition directories (`year=2018/month=11/`)
//!
//! Values are carried as strings. A null or empty value maps to the
//! `__HIVE_DEFAULT_PARTITION__` directory. Characters that are unsafe in
//! object keys (including `/` and `%`) are percent-escaped by the object
//! store's own path encoding, so a directory name is decoded with
//! [`percent_decode`] before the value is recovered.

use object_store::path::{Path, PathPart};

/// Directory value used for null partition values.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// One `column=value` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionValue {
    pub column: String,
    pub value: Option<String>,
}

impl PartitionValue {
    #[must_use]
    pub fn new(column: impl Into<String>, value: Option<String>) -> Self {
        let value = value.filter(|v| !v.is_empty());
        PartitionValue {
            column: column.into(),
            value,
        }
    }

    /// Directory name for this pair.
    #[must_use]
    pub fn segment(&self) -> PathPart<'static> {
        let value = self.value.as_deref().unwrap_or(DEFAULT_PARTITION);
        PathPart::from(format!("{}={}", self.column, value))
    }

    /// Parse a raw (store-encoded) directory name. Returns None for
    /// directories that are not `column=value`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = percent_decode(raw);
        let (column, value) = decoded.split_once('=')?;
        if column.is_empty() {
            return None;
        }
        let value = if value == DEFAULT_PARTITION {
            None
        } else {
            Some(value.to_string())
        };
        Some(PartitionValue::new(column, value))
    }
}

/// Append partition directories to a base path.
#[must_use]
pub fn partition_path(base: &Path, values: &[PartitionValue]) -> Path {
    values
        .iter()
        .fold(base.clone(), |path, value| path.child(value.segment()))
}

/// Recover partition values from the directories between `table_root` and
/// the file name of `location`.
#[must_use]
pub fn partition_values(table_root: &Path, location: &Path) -> Vec<PartitionValue> {
    let Some(parts) = location.prefix_match(table_root) else {
        return Vec::new();
    };
    let parts: Vec<PathPart<'_>> = parts.collect();
    let dirs = parts.len().saturating_sub(1);
    parts[..dirs]
        .iter()
        .filter_map(|part| PartitionValue::parse(part.as_ref()))
        .collect()
}

/// Decode `%XX` escapes; malformed escapes are kept literally.
#[must_use]
pub fn percent_decode(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}
