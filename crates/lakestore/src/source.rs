//! Line-delimited JSON source reader
//!
//! Every object matching a pattern becomes one [`SourcePartition`]. The
//! partition index is the object's position in path order, so it is stable
//! for a given snapshot no matter in which order fetches complete.

use crate::error::{Result, StoreError};
use crate::location::Lake;
use crate::pattern::ObjectPattern;
use diagnostics::*;
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;

/// Records parsed from one source object.
#[derive(Debug, Clone)]
pub struct SourcePartition<T> {
    pub index: usize,
    pub location: String,
    pub records: Vec<T>,
    /// Non-blank lines that failed to parse and were dropped
    pub malformed: usize,
}

/// Reads typed records from line-delimited JSON objects.
pub struct SourceReader<'a> {
    lake: &'a Lake,
    parallelism: usize,
}

impl<'a> SourceReader<'a> {
    #[must_use]
    pub fn new(lake: &'a Lake, parallelism: usize) -> Self {
        SourceReader {
            lake,
            parallelism: parallelism.max(1),
        }
    }

    /// Read all objects matching `pattern`. Fails if nothing matches or any
    /// object cannot be fetched.
    pub async fn read<T>(&self, pattern: &str) -> Result<Vec<SourcePartition<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let pattern = ObjectPattern::parse(pattern)?;
        let objects = pattern.list(self.lake).await?;

        if objects.is_empty() {
            return Err(StoreError::NoMatchingObjects {
                pattern: pattern.as_str().to_string(),
                location: self.lake.to_string(),
            });
        }

        debug!("reading {count} objects for {pattern}",
            count: objects.len(), pattern: pattern.as_str());

        let store = self.lake.store().clone();
        let mut partitions: Vec<SourcePartition<T>> =
            futures::stream::iter(objects.into_iter().enumerate())
                .map(|(index, meta)| {
                    let store = store.clone();
                    async move {
                        let bytes = store.get(&meta.location).await?.bytes().await?;
                        Ok::<_, StoreError>(parse_lines(index, meta.location.to_string(), &bytes))
                    }
                })
                .buffer_unordered(self.parallelism)
                .try_collect()
                .await?;

        partitions.sort_by_key(|p| p.index);

        let malformed: usize = partitions.iter().map(|p| p.malformed).sum();
        if malformed > 0 {
            warn!("dropped {malformed} malformed lines matching {pattern}",
                malformed: malformed, pattern: pattern.as_str());
        }

        Ok(partitions)
    }
}

/// Parse each non-blank line of `bytes` as one record.
#[must_use]
pub fn parse_lines<T: DeserializeOwned>(
    index: usize,
    location: String,
    bytes: &[u8],
) -> SourcePartition<T> {
    let mut records = Vec::new();
    let mut malformed = 0;

    for line in bytes.split(|b| *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<T>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                malformed += 1;
                debug!("skipping malformed line in {location}: {error}",
                    location: location.as_str(), error: e.to_string());
            }
        }
    }

    SourcePartition {
        index,
        location,
        records,
        malformed,
    }
}
