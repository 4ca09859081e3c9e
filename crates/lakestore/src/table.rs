//! Partitioned Parquet tables with whole-table overwrite
//!
//! Layout of a committed table:
//!
//! ```text
//! <root>/<table>/<col>=<value>/.../part-00000-<run>.snappy.parquet
//! <root>/<table>/_SUCCESS
//! ```
//!
//! A write stages every file under `<root>/_staging/<table>-<run>/` first.
//! Only when staging succeeded is the marker of the previous output removed,
//! the previous files deleted, the staged files moved into place and the
//! marker written again. Readers require the marker, so they observe either
//! the old table or the new one, never a mix.

use crate::error::{Result, StoreError};
use crate::location::Lake;
use crate::parquet::{decode_batches, encode_batch, from_batch, to_batch};
use crate::partition::{PartitionValue, partition_path, partition_values};
use crate::schema::ForArrow;
use arrow::compute::{cast, take_record_batch};
use arrow::util::display::array_value_to_string;
use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions, StringArray, UInt32Array};
use arrow_schema::{FieldRef, Schema};
use diagnostics::*;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, PutPayload};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SUCCESS_MARKER: &str = "_SUCCESS";
pub const STAGING_DIR: &str = "_staging";

/// Name and partition columns of an output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub partition_by: &'static [&'static str],
}

/// What one table write produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: usize,
    pub files: usize,
    pub partitions: usize,
}

pub struct TableWriter<'a> {
    lake: &'a Lake,
    run_id: String,
}

impl<'a> TableWriter<'a> {
    #[must_use]
    pub fn new(lake: &'a Lake, run_id: impl Into<String>) -> Self {
        TableWriter {
            lake,
            run_id: run_id.into(),
        }
    }

    /// Replace the whole table with `rows`.
    pub async fn write<T: Serialize + ForArrow>(
        &self,
        spec: &TableSpec,
        rows: &[T],
    ) -> Result<TableSummary> {
        let batch = to_batch(rows)?;
        let files = split_partitions(spec, &batch)?;

        let staging_root = self
            .lake
            .path(&format!("{}/{}-{}", STAGING_DIR, spec.name, self.run_id));
        let table_root = self.lake.path(spec.name);

        let mut staged = Vec::with_capacity(files.len());
        for (i, (values, part)) in files.iter().enumerate() {
            let file_name = format!("part-{:05}-{}.snappy.parquet", i, self.run_id);
            let from = partition_path(&staging_root, values).child(file_name.as_str());
            let to = partition_path(&table_root, values).child(file_name.as_str());

            if let Err(e) = self.stage(&from, part).await {
                error!("staging {table} failed: {error}", table: spec.name, error: e.to_string());
                self.discard(&staging_root).await;
                self.prune(STAGING_DIR);
                return Err(e);
            }
            staged.push((from, to));
        }

        debug!("staged {files} files for {table}", files: staged.len(), table: spec.name);

        if let Err(e) = self.commit(&table_root, &staged).await {
            error!("committing {table} failed: {error}", table: spec.name, error: e.to_string());
            self.discard(&staging_root).await;
            self.prune(STAGING_DIR);
            return Err(e);
        }
        self.prune(STAGING_DIR);
        self.prune(spec.name);

        let summary = TableSummary {
            table: spec.name.to_string(),
            rows: batch.num_rows(),
            files: staged.len(),
            partitions: if spec.partition_by.is_empty() {
                0
            } else {
                staged.len()
            },
        };

        info!("committed {table}: {rows} rows in {files} files",
            table: spec.name, rows: summary.rows, files: summary.files);

        Ok(summary)
    }

    async fn stage(&self, path: &Path, batch: &RecordBatch) -> Result<()> {
        let bytes = encode_batch(batch)?;
        let _ = self.lake.store().put(path, PutPayload::from(bytes)).await?;
        Ok(())
    }

    async fn commit(&self, table_root: &Path, staged: &[(Path, Path)]) -> Result<()> {
        let store = self.lake.store();
        let marker = table_root.child(SUCCESS_MARKER);

        delete_if_present(self.lake, &marker).await?;

        let previous: Vec<ObjectMeta> = store.list(Some(table_root)).try_collect().await?;
        for meta in &previous {
            delete_if_present(self.lake, &meta.location).await?;
        }

        for (from, to) in staged {
            store.rename(from, to).await?;
        }

        let _ = store.put(&marker, PutPayload::from_static(b"")).await?;
        Ok(())
    }

    async fn discard(&self, staging_root: &Path) {
        let listed: std::result::Result<Vec<ObjectMeta>, _> = self
            .lake
            .store()
            .list(Some(staging_root))
            .try_collect()
            .await;
        match listed {
            Ok(objects) => {
                for meta in objects {
                    if let Err(e) = self.lake.store().delete(&meta.location).await {
                        warn!("could not remove staged {path}: {error}",
                            path: meta.location.to_string(), error: e.to_string());
                    }
                }
            }
            Err(e) => {
                warn!("could not list staging area {path}: {error}",
                    path: staging_root.to_string(), error: e.to_string());
            }
        }
    }

    /// Drop directories emptied by a write on local lakes.
    fn prune(&self, relative: &str) {
        if let Err(e) = self.lake.prune_empty_dirs(relative) {
            warn!("could not prune {path}: {error}", path: relative, error: e.to_string());
        }
    }
}

async fn delete_if_present(lake: &Lake, path: &Path) -> Result<()> {
    match lake.store().delete(path).await {
        Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Group rows by partition values and drop the partition columns.
/// Unpartitioned tables always yield exactly one (possibly empty) batch.
fn split_partitions(
    spec: &TableSpec,
    batch: &RecordBatch,
) -> Result<Vec<(Vec<PartitionValue>, RecordBatch)>> {
    let schema = batch.schema();
    let mut partition_idx = Vec::with_capacity(spec.partition_by.len());
    for column in spec.partition_by {
        let idx = schema
            .index_of(column)
            .map_err(|_| StoreError::UnknownPartitionColumn {
                table: spec.name.to_string(),
                column: (*column).to_string(),
            })?;
        partition_idx.push(idx);
    }

    let data_idx: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !partition_idx.contains(i))
        .collect();
    let data = batch.project(&data_idx)?;

    if partition_idx.is_empty() {
        return Ok(vec![(Vec::new(), data)]);
    }

    let mut groups: BTreeMap<Vec<PartitionValue>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(partition_idx.len());
        for (&idx, column) in partition_idx.iter().zip(spec.partition_by) {
            let array = batch.column(idx);
            let value = if array.is_null(row) {
                None
            } else {
                Some(array_value_to_string(array.as_ref(), row)?)
            };
            key.push(PartitionValue::new(*column, value));
        }
        groups
            .entry(key)
            .or_default()
            .push(row_index(spec, row, batch.num_rows())?);
    }

    groups
        .into_iter()
        .map(|(key, rows)| {
            let indices = UInt32Array::from(rows);
            Ok((key, take_record_batch(&data, &indices)?))
        })
        .collect()
}

fn row_index(spec: &TableSpec, row: usize, rows: usize) -> Result<u32> {
    u32::try_from(row).map_err(|_| StoreError::TooManyRows {
        table: spec.name.to_string(),
        rows,
    })
}

pub struct TableReader<'a> {
    lake: &'a Lake,
}

impl<'a> TableReader<'a> {
    #[must_use]
    pub fn new(lake: &'a Lake) -> Self {
        TableReader { lake }
    }

    /// True when the table's last write completed.
    pub async fn is_committed(&self, spec: &TableSpec) -> Result<bool> {
        let marker = self.lake.path(spec.name).child(SUCCESS_MARKER);
        match self.lake.store().head(&marker).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a committed table, restoring partition columns from the paths.
    pub async fn read<T: DeserializeOwned + ForArrow>(&self, spec: &TableSpec) -> Result<Vec<T>> {
        let table_root = self.lake.path(spec.name);
        if !self.is_committed(spec).await? {
            return Err(StoreError::TableNotCommitted {
                table: spec.name.to_string(),
                location: self.lake.url_for(spec.name),
            });
        }

        let mut files: Vec<ObjectMeta> = self
            .lake
            .store()
            .list(Some(&table_root))
            .try_collect()
            .await?;
        files.retain(|meta| meta.location.as_ref().ends_with(".parquet"));
        files.sort_by(|a, b| a.location.cmp(&b.location));

        let fields = T::for_arrow();
        let mut rows = Vec::new();
        for meta in files {
            let bytes = self.lake.store().get(&meta.location).await?.bytes().await?;
            let values = partition_values(&table_root, &meta.location);
            for batch in decode_batches(bytes)? {
                let full = attach_partition_columns(spec, &meta.location, &fields, &batch, &values)?;
                rows.extend(from_batch::<T>(&full)?);
            }
        }

        debug!("read {rows} rows from {table}", rows: rows.len(), table: spec.name);
        Ok(rows)
    }
}

fn attach_partition_columns(
    spec: &TableSpec,
    location: &Path,
    fields: &[FieldRef],
    batch: &RecordBatch,
    values: &[PartitionValue],
) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.len());
    for field in fields {
        if let Some(column) = batch.column_by_name(field.name()) {
            columns.push(column.clone());
            continue;
        }
        let Some(pv) = values.iter().find(|v| &v.column == field.name()) else {
            return Err(StoreError::MissingColumn {
                table: spec.name.to_string(),
                file: location.to_string(),
                column: field.name().clone(),
            });
        };
        let strings = StringArray::from(vec![pv.value.as_deref(); batch.num_rows()]);
        columns.push(cast(&strings, field.data_type())?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields.to_vec())),
        columns,
        &options,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StorageConfig;
    use arrow_schema::{DataType, Field};
    use futures::stream::BoxStream;
    use object_store::memory::InMemory;
    use object_store::{
        GetOptions, GetResult, ListResult, MultipartUpload, ObjectStore, PutMultipartOptions,
        PutOptions, PutResult,
    };
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Play {
        id: i64,
        artist: Option<String>,
        year: i32,
    }

    impl ForArrow for Play {
        fn for_arrow() -> Vec<FieldRef> {
            vec![
                Arc::new(Field::new("id", DataType::Int64, false)),
                Arc::new(Field::new("artist", DataType::Utf8, true)),
                Arc::new(Field::new("year", DataType::Int32, false)),
            ]
        }
    }

    const PLAYS: TableSpec = TableSpec {
        name: "plays",
        partition_by: &["year", "artist"],
    };

    const FLAT: TableSpec = TableSpec {
        name: "flat",
        partition_by: &[],
    };

    fn plays() -> Vec<Play> {
        vec![
            Play { id: 1, artist: Some("AR1".into()), year: 2018 },
            Play { id: 2, artist: None, year: 2018 },
            Play { id: 3, artist: Some("AR1".into()), year: 2018 },
            Play { id: 4, artist: Some("AR2".into()), year: 2019 },
        ]
    }

    async fn keys(lake: &Lake, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = lake
            .store()
            .list(Some(&lake.path(prefix)))
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.location.to_string())
            .collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_partitioned_write_and_read_back() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let lake = Lake::in_memory();
        let summary = TableWriter::new(&lake, "run1").write(&PLAYS, &plays()).await?;
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.partitions, 3);

        let written = keys(&lake, "plays").await;
        assert!(written.contains(&"plays/_SUCCESS".to_string()));
        assert!(written.iter().any(|k| k.starts_with("plays/year=2018/artist=__HIVE_DEFAULT_PARTITION__/")));
        assert!(written.iter().any(|k| k.starts_with("plays/year=2019/artist=AR2/")));
        assert!(keys(&lake, STAGING_DIR).await.is_empty());

        let mut read: Vec<Play> = TableReader::new(&lake).read(&PLAYS).await?;
        read.sort_by_key(|p| p.id);
        assert_eq!(read, plays());
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_replaces_previous_output() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let lake = Lake::in_memory();
        let _ = TableWriter::new(&lake, "run1").write(&PLAYS, &plays()).await?;
        let second = vec![Play { id: 9, artist: Some("AR9".into()), year: 2020 }];
        let _ = TableWriter::new(&lake, "run2").write(&PLAYS, &second).await?;

        let written = keys(&lake, "plays").await;
        assert!(written.iter().all(|k| !k.contains("run1")));
        let read: Vec<Play> = TableReader::new(&lake).read(&PLAYS).await?;
        assert_eq!(read, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_tables() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let lake = Lake::in_memory();
        let empty: Vec<Play> = Vec::new();

        let partitioned = TableWriter::new(&lake, "r").write(&PLAYS, &empty).await?;
        assert_eq!(partitioned.files, 0);
        let flat = TableWriter::new(&lake, "r").write(&FLAT, &empty).await?;
        assert_eq!(flat.files, 1);

        let reader = TableReader::new(&lake);
        assert!(reader.read::<Play>(&PLAYS).await?.is_empty());
        assert!(reader.read::<Play>(&FLAT).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_uncommitted_table_is_rejected() {
        let lake = Lake::in_memory();
        let reader = TableReader::new(&lake);
        assert!(!reader.is_committed(&PLAYS).await.unwrap());
        let err = reader.read::<Play>(&PLAYS).await.expect_err("not written");
        assert!(matches!(err, StoreError::TableNotCommitted { .. }));
    }

    /// Memory store that refuses to copy onto keys containing `refused`.
    #[derive(Debug)]
    struct RefusingCopy {
        inner: InMemory,
        refused: &'static str,
    }

    impl std::fmt::Display for RefusingCopy {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "RefusingCopy")
        }
    }

    #[async_trait::async_trait]
    impl ObjectStore for RefusingCopy {
        async fn put_opts(
            &self,
            location: &Path,
            payload: PutPayload,
            opts: PutOptions,
        ) -> object_store::Result<PutResult> {
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &Path,
            opts: PutMultipartOptions,
        ) -> object_store::Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(&self, location: &Path, options: GetOptions) -> object_store::Result<GetResult> {
            self.inner.get_opts(location, options).await
        }

        async fn delete(&self, location: &Path) -> object_store::Result<()> {
            self.inner.delete(location).await
        }

        fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
            self.inner.list(prefix)
        }

        async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
            self.inner.list_with_delimiter(prefix).await
        }

        async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
            if to.as_ref().contains(self.refused) {
                return Err(object_store::Error::Generic {
                    store: "RefusingCopy",
                    source: "copy refused".into(),
                });
            }
            self.inner.copy(from, to).await
        }

        async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
            self.inner.copy_if_not_exists(from, to).await
        }
    }

    #[tokio::test]
    async fn test_failed_commit_clears_staging_and_marker() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = RefusingCopy {
            inner: InMemory::new(),
            refused: "artist=AR2/part-00002-run2",
        };
        let lake = Lake::from_store(Arc::new(store), Path::default());
        let _ = TableWriter::new(&lake, "run1").write(&PLAYS, &plays()).await?;

        let err = TableWriter::new(&lake, "run2")
            .write(&PLAYS, &plays())
            .await
            .expect_err("third move is refused");
        assert!(matches!(err, StoreError::ObjectStore(_)));

        assert!(keys(&lake, STAGING_DIR).await.is_empty());
        let reader = TableReader::new(&lake);
        assert!(!reader.is_committed(&PLAYS).await?);
        assert!(matches!(
            reader.read::<Play>(&PLAYS).await,
            Err(StoreError::TableNotCommitted { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_local_overwrite_leaves_no_empty_dirs() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::tempdir()?;
        let lake = Lake::open_for_write(&StorageConfig::local(tmp.path().to_string_lossy()))?;
        let _ = TableWriter::new(&lake, "run1").write(&PLAYS, &plays()).await?;
        let second = vec![Play { id: 9, artist: Some("AR9".into()), year: 2020 }];
        let _ = TableWriter::new(&lake, "run2").write(&PLAYS, &second).await?;

        assert!(!tmp.path().join(STAGING_DIR).exists());
        assert!(!tmp.path().join("plays/year=2018").exists());
        assert!(tmp.path().join("plays/year=2020/artist=AR9").is_dir());
        assert!(tmp.path().join("plays/_SUCCESS").is_file());

        let read: Vec<Play> = TableReader::new(&lake).read(&PLAYS).await?;
        assert_eq!(read, second);
        Ok(())
    }

    #[test]
    fn test_row_index_limit() {
        assert_eq!(row_index(&PLAYS, 7, 8).unwrap(), 7);
        let rows = u32::MAX as usize + 2;
        assert!(matches!(
            row_index(&PLAYS, rows - 1, rows),
            Err(StoreError::TooManyRows { .. })
        ));
    }

    #[test]
    fn test_unknown_partition_column() {
        let spec = TableSpec {
            name: "bad",
            partition_by: &["month"],
        };
        let batch = to_batch(&plays()).unwrap();
        assert!(matches!(
            split_partitions(&spec, &batch),
            Err(StoreError::UnknownPartitionColumn { .. })
        ));
    }
}
