//! Parquet encoding for table files

use crate::error::Result;
use crate::schema::ForArrow;
use arrow_array::RecordBatch;
use bytes::Bytes;
use parquet::arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode one batch as a snappy-compressed Parquet file.
pub fn encode_batch(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    let _ = writer.close()?;
    Ok(buffer)
}

/// Decode every record batch of a Parquet file.
pub fn decode_batches(bytes: Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Rows to a batch laid out by `T::for_arrow()`.
pub fn to_batch<T: Serialize + ForArrow>(rows: &[T]) -> Result<RecordBatch> {
    Ok(serde_arrow::to_record_batch(&T::for_arrow(), &rows)?)
}

/// Batch back to rows.
pub fn from_batch<T: DeserializeOwned>(batch: &RecordBatch) -> Result<Vec<T>> {
    Ok(serde_arrow::from_record_batch(batch)?)
}
