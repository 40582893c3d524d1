//! Whole-file Parquet snapshots.
//!
//! Writes never touch the target until the new file is complete: the batch is
//! written to a temporary file beside it and renamed over it.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    if !path.exists() {
        return Err(StoreError::ParquetNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Replace `path` with a Parquet file holding `batch`.
///
/// Readers see either the previous file or the complete new one.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut writer = ArrowWriter::try_new(&mut tmp, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    debug!(path = %path.display(), rows = batch.num_rows(), "wrote parquet snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn batch(names: &[&str]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("source_seq", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(names.to_vec())),
                Arc::new(Int64Array::from_iter_values(0..names.len() as i64)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scraped.parquet");
        write_parquet(&path, &batch(&["a", "b"])).unwrap();

        let batches = read_parquet(&path).unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
    }

    #[test]
    fn replace_overwrites_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("staging.parquet");
        write_parquet(&path, &batch(&["a", "b", "c"])).unwrap();
        write_parquet(&path, &batch(&["z"])).unwrap();

        let rows: usize = read_parquet(&path).unwrap().iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn creates_missing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("diff.parquet");
        write_parquet(&path, &batch(&[])).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_parquet(&dir.path().join("nope.parquet")).unwrap_err();
        assert!(matches!(err, StoreError::ParquetNotFound(_)));
    }
}
