//! Parquet-backed record source and staging sink.

use std::path::{Path, PathBuf};

use armory_core::ingest::{canonical_from_batches, scraped_from_batches};
use armory_core::{
    CanonicalSet, CanonicalTable, EquipmentRecord, Reconciliation, RecordSink, RecordSource,
    records_to_batch,
};
use tracing::info;

use crate::error::StoreError;
use crate::persist::{read_parquet, write_parquet};

/// Read and validate a scraped-schema snapshot.
pub fn read_records(path: &Path) -> Result<Vec<EquipmentRecord>, StoreError> {
    let batches = read_parquet(path)?;
    scraped_from_batches(&batches).map_err(|source| StoreError::Ingest {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace `path` with `records` in the equipment schema.
pub fn write_records(path: &Path, records: &[EquipmentRecord]) -> Result<(), StoreError> {
    write_parquet(path, &records_to_batch(records)?)
}

/// Write a reconciliation diff for review.
pub fn write_diff(path: &Path, reconciliation: &Reconciliation) -> Result<(), StoreError> {
    write_parquet(path, &reconciliation.to_batch()?)
}

/// Scraped snapshot plus one Parquet file per canonical table.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    scraped: PathBuf,
    tables: Vec<CanonicalTable>,
    /// Relative table paths are resolved against this directory.
    base: PathBuf,
}

impl ParquetSource {
    pub fn new(
        scraped: impl Into<PathBuf>,
        tables: Vec<CanonicalTable>,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scraped: scraped.into(),
            tables,
            base: base.into(),
        }
    }

    fn table_path(&self, table: &CanonicalTable) -> Result<PathBuf, StoreError> {
        let path = table
            .path
            .as_ref()
            .ok_or_else(|| StoreError::MissingTablePath(table.id.clone()))?;
        Ok(self.base.join(path))
    }
}

impl RecordSource for ParquetSource {
    type Error = StoreError;

    fn scraped(&self) -> Result<Vec<EquipmentRecord>, StoreError> {
        let records = read_records(&self.scraped)?;
        info!(path = %self.scraped.display(), rows = records.len(), "loaded scraped snapshot");
        Ok(records)
    }

    fn canonical(&self) -> Result<CanonicalSet, StoreError> {
        let mut set = CanonicalSet::new();
        for table in &self.tables {
            let path = self.table_path(table)?;
            let batches = read_parquet(&path)?;
            let inserted = canonical_from_batches(table, &batches, &mut set)
                .map_err(|source| StoreError::Ingest { path, source })?;
            info!(table = %table.id, rows = inserted, "loaded canonical table");
        }
        Ok(set)
    }
}

/// Staging snapshot replaced wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    path: PathBuf,
}

impl ParquetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for ParquetSink {
    type Error = StoreError;

    fn replace_all(&mut self, records: &[EquipmentRecord]) -> Result<(), StoreError> {
        write_records(&self.path, records)?;
        info!(path = %self.path.display(), rows = records.len(), "replaced staging snapshot");
        Ok(())
    }
}
