//! Typed extraction of equipment records from Arrow batches.
//!
//! This is the ingestion boundary: rows leave here as [`EquipmentRecord`]s or
//! not at all. A missing required column, a null identity in a canonical
//! table, or an unparseable label aborts the load with an [`IngestError`].

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use thiserror::Error;
use tracing::debug;

use crate::canonical::{CanonicalSet, CanonicalTable};
use crate::record::{EquipmentRecord, ParseLabelError, Stats};
use crate::schema::col;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("null '{column}' at row {row}")]
    NullValue { column: &'static str, row: usize },

    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedType {
        column: &'static str,
        data_type: DataType,
    },

    #[error("row {row}: {source}")]
    InvalidLabel {
        row: usize,
        #[source]
        source: ParseLabelError,
    },
}

/// Columns every scraped batch must carry. Values may be null except `source_seq`.
const SCRAPED_REQUIRED: &[&str] = &[col::NAME, col::RARITY, col::SOURCE_SEQ];

/// Extract scraped records.
///
/// Placeholder rows (null name) and rows with a null rarity are kept; only
/// `source_seq` must be non-null.
pub fn scraped_from_batches(batches: &[RecordBatch]) -> Result<Vec<EquipmentRecord>, IngestError> {
    let mut out = Vec::new();
    for batch in batches {
        for &column in SCRAPED_REQUIRED {
            if batch.column_by_name(column).is_none() {
                return Err(IngestError::MissingColumn(column));
            }
        }
        for row in 0..batch.num_rows() {
            let source_seq = integer(batch, col::SOURCE_SEQ, row)?.ok_or(IngestError::NullValue {
                column: col::SOURCE_SEQ,
                row,
            })?;
            let rarity = text(batch, col::RARITY, row)?
                .map(|s| s.parse())
                .transpose()
                .map_err(|source| IngestError::InvalidLabel { row, source })?;
            out.push(read_record(batch, row, rarity, source_seq)?);
        }
    }
    debug!(rows = out.len(), "ingested scraped records");
    Ok(out)
}

/// Extract one canonical table into `set`, labelling every row with the
/// table's category. Returns the number of rows inserted (duplicates of keys
/// already in `set` are skipped).
///
/// `name` is required and must be non-null. A per-row `rarity` cell overrides
/// the table's rarity. Without a `source_seq` column the row ordinal is used.
pub fn canonical_from_batches(
    table: &CanonicalTable,
    batches: &[RecordBatch],
    set: &mut CanonicalSet,
) -> Result<usize, IngestError> {
    let mut inserted = 0;
    let mut ordinal: i64 = 0;
    for batch in batches {
        if batch.column_by_name(col::NAME).is_none() {
            return Err(IngestError::MissingColumn(col::NAME));
        }
        for row in 0..batch.num_rows() {
            let name = text(batch, col::NAME, row)?.ok_or(IngestError::NullValue {
                column: col::NAME,
                row,
            })?;
            let rarity = match text(batch, col::RARITY, row)? {
                Some(s) => s
                    .parse()
                    .map_err(|source| IngestError::InvalidLabel { row, source })?,
                None => table.rarity,
            };
            let source_seq = integer(batch, col::SOURCE_SEQ, row)?.unwrap_or(ordinal);
            ordinal += 1;

            let mut record = read_record(batch, row, Some(rarity), source_seq)?;
            record.name = Some(name);
            record.category = Some(table.category);
            if set.insert(&table.id, record) {
                inserted += 1;
            }
        }
    }
    debug!(table = %table.id, inserted, "ingested canonical table");
    Ok(inserted)
}

/// Everything but rarity and sequence, which the callers resolve differently.
fn read_record(
    batch: &RecordBatch,
    row: usize,
    rarity: Option<crate::record::Rarity>,
    source_seq: i64,
) -> Result<EquipmentRecord, IngestError> {
    let category = text(batch, col::CATEGORY, row)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|source| IngestError::InvalidLabel { row, source })?;

    let stats = Stats {
        hp: integer(batch, col::HP, row)?,
        attack: integer(batch, col::ATTACK, row)?,
        defense: integer(batch, col::DEFENSE, row)?,
        critical: decimal(batch, col::CRITICAL, row)?,
        evasion: decimal(batch, col::EVASION, row)?,
        accuracy: decimal(batch, col::ACCURACY, row)?,
    }
    .rounded();

    let mut record = EquipmentRecord {
        name: text(batch, col::NAME, row)?,
        rarity,
        category,
        stats,
        ability: text(batch, col::ABILITY, row)?,
        ability_category: text(batch, col::ABILITY_CATEGORY, row)?,
        source_seq,
        image_ref: text(batch, col::IMAGE_REF, row)?,
        is_new: flag(batch, col::IS_NEW, row)?.unwrap_or(false),
    };
    record.fill_ability_tag();
    Ok(record)
}

// ── Arrow extraction helpers ──
//
// Each returns `Ok(None)` for an absent column or a null cell.

/// Trimmed string (Utf8 or LargeUtf8); blank strings read as `None`.
fn text(batch: &RecordBatch, column: &'static str, row: usize) -> Result<Option<String>, IngestError> {
    let Some(arr) = batch.column_by_name(column) else {
        return Ok(None);
    };
    if arr.is_null(row) {
        return Ok(None);
    }
    let value = if let Some(a) = arr.as_any().downcast_ref::<StringArray>() {
        a.value(row)
    } else if let Some(a) = arr.as_any().downcast_ref::<LargeStringArray>() {
        a.value(row)
    } else {
        return Err(unsupported(column, arr.data_type()));
    };
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Integer column; float cells are rounded.
fn integer(batch: &RecordBatch, column: &'static str, row: usize) -> Result<Option<i64>, IngestError> {
    let Some(arr) = batch.column_by_name(column) else {
        return Ok(None);
    };
    if arr.is_null(row) {
        return Ok(None);
    }
    let any = arr.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        Ok(Some(a.value(row)))
    } else if let Some(a) = any.downcast_ref::<Int32Array>() {
        Ok(Some(a.value(row) as i64))
    } else if let Some(a) = any.downcast_ref::<Float64Array>() {
        Ok(Some(a.value(row).round() as i64))
    } else if let Some(a) = any.downcast_ref::<Float32Array>() {
        Ok(Some(a.value(row).round() as i64))
    } else {
        Err(unsupported(column, arr.data_type()))
    }
}

fn decimal(batch: &RecordBatch, column: &'static str, row: usize) -> Result<Option<f64>, IngestError> {
    let Some(arr) = batch.column_by_name(column) else {
        return Ok(None);
    };
    if arr.is_null(row) {
        return Ok(None);
    }
    let any = arr.as_any();
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        Ok(Some(a.value(row)))
    } else if let Some(a) = any.downcast_ref::<Float32Array>() {
        Ok(Some(a.value(row) as f64))
    } else if let Some(a) = any.downcast_ref::<Int64Array>() {
        Ok(Some(a.value(row) as f64))
    } else if let Some(a) = any.downcast_ref::<Int32Array>() {
        Ok(Some(a.value(row) as f64))
    } else {
        Err(unsupported(column, arr.data_type()))
    }
}

/// Boolean column; integer flags (the scraper writes 0/1) are accepted.
fn flag(batch: &RecordBatch, column: &'static str, row: usize) -> Result<Option<bool>, IngestError> {
    let Some(arr) = batch.column_by_name(column) else {
        return Ok(None);
    };
    if arr.is_null(row) {
        return Ok(None);
    }
    if let Some(a) = arr.as_any().downcast_ref::<BooleanArray>() {
        return Ok(Some(a.value(row)));
    }
    integer(batch, column, row).map(|v| v.map(|n| n != 0))
}

fn unsupported(column: &'static str, data_type: &DataType) -> IngestError {
    IngestError::UnsupportedType {
        column,
        data_type: data_type.clone(),
    }
}
