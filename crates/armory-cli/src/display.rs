//! Terminal tables for diffs, run summaries and category counts.

use std::collections::BTreeMap;
use std::sync::Arc;

use armory_core::schema::col;
use armory_core::{Category, Compacted, Membership, Reconciliation};
use armory_pipeline::RunSummary;
use arrow::array::{ArrayRef, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

/// Diff columns shown in the terminal preview.
const DIFF_PREVIEW: &[&str] = &[
    col::MEMBERSHIP,
    col::SOURCE_TABLE,
    col::NAME,
    col::RARITY,
    col::CATEGORY,
    col::SOURCE_SEQ,
];

// ── Public API ──

pub fn print_compaction(compacted: &Compacted) {
    println!(
        "kept {} rows, dropped {} duplicates and {} placeholders; frontier {}",
        compacted.records.len(),
        compacted.duplicates,
        compacted.placeholders,
        armory_core::frontier(&compacted.records).map_or_else(|| "-".to_string(), |f| f.to_string()),
    );
}

/// Print membership counts and the first `limit` diff rows.
pub fn print_reconciliation(rec: &Reconciliation, limit: usize) -> anyhow::Result<()> {
    println!(
        "matched {}, missing from scraping {}, missing from canonical {}, unkeyed {}",
        rec.matched.len(),
        rec.count(Membership::CanonicalOnly),
        rec.count(Membership::ScrapedOnly),
        rec.unkeyed,
    );
    if rec.diffs.is_empty() || limit == 0 {
        return Ok(());
    }
    let preview = diff_preview(rec, limit)?;
    println!("{}", pretty_format_batches(&[preview])?);
    if rec.diffs.len() > limit {
        println!("... {} more", rec.diffs.len() - limit);
    }
    Ok(())
}

pub fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", pretty_format_batches(&[summary_batch(summary)?])?);
    Ok(())
}

pub fn print_category_counts(counts: &BTreeMap<Option<Category>, usize>) -> anyhow::Result<()> {
    println!("{}", pretty_format_batches(&[category_batch(counts)?])?);
    Ok(())
}

// ── Batch builders ──

fn diff_preview(rec: &Reconciliation, limit: usize) -> anyhow::Result<RecordBatch> {
    let batch = rec.to_batch()?;
    let schema = batch.schema();
    let indices = DIFF_PREVIEW
        .iter()
        .map(|name| schema.index_of(name))
        .collect::<Result<Vec<_>, _>>()?;
    let projected = batch.project(&indices)?;
    Ok(projected.slice(0, limit.min(projected.num_rows())))
}

fn summary_batch(summary: &RunSummary) -> anyhow::Result<RecordBatch> {
    let rows = summary.rows();
    let schema = Arc::new(Schema::new(vec![
        Field::new("metric", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(k, _)| *k))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|(_, v)| v.as_str()))),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn category_batch(counts: &BTreeMap<Option<Category>, usize>) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("category", DataType::Utf8, false),
        Field::new("staged", DataType::UInt64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            counts
                .keys()
                .map(|c| c.map_or("unresolved", |c| c.as_str())),
        )),
        Arc::new(UInt64Array::from_iter_values(
            counts.values().map(|&n| n as u64),
        )),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}
