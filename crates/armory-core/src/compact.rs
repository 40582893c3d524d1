//! Dedup/compaction of scraped records.
//!
//! The scraper re-reads old pages, so one item can appear under many source
//! sequence numbers. Compaction keeps the earliest observation per
//! `(name, rarity)`, drops nameless rows, and keeps exactly one row at the
//! highest sequence seen so the next scrape knows where to resume.

use std::collections::HashSet;

use tracing::debug;

use crate::record::{EquipmentRecord, Rarity};

/// Result of [`compact`].
#[derive(Debug, Clone, PartialEq)]
pub struct Compacted {
    /// Sorted by `source_seq` ascending.
    pub records: Vec<EquipmentRecord>,
    /// Named rows dropped because an earlier row had the same key.
    pub duplicates: usize,
    /// Nameless rows dropped.
    pub placeholders: usize,
}

/// Compact scraped rows to one row per key plus the scan frontier marker.
///
/// Named rows with a null rarity are partitioned under `(name, None)`, so they
/// survive compaction but never match a canonical key.
///
/// Idempotent: `compact(&compact(s).records).records == compact(s).records`.
pub fn compact(rows: &[EquipmentRecord]) -> Compacted {
    let Some(max_seq) = frontier(rows) else {
        return Compacted {
            records: Vec::new(),
            duplicates: 0,
            placeholders: 0,
        };
    };

    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by_key(|&i| rows[i].source_seq);

    let mut seen: HashSet<(&str, Option<Rarity>)> = HashSet::new();
    let mut kept: Vec<EquipmentRecord> = Vec::new();
    let mut duplicates = 0;
    let mut nameless = 0;
    let mut frontier_kept = false;
    let mut frontier_placeholder: Option<&EquipmentRecord> = None;

    for &i in &order {
        let row = &rows[i];
        match row.name() {
            Some(name) => {
                if seen.insert((name, row.rarity)) {
                    frontier_kept |= row.source_seq == max_seq;
                    kept.push(row.clone());
                } else {
                    duplicates += 1;
                }
            }
            None => {
                nameless += 1;
                if row.source_seq == max_seq && frontier_placeholder.is_none() {
                    frontier_placeholder = Some(row);
                }
            }
        }
    }

    // The frontier must survive. A kept named row at the max sequence already
    // marks it; otherwise keep the first nameless row there.
    if !frontier_kept {
        if let Some(row) = frontier_placeholder {
            kept.push(row.clone());
            nameless -= 1;
        } else {
            // Only reachable when every row at max_seq was a duplicate.
            kept.push(EquipmentRecord::placeholder(max_seq));
        }
    }

    kept.sort_by_key(|r| r.source_seq);
    debug!(
        input = rows.len(),
        kept = kept.len(),
        duplicates,
        placeholders = nameless,
        "compacted scraped rows"
    );

    Compacted {
        records: kept,
        duplicates,
        placeholders: nameless,
    }
}

/// The scan frontier: the highest source sequence number in `rows`.
pub fn frontier(rows: &[EquipmentRecord]) -> Option<i64> {
    rows.iter().map(|r| r.source_seq).max()
}
