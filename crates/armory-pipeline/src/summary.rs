//! Counts reported at the end of a refresh.

use std::collections::BTreeMap;

use armory_core::{Category, EquipmentRecord, Membership, Rarity};
use chrono::{DateTime, Utc};

use crate::staging::ReconcileOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // ── Compaction ──
    pub scraped_rows: usize,
    pub compacted_rows: usize,
    pub duplicates_dropped: usize,
    pub placeholders_dropped: usize,
    pub frontier: Option<i64>,

    // ── Reconciliation ──
    pub matched: usize,
    pub missing_from_scraping: usize,
    pub missing_from_canonical: usize,
    pub unkeyed: usize,

    // ── Staging and classification ──
    pub staged: usize,
    pub classified: usize,
    pub low_confidence: usize,
    pub skipped_decode: usize,
    pub skipped_rarity: usize,
    pub skipped_no_bank: usize,
    pub skipped_no_image: usize,
    pub bank_sizes: BTreeMap<Rarity, usize>,
}

impl RunSummary {
    /// Compaction and reconciliation counts; staging counts start at zero.
    pub fn from_outcome(outcome: &ReconcileOutcome, started_at: DateTime<Utc>) -> Self {
        let rec = &outcome.reconciliation;
        Self {
            started_at,
            finished_at: None,
            scraped_rows: outcome.scraped_rows,
            compacted_rows: outcome.compacted.records.len(),
            duplicates_dropped: outcome.compacted.duplicates,
            placeholders_dropped: outcome.compacted.placeholders,
            frontier: armory_core::frontier(&outcome.compacted.records),
            matched: rec.matched.len(),
            missing_from_scraping: rec.count(Membership::CanonicalOnly),
            missing_from_canonical: rec.count(Membership::ScrapedOnly),
            unkeyed: rec.unkeyed,
            staged: 0,
            classified: 0,
            low_confidence: 0,
            skipped_decode: 0,
            skipped_rarity: 0,
            skipped_no_bank: 0,
            skipped_no_image: 0,
            bank_sizes: BTreeMap::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Staged rows left without a category, for any reason.
    pub fn unresolved(&self) -> usize {
        self.staged - self.classified
    }

    /// Label/value pairs in report order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let banks = if self.bank_sizes.is_empty() {
            "none".to_string()
        } else {
            self.bank_sizes
                .iter()
                .map(|(r, n)| format!("{r}={n}"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut rows = vec![
            ("started_at", self.started_at.to_rfc3339()),
            ("scraped_rows", self.scraped_rows.to_string()),
            ("compacted_rows", self.compacted_rows.to_string()),
            ("duplicates_dropped", self.duplicates_dropped.to_string()),
            ("placeholders_dropped", self.placeholders_dropped.to_string()),
            (
                "frontier",
                self.frontier.map_or_else(|| "-".into(), |f| f.to_string()),
            ),
            ("matched", self.matched.to_string()),
            ("missing_from_scraping", self.missing_from_scraping.to_string()),
            ("missing_from_canonical", self.missing_from_canonical.to_string()),
            ("unkeyed", self.unkeyed.to_string()),
            ("reference_banks", banks),
            ("staged", self.staged.to_string()),
            ("classified", self.classified.to_string()),
            ("low_confidence", self.low_confidence.to_string()),
            ("skipped_decode", self.skipped_decode.to_string()),
            ("skipped_rarity", self.skipped_rarity.to_string()),
            ("skipped_no_bank", self.skipped_no_bank.to_string()),
            ("skipped_no_image", self.skipped_no_image.to_string()),
        ];
        if let Some(finished) = self.finished_at {
            let secs = (finished - self.started_at).num_milliseconds() as f64 / 1000.0;
            rows.push(("finished_at", finished.to_rfc3339()));
            rows.push(("elapsed_secs", format!("{secs:.3}")));
        }
        rows
    }
}

/// Staged rows per category; `None` counts unresolved rows.
pub fn category_counts(records: &[EquipmentRecord]) -> BTreeMap<Option<Category>, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.category).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use armory_core::{CanonicalSet, EquipmentRecord, compact, reconcile};

    fn outcome() -> ReconcileOutcome {
        let scraped = vec![
            EquipmentRecord::named("Potion", Rarity::Ksr, 10),
            EquipmentRecord::named("Potion", Rarity::Ksr, 12),
            EquipmentRecord::named("Potion", Rarity::Ksr, 15),
        ];
        let canonical = CanonicalSet::new();
        let compacted = compact(&scraped);
        let reconciliation = reconcile(&canonical, &compacted.records);
        ReconcileOutcome {
            scraped_rows: scraped.len(),
            compacted,
            canonical,
            reconciliation,
        }
    }

    #[test]
    fn counts_from_outcome() {
        let s = RunSummary::from_outcome(&outcome(), Utc::now());
        assert_eq!(s.scraped_rows, 3);
        assert_eq!(s.compacted_rows, 2);
        assert_eq!(s.duplicates_dropped, 2);
        assert_eq!(s.frontier, Some(15));
        assert_eq!(s.missing_from_canonical, 1);
        assert_eq!(s.unkeyed, 1);
        assert_eq!(s.unresolved(), 0);
    }

    #[test]
    fn rows_include_timing_once_finished() {
        let mut s = RunSummary::from_outcome(&outcome(), Utc::now());
        assert!(s.rows().iter().all(|(k, _)| *k != "finished_at"));
        s.finish();
        let rows = s.rows();
        assert!(rows.iter().any(|(k, _)| *k == "elapsed_secs"));
        assert_eq!(
            rows.iter().find(|(k, _)| *k == "reference_banks").map(|(_, v)| v.as_str()),
            Some("none")
        );
    }

    #[test]
    fn category_counts_include_unresolved() {
        let mut a = EquipmentRecord::named("a", Rarity::Ur, 1);
        a.category = Some(Category::Armor);
        let b = EquipmentRecord::named("b", Rarity::Ur, 2);
        let counts = category_counts(&[a, b.clone(), b]);
        assert_eq!(counts.get(&Some(Category::Armor)), Some(&1));
        assert_eq!(counts.get(&None), Some(&2));
    }
}
