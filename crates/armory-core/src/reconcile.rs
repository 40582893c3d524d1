//! Full outer join of the canonical set against compacted scraped records.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::canonical::CanonicalSet;
use crate::record::{EquipmentRecord, IdentityKey};
use crate::schema::{diff_schema, record_columns};

/// Which side of the join a diff row exists on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Membership {
    /// In the canonical set, never seen by the scraper.
    CanonicalOnly,
    /// Scraped, but not yet curated.
    ScrapedOnly,
}

impl Membership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CanonicalOnly => "missing_from_scraping",
            Self::ScrapedOnly => "missing_from_canonical",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub membership: Membership,
    pub key: IdentityKey,
    /// The record from whichever side the key exists on.
    pub record: EquipmentRecord,
    /// Canonical table id, for canonical-only rows.
    pub source_table: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Canonical-only rows sorted by key, then scraped-only rows in scrape order.
    pub diffs: Vec<DiffRow>,
    /// Keys present on both sides, sorted.
    pub matched: Vec<IdentityKey>,
    /// Scraped rows without a complete key (placeholders, unknown rarity).
    pub unkeyed: usize,
}

impl Reconciliation {
    pub fn scraped_only(&self) -> impl Iterator<Item = &DiffRow> {
        self.diffs
            .iter()
            .filter(|d| d.membership == Membership::ScrapedOnly)
    }

    pub fn count(&self, membership: Membership) -> usize {
        self.diffs
            .iter()
            .filter(|d| d.membership == membership)
            .count()
    }

    /// Diff rows as one [`diff_schema`] batch for review export.
    pub fn to_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(
                self.diffs
                    .iter()
                    .map(|d| d.membership.as_str())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                self.diffs
                    .iter()
                    .map(|d| d.source_table.as_deref())
                    .collect::<Vec<_>>(),
            )),
        ];
        columns.extend(record_columns(self.diffs.iter().map(|d| &d.record)));
        RecordBatch::try_new(Arc::new(diff_schema()), columns)
    }
}

/// Join `canonical` against compacted `scraped` on identity key.
///
/// Every key of either side ends up in exactly one of `matched`, the
/// canonical-only diffs, or the scraped-only diffs. A key repeated on the
/// scraped side (uncompacted input) is reported once, from its first row.
pub fn reconcile(canonical: &CanonicalSet, scraped: &[EquipmentRecord]) -> Reconciliation {
    let mut scraped_by_key: HashMap<IdentityKey, &EquipmentRecord> = HashMap::new();
    let mut scraped_order: Vec<IdentityKey> = Vec::new();
    let mut unkeyed = 0;
    for record in scraped {
        match record.key() {
            Some(key) => {
                if !scraped_by_key.contains_key(&key) {
                    scraped_by_key.insert(key.clone(), record);
                    scraped_order.push(key);
                }
            }
            None => unkeyed += 1,
        }
    }

    let mut matched = BTreeSet::new();
    let mut canonical_only: Vec<DiffRow> = Vec::new();
    for entry in canonical.iter() {
        if scraped_by_key.contains_key(&entry.key) {
            matched.insert(entry.key.clone());
        } else {
            canonical_only.push(DiffRow {
                membership: Membership::CanonicalOnly,
                key: entry.key.clone(),
                record: entry.record.clone(),
                source_table: Some(entry.table.clone()),
            });
        }
    }
    canonical_only.sort_by(|a, b| a.key.cmp(&b.key));

    let mut scraped_only: Vec<DiffRow> = scraped_order
        .into_iter()
        .filter(|key| !canonical.contains(key))
        .filter_map(|key| {
            let record = scraped_by_key.get(&key)?;
            Some(DiffRow {
                membership: Membership::ScrapedOnly,
                record: (*record).clone(),
                key,
                source_table: None,
            })
        })
        .collect();
    scraped_only.sort_by(|a, b| {
        a.record
            .source_seq
            .cmp(&b.record.source_seq)
            .then_with(|| a.key.cmp(&b.key))
    });

    info!(
        matched = matched.len(),
        missing_from_scraping = canonical_only.len(),
        missing_from_canonical = scraped_only.len(),
        unkeyed,
        "reconciled"
    );

    let mut diffs = canonical_only;
    diffs.extend(scraped_only);
    Reconciliation {
        diffs,
        matched: matched.into_iter().collect(),
        unkeyed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Category, Rarity};
    use crate::schema::col;
    use arrow::array::Array;

    fn canonical(items: &[(&str, Rarity, Category)]) -> CanonicalSet {
        let mut set = CanonicalSet::new();
        for (i, (name, rarity, category)) in items.iter().enumerate() {
            let mut r = EquipmentRecord::named(*name, *rarity, i as i64);
            r.category = Some(*category);
            set.insert("canon", r);
        }
        set
    }

    #[test]
    fn classifies_both_sides() {
        let canon = canonical(&[
            ("Sword A", Rarity::Ur, Category::Weapon),
            ("Helm C", Rarity::Ksr, Category::Armor),
        ]);
        let scraped = vec![
            EquipmentRecord::named("Sword A", Rarity::Ur, 1),
            EquipmentRecord::named("Shield B", Rarity::Ssr, 2),
        ];
        let rec = reconcile(&canon, &scraped);

        assert_eq!(rec.matched, vec![IdentityKey::new("Sword A", Rarity::Ur)]);
        let canonical_only: Vec<_> = rec
            .diffs
            .iter()
            .filter(|d| d.membership == Membership::CanonicalOnly)
            .collect();
        let missing_scrape: Vec<_> = canonical_only.iter().map(|d| d.key.clone()).collect();
        assert_eq!(missing_scrape, vec![IdentityKey::new("Helm C", Rarity::Ksr)]);
        let missing_canon: Vec<_> = rec.scraped_only().map(|d| d.key.clone()).collect();
        assert_eq!(missing_canon, vec![IdentityKey::new("Shield B", Rarity::Ssr)]);

        let helm = canonical_only[0];
        assert_eq!(helm.source_table.as_deref(), Some("canon"));
        assert_eq!(helm.record.category, Some(Category::Armor));
    }

    #[test]
    fn every_key_lands_in_exactly_one_bucket() {
        let canon = canonical(&[
            ("A", Rarity::Ur, Category::Weapon),
            ("B", Rarity::Ur, Category::Armor),
            ("C", Rarity::Ksr, Category::Accessory),
        ]);
        let scraped = vec![
            EquipmentRecord::named("B", Rarity::Ur, 1),
            EquipmentRecord::named("C", Rarity::Ur, 2),
            EquipmentRecord::named("D", Rarity::Ssr, 3),
            EquipmentRecord::placeholder(4),
        ];
        let rec = reconcile(&canon, &scraped);

        let mut all: Vec<IdentityKey> = rec.matched.clone();
        all.extend(rec.diffs.iter().map(|d| d.key.clone()));
        let unique: BTreeSet<_> = all.iter().cloned().collect();
        assert_eq!(unique.len(), all.len(), "no key in two buckets");

        let mut expected: BTreeSet<IdentityKey> = canon.iter().map(|e| e.key.clone()).collect();
        expected.extend(scraped.iter().filter_map(EquipmentRecord::key));
        assert_eq!(unique, expected);
        assert_eq!(rec.unkeyed, 1);
    }

    #[test]
    fn rarity_is_part_of_identity() {
        let canon = canonical(&[("Blade", Rarity::Ur, Category::Weapon)]);
        let rec = reconcile(&canon, &[EquipmentRecord::named("Blade", Rarity::Ksr, 1)]);
        assert!(rec.matched.is_empty());
        assert_eq!(rec.count(Membership::CanonicalOnly), 1);
        assert_eq!(rec.count(Membership::ScrapedOnly), 1);
    }

    #[test]
    fn repeated_scraped_key_reported_once() {
        let rec = reconcile(
            &CanonicalSet::new(),
            &[
                EquipmentRecord::named("X", Rarity::Ur, 1),
                EquipmentRecord::named("X", Rarity::Ur, 2),
            ],
        );
        assert_eq!(rec.diffs.len(), 1);
        assert_eq!(rec.diffs[0].record.source_seq, 1);
    }

    #[test]
    fn scraped_only_ordered_by_sequence() {
        let rec = reconcile(
            &CanonicalSet::new(),
            &[
                EquipmentRecord::named("late", Rarity::Ur, 9),
                EquipmentRecord::named("early", Rarity::Ur, 2),
            ],
        );
        let names: Vec<_> = rec.diffs.iter().map(|d| d.key.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn diff_batch_carries_membership_and_fields() {
        let canon = canonical(&[("Helm C", Rarity::Ksr, Category::Armor)]);
        let mut shield = EquipmentRecord::named("Shield B", Rarity::Ssr, 2);
        shield.stats.defense = Some(80);
        shield.ability = Some("Guard".into());
        let rec = reconcile(&canon, &[shield]);

        let batch = rec.to_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        let membership = batch
            .column_by_name(col::MEMBERSHIP)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(membership.value(0), "missing_from_scraping");
        assert_eq!(membership.value(1), "missing_from_canonical");

        let table = batch.column_by_name(col::SOURCE_TABLE).unwrap();
        assert!(!table.is_null(0));
        assert!(table.is_null(1));

        let ability = batch
            .column_by_name(col::ABILITY)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ability.value(1), "Guard");
    }

    #[test]
    fn empty_inputs() {
        let rec = reconcile(&CanonicalSet::new(), &[]);
        assert!(rec.diffs.is_empty());
        assert_eq!(rec.to_batch().unwrap().num_rows(), 0);
    }
}
