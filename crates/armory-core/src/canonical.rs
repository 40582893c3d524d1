//! The curated canonical record set and the table mapping that labels it.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::{Category, EquipmentRecord, IdentityKey, Rarity};

/// One curated table and the labels every row in it carries.
///
/// Supplied by the caller (config), never inferred from the table identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub id: String,
    /// Applied to rows whose own `rarity` cell is absent.
    pub rarity: Rarity,
    pub category: Category,
    /// Snapshot location, relative to the config file when not absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// A canonical record and the table it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEntry {
    pub table: String,
    pub key: IdentityKey,
    pub record: EquipmentRecord,
}

/// Canonical records, unique by identity key, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CanonicalSet {
    entries: Vec<CanonicalEntry>,
    index: HashMap<IdentityKey, usize>,
}

impl CanonicalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. The first occurrence of a key wins; later ones are
    /// logged and dropped. Returns whether the record was inserted.
    ///
    /// Records without a key are rejected.
    pub fn insert(&mut self, table: &str, record: EquipmentRecord) -> bool {
        let Some(key) = record.key() else {
            return false;
        };
        if let Some(&existing) = self.index.get(&key) {
            warn!(
                key = %key,
                table,
                first_table = %self.entries[existing].table,
                "duplicate canonical key, keeping first"
            );
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push(CanonicalEntry {
            table: table.to_string(),
            key,
            record,
        });
        true
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&CanonicalEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalEntry> {
        self.entries.iter()
    }

    /// Entries with a known category, as `(key, category)` pairs.
    pub fn labelled(&self) -> impl Iterator<Item = (&IdentityKey, Category)> {
        self.entries
            .iter()
            .filter_map(|e| e.record.category.map(|c| (&e.key, c)))
    }
}
