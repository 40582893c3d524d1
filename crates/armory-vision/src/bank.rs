//! Per-rarity reference banks built from the labelled canonical set.
//!
//! A bank is rebuilt on every run and never persisted. It holds the
//! fingerprints of every canonical item with a known category and a
//! resolvable icon, as one flat word matrix with a parallel category column.

use std::collections::BTreeMap;

use armory_core::{CanonicalSet, Category, IdentityKey, PipelineConfig, Rarity};
use tracing::{debug, info, warn};

use crate::error::VisionError;
use crate::fingerprint::{Fingerprint, extract, hamming};
use crate::resolve::ImageResolver;

/// One labelled reference fingerprint.
#[derive(Debug, Clone)]
pub struct Reference {
    pub key: IdentityKey,
    pub fingerprint: Fingerprint,
    pub category: Category,
}

/// Fingerprint matrix and parallel labels for one rarity. Never empty.
#[derive(Debug, Clone)]
pub struct ReferenceBank {
    rarity: Rarity,
    /// Words per fingerprint.
    width: usize,
    matrix: Vec<u64>,
    categories: Vec<Category>,
    keys: Vec<IdentityKey>,
}

impl ReferenceBank {
    /// Build a bank from references. Returns `None` for an empty list, so a
    /// bank that exists always has at least one entry.
    pub fn from_references(
        rarity: Rarity,
        references: Vec<Reference>,
    ) -> Result<Option<Self>, VisionError> {
        let Some(first) = references.first() else {
            return Ok(None);
        };
        let width = first.fingerprint.words().len();
        let mut bank = Self {
            rarity,
            width,
            matrix: Vec::with_capacity(width * references.len()),
            categories: Vec::with_capacity(references.len()),
            keys: Vec::with_capacity(references.len()),
        };
        for r in references {
            let actual = r.fingerprint.words().len();
            if actual != width {
                return Err(VisionError::LengthMismatch {
                    expected: width,
                    actual,
                });
            }
            bank.matrix.extend_from_slice(r.fingerprint.words());
            bank.categories.push(r.category);
            bank.keys.push(r.key);
        }
        Ok(Some(bank))
    }

    pub fn rarity(&self) -> Rarity {
        self.rarity
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, index: usize) -> Category {
        self.categories[index]
    }

    pub fn key(&self, index: usize) -> &IdentityKey {
        &self.keys[index]
    }

    fn row(&self, index: usize) -> &[u64] {
        &self.matrix[index * self.width..(index + 1) * self.width]
    }

    /// Hamming distance from `query` to every entry, in entry order.
    pub fn distances(&self, query: &Fingerprint) -> Result<Vec<u32>, VisionError> {
        if query.words().len() != self.width {
            return Err(VisionError::LengthMismatch {
                expected: self.width,
                actual: query.words().len(),
            });
        }
        Ok((0..self.len())
            .map(|i| hamming(self.row(i), query.words()))
            .collect())
    }

    /// Entry counts per category.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.categories {
            *counts.entry(*c).or_insert(0) += 1;
        }
        counts
    }
}

/// Banks keyed by rarity. Only rarities with at least one reference appear.
#[derive(Debug, Clone, Default)]
pub struct BankSet {
    banks: BTreeMap<Rarity, ReferenceBank>,
}

impl BankSet {
    pub fn get(&self, rarity: Rarity) -> Option<&ReferenceBank> {
        self.banks.get(&rarity)
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceBank> {
        self.banks.values()
    }

    pub fn insert(&mut self, bank: ReferenceBank) {
        self.banks.insert(bank.rarity, bank);
    }

    pub fn sizes(&self) -> BTreeMap<Rarity, usize> {
        self.banks.iter().map(|(r, b)| (*r, b.len())).collect()
    }
}

/// What the bank build used and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankReport {
    pub references: BTreeMap<Rarity, usize>,
    /// Canonical items of a rarity that is not classified automatically.
    pub excluded_rarity: usize,
    /// Canonical items without a category.
    pub unlabelled: usize,
    pub missing_image: usize,
    /// Icons that exist but could not be read, decoded or fingerprinted.
    pub failed: usize,
}

/// Fingerprint every labelled canonical item of an allowed rarity.
///
/// Items without an icon, or whose icon fails to decode, are skipped and
/// counted. Returns an empty [`BankSet`] rather than an error when nothing
/// is usable; the caller decides whether that is fatal.
pub fn build_banks(
    canonical: &CanonicalSet,
    images: &dyn ImageResolver,
    config: &PipelineConfig,
) -> Result<(BankSet, BankReport), VisionError> {
    let mut report = BankReport::default();
    let mut pending: BTreeMap<Rarity, Vec<Reference>> = BTreeMap::new();

    report.unlabelled = canonical.len() - canonical.labelled().count();

    for (key, category) in canonical.labelled() {
        let rarity = key.rarity;
        if !config.classifies(rarity) {
            report.excluded_rarity += 1;
            continue;
        }

        let image = match images.resolve(key) {
            Ok(Some(image)) => image,
            Ok(None) => {
                debug!(key = %key, "no reference icon");
                report.missing_image += 1;
                continue;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "skipping unreadable reference icon");
                report.failed += 1;
                continue;
            }
        };
        let fingerprint = match extract(&image, rarity, &config.fingerprint) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(key = %key, error = %e, "skipping reference icon");
                report.failed += 1;
                continue;
            }
        };

        pending.entry(rarity).or_default().push(Reference {
            key: key.clone(),
            fingerprint,
            category,
        });
    }

    let mut banks = BankSet::default();
    for (rarity, references) in pending {
        if let Some(bank) = ReferenceBank::from_references(rarity, references)? {
            info!(
                rarity = %rarity,
                references = bank.len(),
                categories = ?bank.category_counts(),
                "built reference bank"
            );
            banks.insert(bank);
        }
    }
    for rarity in &config.allowed_rarities {
        if banks.get(*rarity).is_none() {
            warn!(rarity = %rarity, "no reference bank; items of this rarity stay unresolved");
        }
    }

    report.references = banks.sizes();
    Ok((banks, report))
}
