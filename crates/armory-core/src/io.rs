//! Boundaries to the record store.
//!
//! The pipeline reads full snapshots and writes full replacements; it never
//! issues partial updates. Implementations own the storage format.

use crate::canonical::CanonicalSet;
use crate::record::EquipmentRecord;

/// Full scraped and canonical snapshots.
pub trait RecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every scraped row, uncompacted, with its source sequence number.
    fn scraped(&self) -> Result<Vec<EquipmentRecord>, Self::Error>;

    /// The curated set, labelled by the table mapping.
    fn canonical(&self) -> Result<CanonicalSet, Self::Error>;
}

/// Destination for the staging set.
pub trait RecordSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Replace the stored set with `records`. Either all of `records` becomes
    /// visible or the previous set remains.
    fn replace_all(&mut self, records: &[EquipmentRecord]) -> Result<(), Self::Error>;
}
