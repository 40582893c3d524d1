pub mod canonical;
pub mod compact;
pub mod config;
pub mod ingest;
pub mod io;
pub mod reconcile;
pub mod record;
pub mod schema;

pub use canonical::{CanonicalEntry, CanonicalSet, CanonicalTable};
pub use compact::{Compacted, compact, frontier};
pub use config::{ConfigError, CropRect, FingerprintConfig, PipelineConfig};
pub use ingest::IngestError;
pub use io::{RecordSink, RecordSource};
pub use reconcile::{DiffRow, Membership, Reconciliation, reconcile};
pub use record::{Category, EquipmentRecord, IdentityKey, NO_ABILITY, Rarity, Stats};
pub use schema::{diff_schema, equipment_schema, records_to_batch};
