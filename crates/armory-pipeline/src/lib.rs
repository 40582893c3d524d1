//! Staging refresh orchestration over a record source, an icon resolver and a
//! staging sink.

mod error;
pub use error::PipelineError;

pub mod staging;
pub mod summary;

pub use staging::{
    ReconcileOutcome, classify_staged, reconcile_snapshot, refresh_staging, run_refresh, stage,
};
pub use summary::{RunSummary, category_counts};
