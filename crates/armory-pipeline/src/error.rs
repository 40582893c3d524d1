use armory_vision::VisionError;
use thiserror::Error;

use crate::summary::RunSummary;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("read records: {0}")]
    Source(#[source] BoxError),

    #[error("write staging set: {0}")]
    Sink(#[source] BoxError),

    /// Compaction and reconciliation finished; `summary` holds their counts.
    #[error("no reference bank for any allowed rarity ({allowed})")]
    EmptyBank {
        allowed: String,
        summary: Box<RunSummary>,
    },

    #[error(transparent)]
    Vision(#[from] VisionError),
}
