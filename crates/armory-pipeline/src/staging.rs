//! Staging refresh: rebuild the set of scraped items not yet curated, and
//! fill their categories where the icon classifier is confident.
//!
//! # Run order
//!
//! 1. Read the full scraped and canonical snapshots.
//! 2. Compact the scraped rows and reconcile them against the canonical set.
//! 3. Stage the scraped-only rows with their category cleared.
//! 4. Build reference banks from the canonical icons and classify the staged
//!    rows under the confidence gate.
//! 5. Hand the complete staged set to the sink in one call.
//!
//! Nothing is written before step 5, so a failed run leaves the stored
//! staging set as it was.

use armory_core::{
    CanonicalSet, Compacted, EquipmentRecord, PipelineConfig, Reconciliation, RecordSink,
    RecordSource, compact, reconcile,
};
use armory_vision::{Classifier, ImageResolver, build_banks, extract};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::summary::RunSummary;

/// Compacted scraped rows, the canonical set, and their join.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub scraped_rows: usize,
    pub compacted: Compacted,
    pub canonical: CanonicalSet,
    pub reconciliation: Reconciliation,
}

/// Read both snapshots, compact, and reconcile.
pub fn reconcile_snapshot<S: RecordSource>(source: &S) -> Result<ReconcileOutcome, PipelineError> {
    let scraped = source
        .scraped()
        .map_err(|e| PipelineError::Source(Box::new(e)))?;
    let canonical = source
        .canonical()
        .map_err(|e| PipelineError::Source(Box::new(e)))?;

    let compacted = compact(&scraped);
    info!(
        scraped = scraped.len(),
        kept = compacted.records.len(),
        duplicates = compacted.duplicates,
        placeholders = compacted.placeholders,
        "compacted"
    );
    let reconciliation = reconcile(&canonical, &compacted.records);

    Ok(ReconcileOutcome {
        scraped_rows: scraped.len(),
        compacted,
        canonical,
        reconciliation,
    })
}

/// Scraped-only records with their category cleared and ability tag filled,
/// ordered by rarity label then name. With `new_only`, only rows the scraper
/// flagged new.
pub fn stage(outcome: &ReconcileOutcome, config: &PipelineConfig) -> Vec<EquipmentRecord> {
    let mut staged: Vec<EquipmentRecord> = outcome
        .reconciliation
        .scraped_only()
        .filter(|d| !config.new_only || d.record.is_new)
        .map(|d| {
            let mut record = EquipmentRecord {
                category: None,
                ..d.record.clone()
            };
            record.fill_ability_tag();
            record
        })
        .collect();
    // Label order ("KSR" < "SSR" < "UR"), not tier order.
    staged.sort_by(|a, b| {
        let label = |r: &EquipmentRecord| r.rarity.map(|x| x.as_str());
        (label(a), a.name()).cmp(&(label(b), b.name()))
    });
    staged
}

/// Classify unresolved staged rows in place and count the outcomes in
/// `summary`.
///
/// Fails with [`PipelineError::EmptyBank`] when no allowed rarity has a
/// reference bank. Per-row problems (missing or unreadable icon, rarity
/// without a bank) are counted and skipped.
pub fn classify_staged(
    staged: &mut [EquipmentRecord],
    canonical: &CanonicalSet,
    images: &dyn ImageResolver,
    config: &PipelineConfig,
    summary: &mut RunSummary,
) -> Result<(), PipelineError> {
    let (banks, report) = build_banks(canonical, images, config)?;
    summary.bank_sizes = report.references.clone();
    if banks.is_empty() {
        let allowed = config
            .allowed_rarities
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PipelineError::EmptyBank {
            allowed,
            summary: Box::new(summary.clone()),
        });
    }

    let classifier = Classifier::from_config(config);
    for record in staged.iter_mut().filter(|r| r.category.is_none()) {
        let Some(key) = record.key() else { continue };
        if !config.classifies(key.rarity) {
            summary.skipped_rarity += 1;
            continue;
        }
        let Some(bank) = banks.get(key.rarity) else {
            summary.skipped_no_bank += 1;
            continue;
        };

        let image = match images.resolve(&key) {
            Ok(Some(image)) => image,
            Ok(None) => {
                debug!(key = %key, "no icon, leaving unresolved");
                summary.skipped_no_image += 1;
                continue;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "icon unreadable, leaving unresolved");
                summary.skipped_decode += 1;
                continue;
            }
        };
        let fingerprint = match extract(&image, key.rarity, &config.fingerprint) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(key = %key, error = %e, "fingerprint failed, leaving unresolved");
                summary.skipped_decode += 1;
                continue;
            }
        };

        let prediction = classifier.predict(bank, &fingerprint)?;
        if config.is_confident(prediction.best, prediction.gap) {
            record.category = Some(prediction.category);
            summary.classified += 1;
            debug!(
                key = %key,
                category = %prediction.category,
                best = prediction.best,
                gap = prediction.gap,
                nearest = %bank.key(prediction.nearest),
                "classified"
            );
        } else {
            summary.low_confidence += 1;
            debug!(
                key = %key,
                category = %prediction.category,
                best = prediction.best,
                gap = prediction.gap,
                "low confidence, leaving unresolved"
            );
        }
    }

    info!(
        classified = summary.classified,
        low_confidence = summary.low_confidence,
        skipped_decode = summary.skipped_decode,
        skipped_rarity = summary.skipped_rarity,
        skipped_no_bank = summary.skipped_no_bank,
        skipped_no_image = summary.skipped_no_image,
        "classification finished"
    );
    Ok(())
}

/// Stage, classify, and replace the stored staging set.
///
/// Returns the staged set alongside the summary.
pub fn refresh_staging<K: RecordSink>(
    outcome: &ReconcileOutcome,
    images: &dyn ImageResolver,
    sink: &mut K,
    config: &PipelineConfig,
) -> Result<(RunSummary, Vec<EquipmentRecord>), PipelineError> {
    let mut summary = RunSummary::from_outcome(outcome, Utc::now());
    let mut staged = stage(outcome, config);
    summary.staged = staged.len();

    classify_staged(&mut staged, &outcome.canonical, images, config, &mut summary)?;

    sink.replace_all(&staged)
        .map_err(|e| PipelineError::Sink(Box::new(e)))?;
    summary.finish();
    info!(staged = staged.len(), "staging set replaced");
    Ok((summary, staged))
}

/// One full refresh from source to sink.
pub fn run_refresh<S: RecordSource, K: RecordSink>(
    source: &S,
    images: &dyn ImageResolver,
    sink: &mut K,
    config: &PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    let outcome = reconcile_snapshot(source)?;
    let (summary, _) = refresh_staging(&outcome, images, sink, config)?;
    Ok(summary)
}
