//! Distance-weighted k-nearest-neighbour category vote.
//!
//! The classifier only predicts. Whether a prediction is trusted is decided
//! by the caller with [`PipelineConfig::is_confident`] on `best` and `gap`.

use armory_core::{Category, PipelineConfig};
use tracing::debug;

use crate::bank::ReferenceBank;
use crate::error::VisionError;
use crate::fingerprint::Fingerprint;

/// One bank entry and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub index: usize,
    pub distance: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub category: Category,
    /// Distance to the nearest reference.
    pub best: u32,
    /// Second-nearest distance minus `best`; 0 for a one-entry bank.
    pub gap: u32,
    /// Bank index of the nearest reference.
    pub nearest: usize,
}

/// All entries ordered by `(distance, index)`.
pub fn nearest_neighbours(distances: &[u32]) -> Vec<Neighbour> {
    let mut ranked: Vec<Neighbour> = distances
        .iter()
        .enumerate()
        .map(|(index, &distance)| Neighbour { index, distance })
        .collect();
    ranked.sort_by_key(|n| (n.distance, n.index));
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    top_k: usize,
    epsilon: f64,
}

impl Classifier {
    pub fn new(top_k: usize, epsilon: f64) -> Self {
        Self {
            top_k: top_k.max(1),
            epsilon,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.top_k, config.epsilon)
    }

    /// Vote among the `top_k` nearest references, each weighted
    /// `1 / (epsilon + distance)`.
    pub fn predict(
        &self,
        bank: &ReferenceBank,
        query: &Fingerprint,
    ) -> Result<Prediction, VisionError> {
        let ranked = nearest_neighbours(&bank.distances(query)?);
        let Some(first) = ranked.first() else {
            return Err(VisionError::EmptyBank(bank.rarity()));
        };
        let best = first.distance;
        let second = ranked.get(1).map_or(best, |n| n.distance);

        let mut weights = [0.0f64; 3];
        let mut nearest: [Option<u32>; 3] = [None; 3];
        for n in ranked.iter().take(self.top_k) {
            let c = bank.category(n.index).id();
            weights[c] += 1.0 / (self.epsilon + f64::from(n.distance));
            // Ranked ascending, so the first vote per category is its nearest.
            nearest[c].get_or_insert(n.distance);
        }
        let category = argmax(&weights, &nearest);

        debug!(
            rarity = %bank.rarity(),
            category = %category,
            best,
            gap = second - best,
            nearest = %bank.key(first.index),
            "knn vote"
        );

        Ok(Prediction {
            category,
            best,
            gap: second - best,
            nearest: first.index,
        })
    }
}

/// Highest weight wins. Equal weights go to the category whose nearest
/// vote is closer, then to the lower category id.
fn argmax(weights: &[f64; 3], nearest: &[Option<u32>; 3]) -> Category {
    let mut winner = Category::Weapon;
    let mut top: Option<(f64, u32)> = None;
    for c in Category::ALL {
        let Some(d) = nearest[c.id()] else { continue };
        let w = weights[c.id()];
        let better = match top {
            None => true,
            Some((tw, td)) => w > tw || (w == tw && d < td),
        };
        if better {
            top = Some((w, d));
            winner = c;
        }
    }
    winner
}
