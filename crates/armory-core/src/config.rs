//! Pipeline configuration: classifier parameters, fingerprint geometry and
//! the canonical table mapping.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical::CanonicalTable;
use crate::record::Rarity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Crop rectangle as fractions of the icon's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl CropRect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    fn validate(&self, rarity: Rarity) -> Result<(), ConfigError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if ![self.x0, self.y0, self.x1, self.y1].into_iter().all(in_unit)
            || self.x0 >= self.x1
            || self.y0 >= self.y1
        {
            return Err(ConfigError::Invalid(format!(
                "crop for {rarity} must satisfy 0 <= x0 < x1 <= 1 and 0 <= y0 < y1 <= 1"
            )));
        }
        Ok(())
    }
}

/// Marker region crop for UR and KSR icons.
pub const DEFAULT_CROP: CropRect = CropRect::new(0.0, 0.0, 0.38, 0.38);

/// SSR icons carry a shorter, wider marker.
pub const SSR_CROP: CropRect = CropRect::new(0.0, 0.0, 0.32, 0.25);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Side length of the square bit grid.
    pub side: u32,
    /// Edge responses strictly above this become set bits.
    pub edge_threshold: u8,
    /// Rows and columns with more than `side * line_ratio` set bits are cleared.
    pub line_ratio: f64,
    pub crop: BTreeMap<Rarity, CropRect>,
    pub border_margin: BTreeMap<Rarity, u32>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            side: 64,
            edge_threshold: 35,
            line_ratio: 0.70,
            crop: BTreeMap::from([
                (Rarity::Ur, DEFAULT_CROP),
                (Rarity::Ksr, DEFAULT_CROP),
                (Rarity::Ssr, SSR_CROP),
            ]),
            border_margin: BTreeMap::from([(Rarity::Ur, 5), (Rarity::Ksr, 5), (Rarity::Ssr, 4)]),
        }
    }
}

impl FingerprintConfig {
    pub fn crop_for(&self, rarity: Rarity) -> CropRect {
        self.crop.get(&rarity).copied().unwrap_or(match rarity {
            Rarity::Ssr => SSR_CROP,
            _ => DEFAULT_CROP,
        })
    }

    pub fn margin_for(&self, rarity: Rarity) -> u32 {
        self.border_margin.get(&rarity).copied().unwrap_or(match rarity {
            Rarity::Ssr => 4,
            _ => 5,
        })
    }

    /// Bits per fingerprint.
    pub fn bits(&self) -> usize {
        (self.side as usize) * (self.side as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.side == 0 {
            return Err(ConfigError::Invalid("fingerprint.side must be positive".into()));
        }
        if !(self.line_ratio > 0.0 && self.line_ratio <= 1.0) {
            return Err(ConfigError::Invalid(
                "fingerprint.line_ratio must be in (0, 1]".into(),
            ));
        }
        for rarity in Rarity::ALL {
            self.crop_for(rarity).validate(rarity)?;
            if self.margin_for(rarity) * 2 >= self.side {
                return Err(ConfigError::Invalid(format!(
                    "border margin for {rarity} leaves no interior in a {}px grid",
                    self.side
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Neighbours that vote.
    pub top_k: usize,
    /// Added to distances before inverting, so an exact match has finite weight.
    pub epsilon: f64,
    /// A prediction is held back when its nearest distance is at least this.
    pub hold_max_best: u32,
    /// A prediction is held back when its margin is at most this.
    pub hold_min_gap: u32,
    /// Rarities eligible for automatic classification.
    pub allowed_rarities: BTreeSet<Rarity>,
    /// Stage only scraped-only rows that the scraper flagged as new.
    pub new_only: bool,
    pub fingerprint: FingerprintConfig,
    pub canonical_tables: Vec<CanonicalTable>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 9,
            epsilon: 1e-6,
            hold_max_best: 650,
            hold_min_gap: 30,
            allowed_rarities: BTreeSet::from([Rarity::Ur, Rarity::Ksr]),
            new_only: false,
            fingerprint: FingerprintConfig::default(),
            canonical_tables: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be positive".into()));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(ConfigError::Invalid("epsilon must be positive".into()));
        }
        let mut ids = BTreeSet::new();
        for table in &self.canonical_tables {
            if !ids.insert(table.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "canonical table '{}' listed twice",
                    table.id
                )));
            }
        }
        self.fingerprint.validate()
    }

    /// Whether items of this rarity are classified automatically.
    pub fn classifies(&self, rarity: Rarity) -> bool {
        self.allowed_rarities.contains(&rarity)
    }

    /// Confidence gate: the nearest reference must be close and clearly
    /// closer than the runner-up.
    pub fn is_confident(&self, best: u32, gap: u32) -> bool {
        best < self.hold_max_best && gap > self.hold_min_gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Category;

    #[test]
    fn empty_object_yields_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.top_k, 9);
        assert!(config.classifies(Rarity::Ur));
        assert!(config.classifies(Rarity::Ksr));
        assert!(!config.classifies(Rarity::Ssr));
        assert_eq!(config.fingerprint.bits(), 4096);
    }

    #[test]
    fn crop_and_margin_defaults_per_rarity() {
        let fp = FingerprintConfig::default();
        assert_eq!(fp.crop_for(Rarity::Ur), DEFAULT_CROP);
        assert_eq!(fp.crop_for(Rarity::Ssr), SSR_CROP);
        assert_eq!(fp.margin_for(Rarity::Ksr), 5);
        assert_eq!(fp.margin_for(Rarity::Ssr), 4);
    }

    #[test]
    fn confidence_gate_boundaries() {
        let config = PipelineConfig::default();
        assert!(config.is_confident(649, 31));
        assert!(!config.is_confident(650, 100), "best at threshold is held");
        assert!(!config.is_confident(100, 30), "gap at threshold is held");
        assert!(!config.is_confident(0, 0));
    }

    #[test]
    fn partial_override() {
        let config = PipelineConfig::from_json(
            r#"{
                "top_k": 5,
                "allowed_rarities": ["UR", "KSR", "SSR"],
                "fingerprint": {"edge_threshold": 40},
                "canonical_tables": [
                    {"id": "ur武器", "rarity": "UR", "category": "weapon"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.top_k, 5);
        assert!(config.classifies(Rarity::Ssr));
        assert_eq!(config.fingerprint.edge_threshold, 40);
        assert_eq!(config.fingerprint.side, 64);
        assert_eq!(config.canonical_tables[0].category, Category::Weapon);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"top_k": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json(
                r#"{"fingerprint": {"crop": {"UR": {"x0": 0.5, "y0": 0, "x1": 0.4, "y1": 1}}}}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"fingerprint": {"side": 8, "border_margin": {"UR": 4}}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{"top_k": "nine"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn duplicate_table_ids_rejected() {
        let mut config = PipelineConfig::default();
        let table = CanonicalTable {
            id: "t".into(),
            rarity: Rarity::Ur,
            category: Category::Weapon,
            path: None,
        };
        config.canonical_tables = vec![table.clone(), table];
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("armory.json");
        std::fs::write(&path, r#"{"new_only": true}"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert!(config.new_only);

        let missing = PipelineConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
