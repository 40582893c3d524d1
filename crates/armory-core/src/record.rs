//! Equipment records, rarity tiers, categories and identity keys.
//!
//! One [`EquipmentRecord`] is one observation of an item, either scraped from a
//! news page or read from a curated canonical table. Records are identified by
//! `(name, rarity)`; the scraped set may hold many rows per key until compacted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ability-category tag for records without one.
pub const NO_ABILITY: &str = "no ability";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} label: {value:?}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// Rarity tier. Declaration order is the display/sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[serde(rename = "UR")]
    Ur,
    #[serde(rename = "KSR")]
    Ksr,
    #[serde(rename = "SSR")]
    Ssr,
}

impl Rarity {
    pub const ALL: [Rarity; 3] = [Rarity::Ur, Rarity::Ksr, Rarity::Ssr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ur => "UR",
            Self::Ksr => "KSR",
            Self::Ssr => "SSR",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = ParseLabelError;

    /// Parses scraped or hand-typed rarity text.
    ///
    /// Case, full-width forms and `_`/space separators are ignored, so
    /// `"ｕｒ"`, `"k_sr"` and `" SSR "` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "UR" => Ok(Self::Ur),
            "KSR" => Ok(Self::Ksr),
            "SSR" => Ok(Self::Ssr),
            _ => Err(ParseLabelError {
                kind: "rarity",
                value: s.to_string(),
            }),
        }
    }
}

/// Equipment category. The discriminant is the category id used by banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Weapon = 0,
    Armor = 1,
    Accessory = 2,
}

impl Category {
    /// All categories in id order.
    pub const ALL: [Category; 3] = [Category::Weapon, Category::Armor, Category::Accessory];

    pub fn id(&self) -> usize {
        *self as usize
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Accessory => "accessory",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseLabelError;

    /// Accepts the English names and the labels used by the curated sheets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        match t.to_ascii_lowercase().as_str() {
            "weapon" => return Ok(Self::Weapon),
            "armor" | "armour" => return Ok(Self::Armor),
            "accessory" => return Ok(Self::Accessory),
            _ => {}
        }
        match t {
            "武器" => Ok(Self::Weapon),
            "防具" => Ok(Self::Armor),
            "装飾" => Ok(Self::Accessory),
            _ => Err(ParseLabelError {
                kind: "category",
                value: s.to_string(),
            }),
        }
    }
}

/// Uppercase, fold full-width ASCII, and drop `_`, spaces and ideographic spaces.
pub fn normalize_label(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .filter(|c| !matches!(c, '_' | ' ' | '\u{3000}' | '\t'))
        .collect::<String>()
        .to_uppercase()
}

/// The six equipment stats. `None` means "not listed", which is not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub hp: Option<i64>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
    /// Percent.
    pub critical: Option<f64>,
    /// Percent.
    pub evasion: Option<f64>,
    /// Percent.
    pub accuracy: Option<f64>,
}

impl Stats {
    /// Round percent stats to one decimal, as the curated sheets store them.
    pub fn rounded(mut self) -> Self {
        let round1 = |v: Option<f64>| v.map(|x| (x * 10.0).round() / 10.0);
        self.critical = round1(self.critical);
        self.evasion = round1(self.evasion);
        self.accuracy = round1(self.accuracy);
        self
    }
}

/// `(name, rarity)`: the identity of one equipment item.
///
/// Field order makes the derived ordering rarity-major, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    pub rarity: Rarity,
    pub name: String,
}

impl IdentityKey {
    pub fn new(name: impl Into<String>, rarity: Rarity) -> Self {
        Self {
            rarity,
            name: name.into(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.rarity)
    }
}

/// One equipment observation.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRecord {
    /// `None` on scan placeholders (a page with no equipment table).
    pub name: Option<String>,
    /// `None` when the scraper could not determine the tier.
    pub rarity: Option<Rarity>,
    /// `None` means unresolved.
    pub category: Option<Category>,
    pub stats: Stats,
    pub ability: Option<String>,
    pub ability_category: Option<String>,
    /// Source page number for scraped rows, row ordinal for canonical rows.
    pub source_seq: i64,
    /// Opaque handle to the icon, typically a path relative to the image root.
    pub image_ref: Option<String>,
    /// Set by the scraper when the item was marked new on its source page.
    pub is_new: bool,
}

impl EquipmentRecord {
    /// A named record with no stats, ability, or category.
    pub fn named(name: impl Into<String>, rarity: Rarity, source_seq: i64) -> Self {
        Self {
            name: Some(name.into()),
            rarity: Some(rarity),
            ..Self::placeholder(source_seq)
        }
    }

    /// A nameless row recording that `source_seq` was scanned.
    pub fn placeholder(source_seq: i64) -> Self {
        Self {
            name: None,
            rarity: None,
            category: None,
            stats: Stats::default(),
            ability: None,
            ability_category: None,
            source_seq,
            image_ref: None,
            is_new: false,
        }
    }

    /// Trimmed name, or `None` if absent or blank.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    /// The identity key; requires both a non-blank name and a rarity.
    pub fn key(&self) -> Option<IdentityKey> {
        Some(IdentityKey::new(self.name()?, self.rarity?))
    }

    pub fn is_placeholder(&self) -> bool {
        self.name().is_none()
    }

    /// Ability-category tag, or [`NO_ABILITY`] when none is set.
    pub fn ability_tag(&self) -> &str {
        self.ability_category
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(NO_ABILITY)
    }

    /// Store the derived tag so it reaches every output.
    pub fn fill_ability_tag(&mut self) {
        if self.ability_category.as_deref().is_none_or(|t| t.trim().is_empty()) {
            self.ability_category = Some(NO_ABILITY.to_string());
        }
    }
}
