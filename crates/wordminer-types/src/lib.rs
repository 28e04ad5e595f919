//! Shared types for the WordMiner vocabulary engine.
//!
//! Everything here is plain data: difficulty [`Tier`]s, learner
//! [`VocabLabel`]s, merged [`DictionaryEntry`] records and the per-article
//! [`TokenStat`] rows that storage persists. Higher-level crates build on
//! these without pulling in any loader or storage code.
//!
//! ```rust
//! use wordminer_types::{Tier, VocabLabel};
//!
//! assert!(Tier::MiddleSchool < Tier::Sat);
//! assert_eq!(Tier::from_file_name("3-CET4.json"), Tier::Cet4);
//! assert_eq!("Learning".parse::<VocabLabel>().unwrap(), VocabLabel::Learning);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned to an imported article.
pub type ArticleId = u64;

/// Difficulty classification, ordered from least to most advanced.
///
/// `Unknown` sorts last and means the lemma was not found in the dictionary.
/// Serialized using the report label (`"CET-4"`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "Middle School")]
    MiddleSchool,
    #[serde(rename = "High School")]
    HighSchool,
    #[serde(rename = "CET-4")]
    Cet4,
    #[serde(rename = "CET-6")]
    Cet6,
    Postgraduate,
    #[serde(rename = "TOEFL")]
    Toefl,
    #[serde(rename = "SAT")]
    Sat,
    Unknown,
}

impl Tier {
    /// Every tier in ascending difficulty, `Unknown` last.
    pub const ALL: [Tier; 8] = [
        Tier::MiddleSchool,
        Tier::HighSchool,
        Tier::Cet4,
        Tier::Cet6,
        Tier::Postgraduate,
        Tier::Toefl,
        Tier::Sat,
        Tier::Unknown,
    ];

    /// Tiers that have a dictionary source file, in load order.
    pub const LEVELED: [Tier; 7] = [
        Tier::MiddleSchool,
        Tier::HighSchool,
        Tier::Cet4,
        Tier::Cet6,
        Tier::Postgraduate,
        Tier::Toefl,
        Tier::Sat,
    ];

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Tier::MiddleSchool => "Middle School",
            Tier::HighSchool => "High School",
            Tier::Cet4 => "CET-4",
            Tier::Cet6 => "CET-6",
            Tier::Postgraduate => "Postgraduate",
            Tier::Toefl => "TOEFL",
            Tier::Sat => "SAT",
            Tier::Unknown => "Unknown",
        }
    }

    /// File-name prefix of the dictionary source for this tier.
    pub fn file_prefix(self) -> Option<&'static str> {
        match self {
            Tier::MiddleSchool => Some("1-middle-school"),
            Tier::HighSchool => Some("2-high-school"),
            Tier::Cet4 => Some("3-CET4"),
            Tier::Cet6 => Some("4-CET6"),
            Tier::Postgraduate => Some("5-postgraduate"),
            Tier::Toefl => Some("6-TOEFL"),
            Tier::Sat => Some("7-SAT"),
            Tier::Unknown => None,
        }
    }

    /// Resolve a tier from a source file name by prefix; unmatched names are `Unknown`.
    pub fn from_file_name(name: &str) -> Tier {
        Tier::LEVELED
            .into_iter()
            .find(|tier| tier.file_prefix().is_some_and(|p| name.starts_with(p)))
            .unwrap_or(Tier::Unknown)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Learner-assigned familiarity with a lemma.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabLabel {
    Mastered,
    Learning,
    Unfamiliar,
}

impl VocabLabel {
    pub const ALL: [VocabLabel; 3] = [
        VocabLabel::Mastered,
        VocabLabel::Learning,
        VocabLabel::Unfamiliar,
    ];

    /// Storage value (`mastered`, `learning`, `unfamiliar`).
    pub fn as_str(self) -> &'static str {
        match self {
            VocabLabel::Mastered => "mastered",
            VocabLabel::Learning => "learning",
            VocabLabel::Unfamiliar => "unfamiliar",
        }
    }
}

impl fmt::Display for VocabLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid vocabulary label: {0:?} (expected mastered, learning or unfamiliar)")]
pub struct ParseLabelError(pub String);

impl FromStr for VocabLabel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VocabLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}

/// A translation and its part-of-speech marker (`n.`, `v.`...).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Translation {
    pub translation: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A set phrase built on the headword and its translation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrase {
    pub phrase: String,
    pub translation: String,
}

/// Merged dictionary record: one per lemma, tier fixed by the first source that listed it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub lemma: String,
    pub tier: Tier,
    pub translations: Vec<Translation>,
    pub phrases: Vec<Phrase>,
}

/// Persisted per-article row: a lemma, how often it occurred, and its tier at import time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenStat {
    pub lemma: String,
    pub count: u64,
    pub tier: Tier,
}

/// Union and intersection sizes of distinct-lemma sets across articles.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OverlapResult {
    pub unique: usize,
    pub shared: usize,
}
