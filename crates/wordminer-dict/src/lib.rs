//! Load leveled vocabulary lists into a single lemma -> entry dictionary.
//!
//! A dictionary directory holds one JSON file per difficulty tier, named by
//! tier prefix (`1-middle-school.json`, `3-CET4.json`, ...). Each file is an
//! array of records:
//!
//! ```json
//! [{ "word": "cat",
//!    "translations": [{ "translation": "猫", "type": "n" }],
//!    "phrases": [{ "phrase": "let the cat out", "translation": "泄露秘密" }] }]
//! ```
//!
//! Files are merged easiest tier first, and the first tier to list a lemma
//! keeps it. Loading never fails: a missing directory gives an empty
//! dictionary, unreadable files and malformed records are skipped with a
//! warning. Once built, a [`Dictionary`] is read-only and safe to share.
//!
//! # Example
//! ```no_run
//! use wordminer_dict::{Dictionary, LoadMode};
//! use wordminer_types::Tier;
//!
//! let dict = Dictionary::load_with_mode("data/dictionary", LoadMode::Mmap);
//! match dict.get("cat") {
//!     Some(entry) => println!("cat: {} ({} translations)", entry.tier, entry.translations.len()),
//!     None => assert_eq!(dict.tier_of("cat"), Tier::Unknown),
//! }
//! ```
//!
//! For a runnable demo, see `cargo run -p wordminer-dict --example stats -- <dict-dir>`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use memmap2::Mmap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};
use wordminer_types::{DictionaryEntry, Phrase, Tier, Translation};

/// Strategy for reading dictionary source files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each source file.
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl FromStr for LoadMode {
    type Err = anyhow::Error;

    /// Accepts `mmap` or `owned`, ignoring ASCII case.
    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mmap" => Ok(LoadMode::Mmap),
            "owned" => Ok(LoadMode::Owned),
            other => bail!("unknown load mode {other:?} (expected mmap or owned)"),
        }
    }
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// One record of a source file. Absent or ill-typed fields come back empty.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SourceRecord {
    #[serde(default, deserialize_with = "lenient_word")]
    pub word: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub translations: Vec<Translation>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub phrases: Vec<Phrase>,
}

impl SourceRecord {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: Some(word.into()),
            ..Self::default()
        }
    }
}

/// Merged, read-only view of every source file.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    entries: HashMap<String, DictionaryEntry>,
}

impl Dictionary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from in-memory sources, consumed in the order given.
    ///
    /// Callers pass sources easiest tier first; a lemma already present is
    /// never overwritten by a later source.
    pub fn from_sources<I, R>(sources: I) -> Self
    where
        I: IntoIterator<Item = (Tier, R)>,
        R: IntoIterator<Item = SourceRecord>,
    {
        let mut dict = Self::empty();
        for (tier, records) in sources {
            dict.merge_source(tier, records);
        }
        dict
    }

    /// Load every `*.json` source under `dict_dir` using memory maps.
    pub fn load(dict_dir: impl AsRef<Path>) -> Self {
        Self::load_with_mode(dict_dir, LoadMode::Mmap)
    }

    /// Load every `*.json` source under `dict_dir`, choosing how files are read.
    pub fn load_with_mode(dict_dir: impl AsRef<Path>, mode: LoadMode) -> Self {
        let dir = dict_dir.as_ref();
        if !dir.is_dir() {
            warn!(
                "dictionary directory {} not found; every word will be Unknown",
                dir.display()
            );
            return Self::empty();
        }

        let sources = match list_sources(dir) {
            Ok(sources) => sources,
            Err(err) => {
                warn!("{err:#}");
                return Self::empty();
            }
        };

        let mut dict = Self::empty();
        for (tier, path) in sources {
            let parsed = load_file(&path, mode).and_then(|buf| parse_source(buf.as_slice()));
            let records = match parsed {
                Ok(records) => records,
                Err(err) => {
                    warn!("skipping dictionary source {}: {err:#}", path.display());
                    continue;
                }
            };
            let added = dict.merge_source(tier, records);
            info!("loaded {added} entries from {} ({tier})", path.display());
        }

        info!("dictionary ready with {} entries", dict.len());
        dict
    }

    /// Exact-match lookup by lemma.
    pub fn get(&self, lemma: &str) -> Option<&DictionaryEntry> {
        self.entries.get(lemma)
    }

    /// Lookup after trimming and lowercasing `word`.
    pub fn lookup(&self, word: &str) -> Option<&DictionaryEntry> {
        self.entries.get(&normalize_headword(word))
    }

    /// Tier of `lemma`, or [`Tier::Unknown`] when absent.
    pub fn tier_of(&self, lemma: &str) -> Tier {
        self.get(lemma).map_or(Tier::Unknown, |entry| entry.tier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DictionaryEntry> + '_ {
        self.entries.values()
    }

    /// Number of entries per tier.
    pub fn tier_counts(&self) -> BTreeMap<Tier, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.tier).or_insert(0) += 1;
        }
        counts
    }

    fn merge_source(
        &mut self,
        tier: Tier,
        records: impl IntoIterator<Item = SourceRecord>,
    ) -> usize {
        let mut added = 0;
        for record in records {
            let Some(word) = record.word else {
                continue;
            };
            let lemma = normalize_headword(&word);
            if lemma.is_empty() || self.entries.contains_key(&lemma) {
                continue;
            }
            self.entries.insert(
                lemma.clone(),
                DictionaryEntry {
                    lemma,
                    tier,
                    translations: record.translations,
                    phrases: record.phrases,
                },
            );
            added += 1;
        }
        added
    }
}

/// Trim and lowercase a headword into its lemma key.
pub fn normalize_headword(word: &str) -> String {
    word.trim().to_lowercase()
}

/// JSON sources in `dir`, ordered by tier then file name.
fn list_sources(dir: &Path) -> Result<Vec<(Tier, PathBuf)>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("list {}", dir.display()))?
            .path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let tier = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(Tier::Unknown, Tier::from_file_name);
        sources.push((tier, path));
    }
    sources.sort();
    Ok(sources)
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

/// Parse a source file body. The top level must be an array; records that
/// are not objects are dropped.
fn parse_source(bytes: &[u8]) -> Result<Vec<SourceRecord>> {
    let values: Vec<Value> =
        serde_json::from_slice(bytes).context("expected a JSON array of records")?;
    let total = values.len();
    let records: Vec<SourceRecord> = values
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if records.len() < total {
        debug!("dropped {} non-object records", total - records.len());
    }
    Ok(records)
}

fn lenient_word<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_list<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(de)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
