//! Storage contracts and the in-memory implementation used by the service.
//!
//! The engine only talks to storage through [`StatsStore`], [`LabelStore`]
//! and [`ArticleCatalog`]. [`MemoryStore`] implements all three on top of
//! `DashMap`, so one label write or one article's stats write is applied as
//! a unit, and can be snapshotted to a JSON file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;
use wordminer_types::{ArticleId, TokenStat, VocabLabel};

use crate::analyze::sort_stats;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// The storage task itself failed (panicked or was cancelled).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// An imported article with its full text.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub path: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Article metadata without the content, for listings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub title: String,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Article> for ArticleSummary {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            path: article.path.clone(),
            created_at: article.created_at,
        }
    }
}

/// Persisted per-article lemma counts with their tier snapshot.
pub trait StatsStore: Send + Sync {
    /// Insert or replace the row for `stat.lemma` within `article`.
    fn upsert(&self, article: ArticleId, stat: TokenStat) -> Result<(), StoreError>;

    fn upsert_all(&self, article: ArticleId, stats: Vec<TokenStat>) -> Result<(), StoreError> {
        for stat in stats {
            self.upsert(article, stat)?;
        }
        Ok(())
    }

    /// Rows for `article`, by count descending then lemma. Unknown ids give no rows.
    fn query_by_article(&self, article: ArticleId) -> Result<Vec<TokenStat>, StoreError>;

    fn query_distinct_lemmas(&self, article: ArticleId) -> Result<HashSet<String>, StoreError>;
}

/// Global lemma -> familiarity label mapping.
pub trait LabelStore: Send + Sync {
    fn get_label(&self, lemma: &str) -> Result<Option<VocabLabel>, StoreError>;

    /// Insert or overwrite the label of `lemma`.
    fn set_label(&self, lemma: &str, label: VocabLabel) -> Result<(), StoreError>;

    /// Lemmas carrying `label`, sorted ascending.
    fn list_by_label(&self, label: VocabLabel) -> Result<Vec<String>, StoreError>;

    fn all_labels(&self) -> Result<HashMap<String, VocabLabel>, StoreError>;
}

/// Registry of imported articles.
pub trait ArticleCatalog: Send + Sync {
    fn add_article(
        &self,
        title: &str,
        path: Option<&str>,
        content: &str,
    ) -> Result<ArticleId, StoreError>;

    fn get_article(&self, id: ArticleId) -> Result<Option<Article>, StoreError>;

    /// All articles, newest first.
    fn list_articles(&self) -> Result<Vec<ArticleSummary>, StoreError>;

    /// Remove an article together with its stats. Returns whether it existed.
    fn delete_article(&self, id: ArticleId) -> Result<bool, StoreError>;
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    last_id: ArticleId,
    articles: Vec<Article>,
    stats: BTreeMap<ArticleId, Vec<TokenStat>>,
    labels: BTreeMap<String, VocabLabel>,
}

/// Process-local store backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    last_id: AtomicU64,
    articles: DashMap<ArticleId, Article>,
    stats: DashMap<ArticleId, HashMap<String, TokenStat>>,
    labels: DashMap<String, VocabLabel>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a snapshot written by [`save_to`](Self::save_to).
    ///
    /// A missing file gives an empty store.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;

        let store = Self::new();
        let max_id = snapshot.articles.iter().map(|a| a.id).max().unwrap_or(0);
        store
            .last_id
            .store(snapshot.last_id.max(max_id), Ordering::SeqCst);
        for article in snapshot.articles {
            store.articles.insert(article.id, article);
        }
        for (article, rows) in snapshot.stats {
            let rows = rows.into_iter().map(|r| (r.lemma.clone(), r)).collect();
            store.stats.insert(article, rows);
        }
        for (lemma, label) in snapshot.labels {
            store.labels.insert(lemma, label);
        }
        info!(
            "restored {} articles and {} labels from {}",
            store.articles.len(),
            store.labels.len(),
            path.display()
        );
        Ok(store)
    }

    /// Write a JSON snapshot atomically (temp file in the same directory, then rename).
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let parent_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent_dir)?;

        let snapshot = self.snapshot();
        let temp_file = NamedTempFile::new_in(parent_dir)?;
        {
            let mut writer = BufWriter::new(temp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let mut articles: Vec<Article> = self.articles.iter().map(|a| a.value().clone()).collect();
        articles.sort_by_key(|a| a.id);
        let stats = self
            .stats
            .iter()
            .map(|entry| {
                let mut rows: Vec<TokenStat> = entry.value().values().cloned().collect();
                sort_stats(&mut rows);
                (*entry.key(), rows)
            })
            .collect();
        let labels = self
            .labels
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        Snapshot {
            last_id: self.last_id.load(Ordering::SeqCst),
            articles,
            stats,
            labels,
        }
    }
}

impl StatsStore for MemoryStore {
    fn upsert(&self, article: ArticleId, stat: TokenStat) -> Result<(), StoreError> {
        self.stats
            .entry(article)
            .or_default()
            .insert(stat.lemma.clone(), stat);
        Ok(())
    }

    fn upsert_all(&self, article: ArticleId, stats: Vec<TokenStat>) -> Result<(), StoreError> {
        // One entry guard for the whole batch: readers see all rows or none.
        let mut rows = self.stats.entry(article).or_default();
        for stat in stats {
            rows.insert(stat.lemma.clone(), stat);
        }
        Ok(())
    }

    fn query_by_article(&self, article: ArticleId) -> Result<Vec<TokenStat>, StoreError> {
        let mut rows: Vec<TokenStat> = self
            .stats
            .get(&article)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        sort_stats(&mut rows);
        Ok(rows)
    }

    fn query_distinct_lemmas(&self, article: ArticleId) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .stats
            .get(&article)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }
}

impl LabelStore for MemoryStore {
    fn get_label(&self, lemma: &str) -> Result<Option<VocabLabel>, StoreError> {
        Ok(self.labels.get(lemma).map(|label| *label))
    }

    fn set_label(&self, lemma: &str, label: VocabLabel) -> Result<(), StoreError> {
        self.labels.insert(lemma.to_string(), label);
        Ok(())
    }

    fn list_by_label(&self, label: VocabLabel) -> Result<Vec<String>, StoreError> {
        let mut lemmas: Vec<String> = self
            .labels
            .iter()
            .filter(|entry| *entry.value() == label)
            .map(|entry| entry.key().clone())
            .collect();
        lemmas.sort();
        Ok(lemmas)
    }

    fn all_labels(&self) -> Result<HashMap<String, VocabLabel>, StoreError> {
        Ok(self
            .labels
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect())
    }
}

impl ArticleCatalog for MemoryStore {
    fn add_article(
        &self,
        title: &str,
        path: Option<&str>,
        content: &str,
    ) -> Result<ArticleId, StoreError> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.articles.insert(
            id,
            Article {
                id,
                title: title.to_string(),
                path: path.map(str::to_string),
                content: content.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    fn get_article(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        Ok(self.articles.get(&id).map(|a| a.value().clone()))
    }

    fn list_articles(&self) -> Result<Vec<ArticleSummary>, StoreError> {
        let mut summaries: Vec<ArticleSummary> = self
            .articles
            .iter()
            .map(|a| ArticleSummary::from(a.value()))
            .collect();
        summaries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(summaries)
    }

    fn delete_article(&self, id: ArticleId) -> Result<bool, StoreError> {
        self.stats.remove(&id);
        Ok(self.articles.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordminer_types::Tier;

    fn stat(lemma: &str, count: u64, tier: Tier) -> TokenStat {
        TokenStat {
            lemma: lemma.to_string(),
            count,
            tier,
        }
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store = MemoryStore::new();
        store.upsert(1, stat("cat", 2, Tier::MiddleSchool)).unwrap();
        store.upsert(1, stat("cat", 5, Tier::Cet4)).unwrap();
        store.upsert(1, stat("dog", 5, Tier::Unknown)).unwrap();

        let rows = store.query_by_article(1).unwrap();
        assert_eq!(rows, vec![stat("cat", 5, Tier::Cet4), stat("dog", 5, Tier::Unknown)]);
        assert!(store.query_by_article(2).unwrap().is_empty());
        assert_eq!(store.query_distinct_lemmas(1).unwrap().len(), 2);
    }

    #[test]
    fn labels_overwrite_and_list_sorted() {
        let store = MemoryStore::new();
        store.set_label("zebra", VocabLabel::Learning).unwrap();
        store.set_label("apple", VocabLabel::Learning).unwrap();
        store.set_label("mango", VocabLabel::Mastered).unwrap();
        store.set_label("mango", VocabLabel::Learning).unwrap();

        assert_eq!(
            store.list_by_label(VocabLabel::Learning).unwrap(),
            ["apple", "mango", "zebra"]
        );
        assert!(store.list_by_label(VocabLabel::Mastered).unwrap().is_empty());
        assert_eq!(store.get_label("mango").unwrap(), Some(VocabLabel::Learning));
        assert_eq!(store.get_label("pear").unwrap(), None);
    }

    #[test]
    fn assigns_increasing_ids_and_lists_newest_first() {
        let store = MemoryStore::new();
        let first = store.add_article("one", None, "a").unwrap();
        let second = store.add_article("two", Some("/tmp/two.txt"), "b").unwrap();
        assert_eq!((first, second), (1, 2));

        let ids: Vec<ArticleId> = store.list_articles().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, [2, 1]);
        let two = store.get_article(2).unwrap().unwrap();
        assert_eq!(two.path.as_deref(), Some("/tmp/two.txt"));
        assert!(store.get_article(9).unwrap().is_none());
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("nested").join("store.json");

        let store = MemoryStore::new();
        let id = store.add_article("one", None, "cats").unwrap();
        store.upsert(id, stat("cat", 1, Tier::MiddleSchool)).unwrap();
        store.set_label("cat", VocabLabel::Mastered).unwrap();
        store.save_to(&path).unwrap();

        let restored = MemoryStore::load_from(&path).unwrap();
        assert_eq!(restored.get_article(id).unwrap(), store.get_article(id).unwrap());
        assert_eq!(restored.query_by_article(id).unwrap(), store.query_by_article(id).unwrap());
        assert_eq!(restored.get_label("cat").unwrap(), Some(VocabLabel::Mastered));
        // Ids keep counting from where the snapshot left off.
        assert_eq!(restored.add_article("two", None, "").unwrap(), 2);
    }

    #[test]
    fn delete_drops_article_and_its_stats() {
        let store = MemoryStore::new();
        let keep = store.add_article("keep", None, "dogs").unwrap();
        let gone = store.add_article("gone", None, "cats").unwrap();
        store.upsert(keep, stat("dog", 1, Tier::Unknown)).unwrap();
        store.upsert(gone, stat("cat", 1, Tier::MiddleSchool)).unwrap();

        assert!(store.delete_article(gone).unwrap());
        assert!(!store.delete_article(gone).unwrap());
        assert!(store.get_article(gone).unwrap().is_none());
        assert!(store.query_by_article(gone).unwrap().is_empty());
        assert_eq!(store.query_by_article(keep).unwrap().len(), 1);

        // Ids are never reused after a delete.
        assert_eq!(store.add_article("next", None, "").unwrap(), gone + 1);
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load_from(tempdir.path().join("absent.json")).unwrap();
        assert!(store.list_articles().unwrap().is_empty());
        assert!(store.all_labels().unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("store.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            MemoryStore::load_from(&path),
            Err(StoreError::Snapshot(_))
        ));
    }
}
