//! Lexical statistics for imported articles.
//!
//! [`analyze`] turns text into per-lemma and per-tier counts against a
//! [`Dictionary`](wordminer_dict::Dictionary) snapshot, [`record_article_stats`]
//! persists them with the tier frozen at import time, and the
//! [`VocabularyLedger`] and [`OverlapEngine`] answer questions from what was
//! persisted. Storage is reached only through the traits in [`store`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use wordminer_analysis::{MemoryStore, OverlapEngine, import_article};
//! use wordminer_dict::Dictionary;
//!
//! let store = Arc::new(MemoryStore::new());
//! let dict = Dictionary::empty();
//! let a = import_article(store.as_ref(), "a", None, "cats and dogs", &dict).unwrap();
//! let b = import_article(store.as_ref(), "b", None, "dogs and owls", &dict).unwrap();
//!
//! let overlap = OverlapEngine::new(store).overlap(&[a.article_id, b.article_id]).unwrap();
//! assert_eq!(overlap.map(|o| (o.unique, o.shared)), Some((4, 2)));
//! ```

pub mod analyze;
pub mod ledger;
pub mod overlap;
pub mod report;
pub mod store;

pub use analyze::{
    AnalysisResult, ImportSummary, analyze, import_article, record_article_stats, resolve_stats,
    vocabulary_richness,
};
pub use ledger::{LabelBreakdown, VocabularyLedger};
pub use overlap::{OverlapEngine, overlap_of};
pub use report::{
    AnnotatedToken, ArticleReport, DEFAULT_TOP_WORDS, TierCount, annotate, build_report,
};
pub use store::{
    Article, ArticleCatalog, ArticleSummary, LabelStore, MemoryStore, StatsStore, StoreError,
};
