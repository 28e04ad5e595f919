use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;
use wordminer_dict::Dictionary;
use wordminer_morph::{lemmatize, tokenize};
use wordminer_types::{ArticleId, Tier, TokenStat};

use crate::store::{ArticleCatalog, StatsStore, StoreError};

/// Per-lemma and per-tier token counts for one text.
///
/// Both maps count tokens, so their sums are equal and match the number of
/// tokens the tokenizer produced.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnalysisResult {
    pub lemma_counts: HashMap<String, u64>,
    pub tier_counts: BTreeMap<Tier, u64>,
}

impl AnalysisResult {
    pub fn total_tokens(&self) -> u64 {
        self.lemma_counts.values().sum()
    }

    pub fn distinct_lemmas(&self) -> usize {
        self.lemma_counts.len()
    }
}

/// Tokenize, lemmatize and bucket `text` against `dict` in one pass.
pub fn analyze(text: &str, dict: &Dictionary) -> AnalysisResult {
    let mut result = AnalysisResult::default();
    for token in tokenize(text) {
        let lemma = lemmatize(token.text);
        let tier = dict.tier_of(&lemma);
        *result.lemma_counts.entry(lemma).or_insert(0) += 1;
        *result.tier_counts.entry(tier).or_insert(0) += 1;
    }
    result
}

/// Snapshot each lemma's tier as of now. Rows come back by count
/// descending, then lemma ascending.
pub fn resolve_stats(lemma_counts: &HashMap<String, u64>, dict: &Dictionary) -> Vec<TokenStat> {
    let mut rows: Vec<TokenStat> = lemma_counts
        .iter()
        .map(|(lemma, count)| TokenStat {
            lemma: lemma.clone(),
            count: *count,
            tier: dict.tier_of(lemma),
        })
        .collect();
    sort_stats(&mut rows);
    rows
}

pub(crate) fn sort_stats(rows: &mut [TokenStat]) {
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.lemma.cmp(&b.lemma)));
}

/// Persist one row per distinct lemma with the tier resolved at call time.
pub fn record_article_stats<S>(
    store: &S,
    article: ArticleId,
    lemma_counts: &HashMap<String, u64>,
    dict: &Dictionary,
) -> Result<usize, StoreError>
where
    S: StatsStore + ?Sized,
{
    let rows = resolve_stats(lemma_counts, dict);
    let written = rows.len();
    store.upsert_all(article, rows)?;
    Ok(written)
}

/// Distinct lemmas whose tier is [`Tier::Unknown`], i.e. not in the dictionary.
pub(crate) fn count_unknown(rows: &[TokenStat]) -> usize {
    rows.iter().filter(|r| r.tier == Tier::Unknown).count()
}

/// Distinct lemmas per token; `0.0` for a text without tokens.
pub fn vocabulary_richness(distinct_lemmas: usize, total_words: u64) -> f64 {
    if total_words == 0 {
        return 0.0;
    }
    distinct_lemmas as f64 / total_words as f64
}

/// Outcome of [`import_article`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportSummary {
    pub article_id: ArticleId,
    pub total_words: u64,
    pub distinct_lemmas: usize,
    pub vocabulary_richness: f64,
    pub tier_counts: BTreeMap<Tier, u64>,
    /// Distinct lemmas recorded with [`Tier::Unknown`].
    pub not_in_dictionary: usize,
}

/// Register an article, analyze it and persist its statistics.
pub fn import_article<S>(
    store: &S,
    title: &str,
    path: Option<&str>,
    content: &str,
    dict: &Dictionary,
) -> Result<ImportSummary, StoreError>
where
    S: ArticleCatalog + StatsStore + ?Sized,
{
    let article_id = store.add_article(title, path, content)?;
    let result = analyze(content, dict);
    let rows = resolve_stats(&result.lemma_counts, dict);
    let not_in_dictionary = count_unknown(&rows);
    store.upsert_all(article_id, rows)?;

    let total_words = result.total_tokens();
    let distinct_lemmas = result.distinct_lemmas();
    let summary = ImportSummary {
        article_id,
        total_words,
        distinct_lemmas,
        vocabulary_richness: vocabulary_richness(distinct_lemmas, total_words),
        tier_counts: result.tier_counts,
        not_in_dictionary,
    };
    info!(
        "imported article {} ({:?}): {} words, {} distinct lemmas",
        article_id, title, summary.total_words, summary.distinct_lemmas
    );
    Ok(summary)
}
