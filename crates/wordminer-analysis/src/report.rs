use std::collections::HashMap;

use serde::Serialize;
use wordminer_dict::Dictionary;
use wordminer_morph::{lemmatize, tokenize};
use wordminer_types::{ArticleId, Tier, TokenStat, VocabLabel};

use crate::analyze::{count_unknown, vocabulary_richness};
use crate::ledger::{LabelBreakdown, breakdown_with};

pub const DEFAULT_TOP_WORDS: usize = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    pub count: u64,
}

/// Vocabulary report for one article, built from its persisted rows only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArticleReport {
    pub article_id: ArticleId,
    pub total_words: u64,
    pub distinct_lemmas: usize,
    pub vocabulary_richness: f64,
    /// Token counts per tier, every tier listed in order.
    pub tiers: Vec<TierCount>,
    pub not_in_dictionary: usize,
    pub top_words: Vec<TokenStat>,
    pub labels: LabelBreakdown,
}

/// Summarize an article's rows. `rows` must be in store order (count
/// descending, then lemma) so the top-word cut is stable.
pub fn build_report(
    article_id: ArticleId,
    rows: &[TokenStat],
    labels: &HashMap<String, VocabLabel>,
    top_n: usize,
) -> ArticleReport {
    let tiers = Tier::ALL
        .into_iter()
        .map(|tier| TierCount {
            tier,
            count: rows.iter().filter(|r| r.tier == tier).map(|r| r.count).sum(),
        })
        .collect();

    let total_words = rows.iter().map(|r| r.count).sum();
    ArticleReport {
        article_id,
        total_words,
        distinct_lemmas: rows.len(),
        vocabulary_richness: vocabulary_richness(rows.len(), total_words),
        tiers,
        not_in_dictionary: count_unknown(rows),
        top_words: rows.iter().take(top_n).cloned().collect(),
        labels: breakdown_with(labels, rows.iter().map(|r| r.lemma.as_str())),
    }
}

/// A token of the source text with everything a reader view needs to style it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AnnotatedToken<'a> {
    pub start: usize,
    pub end: usize,
    pub surface: &'a str,
    pub lemma: String,
    pub tier: Tier,
    pub label: Option<VocabLabel>,
}

/// Annotate every token of `text` with its lemma, live dictionary tier and label.
pub fn annotate<'a>(
    text: &'a str,
    dict: &Dictionary,
    labels: &HashMap<String, VocabLabel>,
) -> Vec<AnnotatedToken<'a>> {
    tokenize(text)
        .map(|token| {
            let lemma = lemmatize(token.text);
            AnnotatedToken {
                start: token.start,
                end: token.end,
                surface: token.text,
                tier: dict.tier_of(&lemma),
                label: labels.get(&lemma).copied(),
                lemma,
            }
        })
        .collect()
}
