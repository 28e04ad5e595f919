use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bitvec::prelude::*;
use wordminer_types::{ArticleId, OverlapResult};

use crate::store::{StatsStore, StoreError};

type BitSet = BitVec<usize, Lsb0>;

/// Vocabulary overlap across articles, computed from persisted stats.
pub struct OverlapEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for OverlapEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StatsStore + ?Sized> OverlapEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Union and intersection sizes of the articles' distinct-lemma sets.
    ///
    /// Returns `None` when `ids` is empty. Repeated ids count once; an id
    /// without stats contributes an empty set.
    pub fn overlap(&self, ids: &[ArticleId]) -> Result<Option<OverlapResult>, StoreError> {
        let sets = self.lemma_sets(ids)?;
        if sets.is_empty() {
            return Ok(None);
        }
        Ok(Some(LemmaUniverse::build(&sets).overlap()))
    }

    /// Lemmas present in every selected article, sorted ascending.
    pub fn shared_lemmas(&self, ids: &[ArticleId]) -> Result<Vec<String>, StoreError> {
        Ok(self
            .overlap_with_shared(ids)?
            .map(|(_, shared)| shared)
            .unwrap_or_default())
    }

    /// [`overlap`](Self::overlap) plus the shared lemmas, both computed from
    /// one read of the store so `shared` always equals the list length.
    pub fn overlap_with_shared(
        &self,
        ids: &[ArticleId],
    ) -> Result<Option<(OverlapResult, Vec<String>)>, StoreError> {
        let sets = self.lemma_sets(ids)?;
        if sets.is_empty() {
            return Ok(None);
        }
        let universe = LemmaUniverse::build(&sets);
        let shared = universe.intersection();
        let result = OverlapResult {
            unique: universe.lemmas.len(),
            shared: shared.count_ones(),
        };
        Ok(Some((result, universe.lemmas_of(&shared))))
    }

    fn lemma_sets(&self, ids: &[ArticleId]) -> Result<Vec<HashSet<String>>, StoreError> {
        let mut unique_ids = ids.to_vec();
        unique_ids.sort_unstable();
        unique_ids.dedup();
        unique_ids
            .into_iter()
            .map(|id| self.store.query_distinct_lemmas(id))
            .collect()
    }
}

/// Overlap of in-memory lemma sets; `None` for an empty slice.
pub fn overlap_of(sets: &[HashSet<String>]) -> Option<OverlapResult> {
    if sets.is_empty() {
        return None;
    }
    Some(LemmaUniverse::build(sets).overlap())
}

/// Every lemma of the selection, indexed in sorted order, with one
/// membership bitset per article.
struct LemmaUniverse<'a> {
    lemmas: Vec<&'a str>,
    members: Vec<BitSet>,
}

impl<'a> LemmaUniverse<'a> {
    fn build(sets: &'a [HashSet<String>]) -> Self {
        let mut lemmas: Vec<&str> = sets.iter().flatten().map(String::as_str).collect();
        lemmas.sort_unstable();
        lemmas.dedup();
        let index: HashMap<&str, usize> = lemmas.iter().enumerate().map(|(i, l)| (*l, i)).collect();

        let n = lemmas.len();
        let members = sets
            .iter()
            .map(|set| {
                let mut bits = bitvec![usize, Lsb0; 0; n];
                for lemma in set {
                    bits.set(index[lemma.as_str()], true);
                }
                bits
            })
            .collect();
        Self { lemmas, members }
    }

    fn intersection(&self) -> BitSet {
        let mut shared = bitvec![usize, Lsb0; 1; self.lemmas.len()];
        for bits in &self.members {
            shared &= bits;
            if shared.not_any() {
                break;
            }
        }
        shared
    }

    fn overlap(&self) -> OverlapResult {
        OverlapResult {
            unique: self.lemmas.len(),
            shared: self.intersection().count_ones(),
        }
    }

    fn lemmas_of(&self, bits: &BitSet) -> Vec<String> {
        bits.iter_ones()
            .map(|idx| self.lemmas[idx].to_string())
            .collect()
    }
}
