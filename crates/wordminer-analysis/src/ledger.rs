use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use wordminer_types::VocabLabel;

use crate::store::{LabelStore, StoreError};

/// The learner's familiarity labels, independent of any article.
pub struct VocabularyLedger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for VocabularyLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Distinct lemmas of a selection bucketed by label.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LabelBreakdown {
    pub mastered: usize,
    pub learning: usize,
    pub unfamiliar: usize,
    pub unlabeled: usize,
}

impl LabelBreakdown {
    fn add(&mut self, label: Option<VocabLabel>) {
        match label {
            Some(VocabLabel::Mastered) => self.mastered += 1,
            Some(VocabLabel::Learning) => self.learning += 1,
            Some(VocabLabel::Unfamiliar) => self.unfamiliar += 1,
            None => self.unlabeled += 1,
        }
    }
}

impl<S: LabelStore + ?Sized> VocabularyLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn set_label(&self, lemma: &str, label: VocabLabel) -> Result<(), StoreError> {
        self.store.set_label(lemma, label)
    }

    pub fn get_label(&self, lemma: &str) -> Result<Option<VocabLabel>, StoreError> {
        self.store.get_label(lemma)
    }

    pub fn list_by_label(&self, label: VocabLabel) -> Result<Vec<String>, StoreError> {
        self.store.list_by_label(label)
    }

    pub fn get_all(&self) -> Result<HashMap<String, VocabLabel>, StoreError> {
        self.store.all_labels()
    }

    /// Count `lemmas` per label; lemmas without a label land in `unlabeled`.
    pub fn breakdown<'a, I>(&self, lemmas: I) -> Result<LabelBreakdown, StoreError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let labels = self.store.all_labels()?;
        Ok(breakdown_with(&labels, lemmas))
    }

    /// Write `lemma,status` rows grouped mastered, learning, unfamiliar, each
    /// sorted ascending. Returns the number of rows written, header excluded.
    pub fn export_csv<W: Write>(&self, mut out: W) -> Result<usize, StoreError> {
        writeln!(out, "lemma,status")?;
        let mut rows = 0;
        for label in VocabLabel::ALL {
            for lemma in self.store.list_by_label(label)? {
                writeln!(out, "{lemma},{label}")?;
                rows += 1;
            }
        }
        out.flush()?;
        Ok(rows)
    }
}

pub(crate) fn breakdown_with<'a, I>(
    labels: &HashMap<String, VocabLabel>,
    lemmas: I,
) -> LabelBreakdown
where
    I: IntoIterator<Item = &'a str>,
{
    let mut breakdown = LabelBreakdown::default();
    for lemma in lemmas {
        breakdown.add(labels.get(lemma).copied());
    }
    breakdown
}
