//! Next-question selection.

use std::collections::BTreeSet;

use crate::catalog::{ExclusionPolicy, Question, QuestionCatalog};

/// Picks the lowest-index unanswered question in catalog order.
pub struct QuestionSelector<'a> {
    catalog: &'a QuestionCatalog,
    exclusions: &'a ExclusionPolicy,
}

impl<'a> QuestionSelector<'a> {
    pub fn new(catalog: &'a QuestionCatalog, exclusions: &'a ExclusionPolicy) -> Self {
        Self {
            catalog,
            exclusions,
        }
    }

    pub fn next_question(&self, answered: &BTreeSet<String>) -> Option<&'a Question> {
        self.next_question_skipping(answered, &BTreeSet::new())
    }

    /// Like [`next_question`](Self::next_question), but also passes over
    /// questions deferred for this session.
    pub fn next_question_skipping(
        &self,
        answered: &BTreeSet<String>,
        skipped: &BTreeSet<String>,
    ) -> Option<&'a Question> {
        self.exclusions
            .effective_questions(self.catalog)
            .into_iter()
            .find(|q| !answered.contains(&q.id) && !skipped.contains(&q.id))
    }

    /// Number of askable questions not yet answered.
    pub fn remaining(&self, answered: &BTreeSet<String>) -> usize {
        self.exclusions
            .effective_questions(self.catalog)
            .iter()
            .filter(|q| !answered.contains(&q.id))
            .count()
    }
}
