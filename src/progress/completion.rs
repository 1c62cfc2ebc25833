//! Completion percentage and the "is complete" decision.

use std::collections::BTreeSet;

use crate::catalog::QuestionCatalog;

/// Share of all questions that must be answered, in percent.
pub const DEFAULT_COMPLETION_THRESHOLD: u8 = 90;

/// Computes completion over every phase of the catalog, not just the active
/// one.
pub struct CompletionEvaluator<'a> {
    catalog: &'a QuestionCatalog,
    threshold_percent: u8,
}

impl<'a> CompletionEvaluator<'a> {
    pub fn new(catalog: &'a QuestionCatalog) -> Self {
        Self::with_threshold(catalog, DEFAULT_COMPLETION_THRESHOLD)
    }

    pub fn with_threshold(catalog: &'a QuestionCatalog, threshold_percent: u8) -> Self {
        Self {
            catalog,
            threshold_percent: threshold_percent.min(100),
        }
    }

    /// Answered ids that exist in the catalog.
    pub fn answered_count(&self, answered: &BTreeSet<String>) -> usize {
        self.catalog
            .all_questions()
            .filter(|q| answered.contains(&q.id))
            .count()
    }

    /// `round(100 * answered / total)`, half rounding up.
    pub fn percentage(&self, answered: &BTreeSet<String>) -> u8 {
        let total = self.catalog.len();
        if total == 0 {
            return 0;
        }
        let done = self.answered_count(answered);
        ((200 * done + total) / (2 * total)) as u8
    }

    pub fn required_satisfied(&self, answered: &BTreeSet<String>) -> bool {
        self.catalog
            .required_questions()
            .all(|q| answered.contains(&q.id))
    }

    /// Every required question answered and at least the threshold share of
    /// all questions answered. The share uses the exact ratio, not the
    /// rounded percentage.
    pub fn is_complete(&self, answered: &BTreeSet<String>) -> bool {
        let total = self.catalog.len();
        let done = self.answered_count(answered);
        self.required_satisfied(answered)
            && done * 100 >= usize::from(self.threshold_percent) * total
    }

    /// Required questions still missing, in catalog order.
    pub fn missing_required(&self, answered: &BTreeSet<String>) -> Vec<&'a str> {
        self.catalog
            .required_questions()
            .filter(|q| !answered.contains(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }
}
