//! Resumable per-user answer state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::answer::AnswerValue;
use crate::catalog::QuestionCatalog;

/// Everything needed to resume onboarding for one user.
///
/// Cached locally under the `onboarding_progress` setting and mirrored to the
/// remote profile service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub answered_question_ids: BTreeSet<String>,
    pub answers: BTreeMap<String, AnswerValue>,
    /// Sum of points of answered catalog questions.
    pub total_points: u32,
    /// Points reported by the profile service, used instead of the derived
    /// sum until the next local change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_override: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase_id: Option<String>,
}

impl ProgressState {
    /// Build a state from answered ids and answers (e.g. a remote snapshot).
    pub fn from_parts(
        catalog: &QuestionCatalog,
        answered_question_ids: BTreeSet<String>,
        answers: BTreeMap<String, AnswerValue>,
    ) -> Self {
        let mut state = Self {
            answered_question_ids,
            answers,
            ..Default::default()
        };
        // Every stored answer counts as answered.
        state
            .answered_question_ids
            .extend(state.answers.keys().cloned());
        state.recompute_points(catalog);
        state
    }

    pub fn total_points(&self) -> u32 {
        self.points_override.unwrap_or(self.total_points)
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.answered_question_ids.contains(question_id)
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    /// Store an answer and mark the question answered.
    pub fn record(&mut self, catalog: &QuestionCatalog, question_id: &str, answer: AnswerValue) {
        self.answers.insert(question_id.to_string(), answer);
        self.answered_question_ids.insert(question_id.to_string());
        self.points_override = None;
        self.recompute_points(catalog);
    }

    /// Upsert a batch of answers. Applying the same batch twice is a no-op
    /// the second time.
    pub fn merge_answers(
        &mut self,
        catalog: &QuestionCatalog,
        answers: &BTreeMap<String, AnswerValue>,
    ) {
        for (id, answer) in answers {
            self.answers.insert(id.clone(), answer.clone());
            self.answered_question_ids.insert(id.clone());
        }
        if !answers.is_empty() {
            self.points_override = None;
        }
        self.recompute_points(catalog);
    }

    /// Forget an answer. Returns whether anything was removed.
    pub fn remove(&mut self, catalog: &QuestionCatalog, question_id: &str) -> bool {
        let had_id = self.answered_question_ids.remove(question_id);
        let had_answer = self.answers.remove(question_id).is_some();
        if had_id || had_answer {
            self.points_override = None;
            self.recompute_points(catalog);
        }
        had_id || had_answer
    }

    pub fn recompute_points(&mut self, catalog: &QuestionCatalog) {
        self.total_points = catalog.points_for(&self.answered_question_ids);
    }

    /// Answered ids that no longer exist in the catalog.
    pub fn stale_ids<'a>(&'a self, catalog: &QuestionCatalog) -> Vec<&'a str> {
        self.answered_question_ids
            .iter()
            .filter(|id| !catalog.contains(id))
            .map(String::as_str)
            .collect()
    }
}
