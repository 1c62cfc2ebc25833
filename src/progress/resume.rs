//! Resume-point resolution for returning sessions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::QuestionCatalog;

/// Sentinel phase id once every question in every phase is answered.
pub const COMPLETED_PHASE: &str = "completed";

/// Where a session should pick up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub has_progress: bool,
    pub phase_id: String,
    pub question_index: usize,
}

impl ResumePoint {
    pub fn is_completed(&self) -> bool {
        self.phase_id == COMPLETED_PHASE
    }
}

pub struct ResumeResolver<'a> {
    catalog: &'a QuestionCatalog,
}

impl<'a> ResumeResolver<'a> {
    pub fn new(catalog: &'a QuestionCatalog) -> Self {
        Self { catalog }
    }

    /// First unanswered question, scanning phases in declared order.
    pub fn resolve(&self, answered: &BTreeSet<String>) -> ResumePoint {
        let has_progress = self.catalog.all_questions().any(|q| answered.contains(&q.id));

        for phase in self.catalog.phases() {
            if let Some(index) = phase
                .questions
                .iter()
                .position(|q| !answered.contains(&q.id))
            {
                return ResumePoint {
                    has_progress,
                    phase_id: phase.id.clone(),
                    question_index: index,
                };
            }
        }

        ResumePoint {
            has_progress,
            phase_id: COMPLETED_PHASE.to_string(),
            question_index: 0,
        }
    }
}
