//! Question catalog: the fixed, ordered registry of phases and questions.
//!
//! The catalog is immutable once built. Everything downstream (selection,
//! resume, completion, rewards) reads it and never writes to it.

pub mod exclusion;
pub mod model;
mod reference;

use std::collections::{BTreeSet, HashSet};

pub use exclusion::ExclusionPolicy;
pub use model::{Category, Choice, DateRange, InputKind, Phase, Question};

use crate::error::CatalogError;

/// Ordered phases of questions.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    phases: Vec<Phase>,
}

impl QuestionCatalog {
    /// Build a catalog, checking the phase and question invariants.
    pub fn new(phases: Vec<Phase>) -> Result<Self, CatalogError> {
        if phases.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut phase_ids = HashSet::new();
        let mut seen = HashSet::new();
        let mut previous_points = 0;

        for phase in &phases {
            if !phase_ids.insert(phase.id.as_str()) {
                return Err(CatalogError::DuplicatePhaseId(phase.id.clone()));
            }
            if phase.questions.is_empty() {
                return Err(CatalogError::EmptyPhase(phase.id.clone()));
            }
            if phase.required_points < previous_points {
                return Err(CatalogError::DecreasingRequiredPoints {
                    phase: phase.id.clone(),
                    required: phase.required_points,
                    previous: previous_points,
                });
            }
            previous_points = phase.required_points;

            for question in &phase.questions {
                if let Some(dep) = question
                    .dependencies
                    .iter()
                    .find(|d| !seen.contains(d.as_str()))
                {
                    return Err(CatalogError::UnknownDependency {
                        question: question.id.clone(),
                        dependency: dep.clone(),
                    });
                }
                if !seen.insert(question.id.as_str()) {
                    return Err(CatalogError::DuplicateQuestionId(question.id.clone()));
                }
            }
        }

        Ok(Self { phases })
    }

    /// The built-in catalog: essentials (1), about you (6), deeper (11).
    pub fn reference() -> Self {
        Self {
            phases: reference::phases(),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// All questions, phase order first, then declaration order.
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.phases.iter().flat_map(|p| p.questions.iter())
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.all_questions().find(|q| q.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.question(id).is_some()
    }

    /// Total number of questions across every phase.
    pub fn len(&self) -> usize {
        self.phases.iter().map(|p| p.questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn required_questions(&self) -> impl Iterator<Item = &Question> {
        self.all_questions().filter(|q| q.required)
    }

    /// Sum of points for the answered ids that still exist in the catalog.
    pub fn points_for(&self, answered: &BTreeSet<String>) -> u32 {
        self.all_questions()
            .filter(|q| answered.contains(&q.id))
            .map(|q| q.points)
            .sum()
    }

    /// Phases whose point threshold has been reached.
    pub fn unlocked_phases(&self, points: u32) -> Vec<&Phase> {
        self.phases.iter().filter(|p| p.is_unlocked(points)).collect()
    }
}
