//! Registration-field exclusions.
//!
//! Some profile fields are captured when the account is created (name, handle,
//! birth date, ...). Questions with those ids are never asked during
//! onboarding. The set is static: it does not depend on the user's answers.

use std::collections::BTreeSet;

use super::QuestionCatalog;
use super::model::Question;

/// Question ids populated during account registration.
pub const REGISTRATION_FIELDS: &[&str] = &[
    "full_name",
    "username",
    "date_of_birth",
    "location",
    "gender",
    "email",
    "phone",
];

/// Filters registration-owned questions out of a catalog read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    excluded: BTreeSet<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new(REGISTRATION_FIELDS.iter().copied())
    }
}

impl ExclusionPolicy {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// A policy that excludes nothing.
    pub fn none() -> Self {
        Self {
            excluded: BTreeSet::new(),
        }
    }

    pub fn is_excluded(&self, question_id: &str) -> bool {
        self.excluded.contains(question_id)
    }

    pub fn excluded_ids(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// `all_questions()` minus the excluded ids, in catalog order.
    pub fn effective_questions<'a>(&self, catalog: &'a QuestionCatalog) -> Vec<&'a Question> {
        catalog
            .all_questions()
            .filter(|q| !self.is_excluded(&q.id))
            .collect()
    }
}
