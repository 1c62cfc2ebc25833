//! Pending-write outbox model.
//!
//! Writes that the profile service has not confirmed are kept here until a
//! later flush delivers them. Entries are keyed by question id, so a newer
//! write for the same question replaces the older one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::QuestionCatalog;
use crate::progress::{AnswerValue, ProgressState};

/// Outbox key for the finalize call.
pub const FINALIZE_KEY: &str = "__finalize__";

/// The remote operation to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PendingOp {
    SaveAnswer {
        question_id: String,
        answer: AnswerValue,
        points: u32,
    },
    DeleteAnswer {
        question_id: String,
    },
    Finalize,
}

impl PendingOp {
    pub fn key(&self) -> &str {
        match self {
            Self::SaveAnswer { question_id, .. } | Self::DeleteAnswer { question_id } => {
                question_id
            }
            Self::Finalize => FINALIZE_KEY,
        }
    }
}

/// One queued write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub key: String,
    pub op: PendingOp,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(op: PendingOp) -> Self {
        Self {
            key: op.key().to_string(),
            op,
            attempts: 0,
            last_error: None,
            queued_at: Utc::now(),
        }
    }

    pub fn save_answer(question_id: &str, answer: AnswerValue, points: u32) -> Self {
        Self::new(PendingOp::SaveAnswer {
            question_id: question_id.to_string(),
            answer,
            points,
        })
    }

    pub fn delete_answer(question_id: &str) -> Self {
        Self::new(PendingOp::DeleteAnswer {
            question_id: question_id.to_string(),
        })
    }

    pub fn finalize() -> Self {
        Self::new(PendingOp::Finalize)
    }
}

/// Apply unconfirmed writes on top of a state loaded from the service.
pub fn replay(catalog: &QuestionCatalog, state: &mut ProgressState, writes: &[PendingWrite]) {
    for write in writes {
        match &write.op {
            PendingOp::SaveAnswer {
                question_id,
                answer,
                ..
            } => state.record(catalog, question_id, answer.clone()),
            PendingOp::DeleteAnswer { question_id } => {
                state.remove(catalog, question_id);
            }
            PendingOp::Finalize => {}
        }
    }
}

/// Split queued writes into one batch of answers, the deletes, and whether
/// a finalize is pending.
pub fn partition(
    writes: &[PendingWrite],
) -> (BTreeMap<String, AnswerValue>, Vec<String>, bool) {
    let mut batch = BTreeMap::new();
    let mut deletes = Vec::new();
    let mut finalize = false;
    for write in writes {
        match &write.op {
            PendingOp::SaveAnswer {
                question_id,
                answer,
                ..
            } => {
                batch.insert(question_id.clone(), answer.clone());
            }
            PendingOp::DeleteAnswer { question_id } => deletes.push(question_id.clone()),
            PendingOp::Finalize => finalize = true,
        }
    }
    (batch, deletes, finalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_question_id() {
        assert_eq!(PendingWrite::save_answer("bio", AnswerValue::text("x"), 15).key, "bio");
        assert_eq!(PendingWrite::delete_answer("bio").key, "bio");
        assert_eq!(PendingWrite::finalize().key, FINALIZE_KEY);
    }

    #[test]
    fn op_serde_is_tagged() {
        let op = PendingOp::DeleteAnswer {
            question_id: "bio".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json, serde_json::json!({"op": "delete_answer", "question_id": "bio"}));
        let back: PendingOp = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn replay_applies_saves_and_deletes() {
        let catalog = QuestionCatalog::reference();
        let mut state = ProgressState::default();
        state.record(&catalog, "headline", AnswerValue::text("old"));

        let writes = vec![
            PendingWrite::save_answer("bio", AnswerValue::text("queued"), 15),
            PendingWrite::delete_answer("headline"),
            PendingWrite::finalize(),
        ];
        replay(&catalog, &mut state, &writes);

        assert_eq!(state.answer("bio"), Some(&AnswerValue::text("queued")));
        assert!(!state.has_answered("headline"));
    }

    #[test]
    fn partition_groups_by_kind() {
        let writes = vec![
            PendingWrite::save_answer("bio", AnswerValue::text("a"), 15),
            PendingWrite::save_answer("headline", AnswerValue::text("b"), 10),
            PendingWrite::delete_answer("occupation"),
            PendingWrite::finalize(),
        ];
        let (batch, deletes, finalize) = partition(&writes);
        assert_eq!(batch.len(), 2);
        assert_eq!(deletes, vec!["occupation".to_string()]);
        assert!(finalize);
    }
}
