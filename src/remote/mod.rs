//! Remote profile service: the request/response operations the engine
//! depends on.
//!
//! The transport is pluggable behind [`ProfileApi`]; [`HttpProfileApi`] is the
//! JSON-over-HTTP implementation.

pub mod http;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpProfileApi;

use crate::context::SessionContext;
use crate::error::ApiError;
use crate::progress::AnswerValue;

/// Progress as the profile service knows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProgress {
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
    #[serde(default)]
    pub answered_question_ids: BTreeSet<String>,
    /// Server-side point total, when the service tracks its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
}

/// Acknowledgement for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAck {
    pub accepted: bool,
}

/// Result of handing a completed profile to the matching service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub success: bool,
    #[serde(default)]
    pub profile: serde_json::Value,
}

/// Logical operations of the remote profile service.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch saved answers.
    async fn get_progress(&self, ctx: &SessionContext) -> Result<RemoteProgress, ApiError>;

    /// Save one answer together with the points it is worth.
    async fn save_answer(
        &self,
        ctx: &SessionContext,
        question_id: &str,
        answer: &AnswerValue,
        points: u32,
    ) -> Result<SaveAck, ApiError>;

    /// Upsert several answers at once.
    async fn save_batch(
        &self,
        ctx: &SessionContext,
        answers: &BTreeMap<String, AnswerValue>,
        auto_saved: bool,
    ) -> Result<SaveAck, ApiError>;

    /// Remove a saved answer.
    async fn delete_answer(&self, ctx: &SessionContext, question_id: &str)
    -> Result<SaveAck, ApiError>;

    /// Sync the completed profile into the main user record and trigger
    /// matching. Safe to call more than once.
    async fn finalize(&self, ctx: &SessionContext) -> Result<FinalizeResponse, ApiError>;
}

/// Turn `accepted = false` into an error so callers handle one failure path.
pub(crate) fn require_accepted(ack: SaveAck, operation: &str) -> Result<(), ApiError> {
    if ack.accepted {
        Ok(())
    } else {
        Err(ApiError::Rejected {
            operation: operation.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_progress_tolerates_missing_fields() {
        let progress: RemoteProgress = serde_json::from_str("{}").unwrap();
        assert!(progress.answers.is_empty());
        assert!(progress.total_points.is_none());

        let progress: RemoteProgress = serde_json::from_value(serde_json::json!({
            "answers": {"bio": {"type": "text", "value": "hello"}},
            "answered_question_ids": ["bio", "headline"]
        }))
        .unwrap();
        assert_eq!(progress.answers["bio"], AnswerValue::text("hello"));
        assert_eq!(progress.answered_question_ids.len(), 2);
    }

    #[test]
    fn rejected_ack_becomes_error() {
        assert!(require_accepted(SaveAck { accepted: true }, "save_answer").is_ok());
        let err = require_accepted(SaveAck { accepted: false }, "save_answer").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { .. }));
    }
}
