//! Finalization gateway: hands a completed profile to the profile service,
//! which syncs it into the main user record and triggers matching.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::SessionContext;
use crate::error::ApiError;
use crate::store::ProgressStore;
use crate::store::outbox::FINALIZE_KEY;

/// How a finalize attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// The service accepted the profile.
    Finalized { profile: serde_json::Value },
    /// Completion is recorded locally; the call is queued for retry.
    Deferred { reason: String },
}

impl FinalizeOutcome {
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }
}

pub struct FinalizationGateway {
    store: Arc<ProgressStore>,
}

impl FinalizationGateway {
    pub fn new(store: Arc<ProgressStore>) -> Self {
        Self { store }
    }

    /// Finalize the profile. Never fails: on any error the completion is
    /// still recorded locally and the call is queued. Safe to repeat.
    pub async fn finalize(&self, ctx: &SessionContext) -> FinalizeOutcome {
        // The service should see every answer before it finalizes.
        if self.store.pending_count(ctx).await > 0 {
            let report = self.store.flush_pending(ctx).await;
            if report.remaining > 0 {
                let error = ApiError::Transport {
                    operation: "finalize".into(),
                    reason: format!("{} answer writes still pending", report.remaining),
                };
                return self.defer(ctx, error).await;
            }
        }

        match self.store.finalize_remote(ctx).await {
            Ok(response) => {
                self.store.clear_pending(ctx, FINALIZE_KEY).await;
                self.store.mark_completed(ctx, true).await;
                info!(user_id = %ctx.user_id, "Profile finalized");
                FinalizeOutcome::Finalized {
                    profile: response.profile,
                }
            }
            Err(e) => self.defer(ctx, e).await,
        }
    }

    async fn defer(&self, ctx: &SessionContext, error: ApiError) -> FinalizeOutcome {
        warn!(user_id = %ctx.user_id, error = %error, "Finalize failed, will retry later");
        self.store.mark_completed(ctx, false).await;
        self.store.enqueue_finalize(ctx, &error).await;
        FinalizeOutcome::Deferred {
            reason: error.to_string(),
        }
    }

    /// Whether a finalize call has succeeded for this user.
    pub async fn is_finalized(&self, ctx: &SessionContext) -> bool {
        self.store
            .completion_record(ctx)
            .await
            .is_some_and(|r| r.finalized)
    }
}
