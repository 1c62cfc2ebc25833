//! Local-first progress persistence.
//!
//! `ProgressStore` is the only component that touches storage. Local state is
//! updated and cached before the remote call; writes the profile service does
//! not confirm go to the outbox and are retried by `flush_pending`.
//!
//! Remote writes for a store are serialized: a background flush and a
//! foreground save or delete never interleave, so an outbox snapshot cannot
//! land after a newer write for the same question.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{Question, QuestionCatalog};
use crate::context::SessionContext;
use crate::error::ApiError;
use crate::progress::{AnswerValue, ProgressState};
use crate::remote::{FinalizeResponse, ProfileApi, require_accepted};
use crate::store::outbox::{self, FINALIZE_KEY, PendingWrite};
use crate::store::traits::Database;

/// Settings key for the cached progress state.
pub const PROGRESS_KEY: &str = "onboarding_progress";
/// Settings key for the completion record.
pub const COMPLETION_KEY: &str = "onboarding_completion";

/// Where a loaded state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSource {
    Remote,
    LocalCache,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct LoadedProgress {
    pub state: ProgressState,
    pub source: ProgressSource,
}

/// Whether a write reached the profile service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Confirmed,
    Queued,
}

/// Result of one outbox flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub remaining: usize,
}

/// Local record that the user finished onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_at: DateTime<Utc>,
    pub finalized: bool,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

pub struct ProgressStore {
    db: Arc<dyn Database>,
    api: Arc<dyn ProfileApi>,
    catalog: Arc<QuestionCatalog>,
    save_timeout: Duration,
    /// Held across every remote write and outbox flush.
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(
        db: Arc<dyn Database>,
        api: Arc<dyn ProfileApi>,
        catalog: Arc<QuestionCatalog>,
        save_timeout: Duration,
    ) -> Self {
        Self {
            db,
            api,
            catalog,
            save_timeout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    /// Bound one remote round trip by the save timeout.
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        match tokio::time::timeout(self.save_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                operation: operation.to_string(),
                timeout: self.save_timeout,
            }),
        }
    }

    /// Load progress: remote snapshot plus unconfirmed local writes, falling
    /// back to the local cache and then to an empty state.
    pub async fn load(&self, ctx: &SessionContext) -> LoadedProgress {
        let pending = self.pending_writes(ctx).await;

        let (mut state, source) = match self
            .bounded("get_progress", self.api.get_progress(ctx))
            .await
        {
            Ok(remote) => {
                let mut state = ProgressState::from_parts(
                    &self.catalog,
                    remote.answered_question_ids,
                    remote.answers,
                );
                state.points_override = remote.total_points;
                (state, ProgressSource::Remote)
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, error = %e, "Remote progress unavailable, using local cache");
                match self.cached_state(ctx).await {
                    Some(state) => (state, ProgressSource::LocalCache),
                    None => (ProgressState::default(), ProgressSource::Fresh),
                }
            }
        };

        if !pending.is_empty() {
            debug!(count = pending.len(), "Replaying pending writes onto loaded progress");
            outbox::replay(&self.catalog, &mut state, &pending);
        }

        let stale = state.stale_ids(&self.catalog);
        if !stale.is_empty() {
            warn!(stale = ?stale, "Answered ids no longer in catalog, ignoring");
        }

        self.cache(ctx, &state).await;
        info!(
            user_id = %ctx.user_id,
            source = ?source,
            answered = state.answered_question_ids.len(),
            "Onboarding progress loaded"
        );
        LoadedProgress { state, source }
    }

    async fn cached_state(&self, ctx: &SessionContext) -> Option<ProgressState> {
        match self.db.get_setting(&ctx.user_id, PROGRESS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Cached onboarding progress is unreadable: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cached onboarding progress: {e}");
                None
            }
        }
    }

    /// Write the state to the local cache. Failures are logged only.
    pub async fn cache(&self, ctx: &SessionContext, state: &ProgressState) {
        let value = match serde_json::to_value(state) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize onboarding progress: {e}");
                return;
            }
        };
        if let Err(e) = self.db.set_setting(&ctx.user_id, PROGRESS_KEY, &value).await {
            warn!("Failed to cache onboarding progress: {e}");
        }
    }

    async fn enqueue(&self, ctx: &SessionContext, write: PendingWrite, error: &ApiError) {
        let mut write = write;
        write.last_error = Some(error.to_string());
        if let Err(e) = self.db.upsert_pending_write(&ctx.user_id, &write).await {
            tracing::error!(key = %write.key, "Failed to queue pending write: {e}");
        }
    }

    pub(crate) async fn clear_pending(&self, ctx: &SessionContext, key: &str) {
        if let Err(e) = self.db.remove_pending_write(&ctx.user_id, key).await {
            warn!(key, "Failed to remove pending write: {e}");
        }
    }

    /// Record an answer locally, then try to save it remotely.
    pub async fn persist_answer(
        &self,
        ctx: &SessionContext,
        state: &mut ProgressState,
        question: &Question,
        answer: AnswerValue,
    ) -> SaveOutcome {
        let _write = self.write_lock.lock().await;
        state.record(&self.catalog, &question.id, answer.clone());
        self.cache(ctx, state).await;

        let result = self
            .bounded(
                "save_answer",
                self.api
                    .save_answer(ctx, &question.id, &answer, question.points),
            )
            .await
            .and_then(|ack| require_accepted(ack, "save_answer"));

        match result {
            Ok(()) => {
                // An older queued write for this question must not overwrite it.
                self.clear_pending(ctx, &question.id).await;
                debug!(question_id = %question.id, "Answer saved");
                SaveOutcome::Confirmed
            }
            Err(e) => {
                warn!(question_id = %question.id, error = %e, "Answer save failed, queued for retry");
                self.enqueue(
                    ctx,
                    PendingWrite::save_answer(&question.id, answer, question.points),
                    &e,
                )
                .await;
                SaveOutcome::Queued
            }
        }
    }

    /// Forget an answer locally, then try to delete it remotely.
    pub async fn persist_deletion(
        &self,
        ctx: &SessionContext,
        state: &mut ProgressState,
        question_id: &str,
    ) -> SaveOutcome {
        let _write = self.write_lock.lock().await;
        state.remove(&self.catalog, question_id);
        self.cache(ctx, state).await;

        let result = self
            .bounded("delete_answer", self.api.delete_answer(ctx, question_id))
            .await
            .and_then(|ack| require_accepted(ack, "delete_answer"));

        match result {
            Ok(()) => {
                self.clear_pending(ctx, question_id).await;
                debug!(question_id, "Answer deleted");
                SaveOutcome::Confirmed
            }
            Err(e) => {
                warn!(question_id, error = %e, "Answer delete failed, queued for retry");
                self.enqueue(ctx, PendingWrite::delete_answer(question_id), &e)
                    .await;
                SaveOutcome::Queued
            }
        }
    }

    /// Upsert several answers at once.
    pub async fn save_batch(
        &self,
        ctx: &SessionContext,
        state: &mut ProgressState,
        answers: &BTreeMap<String, AnswerValue>,
        auto_saved: bool,
    ) -> SaveOutcome {
        let _write = self.write_lock.lock().await;
        state.merge_answers(&self.catalog, answers);
        self.cache(ctx, state).await;

        let result = self
            .bounded("save_batch", self.api.save_batch(ctx, answers, auto_saved))
            .await
            .and_then(|ack| require_accepted(ack, "save_batch"));

        match result {
            Ok(()) => {
                for id in answers.keys() {
                    self.clear_pending(ctx, id).await;
                }
                SaveOutcome::Confirmed
            }
            Err(e) => {
                warn!(count = answers.len(), error = %e, "Batch save failed, queued for retry");
                for (id, answer) in answers {
                    let points = self.catalog.question(id).map_or(0, |q| q.points);
                    self.enqueue(ctx, PendingWrite::save_answer(id, answer.clone(), points), &e)
                        .await;
                }
                SaveOutcome::Queued
            }
        }
    }

    /// Queue a finalize call for the next flush.
    pub async fn enqueue_finalize(&self, ctx: &SessionContext, error: &ApiError) {
        self.enqueue(ctx, PendingWrite::finalize(), error).await;
    }

    pub async fn pending_writes(&self, ctx: &SessionContext) -> Vec<PendingWrite> {
        match self.db.list_pending_writes(&ctx.user_id).await {
            Ok(writes) => writes,
            Err(e) => {
                warn!("Failed to read pending writes: {e}");
                Vec::new()
            }
        }
    }

    pub async fn pending_count(&self, ctx: &SessionContext) -> usize {
        self.pending_writes(ctx).await.len()
    }

    async fn record_failure(&self, ctx: &SessionContext, key: &str, error: &ApiError) {
        if let Err(e) = self
            .db
            .record_write_attempt(&ctx.user_id, key, &error.to_string())
            .await
        {
            warn!(key, "Failed to record write attempt: {e}");
        }
    }

    /// Retry everything in the outbox.
    ///
    /// Answers go out as one auto-saved batch, deletes one by one, and the
    /// finalize call last, only once no answer writes are left.
    pub async fn flush_pending(&self, ctx: &SessionContext) -> FlushReport {
        let _write = self.write_lock.lock().await;
        let writes = self.pending_writes(ctx).await;
        if writes.is_empty() {
            return FlushReport::default();
        }

        let (batch, deletes, finalize) = outbox::partition(&writes);
        let mut delivered = 0;
        let mut answers_left = false;

        if !batch.is_empty() {
            let result = self
                .bounded("save_batch", self.api.save_batch(ctx, &batch, true))
                .await
                .and_then(|ack| require_accepted(ack, "save_batch"));
            match result {
                Ok(()) => {
                    for id in batch.keys() {
                        self.clear_pending(ctx, id).await;
                    }
                    delivered += batch.len();
                }
                Err(e) => {
                    warn!(count = batch.len(), error = %e, "Pending batch still failing");
                    for id in batch.keys() {
                        self.record_failure(ctx, id, &e).await;
                    }
                    answers_left = true;
                }
            }
        }

        for id in &deletes {
            let result = self
                .bounded("delete_answer", self.api.delete_answer(ctx, id))
                .await
                .and_then(|ack| require_accepted(ack, "delete_answer"));
            match result {
                Ok(()) => {
                    self.clear_pending(ctx, id).await;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(question_id = %id, error = %e, "Pending delete still failing");
                    self.record_failure(ctx, id, &e).await;
                    answers_left = true;
                }
            }
        }

        if finalize && !answers_left {
            match self.finalize_remote(ctx).await {
                Ok(_) => {
                    self.clear_pending(ctx, FINALIZE_KEY).await;
                    self.mark_completed(ctx, true).await;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Pending finalize still failing");
                    self.record_failure(ctx, FINALIZE_KEY, &e).await;
                }
            }
        }

        let remaining = self.pending_count(ctx).await;
        info!(delivered, remaining, "Outbox flushed");
        FlushReport {
            delivered,
            remaining,
        }
    }

    /// Call the remote finalize, treating `success = false` as a failure.
    pub async fn finalize_remote(
        &self,
        ctx: &SessionContext,
    ) -> Result<FinalizeResponse, ApiError> {
        let response = self
            .bounded("finalize", self.api.finalize(ctx))
            .await?;
        if response.success {
            Ok(response)
        } else {
            Err(ApiError::Rejected {
                operation: "finalize".into(),
            })
        }
    }

    pub async fn completion_record(&self, ctx: &SessionContext) -> Option<CompletionRecord> {
        match self.db.get_setting(&ctx.user_id, COMPLETION_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read completion record: {e}");
                None
            }
        }
    }

    /// Record completion. The first completion time is kept; `finalized`
    /// only ever goes from false to true.
    pub async fn mark_completed(&self, ctx: &SessionContext, finalized: bool) -> CompletionRecord {
        let now = Utc::now();
        let record = match self.completion_record(ctx).await {
            Some(existing) => CompletionRecord {
                completed_at: existing.completed_at,
                finalized: existing.finalized || finalized,
                finalized_at: existing
                    .finalized_at
                    .or_else(|| finalized.then_some(now)),
            },
            None => CompletionRecord {
                completed_at: now,
                finalized,
                finalized_at: finalized.then_some(now),
            },
        };

        match serde_json::to_value(&record) {
            Ok(value) => {
                if let Err(e) = self.db.set_setting(&ctx.user_id, COMPLETION_KEY, &value).await {
                    warn!("Failed to persist completion record: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize completion record: {e}"),
        }
        record
    }
}

/// Periodically flush the outbox.
pub fn spawn_outbox_flusher(
    store: Arc<ProgressStore>,
    ctx: SessionContext,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if store.pending_count(&ctx).await > 0 {
                store.flush_pending(&ctx).await;
            }
        }
    })
}
