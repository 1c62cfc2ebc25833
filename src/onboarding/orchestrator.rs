//! SessionOrchestrator: drives one onboarding session through
//! question → answer → persist → advance, and on to completion and
//! finalization.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::catalog::{ExclusionPolicy, InputKind, Question, QuestionCatalog};
use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::error::{SessionError, ValidationError};
use crate::progress::{
    AnswerValue, CompletionEvaluator, ProgressState, QuestionSelector, ResumeResolver, RewardTier,
    RewardTierCalculator,
};
use crate::store::{FlushReport, ProgressStore, SaveOutcome};

use super::events::{ConversationEvent, EventLog, PromptKind};
use super::finalize::{FinalizationGateway, FinalizeOutcome};
use super::prompts;
use super::state::{SessionMachine, SessionState, StateTransition};
use super::validation;

/// A question as presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPrompt {
    pub question_id: String,
    pub phase_id: String,
    pub text: String,
    pub input: InputKind,
    pub required: bool,
    pub points: u32,
    /// 1-based position among askable questions.
    pub position: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub percentage: u8,
    pub total_points: u32,
    pub tier: RewardTier,
    pub finalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

/// What the session wants the presenter to show next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum Turn {
    Asked {
        prompt: QuestionPrompt,
        save: Option<SaveOutcome>,
    },
    Reprompted {
        prompt: QuestionPrompt,
        error: String,
    },
    Completed(CompletionSummary),
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub state: SessionState,
    pub current_question: Option<QuestionPrompt>,
    pub answered: usize,
    pub total_questions: usize,
    pub percentage: u8,
    pub is_complete: bool,
    pub missing_required: Vec<String>,
    pub total_points: u32,
    pub tier: RewardTier,
    pub next_tier: Option<RewardTier>,
    pub unlocked_phases: Vec<String>,
    pub skipped: Vec<String>,
    pub pending_writes: usize,
    pub finalized: bool,
}

#[derive(Default)]
struct Inner {
    machine: SessionMachine,
    progress: ProgressState,
    current: Option<String>,
    /// Deferred for this session only.
    skipped: BTreeSet<String>,
    finalized: bool,
    profile: Option<serde_json::Value>,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionOrchestrator {
    ctx: SessionContext,
    store: Arc<ProgressStore>,
    gateway: FinalizationGateway,
    exclusions: ExclusionPolicy,
    rewards: RewardTierCalculator,
    config: SessionConfig,
    inner: RwLock<Inner>,
    events: EventLog,
    in_flight: AtomicBool,
}

impl SessionOrchestrator {
    pub fn new(ctx: SessionContext, store: Arc<ProgressStore>, config: SessionConfig) -> Self {
        Self {
            ctx,
            gateway: FinalizationGateway::new(store.clone()),
            store,
            exclusions: ExclusionPolicy::default(),
            rewards: RewardTierCalculator::default(),
            config,
            inner: RwLock::new(Inner::default()),
            events: EventLog::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionPolicy) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_rewards(mut self, rewards: RewardTierCalculator) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn catalog(&self) -> &QuestionCatalog {
        self.store.catalog()
    }

    fn evaluator(&self) -> CompletionEvaluator<'_> {
        CompletionEvaluator::with_threshold(self.catalog(), self.config.completion_threshold)
    }

    /// Refuse to start a second save/finalize while one is outstanding.
    fn begin(&self) -> Result<InFlight<'_>, SessionError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SessionError::Busy)?;
        Ok(InFlight(&self.in_flight))
    }

    async fn pace(&self) {
        if !self.config.typing_delay.is_zero() {
            tokio::time::sleep(self.config.typing_delay).await;
        }
    }

    fn question_prompt(&self, question: &Question) -> QuestionPrompt {
        let askable = self.exclusions.effective_questions(self.catalog());
        let position = askable
            .iter()
            .position(|q| q.id == question.id)
            .map_or(0, |i| i + 1);
        QuestionPrompt {
            question_id: question.id.clone(),
            phase_id: question.phase_id.clone(),
            text: prompts::question_text(question),
            input: question.input.clone(),
            required: question.required,
            points: question.points,
            position,
            total: askable.len(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load progress, greet, and ask the first question.
    pub async fn start(&self) -> Result<Turn, SessionError> {
        let _guard = self.begin()?;
        {
            let inner = self.inner.read().await;
            if inner.machine.state != SessionState::Initializing {
                return Err(SessionError::InvalidTransition {
                    from: inner.machine.state.to_string(),
                    to: SessionState::Greeting.to_string(),
                });
            }
        }

        let loaded = self.store.load(&self.ctx).await;
        let resume = ResumeResolver::new(self.catalog()).resolve(&loaded.state.answered_question_ids);
        let finalized = self.gateway.is_finalized(&self.ctx).await;
        let percentage = self.evaluator().percentage(&loaded.state.answered_question_ids);

        {
            let mut inner = self.inner.write().await;
            inner.progress = loaded.state;
            if !resume.is_completed() {
                inner.progress.current_phase_id = Some(resume.phase_id.clone());
            }
            inner.finalized = finalized;
            inner.machine.transition_to(SessionState::Greeting, None)?;
        }

        info!(
            user_id = %self.ctx.user_id,
            session_id = %self.ctx.session_id,
            resume_phase = %resume.phase_id,
            has_progress = resume.has_progress,
            "Onboarding session started"
        );

        self.pace().await;
        if resume.has_progress {
            let text = prompts::welcome_back(percentage, self.catalog().phase(&resume.phase_id));
            self.events.prompt(PromptKind::WelcomeBack, text, None).await;
        } else {
            let count = self.exclusions.effective_questions(self.catalog()).len();
            self.events
                .prompt(PromptKind::Greeting, prompts::greeting(count), None)
                .await;
        }

        self.inner
            .write()
            .await
            .machine
            .transition_to(SessionState::Advancing, None)?;
        self.advance(None).await
    }

    /// Submit an answer to the current question.
    pub async fn submit_answer(
        &self,
        question_id: &str,
        answer: AnswerValue,
    ) -> Result<Turn, SessionError> {
        let _guard = self.begin()?;
        let question = self
            .catalog()
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;

        {
            let mut inner = self.inner.write().await;
            if inner.machine.state != SessionState::AwaitingAnswer {
                return Err(SessionError::NotAwaitingAnswer {
                    state: inner.machine.state.to_string(),
                });
            }
            match inner.current.as_deref() {
                Some(current) if current == question_id => {}
                current => {
                    return Err(SessionError::UnexpectedQuestion {
                        expected: current.unwrap_or_default().to_string(),
                        actual: question_id.to_string(),
                    });
                }
            }
            inner.machine.transition_to(SessionState::Validating, None)?;
        }

        self.events.answer(question_id, answer.clone()).await;

        let answer = match validation::validate(question, answer) {
            Ok(valid) => valid,
            Err(error) => return self.reprompt(question, error).await,
        };

        // Optimistic: local state changes before the remote call.
        let before_points;
        let mut progress = {
            let mut inner = self.inner.write().await;
            inner.machine.transition_to(SessionState::Persisting, None)?;
            before_points = inner.progress.total_points();
            inner
                .progress
                .record(self.catalog(), question_id, answer.clone());
            inner.progress.clone()
        };

        let outcome = self
            .store
            .persist_answer(&self.ctx, &mut progress, question, answer)
            .await;
        let after_points = progress.total_points();

        {
            let mut inner = self.inner.write().await;
            inner.progress = progress;
            inner.skipped.remove(question_id);
            inner.current = None;
            inner.machine.transition_to(
                SessionState::Advancing,
                Some(format!("answered {question_id}")),
            )?;
        }

        info!(question_id, outcome = ?outcome, points = after_points, "Answer recorded");
        self.announce_rewards(before_points, after_points).await;
        self.advance(Some(outcome)).await
    }

    async fn reprompt(
        &self,
        question: &Question,
        error: ValidationError,
    ) -> Result<Turn, SessionError> {
        debug!(question_id = %question.id, error = %error, "Answer failed validation");
        self.inner
            .write()
            .await
            .machine
            .transition_to(SessionState::AwaitingAnswer, Some(error.to_string()))?;

        self.pace().await;
        self.events
            .prompt(
                PromptKind::Reprompt,
                prompts::reprompt(question, &error),
                Some(&question.id),
            )
            .await;
        Ok(Turn::Reprompted {
            prompt: self.question_prompt(question),
            error: error.to_string(),
        })
    }

    /// Defer the current question for this session.
    pub async fn skip_current(&self) -> Result<Turn, SessionError> {
        let _guard = self.begin()?;
        let question_id = {
            let mut inner = self.inner.write().await;
            if inner.machine.state != SessionState::AwaitingAnswer {
                return Err(SessionError::NotAwaitingAnswer {
                    state: inner.machine.state.to_string(),
                });
            }
            let Some(question_id) = inner.current.take() else {
                return Err(SessionError::NotAwaitingAnswer {
                    state: inner.machine.state.to_string(),
                });
            };
            inner.skipped.insert(question_id.clone());
            inner
                .machine
                .transition_to(SessionState::Advancing, Some(format!("skipped {question_id}")))?;
            question_id
        };

        debug!(question_id = %question_id, "Question skipped");
        if let Some(question) = self.catalog().question(&question_id) {
            self.events
                .prompt(
                    PromptKind::Skipped,
                    prompts::skipped(question),
                    Some(&question_id),
                )
                .await;
        }
        self.advance(None).await
    }

    /// Remove a previously given answer. The question becomes askable again.
    pub async fn delete_answer(&self, question_id: &str) -> Result<Turn, SessionError> {
        let _guard = self.begin()?;
        let question = self
            .catalog()
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;

        let mut progress = {
            let mut inner = self.inner.write().await;
            if !inner.machine.state.is_idle() {
                return Err(SessionError::NotAwaitingAnswer {
                    state: inner.machine.state.to_string(),
                });
            }
            if !inner.progress.has_answered(question_id) {
                return Err(SessionError::NotAnswered(question_id.to_string()));
            }
            inner.machine.transition_to(
                SessionState::Advancing,
                Some(format!("deleted {question_id}")),
            )?;
            inner.progress.remove(self.catalog(), question_id);
            inner.current = None;
            inner.skipped.remove(question_id);
            inner.progress.clone()
        };

        let outcome = self
            .store
            .persist_deletion(&self.ctx, &mut progress, question_id)
            .await;
        self.inner.write().await.progress = progress;

        info!(question_id, outcome = ?outcome, "Answer removed");
        self.events
            .prompt(
                PromptKind::AnswerRemoved,
                prompts::answer_removed(question),
                Some(question_id),
            )
            .await;
        self.advance(Some(outcome)).await
    }

    /// Flush queued writes now instead of waiting for the background task.
    pub async fn retry_pending(&self) -> Result<FlushReport, SessionError> {
        let _guard = self.begin()?;
        let report = self.store.flush_pending(&self.ctx).await;
        if self.gateway.is_finalized(&self.ctx).await {
            self.inner.write().await.finalized = true;
        }
        Ok(report)
    }

    // ── Advancing ───────────────────────────────────────────────────

    /// Pick the next question, or complete. Called in `Advancing`.
    async fn advance(&self, save: Option<SaveOutcome>) -> Result<Turn, SessionError> {
        let selector = QuestionSelector::new(self.catalog(), &self.exclusions);
        let evaluator = self.evaluator();

        let next = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            let answered = &inner.progress.answered_question_ids;
            let mut next = selector.next_question_skipping(answered, &inner.skipped);

            if next.is_none() && !evaluator.is_complete(answered) {
                if !inner.skipped.is_empty() {
                    warn!(
                        skipped = inner.skipped.len(),
                        "Profile incomplete with only skipped questions left, asking them again"
                    );
                    next = selector.next_question(answered);
                    inner.skipped.clear();
                }
                if next.is_none() {
                    // Excluded questions are still part of the profile.
                    next = self
                        .catalog()
                        .all_questions()
                        .find(|q| !answered.contains(&q.id));
                    match next {
                        Some(question) => warn!(
                            question_id = %question.id,
                            "Profile incomplete without excluded questions, asking one"
                        ),
                        None => warn!(
                            missing = ?evaluator.missing_required(answered),
                            "No questions left but profile is incomplete"
                        ),
                    }
                }
            }

            match next {
                Some(question) => {
                    inner.machine.transition_to(SessionState::AwaitingAnswer, None)?;
                    inner.current = Some(question.id.clone());
                    inner.progress.current_phase_id = Some(question.phase_id.clone());
                    Some(question)
                }
                None => None,
            }
        };

        match next {
            Some(question) => {
                self.pace().await;
                self.events
                    .prompt(
                        PromptKind::Question,
                        prompts::question_text(question),
                        Some(&question.id),
                    )
                    .await;
                Ok(Turn::Asked {
                    prompt: self.question_prompt(question),
                    save,
                })
            }
            None => self.complete().await,
        }
    }

    async fn complete(&self) -> Result<Turn, SessionError> {
        let (percentage, total_points, is_complete) = {
            let mut inner = self.inner.write().await;
            inner.machine.transition_to(SessionState::Completed, None)?;
            inner.current = None;
            inner.progress.current_phase_id = None;
            let answered = &inner.progress.answered_question_ids;
            let evaluator = self.evaluator();
            (
                evaluator.percentage(answered),
                inner.progress.total_points(),
                evaluator.is_complete(answered),
            )
        };
        let tier = self.rewards.tier_for(total_points).clone();

        info!(
            user_id = %self.ctx.user_id,
            percentage,
            total_points,
            tier = %tier.reward_name,
            "Onboarding completed"
        );
        self.pace().await;
        self.events
            .prompt(
                PromptKind::Celebration,
                prompts::celebration(percentage, total_points, &tier),
                None,
            )
            .await;

        // Only a complete profile is handed off.
        if !is_complete {
            let finalized = self.inner.read().await.finalized;
            return Ok(Turn::Completed(CompletionSummary {
                percentage,
                total_points,
                tier,
                finalized,
                profile: None,
            }));
        }

        self.inner
            .write()
            .await
            .machine
            .transition_to(SessionState::Finalizing, None)?;

        let (finalized, profile) = match self.gateway.finalize(&self.ctx).await {
            FinalizeOutcome::Finalized { profile } => {
                self.events
                    .prompt(PromptKind::Finalized, prompts::finalized(), None)
                    .await;
                (true, Some(profile))
            }
            FinalizeOutcome::Deferred { .. } => {
                self.events
                    .prompt(
                        PromptKind::FinalizeDeferred,
                        prompts::finalize_deferred(),
                        None,
                    )
                    .await;
                (false, None)
            }
        };

        {
            let mut inner = self.inner.write().await;
            inner.finalized = inner.finalized || finalized;
            if profile.is_some() {
                inner.profile = profile.clone();
            }
        }

        Ok(Turn::Completed(CompletionSummary {
            percentage,
            total_points,
            tier,
            finalized,
            profile,
        }))
    }

    async fn announce_rewards(&self, before: u32, after: u32) {
        if after <= before {
            return;
        }
        for phase in self.catalog().phases() {
            if phase.required_points > before && phase.required_points <= after {
                info!(phase_id = %phase.id, "Phase unlocked");
                self.events
                    .prompt(PromptKind::PhaseUnlocked, prompts::phase_unlocked(phase), None)
                    .await;
            }
        }
        let old_tier = self.rewards.tier_for(before);
        let new_tier = self.rewards.tier_for(after);
        if new_tier.points_threshold > old_tier.points_threshold {
            info!(tier = %new_tier.reward_name, "Reward tier reached");
            self.events
                .prompt(PromptKind::TierReached, prompts::tier_reached(new_tier), None)
                .await;
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.machine.state
    }

    pub async fn progress(&self) -> ProgressState {
        self.inner.read().await.progress.clone()
    }

    pub async fn current_prompt(&self) -> Option<QuestionPrompt> {
        let inner = self.inner.read().await;
        let id = inner.current.as_deref()?;
        self.catalog().question(id).map(|q| self.question_prompt(q))
    }

    pub async fn transitions(&self) -> Vec<StateTransition> {
        self.inner.read().await.machine.transitions.clone()
    }

    pub async fn events(&self) -> Vec<ConversationEvent> {
        self.events.all().await
    }

    pub async fn events_since(&self, after: u64) -> Vec<ConversationEvent> {
        self.events.since(after).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let pending_writes = self.store.pending_count(&self.ctx).await;
        let inner = self.inner.read().await;
        let answered = &inner.progress.answered_question_ids;
        let evaluator = self.evaluator();
        let total_points = inner.progress.total_points();

        SessionSnapshot {
            session_id: self.ctx.session_id.to_string(),
            user_id: self.ctx.user_id.clone(),
            state: inner.machine.state,
            current_question: inner
                .current
                .as_deref()
                .and_then(|id| self.catalog().question(id))
                .map(|q| self.question_prompt(q)),
            answered: evaluator.answered_count(answered),
            total_questions: self.catalog().len(),
            percentage: evaluator.percentage(answered),
            is_complete: evaluator.is_complete(answered),
            missing_required: evaluator
                .missing_required(answered)
                .into_iter()
                .map(str::to_string)
                .collect(),
            total_points,
            tier: self.rewards.tier_for(total_points).clone(),
            next_tier: self.rewards.next_tier(total_points).cloned(),
            unlocked_phases: self
                .catalog()
                .unlocked_phases(total_points)
                .into_iter()
                .map(|p| p.id.clone())
                .collect(),
            skipped: inner.skipped.iter().cloned().collect(),
            pending_writes,
            finalized: inner.finalized,
        }
    }
}
