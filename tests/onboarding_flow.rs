//! End-to-end session tests against a scripted profile service.
//!
//! Each test builds a real libsql store (in memory or on disk) and drives
//! `SessionOrchestrator` through its public API.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use profile_onboarding::catalog::{InputKind, Question, QuestionCatalog};
use profile_onboarding::config::SessionConfig;
use profile_onboarding::context::SessionContext;
use profile_onboarding::error::{ApiError, SessionError};
use profile_onboarding::onboarding::{PromptKind, SessionOrchestrator, SessionState, Turn};
use profile_onboarding::progress::AnswerValue;
use profile_onboarding::remote::{FinalizeResponse, ProfileApi, RemoteProgress, SaveAck};
use profile_onboarding::store::{Database, LibSqlBackend, ProgressStore, SaveOutcome};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Profile service double with switchable failures.
#[derive(Default)]
struct ScriptedApi {
    offline: AtomicBool,
    fail_finalize: AtomicBool,
    save_delay_ms: AtomicU64,
    finalize_calls: AtomicU32,
    remote: Mutex<RemoteProgress>,
    batches: Mutex<Vec<(BTreeMap<String, AnswerValue>, bool)>>,
}

impl ScriptedApi {
    fn check(&self, operation: &str) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Transport {
                operation: operation.into(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn remote(&self) -> RemoteProgress {
        self.remote.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileApi for ScriptedApi {
    async fn get_progress(&self, _: &SessionContext) -> Result<RemoteProgress, ApiError> {
        self.check("get_progress")?;
        Ok(self.remote())
    }

    async fn save_answer(
        &self,
        _: &SessionContext,
        question_id: &str,
        answer: &AnswerValue,
        _points: u32,
    ) -> Result<SaveAck, ApiError> {
        let delay = self.save_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check("save_answer")?;
        let mut remote = self.remote.lock().unwrap();
        remote.answers.insert(question_id.into(), answer.clone());
        remote.answered_question_ids.insert(question_id.into());
        remote.total_points = None;
        Ok(SaveAck { accepted: true })
    }

    async fn save_batch(
        &self,
        _: &SessionContext,
        answers: &BTreeMap<String, AnswerValue>,
        auto_saved: bool,
    ) -> Result<SaveAck, ApiError> {
        self.check("save_batch")?;
        self.batches
            .lock()
            .unwrap()
            .push((answers.clone(), auto_saved));
        let mut remote = self.remote.lock().unwrap();
        for (id, answer) in answers {
            remote.answers.insert(id.clone(), answer.clone());
            remote.answered_question_ids.insert(id.clone());
        }
        Ok(SaveAck { accepted: true })
    }

    async fn delete_answer(
        &self,
        _: &SessionContext,
        question_id: &str,
    ) -> Result<SaveAck, ApiError> {
        self.check("delete_answer")?;
        let mut remote = self.remote.lock().unwrap();
        remote.answers.remove(question_id);
        remote.answered_question_ids.remove(question_id);
        Ok(SaveAck { accepted: true })
    }

    async fn finalize(&self, _: &SessionContext) -> Result<FinalizeResponse, ApiError> {
        self.check("finalize")?;
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                operation: "finalize".into(),
                status: 502,
                body: "matching service unavailable".into(),
            });
        }
        Ok(FinalizeResponse {
            success: true,
            profile: serde_json::json!({"onboarding_complete": true}),
        })
    }
}

struct Harness {
    db: Arc<dyn Database>,
    api: Arc<ScriptedApi>,
    ctx: SessionContext,
}

impl Harness {
    async fn new() -> Self {
        Self {
            db: Arc::new(LibSqlBackend::new_memory().await.unwrap()),
            api: Arc::new(ScriptedApi::default()),
            ctx: SessionContext::new("user-1", "token-1"),
        }
    }

    fn store(&self) -> Arc<ProgressStore> {
        Arc::new(ProgressStore::new(
            Arc::clone(&self.db),
            self.api.clone(),
            Arc::new(QuestionCatalog::reference()),
            Duration::from_secs(5),
        ))
    }

    /// A fresh orchestrator for the same user, as after an app restart.
    fn session(&self) -> Arc<SessionOrchestrator> {
        Arc::new(SessionOrchestrator::new(
            self.ctx.clone(),
            self.store(),
            SessionConfig::default(),
        ))
    }
}

fn answer_for(question: &Question) -> AnswerValue {
    match &question.input {
        InputKind::ShortText | InputKind::LongText | InputKind::FreeFormStory => {
            AnswerValue::text(format!("about {}", question.id))
        }
        InputKind::SingleSelect { options } => AnswerValue::text(options[0].id.clone()),
        InputKind::MultiSelectCards { cards } => {
            AnswerValue::list([cards[0].id.clone(), cards[1].id.clone()])
        }
        InputKind::Image => AnswerValue::media("img://cover.jpg"),
        InputKind::MultiImage { .. } => AnswerValue::list(["img://one.jpg", "img://two.jpg"]),
        InputKind::Date { .. } => AnswerValue::date("2031-07-04"),
    }
}

fn asked_id(turn: &Turn) -> String {
    match turn {
        Turn::Asked { prompt, .. } => prompt.question_id.clone(),
        other => panic!("expected a question, got {other:?}"),
    }
}

async fn answer(orch: &SessionOrchestrator, turn: &Turn) -> Turn {
    let id = asked_id(turn);
    let catalog = QuestionCatalog::reference();
    let question = catalog.question(&id).unwrap();
    orch.submit_answer(&id, answer_for(question)).await.unwrap()
}

/// Answer until the session completes.
async fn answer_all(orch: &SessionOrchestrator, mut turn: Turn) -> Turn {
    while matches!(turn, Turn::Asked { .. }) {
        turn = answer(orch, &turn).await;
    }
    turn
}

// ── Resume ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_session_resumes_at_first_unanswered_question() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;

        let first = h.session();
        let mut turn = first.start().await.unwrap();
        for _ in 0..3 {
            turn = answer(&first, &turn).await;
        }
        assert_eq!(asked_id(&turn), "relationship_goals");
        drop(first);

        let second = h.session();
        let turn = second.start().await.unwrap();
        assert_eq!(asked_id(&turn), "relationship_goals");

        let events = second.events().await;
        assert_eq!(events[0].prompt_kind(), Some(PromptKind::WelcomeBack));
        assert!(events[0].text().unwrap().contains("17%"));
        assert_eq!(second.snapshot().await.answered, 3);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn resume_falls_back_to_local_cache_when_remote_is_down() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;

        let first = h.session();
        let turn = first.start().await.unwrap();
        answer(&first, &turn).await;

        h.api.offline.store(true, Ordering::SeqCst);
        let second = h.session();
        let turn = second.start().await.unwrap();
        assert_eq!(asked_id(&turn), "headline");
        assert_eq!(second.snapshot().await.total_points, 20);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn resume_survives_restart_with_on_disk_database() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onboarding.db");
        let api = Arc::new(ScriptedApi::default());
        api.offline.store(true, Ordering::SeqCst);
        let ctx = SessionContext::new("user-disk", "token");

        let open = |api: Arc<ScriptedApi>, path: std::path::PathBuf, ctx: SessionContext| async move {
            let db = Arc::new(LibSqlBackend::new_local(&path).await.unwrap());
            let store = Arc::new(ProgressStore::new(
                db,
                api,
                Arc::new(QuestionCatalog::reference()),
                Duration::from_secs(5),
            ));
            SessionOrchestrator::new(ctx, store, SessionConfig::default())
        };

        let first = open(api.clone(), path.clone(), ctx.clone()).await;
        let turn = first.start().await.unwrap();
        let turn = answer(&first, &turn).await;
        answer(&first, &turn).await;
        drop(first);

        let second = open(api.clone(), path.clone(), ctx.clone()).await;
        let turn = second.start().await.unwrap();
        assert_eq!(asked_id(&turn), "bio");
        assert_eq!(second.snapshot().await.pending_writes, 2);
    })
    .await
    .expect("test timed out");
}

// ── Persistence failures ────────────────────────────────────────────────

#[tokio::test]
async fn offline_answers_are_queued_and_flushed_as_one_batch() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        h.api.offline.store(true, Ordering::SeqCst);

        let first = h.session();
        let turn = first.start().await.unwrap();
        let turn = answer(&first, &turn).await;
        match &turn {
            Turn::Asked { save, .. } => assert_eq!(*save, Some(SaveOutcome::Queued)),
            other => panic!("expected a question, got {other:?}"),
        }
        let turn = answer(&first, &turn).await;
        assert_eq!(asked_id(&turn), "bio");
        drop(first);

        // Still offline: the next session picks up the unconfirmed answers.
        let second = h.session();
        let turn = second.start().await.unwrap();
        assert_eq!(asked_id(&turn), "bio");

        h.api.offline.store(false, Ordering::SeqCst);
        let report = second.retry_pending().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.remaining, 0);

        let batches = h.api.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].1, "outbox flushes are auto-saved");
        assert_eq!(
            batches[0].0.keys().cloned().collect::<Vec<_>>(),
            vec!["headline".to_string(), "profile_photos".to_string()]
        );
        assert!(h.api.remote().answered_question_ids.contains("headline"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn finalize_failure_still_completes_and_retries_later() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        h.api.fail_finalize.store(true, Ordering::SeqCst);

        let orch = h.session();
        let turn = orch.start().await.unwrap();
        let turn = answer_all(&orch, turn).await;

        match turn {
            Turn::Completed(summary) => {
                assert_eq!(summary.percentage, 100);
                assert!(!summary.finalized);
                assert!(summary.profile.is_none());
            }
            other => panic!("expected completion, got {other:?}"),
        }
        let snapshot = orch.snapshot().await;
        assert!(snapshot.is_complete);
        assert!(!snapshot.finalized);
        assert_eq!(snapshot.pending_writes, 1);
        assert_eq!(snapshot.state, SessionState::Finalizing);
        assert!(snapshot.current_question.is_none());
        assert!(
            orch.events()
                .await
                .iter()
                .any(|e| e.prompt_kind() == Some(PromptKind::FinalizeDeferred))
        );

        h.api.fail_finalize.store(false, Ordering::SeqCst);
        let report = orch.retry_pending().await.unwrap();
        assert_eq!(report.remaining, 0);
        assert!(orch.snapshot().await.finalized);
        assert_eq!(h.api.finalize_calls.load(Ordering::SeqCst), 2);

        // A later session does not re-ask anything.
        let again = h.session();
        match again.start().await.unwrap() {
            Turn::Completed(summary) => assert!(summary.finalized),
            other => panic!("expected completion, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn overlapping_calls_are_rejected_while_a_save_is_in_flight() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        let orch = h.session();
        orch.start().await.unwrap();
        h.api.save_delay_ms.store(300, Ordering::SeqCst);

        let slow = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.submit_answer("profile_photos", AnswerValue::list(["img://a"]))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(orch.skip_current().await.unwrap_err(), SessionError::Busy);
        assert_eq!(
            orch.submit_answer("profile_photos", AnswerValue::list(["img://b"]))
                .await
                .unwrap_err(),
            SessionError::Busy
        );

        let turn = slow.await.unwrap().unwrap();
        assert_eq!(asked_id(&turn), "headline");
        assert_eq!(
            h.api.remote().answers.get("profile_photos"),
            Some(&AnswerValue::list(["img://a"]))
        );
    })
    .await
    .expect("test timed out");
}

// ── Completion rule ─────────────────────────────────────────────────────

#[tokio::test]
async fn skipping_one_trailing_optional_still_completes() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        let orch = h.session();
        let mut turn = orch.start().await.unwrap();
        while asked_id(&turn) != "cover_photo" {
            turn = answer(&orch, &turn).await;
        }

        // 17 of 18 answered is 94%, above the 90% bar.
        match orch.skip_current().await.unwrap() {
            Turn::Completed(summary) => {
                assert_eq!(summary.percentage, 94);
                assert!(summary.finalized);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn skipping_below_the_bar_brings_skipped_questions_back() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        let orch = h.session();
        let mut turn = orch.start().await.unwrap();
        while asked_id(&turn) != "life_story" {
            turn = answer(&orch, &turn).await;
        }

        let turn = orch.skip_current().await.unwrap();
        assert_eq!(asked_id(&turn), "cover_photo");

        // 16 of 18 is 89%: not complete, so the skipped question returns.
        let turn = orch.skip_current().await.unwrap();
        assert_eq!(asked_id(&turn), "life_story");
        let snapshot = orch.snapshot().await;
        assert_eq!(snapshot.percentage, 89);
        assert!(!snapshot.is_complete);
        assert!(snapshot.skipped.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn required_questions_alone_are_not_enough() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        let orch = h.session();
        let mut turn = orch.start().await.unwrap();

        let catalog = QuestionCatalog::reference();
        for _ in 0..18 {
            let id = asked_id(&turn);
            turn = if catalog.question(&id).unwrap().required {
                answer(&orch, &turn).await
            } else {
                orch.skip_current().await.unwrap()
            };
        }

        // Every optional question was skipped once; the first one is back.
        assert_eq!(asked_id(&turn), "occupation");
        let snapshot = orch.snapshot().await;
        assert!(snapshot.missing_required.is_empty());
        assert_eq!(snapshot.answered, 7);
        assert!(!snapshot.is_complete);
    })
    .await
    .expect("test timed out");
}

// ── Deletion ────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_after_completion_reopens_the_question() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        let orch = h.session();
        let turn = orch.start().await.unwrap();
        answer_all(&orch, turn).await;
        assert_eq!(orch.state().await, SessionState::Finalizing);

        let turn = orch.delete_answer("bio").await.unwrap();
        assert_eq!(asked_id(&turn), "bio");
        assert!(!h.api.remote().answered_question_ids.contains("bio"));
        assert_eq!(orch.snapshot().await.total_points, 155);

        let turn = answer(&orch, &turn).await;
        assert!(matches!(turn, Turn::Completed(ref s) if s.finalized));
        assert_eq!(h.api.finalize_calls.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn remote_point_total_is_used_until_local_changes() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new().await;
        {
            let mut remote = h.api.remote.lock().unwrap();
            remote
                .answers
                .insert("profile_photos".into(), AnswerValue::list(["img://x"]));
            remote.total_points = Some(120);
        }

        let orch = h.session();
        let turn = orch.start().await.unwrap();
        assert_eq!(asked_id(&turn), "headline");
        let snapshot = orch.snapshot().await;
        assert_eq!(snapshot.total_points, 120);
        assert_eq!(snapshot.tier.reward_name, "Connector");

        answer(&orch, &turn).await;
        assert_eq!(orch.snapshot().await.total_points, 30);
    })
    .await
    .expect("test timed out");
}
