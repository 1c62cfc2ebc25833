//! Integration tests for the onboarding WebSocket + REST surface.
//!
//! Each test spins up an Axum server on a random port, connects via
//! tokio-tungstenite or reqwest, and exercises the real contract.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use profile_onboarding::catalog::QuestionCatalog;
use profile_onboarding::config::SessionConfig;
use profile_onboarding::context::SessionContext;
use profile_onboarding::error::ApiError;
use profile_onboarding::onboarding::{OnboardingRouteState, SessionOrchestrator, onboarding_routes};
use profile_onboarding::progress::AnswerValue;
use profile_onboarding::remote::{FinalizeResponse, ProfileApi, RemoteProgress, SaveAck};
use profile_onboarding::store::{LibSqlBackend, ProgressStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Profile service that accepts everything.
struct AcceptAll;

#[async_trait]
impl ProfileApi for AcceptAll {
    async fn get_progress(&self, _: &SessionContext) -> Result<RemoteProgress, ApiError> {
        Ok(RemoteProgress::default())
    }
    async fn save_answer(
        &self,
        _: &SessionContext,
        _: &str,
        _: &AnswerValue,
        _: u32,
    ) -> Result<SaveAck, ApiError> {
        Ok(SaveAck { accepted: true })
    }
    async fn save_batch(
        &self,
        _: &SessionContext,
        _: &BTreeMap<String, AnswerValue>,
        _: bool,
    ) -> Result<SaveAck, ApiError> {
        Ok(SaveAck { accepted: true })
    }
    async fn delete_answer(&self, _: &SessionContext, _: &str) -> Result<SaveAck, ApiError> {
        Ok(SaveAck { accepted: true })
    }
    async fn finalize(&self, _: &SessionContext) -> Result<FinalizeResponse, ApiError> {
        Ok(FinalizeResponse {
            success: true,
            profile: json!({}),
        })
    }
}

/// Start a session and serve it on a random port, return (port, orchestrator).
async fn start_server() -> (u16, Arc<SessionOrchestrator>) {
    let store = Arc::new(ProgressStore::new(
        Arc::new(LibSqlBackend::new_memory().await.unwrap()),
        Arc::new(AcceptAll),
        Arc::new(QuestionCatalog::reference()),
        Duration::from_secs(5),
    ));
    let orchestrator = Arc::new(SessionOrchestrator::new(
        SessionContext::new("user-ws", "token"),
        store,
        SessionConfig::default(),
    ));
    orchestrator.start().await.unwrap();

    let app = onboarding_routes(OnboardingRouteState {
        orchestrator: Arc::clone(&orchestrator),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, orchestrator)
}

fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_receives_event_sync() {
    timeout(TEST_TIMEOUT, async {
        let (port, _orch) = start_server().await;

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .expect("WS connect failed");

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "events_sync");
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["prompt_kind"], "greeting");
        assert_eq!(events[1]["question_id"], "profile_photos");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_answer_action_returns_turn_and_streams_events() {
    timeout(TEST_TIMEOUT, async {
        let (port, _orch) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        let _ = ws.next().await.unwrap().unwrap();

        let action = json!({
            "action": "answer",
            "question_id": "profile_photos",
            "answer": {"type": "list", "value": ["img://1"]}
        });
        ws.send(Message::Text(action.to_string().into()))
            .await
            .unwrap();

        // The turn reply comes first, then the buffered events.
        let mut turn = None;
        let mut asked = Vec::new();
        while turn.is_none() || asked.is_empty() {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            match json["type"].as_str() {
                Some("turn") => turn = Some(json),
                Some("event") if json["event"]["prompt_kind"] == "question" => {
                    asked.push(json["event"]["question_id"].clone())
                }
                _ => {}
            }
        }

        let turn = turn.unwrap();
        assert_eq!(turn["turn"]["turn"], "asked");
        assert_eq!(turn["turn"]["prompt"]["question_id"], "headline");
        assert_eq!(asked, vec![json!("headline")]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_receives_events_from_other_presenters() {
    timeout(TEST_TIMEOUT, async {
        let (port, orch) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        let _ = ws.next().await.unwrap().unwrap();

        orch.skip_current().await.unwrap();

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["prompt_kind"], "skipped");
        assert_eq!(json["event"]["question_id"], "profile_photos");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_bad_message_gets_error_reply() {
    timeout(TEST_TIMEOUT, async {
        let (port, _orch) = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws"))
            .await
            .unwrap();
        let _ = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text("{\"action\":\"dance\"}".into()))
            .await
            .unwrap();
        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "error");

        // Answering a question that is not current is refused.
        let action = json!({
            "action": "answer",
            "question_id": "bio",
            "answer": {"type": "text", "value": "hi"}
        });
        ws.send(Message::Text(action.to_string().into()))
            .await
            .unwrap();
        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "error");
        assert!(json["error"].as_str().unwrap().contains("profile_photos"));
    })
    .await
    .expect("test timed out");
}

// ── REST Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn rest_status_reflects_answers() {
    timeout(TEST_TIMEOUT, async {
        let (port, _orch) = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/onboarding/answer"))
            .json(&json!({
                "question_id": "profile_photos",
                "answer": {"type": "list", "value": ["img://1", "img://2"]}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = reqwest::get(format!("http://127.0.0.1:{port}/api/onboarding/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["answered"], 1);
        assert_eq!(body["total_questions"], 18);
        assert_eq!(body["percentage"], 6);
        assert_eq!(body["current_question"]["question_id"], "headline");
        assert_eq!(body["tier"]["reward_name"], "Newcomer");
        assert_eq!(body["next_tier"]["reward_name"], "Rising Star");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_delete_unknown_question_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let (port, _orch) = start_server().await;

        let resp = reqwest::Client::new()
            .delete(format!(
                "http://127.0.0.1:{port}/api/onboarding/answers/zodiac_sign"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("zodiac_sign"));
    })
    .await
    .expect("test timed out");
}
