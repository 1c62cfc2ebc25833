//! REST + WebSocket endpoints for driving an onboarding session.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::ConversationEvent;
use super::orchestrator::{SessionOrchestrator, Turn};
use crate::error::SessionError;
use crate::progress::AnswerValue;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub orchestrator: Arc<SessionOrchestrator>,
}

/// Messages pushed to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full event log (sent on connect and after lagging).
    EventsSync { events: Vec<ConversationEvent> },
    /// One new conversation event.
    Event { event: ConversationEvent },
    /// Result of a client action.
    Turn { turn: Turn },
    /// A client action was refused.
    Error { error: String },
}

/// Actions a WebSocket client can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Answer {
        question_id: String,
        answer: AnswerValue,
    },
    Skip,
    Delete {
        question_id: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: String,
    pub answer: AnswerValue,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only return events with an id greater than this.
    pub after: Option<u64>,
}

/// Build the onboarding router.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/events", get(get_events))
        .route("/api/onboarding/start", post(start_session))
        .route("/api/onboarding/answer", post(submit_answer))
        .route("/api/onboarding/skip", post(skip_question))
        .route("/api/onboarding/answers/{question_id}", delete(delete_answer))
        .route("/api/onboarding/retry", post(retry_pending))
        .with_state(state)
}

fn error_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::Busy
        | SessionError::InvalidTransition { .. }
        | SessionError::NotAwaitingAnswer { .. }
        | SessionError::UnexpectedQuestion { .. } => StatusCode::CONFLICT,
        SessionError::UnknownQuestion(_) | SessionError::NotAnswered(_) => StatusCode::NOT_FOUND,
    }
}

fn turn_response(result: Result<Turn, SessionError>) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(turn) => (StatusCode::OK, Json(serde_json::json!(turn))),
        Err(e) => (
            error_status(&e),
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "profile-onboarding"
    }))
}

// ── REST Endpoints ──────────────────────────────────────────────────────

async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.orchestrator.snapshot().await)
}

async fn get_events(
    State(state): State<OnboardingRouteState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let events = match query.after {
        Some(after) => state.orchestrator.events_since(after).await,
        None => state.orchestrator.events().await,
    };
    Json(events)
}

async fn start_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    turn_response(state.orchestrator.start().await)
}

/// POST /api/onboarding/answer
///
/// A validation failure is not an HTTP error: the response is a
/// `reprompted` turn for the same question.
async fn submit_answer(
    State(state): State<OnboardingRouteState>,
    Json(body): Json<AnswerRequest>,
) -> impl IntoResponse {
    turn_response(
        state
            .orchestrator
            .submit_answer(&body.question_id, body.answer)
            .await,
    )
}

async fn skip_question(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    turn_response(state.orchestrator.skip_current().await)
}

async fn delete_answer(
    State(state): State<OnboardingRouteState>,
    Path(question_id): Path<String>,
) -> impl IntoResponse {
    turn_response(state.orchestrator.delete_answer(&question_id).await)
}

async fn retry_pending(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    match state.orchestrator.retry_pending().await {
        Ok(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        Err(e) => (
            error_status(&e),
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<OnboardingRouteState>,
) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.orchestrator))
}

async fn send_json(socket: &mut WebSocket, msg: &WsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize WS message");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, orchestrator: Arc<SessionOrchestrator>) {
    // Subscribe before the sync so nothing falls between the two.
    let mut rx = orchestrator.subscribe();

    let events = orchestrator.events().await;
    let mut last_sent = events.last().map_or(0, |e| e.id);
    if !send_json(&mut socket, &WsMessage::EventsSync { events }).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if event.id <= last_sent {
                            continue;
                        }
                        last_sent = event.id;
                        if !send_json(&mut socket, &WsMessage::Event { event }).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind event broadcast");
                        let events = orchestrator.events().await;
                        last_sent = events.last().map_or(last_sent, |e| e.id);
                        if !send_json(&mut socket, &WsMessage::EventsSync { events }).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&text, &orchestrator).await;
                        if !send_json(&mut socket, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn handle_client_message(text: &str, orchestrator: &SessionOrchestrator) -> WsMessage {
    let action = match serde_json::from_str::<ClientAction>(text) {
        Ok(action) => action,
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
            return WsMessage::Error {
                error: format!("Unrecognized message: {e}"),
            };
        }
    };

    let result = match action {
        ClientAction::Answer {
            question_id,
            answer,
        } => orchestrator.submit_answer(&question_id, answer).await,
        ClientAction::Skip => orchestrator.skip_current().await,
        ClientAction::Delete { question_id } => orchestrator.delete_answer(&question_id).await,
    };

    match result {
        Ok(turn) => WsMessage::Turn { turn },
        Err(e) => {
            warn!(error = %e, "WS action refused");
            WsMessage::Error {
                error: e.to_string(),
            }
        }
    }
}
