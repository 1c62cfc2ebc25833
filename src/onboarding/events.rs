//! Conversation event log: append-only record of what the session said and
//! what the user answered, with broadcast fan-out to presenters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

use crate::progress::AnswerValue;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// What a system prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Greeting,
    WelcomeBack,
    Question,
    Reprompt,
    Skipped,
    AnswerRemoved,
    PhaseUnlocked,
    TierReached,
    Celebration,
    Finalized,
    FinalizeDeferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SystemPrompt {
        prompt_kind: PromptKind,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_id: Option<String>,
    },
    UserAnswer {
        question_id: String,
        answer: AnswerValue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    /// Position in the log, starting at 1.
    pub id: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ConversationEvent {
    pub fn prompt_kind(&self) -> Option<PromptKind> {
        match &self.kind {
            EventKind::SystemPrompt { prompt_kind, .. } => Some(*prompt_kind),
            EventKind::UserAnswer { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::SystemPrompt { text, .. } => Some(text),
            EventKind::UserAnswer { .. } => None,
        }
    }
}

/// Ordered, append-only event log.
pub struct EventLog {
    events: RwLock<Vec<ConversationEvent>>,
    tx: broadcast::Sender<ConversationEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            events: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Subscribe to new events as they are appended.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.tx.subscribe()
    }

    pub async fn push(&self, kind: EventKind) -> ConversationEvent {
        let event = {
            let mut events = self.events.write().await;
            let event = ConversationEvent {
                id: events.len() as u64 + 1,
                at: Utc::now(),
                kind,
            };
            events.push(event.clone());
            event
        };
        // Ok if no presenter is listening.
        let _ = self.tx.send(event.clone());
        event
    }

    pub async fn prompt(
        &self,
        prompt_kind: PromptKind,
        text: impl Into<String>,
        question_id: Option<&str>,
    ) -> ConversationEvent {
        self.push(EventKind::SystemPrompt {
            prompt_kind,
            text: text.into(),
            question_id: question_id.map(str::to_string),
        })
        .await
    }

    pub async fn answer(&self, question_id: &str, answer: AnswerValue) -> ConversationEvent {
        self.push(EventKind::UserAnswer {
            question_id: question_id.to_string(),
            answer,
        })
        .await
    }

    pub async fn all(&self) -> Vec<ConversationEvent> {
        self.events.read().await.clone()
    }

    /// Events with an id greater than `after`.
    pub async fn since(&self, after: u64) -> Vec<ConversationEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.id > after)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}
