//! Onboarding session: the conversational flow that walks a user through
//! the question catalog.
//!
//! The orchestrator asks one question at a time, validates and persists each
//! answer, announces unlocked phases and reward tiers, and hands the profile
//! to the finalization gateway once it is complete. Presenters (terminal,
//! REST, WebSocket) only render the turns and events it produces.

pub mod events;
pub mod finalize;
pub mod orchestrator;
pub mod prompts;
pub mod routes;
pub mod state;
pub mod validation;

pub use events::{ConversationEvent, EventKind, EventLog, PromptKind};
pub use finalize::{FinalizationGateway, FinalizeOutcome};
pub use orchestrator::{CompletionSummary, QuestionPrompt, SessionOrchestrator, SessionSnapshot, Turn};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{SessionMachine, SessionState, StateTransition};
