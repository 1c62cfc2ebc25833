//! Error types for the onboarding engine.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Local database errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors talking to the remote profile service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {operation} failed: {reason}")]
    Transport { operation: String, reason: String },

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {operation}: {reason}")]
    Decode { operation: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("{operation} was not accepted by the profile service")]
    Rejected { operation: String },
}

/// Question catalog invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no phases")]
    Empty,

    #[error("Phase {0} has no questions")]
    EmptyPhase(String),

    #[error("Duplicate phase id: {0}")]
    DuplicatePhaseId(String),

    #[error("Duplicate question id: {0}")]
    DuplicateQuestionId(String),

    #[error("Phase {phase} requires {required} points, less than the previous phase ({previous})")]
    DecreasingRequiredPoints {
        phase: String,
        required: u32,
        previous: u32,
    },

    #[error("Question {question} depends on {dependency}, which is not declared before it")]
    UnknownDependency { question: String, dependency: String },

    #[error("Reward tiers must not be empty")]
    NoTiers,

    #[error("Reward tier thresholds must be strictly increasing ({tier} at {threshold})")]
    NonIncreasingTier { tier: String, threshold: u32 },
}

/// Answer validation failures. Always recoverable by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("An answer is required")]
    EmptyRequired,

    #[error("Pick at least one option")]
    NoSelection,

    #[error("Expected a {expected} answer, got {actual}")]
    WrongAnswerType { expected: String, actual: String },

    #[error("{0} is not one of the offered choices")]
    UnknownChoice(String),

    #[error("At most {max} images allowed, got {actual}")]
    TooManyImages { max: usize, actual: usize },

    #[error("{0} is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("{date} is outside the allowed range")]
    DateOutOfRange { date: String },
}

/// Session orchestration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A save or finalize call is already in flight for this session")]
    Busy,

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session is not awaiting an answer (state: {state})")]
    NotAwaitingAnswer { state: String },

    #[error("Answer is for {actual}, but the current question is {expected}")]
    UnexpectedQuestion { expected: String, actual: String },

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Question {0} has no answer to remove")]
    NotAnswered(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
