//! Answer state and the calculators derived from it.

pub mod answer;
pub mod completion;
pub mod resume;
pub mod rewards;
pub mod selector;
pub mod state;

pub use answer::{AnswerValue, MediaRef};
pub use completion::{CompletionEvaluator, DEFAULT_COMPLETION_THRESHOLD};
pub use resume::{COMPLETED_PHASE, ResumePoint, ResumeResolver};
pub use rewards::{RewardTier, RewardTierCalculator};
pub use selector::QuestionSelector;
pub use state::ProgressState;
