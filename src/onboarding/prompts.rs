//! Message texts the session emits.
//!
//! Everything the orchestrator says goes through here so presenters only
//! render strings and never build copy themselves.

use crate::catalog::{InputKind, Phase, Question};
use crate::error::ValidationError;
use crate::progress::RewardTier;

/// First-visit greeting.
pub fn greeting(question_count: usize) -> String {
    format!(
        "Hi! Let's build your profile together. There are {question_count} quick questions, \
         and you can stop at any time and pick up right where you left off."
    )
}

/// Greeting for a returning user.
pub fn welcome_back(percentage: u8, phase: Option<&Phase>) -> String {
    match phase {
        Some(phase) => format!(
            "Welcome back! Your profile is {percentage}% complete. \
             Let's keep going with {}.",
            phase.name
        ),
        None => format!("Welcome back! Your profile is {percentage}% complete."),
    }
}

/// Render a question, including its choices or input hint.
pub fn question_text(question: &Question) -> String {
    let mut text = question.prompt.clone();
    match &question.input {
        InputKind::SingleSelect { options } => {
            text.push_str("\nChoose one:");
            for option in options {
                text.push_str(&format!("\n  - {} ({})", option.label, option.id));
            }
        }
        InputKind::MultiSelectCards { cards } => {
            text.push_str("\nPick as many as you like:");
            for card in cards {
                match &card.detail {
                    Some(detail) => {
                        text.push_str(&format!("\n  - {} ({}): {detail}", card.label, card.id))
                    }
                    None => text.push_str(&format!("\n  - {} ({})", card.label, card.id)),
                }
            }
        }
        InputKind::MultiImage { max_images } => {
            text.push_str(&format!("\n(Up to {max_images} images.)"));
        }
        InputKind::Date { .. } => text.push_str("\n(Use YYYY-MM-DD.)"),
        InputKind::ShortText
        | InputKind::LongText
        | InputKind::Image
        | InputKind::FreeFormStory => {}
    }
    if !question.required {
        text.push_str("\n(Optional.)");
    }
    text
}

/// Re-prompt after a validation failure.
pub fn reprompt(question: &Question, error: &ValidationError) -> String {
    let hint = match error {
        ValidationError::EmptyRequired => "This one's needed for your profile.".to_string(),
        ValidationError::NoSelection => "Pick at least one to continue.".to_string(),
        other => format!("{other}."),
    };
    format!("{hint}\n{}", question_text(question))
}

pub fn skipped(question: &Question) -> String {
    format!("No problem, we'll come back to \"{}\" later.", question.prompt)
}

pub fn answer_removed(question: &Question) -> String {
    format!("Removed your answer to \"{}\".", question.prompt)
}

pub fn phase_unlocked(phase: &Phase) -> String {
    format!("You've unlocked {}!", phase.name)
}

pub fn tier_reached(tier: &RewardTier) -> String {
    if tier.benefits.is_empty() {
        format!("You're now a {}!", tier.reward_name)
    } else {
        format!(
            "You're now a {}! Unlocked: {}.",
            tier.reward_name,
            tier.benefits.join(", ")
        )
    }
}

/// Celebration once the profile is complete.
pub fn celebration(percentage: u8, total_points: u32, tier: &RewardTier) -> String {
    format!(
        "Your profile is complete ({percentage}%, {total_points} points). \
         You've reached {}. We're lining up your first matches now.",
        tier.reward_name
    )
}

pub fn finalized() -> &'static str {
    "All set! Your profile is live."
}

pub fn finalize_deferred() -> &'static str {
    "Your profile is complete. We'll finish publishing it as soon as we can reach the server."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::QuestionCatalog;

    #[test]
    fn select_questions_list_choice_ids() {
        let catalog = QuestionCatalog::reference();
        let text = question_text(catalog.question("relationship_goals").unwrap());
        assert!(text.contains("(friendship)"));
        assert!(text.starts_with("What are you hoping to find here?"));
    }

    #[test]
    fn optional_questions_are_marked() {
        let catalog = QuestionCatalog::reference();
        assert!(question_text(catalog.question("occupation").unwrap()).ends_with("(Optional.)"));
        assert!(!question_text(catalog.question("headline").unwrap()).contains("Optional"));
    }

    #[test]
    fn reprompt_includes_reason_and_question() {
        let catalog = QuestionCatalog::reference();
        let question = catalog.question("bio").unwrap();
        let text = reprompt(question, &ValidationError::EmptyRequired);
        assert!(text.starts_with("This one's needed"));
        assert!(text.contains(&question.prompt));
    }

    #[test]
    fn welcome_back_mentions_percentage() {
        let catalog = QuestionCatalog::reference();
        let text = welcome_back(33, catalog.phase("deeper"));
        assert!(text.contains("33%"));
        assert!(text.contains("Going Deeper"));
    }
}
