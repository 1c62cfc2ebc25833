//! Per-input-kind answer validation.
//!
//! Required questions need a non-blank answer. Structural checks (choice
//! membership, image limits, dates) apply whenever a value is given, even for
//! optional questions. A blank answer to an optional question is accepted.

use chrono::NaiveDate;

use crate::catalog::{InputKind, Question};
use crate::error::ValidationError;
use crate::progress::AnswerValue;

/// Date format for `AnswerValue::Date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The answer variant a given input kind takes.
pub fn expected_type(input: &InputKind) -> &'static str {
    match input {
        InputKind::ShortText
        | InputKind::LongText
        | InputKind::FreeFormStory
        | InputKind::SingleSelect { .. } => "text",
        InputKind::MultiSelectCards { .. } | InputKind::MultiImage { .. } => "list",
        InputKind::Image => "media",
        InputKind::Date { .. } => "date",
    }
}

fn is_selection(input: &InputKind) -> bool {
    matches!(
        input,
        InputKind::SingleSelect { .. }
            | InputKind::MultiSelectCards { .. }
            | InputKind::MultiImage { .. }
    )
}

/// Trim text and drop blank or repeated list entries.
fn normalize(answer: AnswerValue) -> AnswerValue {
    match answer {
        AnswerValue::Text(s) => AnswerValue::Text(s.trim().to_string()),
        AnswerValue::Date(s) => AnswerValue::Date(s.trim().to_string()),
        AnswerValue::List(items) => {
            let mut out: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let item = item.trim().to_string();
                if !item.is_empty() && !out.contains(&item) {
                    out.push(item);
                }
            }
            AnswerValue::List(out)
        }
        AnswerValue::Media(m) => AnswerValue::media(m.0.trim()),
    }
}

/// Validate an answer for a question, returning the normalized value.
pub fn validate(question: &Question, answer: AnswerValue) -> Result<AnswerValue, ValidationError> {
    let expected = expected_type(&question.input);
    if answer.type_name() != expected {
        return Err(ValidationError::WrongAnswerType {
            expected: expected.to_string(),
            actual: answer.type_name().to_string(),
        });
    }

    let answer = normalize(answer);
    if answer.is_blank() {
        return if !question.required {
            Ok(answer)
        } else if is_selection(&question.input) {
            Err(ValidationError::NoSelection)
        } else {
            Err(ValidationError::EmptyRequired)
        };
    }

    match (&question.input, &answer) {
        (InputKind::SingleSelect { options }, AnswerValue::Text(choice)) => {
            if !options.iter().any(|o| &o.id == choice) {
                return Err(ValidationError::UnknownChoice(choice.clone()));
            }
        }
        (InputKind::MultiSelectCards { cards }, AnswerValue::List(picked)) => {
            if let Some(unknown) = picked.iter().find(|p| !cards.iter().any(|c| &c.id == *p)) {
                return Err(ValidationError::UnknownChoice(unknown.clone()));
            }
        }
        (InputKind::MultiImage { max_images }, AnswerValue::List(images)) => {
            if images.len() > *max_images {
                return Err(ValidationError::TooManyImages {
                    max: *max_images,
                    actual: images.len(),
                });
            }
        }
        (InputKind::Date { range }, AnswerValue::Date(raw)) => {
            let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| ValidationError::InvalidDate(raw.clone()))?;
            if let Some(range) = range
                && !range.contains(date)
            {
                return Err(ValidationError::DateOutOfRange { date: raw.clone() });
            }
        }
        _ => {}
    }

    Ok(answer)
}
