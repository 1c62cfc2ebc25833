//! Question and phase data models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Broad topic a question belongs to. Used for grouping on profile screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Photos,
    Basics,
    Intentions,
    Interests,
    Personality,
    Lifestyle,
    Story,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Photos => "photos",
            Self::Basics => "basics",
            Self::Intentions => "intentions",
            Self::Interests => "interests",
            Self::Personality => "personality",
            Self::Lifestyle => "lifestyle",
            Self::Story => "story",
        };
        write!(f, "{s}")
    }
}

/// One entry of a single-select option list or a multi-select card deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Stable value stored in the answer.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Secondary text shown on cards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Choice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Inclusive bounds for a date answer. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min.is_none_or(|min| date >= min) && self.max.is_none_or(|max| date <= max)
    }
}

/// How a question is answered. Choice sets and limits live on the variant
/// that uses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputKind {
    ShortText,
    LongText,
    SingleSelect { options: Vec<Choice> },
    MultiSelectCards { cards: Vec<Choice> },
    Image,
    MultiImage { max_images: usize },
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<DateRange>,
    },
    FreeFormStory,
}

impl InputKind {
    /// Snake-case name, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShortText => "short_text",
            Self::LongText => "long_text",
            Self::SingleSelect { .. } => "single_select",
            Self::MultiSelectCards { .. } => "multi_select_cards",
            Self::Image => "image",
            Self::MultiImage { .. } => "multi_image",
            Self::Date { .. } => "date",
            Self::FreeFormStory => "free_form_story",
        }
    }

    /// The enumerated choices for select kinds, empty otherwise.
    pub fn choices(&self) -> &[Choice] {
        match self {
            Self::SingleSelect { options } => options,
            Self::MultiSelectCards { cards } => cards,
            _ => &[],
        }
    }
}

/// A single onboarding question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Globally unique, stable across catalog versions.
    pub id: String,
    pub prompt: String,
    pub input: InputKind,
    /// Filled in by [`Phase::new`].
    pub phase_id: String,
    pub category: Category,
    pub points: u32,
    pub required: bool,
    /// Question ids that should be answered first. Advisory: the selector
    /// follows catalog order, and the catalog only allows earlier ids here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        input: InputKind,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            input,
            phase_id: String::new(),
            category,
            points: 0,
            required: false,
            dependencies: Vec::new(),
        }
    }

    pub fn points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }
}

/// An ordered group of questions unlocked at a point threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub required_points: u32,
    pub questions: Vec<Question>,
}

impl Phase {
    /// Build a phase, stamping its id onto every question.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        required_points: u32,
        questions: Vec<Question>,
    ) -> Self {
        let id = id.into();
        let questions = questions
            .into_iter()
            .map(|mut q| {
                q.phase_id = id.clone();
                q
            })
            .collect();
        Self {
            id,
            name: name.into(),
            required_points,
            questions,
        }
    }

    pub fn is_unlocked(&self, points: u32) -> bool {
        points >= self.required_points
    }

    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}
