//! Answer values.

use serde::{Deserialize, Serialize};

/// Opaque reference to an uploaded image or other media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A submitted answer. Each input kind accepts exactly one variant; there is
/// no coercion between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Short/long text, single-select choice id, free-form story.
    Text(String),
    /// Multi-select card ids or multi-image media uris.
    List(Vec<String>),
    /// ISO-8601 calendar date (`YYYY-MM-DD`).
    Date(String),
    /// Single image.
    Media(MediaRef),
}

impl AnswerValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn date(s: impl Into<String>) -> Self {
        Self::Date(s.into())
    }

    pub fn media(uri: impl Into<String>) -> Self {
        Self::Media(MediaRef::new(uri))
    }

    /// Variant name, matching the serde tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Date(_) => "date",
            Self::Media(_) => "media",
        }
    }

    /// True when nothing meaningful was entered.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) | Self::Date(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|i| i.trim().is_empty()),
            Self::Media(m) => m.0.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) | Self::Date(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "{}", items.join(", ")),
            Self::Media(m) => write!(f, "[media {}]", m.0),
        }
    }
}
