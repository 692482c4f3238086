//! Saved sentence records and the field sets used to create and edit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One saved translation unit.
///
/// `id` and `created_at` are assigned by the store and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(alias = "korean")]
    pub source_text: String,
    #[serde(alias = "english")]
    pub target_text_a: String,
    #[serde(alias = "japanese")]
    pub target_text_b: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
}

/// Fields for a sentence that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSentence {
    pub source_text: String,
    pub target_text_a: String,
    pub target_text_b: String,
    #[serde(default)]
    pub pronunciation: Option<String>,
}

impl NewSentence {
    pub fn new(
        source_text: impl Into<String>,
        target_text_a: impl Into<String>,
        target_text_b: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            target_text_a: target_text_a.into(),
            target_text_b: target_text_b.into(),
            pronunciation: None,
        }
    }

    pub fn with_pronunciation(mut self, pronunciation: impl Into<String>) -> Self {
        self.pronunciation = Some(pronunciation.into());
        self
    }

    /// Name of the first required field that is blank, if any.
    pub(crate) fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("source text", &self.source_text),
            ("first translation", &self.target_text_a),
            ("second translation", &self.target_text_b),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Partial update for a saved sentence.
///
/// There is no way to express a change of `id` or `created_at`; when a patch is
/// deserialized those keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencePatch {
    #[serde(default, alias = "korean")]
    pub source_text: Option<String>,
    #[serde(default, alias = "english")]
    pub target_text_a: Option<String>,
    #[serde(default, alias = "japanese")]
    pub target_text_b: Option<String>,
    /// `Some(None)` clears the pronunciation.
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub pronunciation: Option<Option<String>>,
}

impl SentencePatch {
    pub fn is_empty(&self) -> bool {
        self.source_text.is_none()
            && self.target_text_a.is_none()
            && self.target_text_b.is_none()
            && self.pronunciation.is_none()
    }

    /// Name of the first required field the patch would blank out, if any.
    pub(crate) fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("source text", &self.source_text),
            ("first translation", &self.target_text_a),
            ("second translation", &self.target_text_b),
        ]
        .into_iter()
        .find(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
    }

    pub(crate) fn apply_to(&self, record: &mut SentenceRecord) {
        if let Some(source_text) = &self.source_text {
            record.source_text = source_text.clone();
        }
        if let Some(target_text_a) = &self.target_text_a {
            record.target_text_a = target_text_a.clone();
        }
        if let Some(target_text_b) = &self.target_text_b {
            record.target_text_b = target_text_b.clone();
        }
        if let Some(pronunciation) = &self.pronunciation {
            record.pronunciation = pronunciation.clone();
        }
    }
}

/// Distinguishes an absent `pronunciation` key from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}
