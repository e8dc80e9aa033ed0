//! Core domain types flowing through a research run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ResearchError, Result};

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// The research subject. Always non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Trim `raw` and reject it if nothing is left.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ResearchError::invalid_input("research topic must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Topic {
    type Err = ResearchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// ArticleRecord
// ---------------------------------------------------------------------------

/// One article returned by the search provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Headline; empty when the provider omitted it.
    #[serde(default)]
    pub title: String,
    /// Article body (or excerpt); may be empty.
    #[serde(default)]
    pub content: String,
    /// Every other field the provider sent, untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ArticleRecord {
    /// Build a record from one element of the provider's `articles` array.
    ///
    /// Missing, `null` or non-string `title`/`content` become empty strings.
    /// A non-object element yields a record with every field empty.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let metadata = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "title" | "content"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            title: text("title"),
            content: text("content"),
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// SummaryRecord
// ---------------------------------------------------------------------------

/// A generated summary, tied to its source article by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Index of the source article in the retrieval output.
    pub article_index: usize,
    /// Summary text, trimmed.
    pub text: String,
}

// ---------------------------------------------------------------------------
// PersistReceipt
// ---------------------------------------------------------------------------

/// Confirmation that the summaries were written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistReceipt {
    /// Where the artifact lives.
    pub path: PathBuf,
    /// Number of summary blocks written.
    pub blocks: usize,
    /// File size in bytes.
    pub bytes_written: usize,
    /// SHA-256 of the file body (hex).
    pub sha256: String,
}
