//! Core domain types: records, the run cursor, batches and summary units.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Stable catalog identifier of a record (e.g. `http://arxiv.org/abs/2401.01234v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One discovered catalog item, normalized from whatever shape the source returned.
///
/// Identity is the `id` alone: two records with the same id are the same logical
/// item even if other fields differ (e.g. a re-fetch after a metadata update).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    pub authors: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Source abstract.
    pub summary_text: String,
    pub categories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,
    /// Landing page (abstract page) URL.
    pub primary_link: String,
    /// Full-text document (PDF) URL.
    pub document_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Record {
    /// Authors joined for display, `", "`-separated.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Publication date as `YYYY-MM-DD`.
    pub fn published_date(&self) -> String {
        self.published_at.format("%Y-%m-%d").to_string()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Persisted boundary between processed and unprocessed records.
///
/// On disk: `{"lastSeenId": "...", "timestamp": "<RFC 3339>", "totalResults": N}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "lastSeenId")]
    pub last_seen_id: RecordId,
    #[serde(rename = "timestamp")]
    pub saved_at: DateTime<Utc>,
    #[serde(rename = "totalResults")]
    pub count_at_save: usize,
}

impl Cursor {
    /// Cursor pointing at `last_seen_id`, stamped now.
    pub fn new(last_seen_id: RecordId, count_at_save: usize) -> Self {
        Self {
            last_seen_id,
            saved_at: Utc::now(),
            count_at_save,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A bounded, ordered group of records sent together for summarization.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based position of the first record in the overall result set.
    pub start_index: usize,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records paired with their 1-based display number in the overall output.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (self.start_index + i + 1, r))
    }
}

// ---------------------------------------------------------------------------
// SummaryUnit
// ---------------------------------------------------------------------------

/// Result of summarizing one record: generated Markdown or a degraded placeholder.
#[derive(Debug, Clone)]
pub struct SummaryUnit {
    pub record: Record,
    pub summary_markdown: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl SummaryUnit {
    /// A successfully generated section.
    pub fn generated(record: Record, summary_markdown: String) -> Self {
        Self {
            record,
            summary_markdown,
            succeeded: true,
            error: None,
        }
    }

    /// A placeholder for a record whose generation failed.
    pub fn failed(record: Record, placeholder: String, error: impl Into<String>) -> Self {
        Self {
            record,
            summary_markdown: placeholder,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}
