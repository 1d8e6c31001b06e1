//! Raw catalog entries and their normalization into [`Record`]s.
//!
//! The catalog is not trusted to return a uniform shape: categories may arrive as a
//! list, a single string, a scalar, or be missing. Normalization coerces what it can
//! and reports a [`RecordAnomaly`] for entries that cannot become a `Record`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use arxivsummary_shared::{Record, RecordId};

/// One link attached to a feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    pub rel: Option<String>,
    pub title: Option<String>,
    pub mime: Option<String>,
}

/// A catalog entry exactly as the source produced it.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub summary: Option<String>,
    /// Expected to be a list of strings; anything else is coerced.
    pub categories: Value,
    pub primary_category: Option<String>,
    pub links: Vec<RawLink>,
    pub doi: Option<String>,
    pub comment: Option<String>,
}

/// A single malformed entry in an otherwise valid stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record {}: {reason}", id.as_deref().unwrap_or("<missing id>"))]
pub struct RecordAnomaly {
    pub id: Option<String>,
    pub reason: String,
}

impl RecordAnomaly {
    fn new(raw: &RawRecord, reason: impl Into<String>) -> Self {
        Self {
            id: raw.id.clone(),
            reason: reason.into(),
        }
    }
}

/// Convert a raw entry into a [`Record`], or explain why it cannot be.
pub fn normalize(raw: &RawRecord) -> Result<Record, RecordAnomaly> {
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RecordAnomaly::new(raw, "missing id"))?;

    let title = raw
        .title
        .as_deref()
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RecordAnomaly::new(raw, "missing title"))?;

    let published_at = raw
        .published
        .as_deref()
        .ok_or_else(|| RecordAnomaly::new(raw, "missing publication date"))
        .and_then(|s| {
            parse_timestamp(s)
                .ok_or_else(|| RecordAnomaly::new(raw, format!("unparseable publication date {s:?}")))
        })?;

    let updated_at = raw
        .updated
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(published_at);

    let primary_category = raw
        .primary_category
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let primary_link = raw
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| id.to_string());

    let document_link = raw
        .links
        .iter()
        .find(|l| {
            l.title.as_deref() == Some("pdf") || l.mime.as_deref() == Some("application/pdf")
        })
        .map(|l| l.href.clone())
        .unwrap_or_else(|| primary_link.replacen("/abs/", "/pdf/", 1));

    Ok(Record {
        id: RecordId::from(id),
        title,
        authors: raw
            .authors
            .iter()
            .map(|a| collapse_whitespace(a))
            .filter(|a| !a.is_empty())
            .collect(),
        published_at,
        updated_at,
        summary_text: raw.summary.as_deref().map(collapse_whitespace).unwrap_or_default(),
        categories: coerce_categories(&raw.categories, primary_category.as_deref()),
        primary_category,
        primary_link,
        document_link,
        doi: non_empty(raw.doi.as_deref()),
        comment: non_empty(raw.comment.as_deref()),
    })
}

/// Best-effort conversion of a category field into a set of category names.
///
/// The primary category, when known, is always a member.
pub fn coerce_categories(value: &Value, primary: Option<&str>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();

    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => insert_split(&mut out, s),
                    Value::Number(n) => {
                        out.insert(n.to_string());
                    }
                    Value::Object(map) => {
                        if let Some(Value::String(term)) = map.get("term") {
                            insert_split(&mut out, term);
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::String(s) => insert_split(&mut out, s),
        Value::Number(n) => {
            out.insert(n.to_string());
        }
        Value::Object(map) => {
            if let Some(Value::String(term)) = map.get("term") {
                insert_split(&mut out, term);
            }
        }
        Value::Null | Value::Bool(_) => {}
    }

    if let Some(p) = primary {
        out.insert(p.to_string());
    }
    out
}

fn insert_split(out: &mut BTreeSet<String>, s: &str) {
    for part in s.split(|c: char| c == ',' || c.is_whitespace()) {
        if !part.is_empty() {
            out.insert(part.to_string());
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str) -> RawRecord {
        RawRecord {
            id: Some(format!("http://arxiv.org/abs/{id}")),
            title: Some("  A  Title\n   Spanning Lines ".into()),
            authors: vec!["Ada Lovelace".into(), "  ".into(), "Alan  Turing".into()],
            published: Some("2025-03-01T18:00:00Z".into()),
            updated: Some("2025-03-02T10:00:00Z".into()),
            summary: Some("We study\nthings.".into()),
            categories: json!(["cond-mat.supr-con", "cond-mat.str-el"]),
            primary_category: Some("cond-mat.supr-con".into()),
            links: vec![
                RawLink {
                    href: format!("http://arxiv.org/abs/{id}"),
                    rel: Some("alternate".into()),
                    title: None,
                    mime: Some("text/html".into()),
                },
                RawLink {
                    href: format!("http://arxiv.org/pdf/{id}"),
                    rel: Some("related".into()),
                    title: Some("pdf".into()),
                    mime: Some("application/pdf".into()),
                },
            ],
            doi: Some(" ".into()),
            comment: Some("12 pages".into()),
        }
    }

    #[test]
    fn normalizes_well_formed_entry() {
        let record = normalize(&raw("2503.00001v1")).expect("normalize");
        assert_eq!(record.id.as_str(), "http://arxiv.org/abs/2503.00001v1");
        assert_eq!(record.title, "A Title Spanning Lines");
        assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(record.summary_text, "We study things.");
        assert_eq!(record.document_link, "http://arxiv.org/pdf/2503.00001v1");
        assert_eq!(record.primary_link, "http://arxiv.org/abs/2503.00001v1");
        assert!(record.updated_at > record.published_at);
        assert_eq!(record.categories.len(), 2);
        assert!(record.doi.is_none());
        assert_eq!(record.comment.as_deref(), Some("12 pages"));
    }

    #[test]
    fn missing_id_is_an_anomaly() {
        let mut entry = raw("x");
        entry.id = None;
        let err = normalize(&entry).unwrap_err();
        assert_eq!(err.reason, "missing id");
        assert!(err.to_string().contains("<missing id>"));
    }

    #[test]
    fn bad_date_is_an_anomaly() {
        let mut entry = raw("x");
        entry.published = Some("yesterday".into());
        let err = normalize(&entry).unwrap_err();
        assert!(err.reason.contains("yesterday"));
    }

    #[test]
    fn document_link_falls_back_to_abs_rewrite() {
        let mut entry = raw("2503.00002v1");
        entry.links.retain(|l| l.rel.as_deref() == Some("alternate"));
        let record = normalize(&entry).expect("normalize");
        assert_eq!(record.document_link, "http://arxiv.org/pdf/2503.00002v1");
    }

    #[test]
    fn coerces_malformed_category_fields() {
        let single = coerce_categories(&json!("cond-mat.str-el"), None);
        assert_eq!(single.into_iter().collect::<Vec<_>>(), vec!["cond-mat.str-el"]);

        let joined = coerce_categories(&json!("hep-th, gr-qc"), None);
        assert_eq!(joined.len(), 2);

        let mixed = coerce_categories(&json!(["hep-th", 42, null, {"term": "gr-qc"}]), None);
        assert!(mixed.contains("hep-th"));
        assert!(mixed.contains("42"));
        assert!(mixed.contains("gr-qc"));

        let missing = coerce_categories(&Value::Null, Some("quant-ph"));
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["quant-ph"]);

        let nothing = coerce_categories(&json!(true), None);
        assert!(nothing.is_empty());
    }
}
