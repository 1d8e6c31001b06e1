//! Atom feed parsing for arXiv API responses.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

use arxivsummary_shared::{ArxivSummaryError, Result};

use crate::record::{RawLink, RawRecord};

/// Marker in the entry id of an arXiv error feed.
const ERROR_ENTRY_MARKER: &str = "/api/errors";

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// `opensearch:totalResults`, when present.
    pub total_results: Option<usize>,
    pub entries: Vec<RawRecord>,
}

/// Text-bearing elements we collect inside an `<entry>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    Doi,
    Comment,
    TotalResults,
}

/// Parse an arXiv Atom feed into raw entries.
///
/// A top-level parse failure or an arXiv error feed is a source error; individual
/// entries are returned as-is and validated later by normalization.
pub fn parse_feed(xml: &str) -> Result<FeedPage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = FeedPage::default();
    let mut saw_feed = false;

    let mut current: Option<RawRecord> = None;
    let mut categories: Vec<Value> = Vec::new();
    let mut in_author = false;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                match name.as_str() {
                    "feed" => saw_feed = true,
                    "entry" => {
                        current = Some(RawRecord::default());
                        categories.clear();
                    }
                    "author" if current.is_some() => in_author = true,
                    "totalResults" => field = Some(Field::TotalResults),
                    _ if current.is_some() => {
                        field = entry_field(&name, in_author);
                        if field.is_none() {
                            handle_attributes(&e, &name, current.as_mut(), &mut categories);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                handle_attributes(&e, &name, current.as_mut(), &mut categories);
            }
            Ok(Event::Text(e)) => {
                if field.is_some() {
                    let chunk = e
                        .unescape()
                        .map_err(|e| ArxivSummaryError::source(format!("bad feed text: {e}")))?;
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "entry" => {
                        if let Some(mut entry) = current.take() {
                            entry.categories = Value::Array(std::mem::take(&mut categories));
                            if is_error_entry(&entry) {
                                return Err(ArxivSummaryError::source(format!(
                                    "catalog rejected query: {}",
                                    entry.summary.as_deref().unwrap_or("unknown error")
                                )));
                            }
                            page.entries.push(entry);
                        }
                    }
                    "author" => in_author = false,
                    _ => {
                        if let Some(f) = field.take() {
                            store_field(f, std::mem::take(&mut text), current.as_mut(), &mut page);
                        }
                    }
                }
            }
            Ok(Event::Eof) => {
                if current.is_some() {
                    return Err(ArxivSummaryError::source("feed ended inside an entry"));
                }
                break;
            }
            Err(e) => {
                return Err(ArxivSummaryError::source(format!(
                    "malformed feed at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !saw_feed {
        return Err(ArxivSummaryError::source("response is not an Atom feed"));
    }

    Ok(page)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn entry_field(name: &str, in_author: bool) -> Option<Field> {
    match name {
        "id" => Some(Field::Id),
        "title" => Some(Field::Title),
        "summary" => Some(Field::Summary),
        "published" => Some(Field::Published),
        "updated" => Some(Field::Updated),
        "name" if in_author => Some(Field::AuthorName),
        "doi" => Some(Field::Doi),
        "comment" => Some(Field::Comment),
        _ => None,
    }
}

fn store_field(field: Field, value: String, entry: Option<&mut RawRecord>, page: &mut FeedPage) {
    if field == Field::TotalResults {
        page.total_results = value.trim().parse().ok();
        return;
    }
    let Some(entry) = entry else {
        return;
    };
    match field {
        Field::Id => entry.id = Some(value),
        Field::Title => entry.title = Some(value),
        Field::Summary => entry.summary = Some(value),
        Field::Published => entry.published = Some(value),
        Field::Updated => entry.updated = Some(value),
        Field::AuthorName => entry.authors.push(value),
        Field::Doi => entry.doi = Some(value),
        Field::Comment => entry.comment = Some(value),
        Field::TotalResults => {}
    }
}

/// Attribute-only elements: `<link>`, `<category>`, `<arxiv:primary_category>`.
fn handle_attributes(
    e: &BytesStart<'_>,
    name: &str,
    entry: Option<&mut RawRecord>,
    categories: &mut Vec<Value>,
) {
    let Some(entry) = entry else {
        return;
    };
    match name {
        "link" => {
            if let Some(href) = attr(e, "href") {
                entry.links.push(RawLink {
                    href,
                    rel: attr(e, "rel"),
                    title: attr(e, "title"),
                    mime: attr(e, "type"),
                });
            }
        }
        "category" => {
            if let Some(term) = attr(e, "term") {
                categories.push(Value::String(term));
            }
        }
        "primary_category" => entry.primary_category = attr(e, "term"),
        _ => {}
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

fn is_error_entry(entry: &RawRecord) -> bool {
    entry
        .id
        .as_deref()
        .is_some_and(|id| id.contains(ERROR_ENTRY_MARKER))
}
