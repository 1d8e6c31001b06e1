//! Run artifacts: the Markdown summary report and the fetched-metadata archive.
//!
//! Both files are written to a temp file in the target directory and renamed into
//! place, so readers never observe a partial artifact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use arxivsummary_shared::{ArxivSummaryError, Record, Result, SummaryUnit};

/// Report title line.
const REPORT_TITLE: &str = "# arXiv Summary Report";

/// Metadata shown in the report header.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    /// Text generator model identifier.
    pub model: String,
    pub record_count: usize,
    /// Units that fell back to a placeholder.
    pub failed: usize,
}

impl ReportMeta {
    /// Header metadata derived from the units of a run.
    pub fn for_units(model: impl Into<String>, units: &[SummaryUnit]) -> Self {
        Self {
            generated_at: Utc::now(),
            model: model.into(),
            record_count: units.len(),
            failed: units.iter().filter(|u| !u.succeeded).count(),
        }
    }

    /// `summary_YYYYMMDD_HHMMSS.md`
    pub fn file_name(&self) -> String {
        format!("summary_{}.md", self.stamp())
    }

    /// `summary_YYYYMMDD_HHMMSS_N.md`, for the `n`th report within one second.
    fn numbered_file_name(&self, n: u32) -> String {
        format!("summary_{}_{n}.md", self.stamp())
    }

    fn stamp(&self) -> impl std::fmt::Display + '_ {
        self.generated_at.format("%Y%m%d_%H%M%S")
    }
}

// ---------------------------------------------------------------------------
// Report rendering
// ---------------------------------------------------------------------------

/// Render the full report: header, one section per unit in order, closing notes.
pub fn render_report(meta: &ReportMeta, units: &[SummaryUnit]) -> String {
    let mut out = String::new();

    out.push_str(REPORT_TITLE);
    out.push_str("\n\n## Overview\n\n");
    out.push_str(&format!(
        "- Generated: {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("- Model: {}\n", meta.model));
    out.push_str(&format!("- Records: {}\n", meta.record_count));
    if meta.failed > 0 {
        out.push_str(&format!(
            "- Failed summaries: {} (placeholders below)\n",
            meta.failed
        ));
    }
    out.push_str("\n---\n\n## Summaries\n\n");

    for unit in units {
        out.push_str(unit.summary_markdown.trim_end());
        out.push_str("\n\n");
    }

    out.push_str("## Notes\n\n");
    out.push_str("- Summaries were generated automatically by a language model.\n");
    out.push_str("- Each summary gives the research purpose and the main finding.\n");
    out.push_str("- Refer to the original paper where a summary is unclear or wrong.\n");

    out
}

/// Render and write the report into `dir`. Returns the written path.
///
/// An existing report with the same timestamp is never replaced: the new one
/// gets a `_2`, `_3`, ... suffix.
#[instrument(skip_all, fields(dir = %dir.display(), records = units.len()))]
pub fn write_report(dir: &Path, meta: &ReportMeta, units: &[SummaryUnit]) -> Result<PathBuf> {
    let mut path = dir.join(meta.file_name());
    let mut n = 1;
    while path.try_exists().map_err(|e| ArxivSummaryError::io(&path, e))? {
        n += 1;
        path = dir.join(meta.numbered_file_name(n));
    }
    write_atomic(&path, &render_report(meta, units))?;
    info!(path = %path.display(), failed = meta.failed, "summary report written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Metadata archive
// ---------------------------------------------------------------------------

/// Archived form of one fetched record.
#[derive(Debug, Serialize)]
struct ArchivedRecord<'a> {
    id: &'a str,
    title: &'a str,
    authors: &'a [String],
    published: String,
    updated: String,
    summary: &'a str,
    categories: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_category: Option<&'a str>,
    entry_url: &'a str,
    pdf_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    doi: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

impl<'a> From<&'a Record> for ArchivedRecord<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            id: r.id.as_str(),
            title: &r.title,
            authors: &r.authors,
            published: r.published_at.to_rfc3339(),
            updated: r.updated_at.to_rfc3339(),
            summary: &r.summary_text,
            categories: r.categories.iter().map(String::as_str).collect(),
            primary_category: r.primary_category.as_deref(),
            entry_url: &r.primary_link,
            pdf_url: &r.document_link,
            doi: r.doi.as_deref(),
            comment: r.comment.as_deref(),
        }
    }
}

/// Write the fetched records as a pretty JSON array to `dir/file_name`.
#[instrument(skip_all, fields(records = records.len()))]
pub fn write_metadata(dir: &Path, file_name: &str, records: &[Record]) -> Result<PathBuf> {
    let archived: Vec<ArchivedRecord<'_>> = records.iter().map(ArchivedRecord::from).collect();
    let json = serde_json::to_string_pretty(&archived).map_err(|e| {
        ArxivSummaryError::Storage(format!("metadata serialization failed: {e}"))
    })?;

    let path = dir.join(file_name);
    write_atomic(&path, &json)?;
    info!(path = %path.display(), "metadata archive written");
    Ok(path)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write via a temp file in the same directory, then rename.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| ArxivSummaryError::io(dir, e))?;

    let temp = dir.join(format!(".artifact-{}.tmp", Uuid::now_v7()));
    std::fs::write(&temp, content).map_err(|e| ArxivSummaryError::io(&temp, e))?;

    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(ArxivSummaryError::io(path, e));
    }

    debug!(path = %path.display(), size = content.len(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arxivsummary_shared::RecordId;
    use chrono::TimeZone;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("as-artifacts-test-{}", Uuid::now_v7()))
    }

    fn make_record(n: u32) -> Record {
        let at = Utc.with_ymd_and_hms(2025, 3, n, 9, 0, 0).unwrap();
        Record {
            id: RecordId::from(format!("http://arxiv.org/abs/2503.0000{n}v1")),
            title: format!("Paper {n}"),
            authors: vec!["Ada Lovelace".into()],
            published_at: at,
            updated_at: at,
            summary_text: "Abstract.".into(),
            categories: ["cond-mat.supr-con".to_string()].into_iter().collect(),
            primary_category: Some("cond-mat.supr-con".into()),
            primary_link: format!("http://arxiv.org/abs/2503.0000{n}v1"),
            document_link: format!("http://arxiv.org/pdf/2503.0000{n}v1"),
            doi: None,
            comment: None,
        }
    }

    fn units() -> Vec<SummaryUnit> {
        vec![
            SummaryUnit::generated(
                make_record(2),
                "#### [Paper 2](http://arxiv.org/pdf/2503.00002v1)\n- Finding: B.\n\n---\n".into(),
            ),
            SummaryUnit::failed(
                make_record(1),
                "#### [Paper 1](http://arxiv.org/pdf/2503.00001v1)\n- Summary unavailable\n\n---\n"
                    .into(),
                "timed out",
            ),
        ]
    }

    fn fixed_meta(units: &[SummaryUnit]) -> ReportMeta {
        ReportMeta {
            generated_at: Utc.with_ymd_and_hms(2025, 3, 4, 8, 5, 9).unwrap(),
            ..ReportMeta::for_units("gemini-2.0-flash", units)
        }
    }

    #[test]
    fn report_has_header_and_ordered_sections() {
        let units = units();
        let meta = fixed_meta(&units);
        let report = render_report(&meta, &units);

        assert!(report.starts_with(REPORT_TITLE));
        assert!(report.contains("- Generated: 2025-03-04 08:05:09 UTC"));
        assert!(report.contains("- Model: gemini-2.0-flash"));
        assert!(report.contains("- Records: 2"));
        assert!(report.contains("- Failed summaries: 1"));

        let second = report.find("[Paper 2]").expect("paper 2");
        let first = report.find("[Paper 1]").expect("paper 1");
        assert!(second < first, "sections keep input order");
        assert!(report.trim_end().ends_with("unclear or wrong."));
    }

    #[test]
    fn clean_report_omits_failure_line() {
        let units = vec![units().remove(0)];
        let report = render_report(&fixed_meta(&units), &units);
        assert!(!report.contains("Failed summaries"));
    }

    #[test]
    fn report_file_name_uses_timestamp() {
        let units = units();
        assert_eq!(fixed_meta(&units).file_name(), "summary_20250304_080509.md");
    }

    #[test]
    fn write_report_creates_file() {
        let dir = temp_dir();
        let units = units();
        let path = write_report(&dir, &fixed_meta(&units), &units).expect("write report");

        assert_eq!(path, dir.join("summary_20250304_080509.md"));
        let content = std::fs::read_to_string(&path).expect("read report");
        assert!(content.contains("## Summaries"));
    }

    #[test]
    fn same_second_reports_do_not_overwrite() {
        let dir = temp_dir();
        let units = units();
        let meta = fixed_meta(&units);

        let first = write_report(&dir, &meta, &units).expect("first report");
        let mut later = meta.clone();
        later.model = "other-model".into();
        let second = write_report(&dir, &later, &units).expect("second report");
        let third = write_report(&dir, &later, &units).expect("third report");

        assert_eq!(first, dir.join("summary_20250304_080509.md"));
        assert_eq!(second, dir.join("summary_20250304_080509_2.md"));
        assert_eq!(third, dir.join("summary_20250304_080509_3.md"));

        let kept = std::fs::read_to_string(&first).expect("read first");
        assert!(!kept.contains("other-model"));
        let newer = std::fs::read_to_string(&second).expect("read second");
        assert!(newer.contains("- Model: other-model"));
    }

    #[test]
    fn metadata_archive_is_json_array() {
        let dir = temp_dir();
        let records = vec![make_record(2), make_record(1)];
        let path = write_metadata(&dir, "metadata.json", &records).expect("write metadata");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let items = value.as_array().expect("array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "http://arxiv.org/abs/2503.00002v1");
        assert_eq!(items[0]["pdf_url"], "http://arxiv.org/pdf/2503.00002v1");
        assert!(items[0].get("doi").is_none());
    }
}
