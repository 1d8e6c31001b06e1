//! Post-processing of generated summary Markdown.
//!
//! A generated batch reply is expected to contain one section per record, each
//! opened by a heading marker (`#### [Title](link)`) and closed by a `---`
//! separator. Other headings are not markers. This crate cleans the reply,
//! counts and splits its sections, and repairs headings whose links came back
//! malformed.

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

/// Horizontal rule closing every section.
pub const SECTION_SEPARATOR: &str = "---";

/// Start of a per-record section: a level-4 heading that is a single `[title](link)`.
static SECTION_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^####[ \t]+\[(.+)\]\(([^\s)]+)\)[ \t]*$").expect("valid regex")
});

/// Trailing horizontal rules (and surrounding blank lines) at the end of a section.
static TRAILING_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\s*(?:-{3,}|\*{3,}|_{3,})[ \t]*)+\s*$").expect("valid regex"));

/// Clean a raw generator reply: strip a wrapping fence, repair heading links and
/// normalize whitespace.
#[instrument(skip_all, fields(len = raw.len()))]
pub fn clean_generated(raw: &str) -> String {
    let cleaned = cleanup::run_pipeline(raw);
    debug!(cleaned_len = cleaned.len(), "generated markdown cleaned");
    cleaned
}

/// Repair headings of the form `### Title (http://...)` into `### [Title](http://...)`.
pub fn repair_heading_links(md: &str) -> String {
    cleanup::repair_heading_links(md)
}

/// Number of per-record section markers in `md`.
pub fn count_sections(md: &str) -> usize {
    SECTION_MARKER_RE.find_iter(md).count()
}

/// Split `md` into per-record sections, in order.
///
/// Text before the first marker is dropped. Each returned section ends with
/// exactly one [`SECTION_SEPARATOR`] line.
pub fn split_sections(md: &str) -> Vec<String> {
    let starts: Vec<usize> = SECTION_MARKER_RE.find_iter(md).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(md.len());
            terminate_section(&md[start..end])
        })
        .collect()
}

/// Title and link of a section's marker heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeading<'a> {
    pub title: &'a str,
    pub link: &'a str,
}

/// The first marker heading in `section`, if any.
pub fn section_heading(section: &str) -> Option<SectionHeading<'_>> {
    SECTION_MARKER_RE.captures(section).map(|caps| SectionHeading {
        title: caps.get(1).map_or("", |m| m.as_str()).trim(),
        link: caps.get(2).map_or("", |m| m.as_str()),
    })
}

/// Normalize a single section so it ends with one separator line.
pub fn terminate_section(section: &str) -> String {
    let body = TRAILING_RULE_RE.replace(section.trim(), "");
    format!("{}\n\n{SECTION_SEPARATOR}\n", body.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "Here are your summaries:\n\n\
#### [Paper A](http://arxiv.org/pdf/1)\n\
- Authors: Ada\n\
- Published: 2025-03-01\n\
- Purpose: Study A.\n\
- Finding: Found A.\n\n\
---\n\n\
#### Paper B (http://arxiv.org/pdf/2)\n\
- Authors: Alan\n\
- Purpose: Study B.\n\
- Finding: Found B.\n\n\
---\n\n\
#### [Paper C](http://arxiv.org/pdf/3)\n\
- Finding: Found C.\n";

    #[test]
    fn counts_only_linked_level_four_headings() {
        // Paper B's heading only becomes a marker once its link is repaired.
        assert_eq!(count_sections(REPLY), 2);
        assert_eq!(count_sections(&clean_generated(REPLY)), 3);

        assert_eq!(count_sections("# Report\n\nno sections"), 0);
        assert_eq!(count_sections("##### [Deep](http://x)\n####[NoSpace](http://x)"), 0);
        assert_eq!(count_sections("#### Plain heading\n### [Level three](http://x)"), 0);
        assert_eq!(count_sections("## [Level two](http://x)"), 0);
    }

    #[test]
    fn stray_headings_are_not_sections() {
        let reply = "## Summaries\n\n\
#### [Paper A](http://arxiv.org/pdf/1)\n\
- Finding: Found A.\n\n\
---\n\n\
### Notes\n\
- None.\n";
        assert_eq!(count_sections(reply), 1);
        let sections = split_sections(reply);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].starts_with("#### [Paper A]"));
    }

    #[test]
    fn heading_title_and_link() {
        let heading = section_heading("#### [Nickelates (Revisited)](http://arxiv.org/pdf/2)\n- x\n");
        assert_eq!(
            heading,
            Some(SectionHeading {
                title: "Nickelates (Revisited)",
                link: "http://arxiv.org/pdf/2"
            })
        );
        assert_eq!(section_heading("### [A](http://x)"), None);
    }

    #[test]
    fn splits_and_terminates_sections() {
        let cleaned = clean_generated(REPLY);
        let sections = split_sections(&cleaned);
        assert_eq!(sections.len(), 3);

        assert!(sections[0].starts_with("#### [Paper A](http://arxiv.org/pdf/1)"));
        assert!(!sections[0].contains("Here are your summaries"));
        assert!(sections[1].starts_with("#### [Paper B](http://arxiv.org/pdf/2)"));
        for section in &sections {
            assert!(section.ends_with("\n\n---\n"), "{section:?}");
            assert_eq!(section.matches("---").count(), 1);
        }
    }

    #[test]
    fn terminate_adds_missing_separator() {
        assert_eq!(terminate_section("#### T\n- x"), "#### T\n- x\n\n---\n");
        assert_eq!(
            terminate_section("#### T\n- x\n\n---\n\n***\n"),
            "#### T\n- x\n\n---\n"
        );
    }

    #[test]
    fn repair_heading_links_public_entry() {
        assert_eq!(
            repair_heading_links("### Paper Title (http://x.org/abs/1)"),
            "### [Paper Title](http://x.org/abs/1)"
        );
    }
}
