//! Cleanup pipeline for generated Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence. The generator's
//! output is not trusted to be well-formed, so headings, fences and whitespace are
//! normalized before sections are counted.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on generated Markdown.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = md.to_string();

    result = strip_outer_fence(&result);
    result = repair_heading_links(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Strip a wrapping code fence
// ---------------------------------------------------------------------------

/// Remove a ```` ```markdown ```` (or bare ```` ``` ````) fence wrapping the whole reply.
fn strip_outer_fence(md: &str) -> String {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^```(?:markdown|md)?[ \t]*\n").expect("valid regex"));
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n```[ \t]*$").expect("valid regex"));

    let trimmed = md.trim();
    if !OPEN_RE.is_match(trimmed) || !CLOSE_RE.is_match(trimmed) {
        return md.to_string();
    }

    let inner = OPEN_RE.replace(trimmed, "");
    CLOSE_RE.replace(&inner, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Repair heading links
// ---------------------------------------------------------------------------

/// Rewrite headings carrying a bare parenthesized URL into a Markdown link.
///
/// `### Paper Title (http://x.org/abs/1)` becomes `### [Paper Title](http://x.org/abs/1)`,
/// and `### [Paper Title] (http://...)` loses the stray space. Already-linked
/// headings are left unchanged.
pub(crate) fn repair_heading_links(md: &str) -> String {
    static HEADING_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*\((https?://[^\s)]+)\)[ \t]*$")
            .expect("valid regex")
    });

    HEADING_URL_RE
        .replace_all(md, |caps: &regex::Captures| {
            let hashes = &caps[1];
            let title = caps[2].trim();
            let url = &caps[3];
            let title = title
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .unwrap_or(title)
                .trim();
            format!("{hashes} [{title}]({url})")
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on lines and normalize line endings.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines into one.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_matches('\n');
    format!("{trimmed}\n")
}
