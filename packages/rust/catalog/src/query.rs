//! Structured query composition for the arXiv search grammar.
//!
//! The free-text term (optionally field-scoped) is ANDed with an ORed group of
//! category filters: `ti:(nickelate OR cuprate) AND (cat:cond-mat.supr-con OR cat:cond-mat.str-el)`.

use arxivsummary_shared::QueryScope;

/// Query used when neither a term nor categories are given.
pub const WILDCARD_QUERY: &str = "*:*";

/// Compose the structured search query.
///
/// - Empty term ⇒ category filter alone.
/// - Empty term and no categories ⇒ [`WILDCARD_QUERY`].
/// - Multi-word terms are parenthesised so boolean operators inside them do not
///   bind to the category group.
pub fn build_query(term: &str, categories: &[String], scope: QueryScope) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(2);

    let term = term.trim();
    if !term.is_empty() {
        let grouped = if term.split_whitespace().nth(1).is_some() && !is_parenthesised(term) {
            format!("({term})")
        } else {
            term.to_string()
        };

        parts.push(match scope {
            QueryScope::All => grouped,
            QueryScope::Title => format!("ti:{grouped}"),
            QueryScope::Abstract => format!("abs:{grouped}"),
            QueryScope::Author => format!("au:{grouped}"),
        });
    }

    let category_filters: Vec<String> = categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| format!("cat:{c}"))
        .collect();

    if !category_filters.is_empty() {
        parts.push(format!("({})", category_filters.join(" OR ")));
    }

    if parts.is_empty() {
        WILDCARD_QUERY.to_string()
    } else {
        parts.join(" AND ")
    }
}

/// True when the whole term is one balanced parenthesised group.
fn is_parenthesised(term: &str) -> bool {
    if !(term.starts_with('(') && term.ends_with(')')) {
        return false;
    }
    let mut depth = 0i32;
    for (i, ch) in term.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != term.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn term_and_categories() {
        let q = build_query(
            "nickelate",
            &cats(&["cond-mat.supr-con", "cond-mat.str-el"]),
            QueryScope::All,
        );
        assert_eq!(q, "nickelate AND (cat:cond-mat.supr-con OR cat:cond-mat.str-el)");
    }

    #[test]
    fn empty_term_reduces_to_category_filter() {
        let q = build_query("  ", &cats(&["cond-mat.supr-con"]), QueryScope::Title);
        assert_eq!(q, "(cat:cond-mat.supr-con)");
    }

    #[test]
    fn empty_everything_is_wildcard() {
        assert_eq!(build_query("", &[], QueryScope::All), WILDCARD_QUERY);
        assert_eq!(build_query("", &cats(&["", " "]), QueryScope::All), WILDCARD_QUERY);
    }

    #[test]
    fn scoped_terms() {
        assert_eq!(build_query("kagome", &[], QueryScope::Title), "ti:kagome");
        assert_eq!(build_query("kagome", &[], QueryScope::Abstract), "abs:kagome");
        assert_eq!(build_query("Hubbard", &[], QueryScope::Author), "au:Hubbard");
    }

    #[test]
    fn multi_word_terms_are_grouped() {
        let q = build_query(
            "nickelate OR cuprate",
            &cats(&["cond-mat.supr-con"]),
            QueryScope::Title,
        );
        assert_eq!(q, "ti:(nickelate OR cuprate) AND (cat:cond-mat.supr-con)");
    }

    #[test]
    fn already_grouped_terms_are_left_alone() {
        assert_eq!(build_query("(a OR b)", &[], QueryScope::All), "(a OR b)");
        assert_eq!(
            build_query("(a OR b) AND (c)", &[], QueryScope::All),
            "((a OR b) AND (c))"
        );
    }
}
