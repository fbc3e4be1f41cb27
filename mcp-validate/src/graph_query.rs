//! Denylist-based mutation blocking for user-supplied graph queries.
//!
//! The only write path is the parameterized upsert in `mcp-tools`; a query
//! string reaching this validator is rejected if it could mutate the graph,
//! run an admin procedure, chain statements, or hide either behind a
//! comment. Matching happens on a normalized form (Unicode NFKC, case-folded,
//! string literals masked) so fullwidth/obfuscated keywords don't slip
//! through.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use mcp_core::error::AppError;

static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#).expect("valid regex"));

const MUTATING_CLAUSES: &[&str] = &["detach delete", "delete", "remove", "create", "merge", "set", "drop"];

const ADMIN_PROCEDURE_PREFIXES: &[&str] = &["call db.", "call dbms.", "call apoc.", "call gds."];

/// Replace every quoted string literal with a fixed placeholder so keyword
/// matching can't be defeated by hiding a clause inside a string, and so a
/// literal containing the word "delete" isn't itself a false positive.
fn mask_string_literals(s: &str) -> String {
    STRING_LITERAL.replace_all(s, "''").into_owned()
}

/// Unicode NFKC + casefold; this collapses fullwidth lookalikes (e.g. the
/// fullwidth `ＤＥＬＥＴＥ`) onto their ASCII equivalents before matching.
fn normalize(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(idx) = haystack[start..].find(needle) {
        let at = start + idx;
        let before_ok = at == 0
            || !haystack[..at]
                .chars()
                .next_back()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false);
        let after = at + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

/// Returns `Ok(())` if `text` is a safe read-only graph query, otherwise
/// an error describing why it was rejected.
pub fn validate_graph_query(text: &str) -> Result<(), AppError> {
    let masked = mask_string_literals(text);
    let normalized = normalize(&masked);

    if normalized.contains("//") || normalized.contains("/*") || normalized.contains("*/") {
        return Err(AppError::invalid(
            "graph query must not contain a comment sequence",
        ));
    }
    if normalized.contains(';') {
        return Err(AppError::invalid(
            "graph query must not contain a statement separator",
        ));
    }
    for clause in MUTATING_CLAUSES {
        if contains_word(&normalized, clause) {
            return Err(AppError::invalid(format!(
                "graph query must be read-only; found mutating clause '{clause}'"
            )));
        }
    }
    for prefix in ADMIN_PROCEDURE_PREFIXES {
        if normalized.contains(prefix) {
            return Err(AppError::invalid(
                "graph query must not invoke a database-administration procedure",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_read_query() {
        let q = "MATCH (a:Svc)-[r:CALLS]->(b:Svc) RETURN a.name AS a, b.name AS b, r.latency_ms AS l";
        assert!(validate_graph_query(q).is_ok());
    }

    #[test]
    fn rejects_detach_delete() {
        assert!(validate_graph_query("MATCH (n) DETACH DELETE n").is_err());
    }

    #[test]
    fn rejects_fullwidth_delete_obfuscation() {
        assert!(validate_graph_query("MATCH (n) ＤＥＬＥＴＥ n").is_err());
    }

    #[test]
    fn rejects_statement_separator() {
        assert!(validate_graph_query("MATCH (n) RETURN n; MATCH (m) DELETE m").is_err());
    }

    #[test]
    fn rejects_admin_procedure() {
        assert!(validate_graph_query("CALL db.createIndex('x')").is_err());
    }

    #[test]
    fn rejects_comment_hiding_mutation() {
        assert!(validate_graph_query("MATCH (n) RETURN n // DELETE n").is_err());
    }

    #[test]
    fn does_not_false_positive_on_string_literal_containing_keyword() {
        let q = "MATCH (n) WHERE n.name = 'delete-me' RETURN n";
        assert!(validate_graph_query(q).is_ok());
    }

    #[test]
    fn does_not_false_positive_on_substring_word() {
        // "created_at" contains "create" but is not the clause keyword.
        assert!(validate_graph_query("MATCH (n) RETURN n.created_at").is_ok());
    }
}
