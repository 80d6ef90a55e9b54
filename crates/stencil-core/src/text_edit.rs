// crates/stencil-core/src/text_edit.rs
// ============================================================================
// Module: Text Marker Editing
// Description: Marker-anchored insertion, replacement, and append helpers.
// Purpose: Edit source text idempotently with strict newline hygiene.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! These functions operate on in-memory text and return the edited result (or
//! `None` when the edit is a no-op), so callers only persist real changes.
//! Insertions are idempotent: a block whose trimmed form already appears in
//! the text is never inserted twice.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::NoExpand;
use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;

use crate::error::SandboxError;
use crate::error::SandboxResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Compiled-size ceiling for caller-supplied patterns, in bytes.
const MAX_PATTERN_SIZE: usize = 1 << 20;

// ============================================================================
// SECTION: Search Patterns
// ============================================================================

/// Search pattern for [`replace`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPattern {
    /// Literal text; metacharacters are escaped before matching.
    Literal(String),
    /// Regular expression; the replacement may reference capture groups.
    Regex(String),
}

// ============================================================================
// SECTION: Marker Operations
// ============================================================================

/// Inserts `block` immediately after the first occurrence of `marker`.
///
/// Returns `Ok(None)` when the trimmed block already occurs in `content`.
/// Exactly one newline separates the block from the marker line and from the
/// following text.
///
/// # Errors
///
/// Returns [`SandboxError::NotFound`] when `marker` does not occur.
pub fn insert_after(
    content: &str,
    marker: &str,
    block: &str,
    operation: &str,
) -> SandboxResult<Option<String>> {
    if marker.is_empty() {
        return Err(SandboxError::validation(operation, "marker must be non-empty"));
    }
    if contains_block(content, block) {
        return Ok(None);
    }
    let Some(start) = content.find(marker) else {
        return Err(SandboxError::not_found(operation, format!("marker '{marker}' not present")));
    };
    let split = start + marker.len();
    let (before, after) = content.split_at(split);
    let body = block.trim_matches(['\r', '\n']);
    let mut out = String::with_capacity(content.len() + body.len() + 2);
    out.push_str(before);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(body);
    out.push('\n');
    out.push_str(after.strip_prefix('\n').unwrap_or(after));
    Ok(Some(out))
}

/// Ensures `block` is present, inserting it after `marker` when absent.
///
/// # Errors
///
/// Returns [`SandboxError::NotFound`] when the block is absent and `marker`
/// does not occur.
pub fn ensure_block(
    content: &str,
    marker: &str,
    block: &str,
    operation: &str,
) -> SandboxResult<Option<String>> {
    if contains_block(content, block) {
        return Ok(None);
    }
    insert_after(content, marker, block, operation)
}

/// Replaces everything strictly between the first `start` marker and the
/// first `end` marker that follows it.
///
/// An empty block collapses the region to a single newline so the markers
/// never merge. Returns `Ok(None)` when the region already holds the result.
///
/// # Errors
///
/// Returns [`SandboxError::NotFound`] when either marker is missing.
pub fn replace_between(
    content: &str,
    start: &str,
    end: &str,
    block: &str,
    operation: &str,
) -> SandboxResult<Option<String>> {
    if start.is_empty() || end.is_empty() {
        return Err(SandboxError::validation(operation, "markers must be non-empty"));
    }
    let Some(start_at) = content.find(start) else {
        return Err(SandboxError::not_found(operation, format!("start marker '{start}' not present")));
    };
    let inner_start = start_at + start.len();
    let Some(end_offset) = content[inner_start ..].find(end) else {
        return Err(SandboxError::not_found(operation, format!("end marker '{end}' not present")));
    };
    let inner_end = inner_start + end_offset;
    let body = block.trim_matches(['\r', '\n']);
    let replacement =
        if body.trim().is_empty() { String::from("\n") } else { format!("\n{body}\n") };
    if content[inner_start .. inner_end] == replacement {
        return Ok(None);
    }
    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[.. inner_start]);
    out.push_str(&replacement);
    out.push_str(&content[inner_end ..]);
    Ok(Some(out))
}

/// Appends `lines` to `content` with exactly one trailing newline.
///
/// Existing content that lacks a trailing newline receives one first.
#[must_use]
pub fn append_lines(content: &str, lines: &[String]) -> String {
    let mut out = String::with_capacity(content.len() + lines.iter().map(String::len).sum::<usize>());
    out.push_str(content);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    let joined = lines.join("\n");
    out.push_str(joined.trim_end_matches(['\r', '\n']));
    out.push('\n');
    out
}

/// Replaces every match of `search` with `replacement`.
///
/// Returns the edited text and the number of replacements; zero matches
/// yields `Ok(None)` unless `ensure_match` is set.
///
/// # Errors
///
/// Returns [`SandboxError::Validation`] for invalid patterns and
/// [`SandboxError::NotFound`] when `ensure_match` is set and nothing matched.
pub fn replace(
    content: &str,
    search: &SearchPattern,
    replacement: &str,
    ensure_match: bool,
    operation: &str,
) -> SandboxResult<Option<(String, usize)>> {
    let (regex, literal) = match search {
        SearchPattern::Literal(text) => {
            if text.is_empty() {
                return Err(SandboxError::validation(operation, "search text must be non-empty"));
            }
            (compile_pattern(&regex::escape(text), operation)?, true)
        }
        SearchPattern::Regex(pattern) => (compile_pattern(pattern, operation)?, false),
    };
    let count = regex.find_iter(content).count();
    if count == 0 {
        if ensure_match {
            return Err(SandboxError::not_found(operation, "search pattern matched nothing"));
        }
        return Ok(None);
    }
    let replaced = if literal {
        regex.replace_all(content, NoExpand(replacement)).into_owned()
    } else {
        regex.replace_all(content, replacement).into_owned()
    };
    Ok(Some((replaced, count)))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the trimmed block is non-empty and already in `content`.
fn contains_block(content: &str, block: &str) -> bool {
    let trimmed = block.trim();
    !trimmed.is_empty() && content.contains(trimmed)
}

/// Compiles a caller pattern with a bounded program size.
fn compile_pattern(pattern: &str, operation: &str) -> SandboxResult<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(MAX_PATTERN_SIZE)
        .build()
        .map_err(|_| SandboxError::validation(operation, "invalid search pattern"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;
    use crate::SandboxErrorKind;

    #[test]
    fn insert_after_places_block_on_its_own_line() {
        let out = insert_after("// imports\nfn main() {}\n", "// imports", "use a;", "t").unwrap();
        assert_eq!(out.unwrap(), "// imports\nuse a;\nfn main() {}\n");
    }

    #[test]
    fn insert_after_marker_at_end_of_text() {
        let out = insert_after("head <!-- here -->", "<!-- here -->", "\nbody\n", "t").unwrap();
        assert_eq!(out.unwrap(), "head <!-- here -->\nbody\n");
    }

    #[test]
    fn insert_after_is_idempotent() {
        let once = insert_after("a\n#m\nb\n", "#m", "x = 1", "t").unwrap().unwrap();
        assert!(insert_after(&once, "#m", "x = 1", "t").unwrap().is_none());
        assert_eq!(once.matches("x = 1").count(), 1);
    }

    #[test]
    fn insert_after_missing_marker_is_not_found() {
        let err = insert_after("abc", "#m", "x", "t").unwrap_err();
        assert_eq!(err.kind(), SandboxErrorKind::NotFound);
    }

    #[test]
    fn insert_after_keeps_existing_blank_line() {
        let out = insert_after("#m\n\nrest\n", "#m", "x", "t").unwrap().unwrap();
        assert_eq!(out, "#m\nx\n\nrest\n");
    }

    #[test]
    fn ensure_block_skips_marker_lookup_when_present() {
        assert!(ensure_block("x = 1\n", "#missing", "x = 1", "t").unwrap().is_none());
    }

    #[test]
    fn replace_between_empty_block_leaves_single_newline() {
        let out = replace_between("<!--A-->old\nstuff<!--B-->", "<!--A-->", "<!--B-->", "", "t")
            .unwrap()
            .unwrap();
        assert_eq!(out, "<!--A-->\n<!--B-->");
        assert!(replace_between(&out, "<!--A-->", "<!--B-->", "", "t").unwrap().is_none());
    }

    #[test]
    fn replace_between_searches_end_after_start() {
        let text = "<!--B--> <!--A-->x<!--B-->";
        let out = replace_between(text, "<!--A-->", "<!--B-->", "new", "t").unwrap().unwrap();
        assert_eq!(out, "<!--B--> <!--A-->\nnew\n<!--B-->");
    }

    #[test]
    fn append_lines_adds_separator_and_single_trailing_newline() {
        let out = append_lines("a", &[String::from("b"), String::from("c\n\n")]);
        assert_eq!(out, "a\nb\nc\n");
        assert_eq!(append_lines("", &[String::from("x")]), "x\n");
    }

    #[test]
    fn literal_replace_escapes_metacharacters() {
        let search = SearchPattern::Literal(String::from("a.b"));
        let (out, count) = replace("a.b axb a.b", &search, "$1", false, "t").unwrap().unwrap();
        assert_eq!(out, "$1 axb $1");
        assert_eq!(count, 2);
    }

    #[test]
    fn regex_replace_expands_groups() {
        let search = SearchPattern::Regex(String::from(r"v(\d+)"));
        let (out, _) = replace("v1 v22", &search, "version-$1", false, "t").unwrap().unwrap();
        assert_eq!(out, "version-1 version-22");
    }

    #[test]
    fn replace_without_match_respects_ensure_match() {
        let search = SearchPattern::Literal(String::from("zzz"));
        assert!(replace("abc", &search, "y", false, "t").unwrap().is_none());
        let err = replace("abc", &search, "y", true, "t").unwrap_err();
        assert_eq!(err.kind(), SandboxErrorKind::NotFound);
    }
}
