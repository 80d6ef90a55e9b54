// crates/stencil-core/src/json_path.rs
// ============================================================================
// Module: JSON Path Expressions
// Description: Parser for dotted/bracketed JSON path expressions.
// Purpose: Address values inside JSON documents by key and index segments.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A path expression is a sequence of segments such as `a.b[2].c` or
//! `scripts["build:prod"]`. Keys are separated by `.`, indices use `[n]`, and
//! keys containing separators use quoted brackets (`["x.y"]` or `['x.y']`).
//! The first segment must be a key. Expressions are parsed on every call and
//! never cached, because the underlying file may change between calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::SandboxError;
use crate::error::SandboxResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of segments accepted in a single expression.
pub const MAX_PATH_SEGMENTS: usize = 64;
/// Maximum accepted array index.
pub const MAX_ARRAY_INDEX: usize = 100_000;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Single segment of a JSON path expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index (non-negative).
    Index(usize),
}

impl PathSegment {
    /// Returns true for array index segments.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parsed JSON path expression.
///
/// # Invariants
/// - Non-empty; the first segment is always [`PathSegment::Key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    /// Ordered segments, walked left to right.
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Parses an expression, labelling failures with `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for empty expressions, empty
    /// segments, unterminated brackets, non-numeric or oversized indices, or a
    /// leading index segment.
    pub fn parse(expression: &str, operation: &str) -> SandboxResult<Self> {
        let invalid = |reason: &str| {
            SandboxError::validation(operation, format!("invalid path expression: {reason}"))
        };
        if expression.trim().is_empty() {
            return Err(invalid("empty expression"));
        }
        let chars: Vec<char> = expression.chars().collect();
        let mut segments = Vec::new();
        let mut cursor = 0;
        let mut expect_key = true;
        while cursor < chars.len() {
            match chars[cursor] {
                '[' => {
                    let (segment, next) = parse_bracket(&chars, cursor).map_err(invalid)?;
                    segments.push(segment);
                    cursor = next;
                    expect_key = false;
                }
                '.' => {
                    if expect_key {
                        return Err(invalid("empty segment"));
                    }
                    cursor += 1;
                    expect_key = true;
                    if cursor == chars.len() {
                        return Err(invalid("trailing separator"));
                    }
                }
                _ => {
                    if !expect_key {
                        return Err(invalid("missing separator"));
                    }
                    let start = cursor;
                    while cursor < chars.len() && chars[cursor] != '.' && chars[cursor] != '[' {
                        if chars[cursor] == ']' {
                            return Err(invalid("unbalanced bracket"));
                        }
                        cursor += 1;
                    }
                    let key: String = chars[start .. cursor].iter().collect();
                    segments.push(PathSegment::Key(key));
                    expect_key = false;
                }
            }
            if segments.len() > MAX_PATH_SEGMENTS {
                return Err(invalid("too many segments"));
            }
        }
        match segments.first() {
            Some(PathSegment::Key(_)) => Ok(Self {
                segments,
            }),
            Some(PathSegment::Index(_)) => Err(invalid("must start with a key")),
            None => Err(invalid("empty expression")),
        }
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Splits the path into its parent segments and final segment.
    #[must_use]
    pub fn split_last(&self) -> (&[PathSegment], &PathSegment) {
        // Invariant: segments is non-empty.
        let last = self.segments.len() - 1;
        (&self.segments[.. last], &self.segments[last])
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if key.is_empty() || key.contains(['.', '[', ']']) => {
                    f.write_str("[\"")?;
                    for ch in key.chars() {
                        if matches!(ch, '"' | '\\') {
                            f.write_char('\\')?;
                        }
                        f.write_char(ch)?;
                    }
                    f.write_str("\"]")?;
                }
                PathSegment::Key(key) => {
                    if position > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a bracket segment starting at `open`; returns the segment and the
/// cursor after the closing bracket.
fn parse_bracket(chars: &[char], open: usize) -> Result<(PathSegment, usize), &'static str> {
    let mut cursor = open + 1;
    let Some(&first) = chars.get(cursor) else {
        return Err("unterminated bracket");
    };
    if first == '"' || first == '\'' {
        cursor += 1;
        let mut key = String::new();
        loop {
            match chars.get(cursor) {
                None => return Err("unterminated quoted key"),
                Some('\\') => {
                    let Some(&escaped) = chars.get(cursor + 1) else {
                        return Err("unterminated quoted key");
                    };
                    key.push(escaped);
                    cursor += 2;
                }
                Some(&ch) if ch == first => {
                    cursor += 1;
                    break;
                }
                Some(&ch) => {
                    key.push(ch);
                    cursor += 1;
                }
            }
        }
        if chars.get(cursor) != Some(&']') {
            return Err("unterminated bracket");
        }
        return Ok((PathSegment::Key(key), cursor + 1));
    }
    let start = cursor;
    while cursor < chars.len() && chars[cursor] != ']' {
        if !chars[cursor].is_ascii_digit() {
            return Err("array index must be a non-negative integer");
        }
        cursor += 1;
    }
    if cursor == chars.len() {
        return Err("unterminated bracket");
    }
    if cursor == start {
        return Err("empty array index");
    }
    let digits: String = chars[start .. cursor].iter().collect();
    let index: usize = digits.parse().map_err(|_| "array index out of range")?;
    if index > MAX_ARRAY_INDEX {
        return Err("array index out of range");
    }
    Ok((PathSegment::Index(index), cursor + 1))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
