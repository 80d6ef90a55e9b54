// crates/stencil-core/src/render.rs
// ============================================================================
// Module: Token Rendering
// Description: Fixed `{{TOKEN}}` substitution for templates and placeholders.
// Purpose: Render author text against context inputs without evaluation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Tokens are written `{{NAME}}` with optional inner whitespace
//! (`{{ NAME }}`). Names follow identifier rules (`[A-Za-z_][A-Za-z0-9_.-]*`).
//! Unknown tokens and anything that is not a well-formed token are left
//! untouched, so rendering is a pure substitution with no expression
//! language. Substituted values are never re-scanned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Opening token delimiter.
pub const TOKEN_OPEN: &str = "{{";
/// Closing token delimiter.
pub const TOKEN_CLOSE: &str = "}}";
/// Maximum token name length scanned.
const MAX_TOKEN_NAME: usize = 128;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Result of rendering text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Rendered text.
    pub text: String,
    /// Number of tokens substituted.
    pub replaced: usize,
}

/// Substitutes every known `{{NAME}}` token in `template`.
#[must_use]
pub fn render_tokens(template: &str, values: &BTreeMap<String, String>) -> Rendered {
    let mut out = String::with_capacity(template.len());
    let mut replaced = 0;
    let mut rest = template;
    while let Some(open) = rest.find(TOKEN_OPEN) {
        out.push_str(&rest[.. open]);
        let after_open = &rest[open + TOKEN_OPEN.len() ..];
        let Some(close) = after_open.find(TOKEN_CLOSE) else {
            out.push_str(&rest[open ..]);
            return Rendered {
                text: out,
                replaced,
            };
        };
        let name = after_open[.. close].trim();
        match values.get(name) {
            Some(value) if is_token_name(name) => {
                out.push_str(value);
                replaced += 1;
                rest = &after_open[close + TOKEN_CLOSE.len() ..];
            }
            _ => {
                // Emit the opening delimiter and rescan after it so a nested
                // `{{{{NAME}}` still finds the inner token.
                out.push_str(TOKEN_OPEN);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    Rendered {
        text: out,
        replaced,
    }
}

/// Lists the distinct well-formed token names referenced by `template`.
#[must_use]
pub fn referenced_tokens(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find(TOKEN_OPEN) {
        let after_open = &rest[open + TOKEN_OPEN.len() ..];
        let Some(close) = after_open.find(TOKEN_CLOSE) else {
            break;
        };
        let name = after_open[.. close].trim();
        if is_token_name(name) && !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
            rest = &after_open[close + TOKEN_CLOSE.len() ..];
        } else {
            rest = after_open;
        }
    }
    names
}

/// Returns true when `name` is a valid token identifier.
#[must_use]
pub fn is_token_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_TOKEN_NAME
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
