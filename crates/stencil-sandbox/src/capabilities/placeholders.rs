// crates/stencil-sandbox/src/capabilities/placeholders.rs
// ============================================================================
// Module: Placeholders Capability
// Description: Bulk placeholder substitution across glob-selected files.
// Purpose: Apply context inputs to generated files in one pass.
// Dependencies: serde, stencil-core, wildmatch
// ============================================================================

//! ## Overview
//! [`PlaceholdersCapability::apply`] walks the project, selects files whose
//! project-relative path matches any glob (patterns without `/` match the
//! file name alone), and substitutes `{{NAME}}` tokens. Files under the author
//! assets directory, housekeeping entries, and files that are not UTF-8 are
//! skipped. Unchanged files are not rewritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::ValidatedPath;
use stencil_core::render::render_tokens;
use wildmatch::WildMatch;

use crate::capabilities::templates::token_table;
use crate::scope::Scope;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome of a bulk placeholder pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaceholderReport {
    /// Number of files rewritten.
    pub files_changed: usize,
    /// Total number of tokens substituted.
    pub replacements: usize,
}

// ============================================================================
// SECTION: Placeholders Capability
// ============================================================================

/// Placeholder substitution scoped to the project root.
#[derive(Clone)]
pub struct PlaceholdersCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl PlaceholdersCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Applies placeholders to every file matching one of `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for empty patterns or when the
    /// project walk exceeds the entry limit.
    pub fn apply<S: AsRef<str>>(
        &self,
        patterns: &[S],
        extra: &BTreeMap<String, String>,
    ) -> SandboxResult<PlaceholderReport> {
        const OPERATION: &str = "placeholders.apply";
        let result = self.apply_matching(patterns, extra, OPERATION);
        self.scope.finish(OPERATION, None, result)
    }

    /// Applies placeholders to one file; returns the number of substitutions.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] for missing files and
    /// [`SandboxError::Validation`] for files that are not UTF-8.
    pub fn apply_file(&self, file: &str, extra: &BTreeMap<String, String>) -> SandboxResult<usize> {
        const OPERATION: &str = "placeholders.apply_file";
        let values = token_table(self.scope.context(), extra);
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let content = self.scope.fs().read_string(&resolved, OPERATION)?;
            self.rewrite(&resolved, &content, &values, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Applies placeholders to `text`.
    #[must_use]
    pub fn apply_string(&self, text: &str, extra: &BTreeMap<String, String>) -> String {
        let values = token_table(self.scope.context(), extra);
        render_tokens(text, &values).text
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Walks the project and rewrites matching files.
    fn apply_matching<S: AsRef<str>>(
        &self,
        patterns: &[S],
        extra: &BTreeMap<String, String>,
        operation: &str,
    ) -> SandboxResult<PlaceholderReport> {
        let globs = compile_globs(patterns, operation)?;
        let values = token_table(self.scope.context(), extra);
        let assets = self.scope.context().author_assets_dir();
        let mut report = PlaceholderReport::default();
        for candidate in self.scope.fs().list_files(&self.scope.root(), operation)? {
            if Path::new(&candidate).starts_with(assets) || !globs.matches(&candidate) {
                continue;
            }
            let resolved = self.scope.resolve(&candidate, operation)?;
            let bytes = self.scope.fs().read(&resolved, operation)?;
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            let replaced = self.rewrite(&resolved, &content, &values, operation)?;
            if replaced > 0 {
                report.files_changed += 1;
                report.replacements += replaced;
            }
        }
        Ok(report)
    }

    /// Renders `content` and writes it back when anything was substituted.
    fn rewrite(
        &self,
        path: &ValidatedPath,
        content: &str,
        values: &BTreeMap<String, String>,
        operation: &str,
    ) -> SandboxResult<usize> {
        let rendered = render_tokens(content, values);
        if rendered.replaced > 0 && rendered.text != content {
            self.scope.fs().write(path, rendered.text.as_bytes(), operation)?;
        }
        Ok(rendered.replaced)
    }
}

// ============================================================================
// SECTION: Globs
// ============================================================================

/// Compiled file selection.
struct GlobSet {
    /// Patterns matched against the full relative path.
    path_globs: Vec<WildMatch>,
    /// Patterns matched against the file name only.
    name_globs: Vec<WildMatch>,
}

impl GlobSet {
    /// Returns true when `relative` is selected by any pattern.
    fn matches(&self, relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        self.path_globs.iter().any(|glob| glob.matches(relative))
            || self.name_globs.iter().any(|glob| glob.matches(name))
    }
}

/// Splits patterns into path and file-name globs.
fn compile_globs<S: AsRef<str>>(patterns: &[S], operation: &str) -> SandboxResult<GlobSet> {
    let mut globs = GlobSet {
        path_globs: Vec::new(),
        name_globs: Vec::new(),
    };
    for pattern in patterns {
        let pattern = pattern.as_ref().trim();
        if pattern.is_empty() {
            return Err(SandboxError::validation(operation, "glob patterns must be non-empty"));
        }
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
        if pattern.contains('/') {
            globs.path_globs.push(WildMatch::new(pattern));
        } else {
            globs.name_globs.push(WildMatch::new(pattern));
        }
    }
    Ok(globs)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
