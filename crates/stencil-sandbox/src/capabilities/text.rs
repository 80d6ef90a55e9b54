// crates/stencil-sandbox/src/capabilities/text.rs
// ============================================================================
// Module: Text Capability
// Description: Marker-anchored and pattern-based edits of text files.
// Purpose: Persist idempotent text edits inside the project.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Thin persistence layer over `stencil_core::text_edit`. Edits that turn out
//! to be no-ops skip the write, so re-running a procedure leaves files
//! untouched. Mutating methods return whether the file changed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use stencil_core::SandboxResult;
use stencil_core::SearchPattern;
use stencil_core::ValidatedPath;
use stencil_core::text_edit;

use crate::scope::Scope;

// ============================================================================
// SECTION: Text Capability
// ============================================================================

/// Text file operations scoped to the project root.
#[derive(Clone)]
pub struct TextCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl TextCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Reads a UTF-8 text file.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] for missing files.
    pub fn read(&self, file: &str) -> SandboxResult<String> {
        const OPERATION: &str = "text.read";
        let result = self
            .scope
            .resolve(file, OPERATION)
            .and_then(|resolved| self.scope.fs().read_string(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Writes a text file.
    ///
    /// # Errors
    ///
    /// Returns boundary, validation, or conflict errors for rejected writes.
    pub fn write(&self, file: &str, contents: &str) -> SandboxResult<()> {
        const OPERATION: &str = "text.write";
        let result = self
            .scope
            .resolve(file, OPERATION)
            .and_then(|resolved| self.scope.fs().write(&resolved, contents.as_bytes(), OPERATION));
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Inserts `block` after the first occurrence of `marker`.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] when the file or the
    /// marker is missing.
    pub fn insert_after(&self, file: &str, marker: &str, block: &str) -> SandboxResult<bool> {
        const OPERATION: &str = "text.insert_after";
        let result = self.edit(file, OPERATION, |content| {
            text_edit::insert_after(content, marker, block, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Ensures `block` is present, inserting it after `marker` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] when the block is
    /// absent and the marker is missing.
    pub fn ensure_block(&self, file: &str, marker: &str, block: &str) -> SandboxResult<bool> {
        const OPERATION: &str = "text.ensure_block";
        let result = self.edit(file, OPERATION, |content| {
            text_edit::ensure_block(content, marker, block, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Replaces the region between the `start` and `end` markers.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] when either marker is
    /// missing.
    pub fn replace_between(
        &self,
        file: &str,
        start: &str,
        end: &str,
        block: &str,
    ) -> SandboxResult<bool> {
        const OPERATION: &str = "text.replace_between";
        let result = self.edit(file, OPERATION, |content| {
            text_edit::replace_between(content, start, end, block, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Appends `lines`, creating the file when absent.
    ///
    /// # Errors
    ///
    /// Returns boundary, validation, or conflict errors for rejected writes.
    pub fn append_lines<S: AsRef<str>>(&self, file: &str, lines: &[S]) -> SandboxResult<()> {
        const OPERATION: &str = "text.append_lines";
        let lines: Vec<String> = lines.iter().map(|line| line.as_ref().to_string()).collect();
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let existing =
                self.scope.fs().read_string_optional(&resolved, OPERATION)?.unwrap_or_default();
            let updated = text_edit::append_lines(&existing, &lines);
            self.scope.fs().write(&resolved, updated.as_bytes(), OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Replaces every match of `search`; returns the number of replacements.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] when `ensure_match` is
    /// set and nothing matched, and validation errors for invalid patterns.
    pub fn replace(
        &self,
        file: &str,
        search: &SearchPattern,
        replacement: &str,
        ensure_match: bool,
    ) -> SandboxResult<usize> {
        const OPERATION: &str = "text.replace";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let content = self.scope.fs().read_string(&resolved, OPERATION)?;
            match text_edit::replace(&content, search, replacement, ensure_match, OPERATION)? {
                Some((updated, count)) => {
                    if updated != content {
                        self.scope.fs().write(&resolved, updated.as_bytes(), OPERATION)?;
                    }
                    Ok(count)
                }
                None => Ok(0),
            }
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Reads, edits, and persists a file when `apply` reports a change.
    fn edit<F>(&self, file: &str, operation: &str, apply: F) -> SandboxResult<bool>
    where
        F: FnOnce(&str) -> SandboxResult<Option<String>>,
    {
        let resolved: ValidatedPath = self.scope.resolve(file, operation)?;
        let content = self.scope.fs().read_string(&resolved, operation)?;
        match apply(&content)? {
            Some(updated) => {
                self.scope.fs().write(&resolved, updated.as_bytes(), operation)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
