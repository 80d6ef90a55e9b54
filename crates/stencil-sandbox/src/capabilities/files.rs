// crates/stencil-sandbox/src/capabilities/files.rs
// ============================================================================
// Module: Files Capability
// Description: Boundary-checked file and directory operations.
// Purpose: Expose read, write, copy, move, remove, and listing to procedures.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Every method resolves its arguments through the scope's boundary resolver
//! before touching [`crate::fs::ProjectFs`]. Paths are project-relative
//! strings; results never contain absolute paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use stencil_core::SandboxResult;

use crate::scope::Scope;

// ============================================================================
// SECTION: Files Capability
// ============================================================================

/// File operations scoped to the project root.
#[derive(Clone)]
pub struct FilesCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl FilesCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Reads a UTF-8 file.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] for missing files and
    /// boundary or validation errors for rejected paths.
    pub fn read(&self, path: &str) -> SandboxResult<String> {
        const OPERATION: &str = "files.read";
        let result = self
            .scope
            .resolve(path, OPERATION)
            .and_then(|resolved| self.scope.fs().read_string(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(path), result)
    }

    /// Reads raw file bytes.
    ///
    /// # Errors
    ///
    /// Same as [`FilesCapability::read`] without the UTF-8 requirement.
    pub fn read_bytes(&self, path: &str) -> SandboxResult<Vec<u8>> {
        const OPERATION: &str = "files.read_bytes";
        let result = self
            .scope
            .resolve(path, OPERATION)
            .and_then(|resolved| self.scope.fs().read(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(path), result)
    }

    /// Atomically writes `contents`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns boundary, validation, or conflict errors for rejected writes.
    pub fn write(&self, path: &str, contents: impl AsRef<[u8]>) -> SandboxResult<()> {
        const OPERATION: &str = "files.write";
        let result = self
            .scope
            .resolve(path, OPERATION)
            .and_then(|resolved| self.scope.fs().write(&resolved, contents.as_ref(), OPERATION));
        self.scope.finish(OPERATION, Some(path), result)
    }

    /// Copies a file or directory tree; returns the number of files copied.
    ///
    /// Housekeeping entries inside trees are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::Conflict`] when the target exists
    /// and `overwrite` is false.
    pub fn copy(&self, from: &str, to: &str, overwrite: bool) -> SandboxResult<usize> {
        const OPERATION: &str = "files.copy";
        let result = self.scope.resolve(from, OPERATION).and_then(|source| {
            let target = self.scope.resolve(to, OPERATION)?;
            self.scope.fs().copy(&source, &target, overwrite, OPERATION)
        });
        self.scope.finish(OPERATION, Some(from), result)
    }

    /// Moves a file or directory tree.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::Conflict`] when the target exists
    /// and `overwrite` is false.
    pub fn move_to(&self, from: &str, to: &str, overwrite: bool) -> SandboxResult<()> {
        const OPERATION: &str = "files.move";
        let result = self.scope.resolve(from, OPERATION).and_then(|source| {
            let target = self.scope.resolve(to, OPERATION)?;
            self.scope.fs().rename(&source, &target, overwrite, OPERATION)
        });
        self.scope.finish(OPERATION, Some(from), result)
    }

    /// Removes a file or directory tree; returns false when nothing existed.
    ///
    /// # Errors
    ///
    /// Returns boundary errors for rejected paths and validation errors for
    /// the project root.
    pub fn remove(&self, path: &str) -> SandboxResult<bool> {
        const OPERATION: &str = "files.remove";
        let result = self
            .scope
            .resolve(path, OPERATION)
            .and_then(|resolved| self.scope.fs().remove(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(path), result)
    }

    /// Returns true when an entry exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns boundary errors for rejected paths.
    pub fn exists(&self, path: &str) -> SandboxResult<bool> {
        const OPERATION: &str = "files.exists";
        let result = self
            .scope
            .resolve(path, OPERATION)
            .and_then(|resolved| self.scope.fs().exists(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(path), result)
    }

    /// Creates each directory (and its parents).
    ///
    /// # Errors
    ///
    /// Stops at the first rejected path.
    pub fn ensure_dirs<S: AsRef<str>>(&self, paths: &[S]) -> SandboxResult<()> {
        const OPERATION: &str = "files.ensure_dirs";
        for path in paths {
            let path = path.as_ref();
            let result = self
                .scope
                .resolve(path, OPERATION)
                .and_then(|resolved| self.scope.fs().create_dirs(&resolved, OPERATION));
            self.scope.finish(OPERATION, Some(path), result)?;
        }
        Ok(())
    }

    /// Lists files below `dir` as sorted project-relative paths.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::NotFound`] for a missing
    /// directory.
    pub fn list(&self, dir: &str) -> SandboxResult<Vec<String>> {
        const OPERATION: &str = "files.list";
        let result = self
            .scope
            .resolve(dir, OPERATION)
            .and_then(|resolved| self.scope.fs().list_files(&resolved, OPERATION));
        self.scope.finish(OPERATION, Some(dir), result)
    }
}
