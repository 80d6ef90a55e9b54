// crates/stencil-core/src/boundary.rs
// ============================================================================
// Module: Boundary Resolver
// Description: Canonical project roots and boundary-checked relative paths.
// Purpose: Provide the single chokepoint every filesystem capability calls.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`BoundaryResolver::resolve`] turns an untrusted relative path into a
//! [`ValidatedPath`]. Validation happens in three passes:
//! 1. Syntactic rejection of empty input, null bytes, absolute paths, and
//!    oversized input.
//! 2. Lexical normalization where `.` is dropped and `..` pops a segment;
//!    popping past the root is an escape.
//! 3. Canonicalization of the deepest existing ancestor so symlinked segments
//!    are resolved before the containment check. The check is component-wise
//!    (`root` itself, or `root` followed by a separator), never a raw string
//!    prefix test.
//!
//! Security posture: every path handed to the resolver is attacker-controlled.
//! Errors carry the offending input and the caller label, never the resolved
//! absolute path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::error::SandboxError;
use crate::error::SandboxResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum length of a relative path request, in bytes.
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;
/// Maximum length of a single path component, in bytes.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Project Root
// ============================================================================

/// Absolute, canonicalized project directory.
///
/// # Invariants
/// - Never empty, never relative.
/// - Points at an existing directory at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot(PathBuf);

impl ProjectRoot {
    /// Canonicalizes an absolute directory path into a project root.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when the path is empty, relative,
    /// missing, or not a directory.
    pub fn new(path: &Path) -> SandboxResult<Self> {
        const OPERATION: &str = "project_root";
        if path.as_os_str().is_empty() {
            return Err(SandboxError::validation(OPERATION, "project root is empty"));
        }
        if !path.is_absolute() {
            return Err(SandboxError::validation(OPERATION, "project root must be absolute"));
        }
        let canonical = fs::canonicalize(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                SandboxError::validation(OPERATION, "project root does not exist")
            } else {
                let message = format!("project root unresolvable: {}", err.kind());
                SandboxError::validation(OPERATION, message)
            }
        })?;
        let metadata = fs::metadata(&canonical).map_err(|err| {
            SandboxError::validation(OPERATION, format!("project root unreadable: {}", err.kind()))
        })?;
        if !metadata.is_dir() {
            return Err(SandboxError::validation(OPERATION, "project root is not a directory"));
        }
        Ok(Self(canonical))
    }

    /// Returns the canonical root path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns true when `candidate` is the root or strictly inside it.
    #[must_use]
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.0)
    }
}

// ============================================================================
// SECTION: Validated Path
// ============================================================================

/// Path proven to resolve to the project root or strictly inside it.
///
/// # Invariants
/// - `relative` contains only normal components (no `.`, `..`, or roots).
/// - `absolute` equals the project root joined with `relative`.
/// - Only [`BoundaryResolver`] constructs values of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    /// Normalized relative path below the root; empty for the root itself.
    relative: PathBuf,
    /// Root-joined absolute path.
    absolute: PathBuf,
}

impl ValidatedPath {
    /// Returns the normalized path relative to the project root.
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Returns the absolute path (root joined with the relative path).
    #[must_use]
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Returns true when the path designates the project root itself.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Returns a `/`-separated display form of the relative path.
    #[must_use]
    pub fn display_relative(&self) -> String {
        if self.is_root() {
            return String::from(".");
        }
        let parts: Vec<String> = self
            .relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }

    /// Returns the parent directory, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let relative = self.relative.parent().map(Path::to_path_buf).unwrap_or_default();
        let absolute = self.absolute.parent().map(Path::to_path_buf).unwrap_or_default();
        Some(Self {
            relative,
            absolute,
        })
    }

    /// Returns the final path component, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.relative.file_name()
    }

    /// Extends the path with a single directory-entry name.
    ///
    /// Used when walking directory handles that were opened from a validated
    /// path; the name must be a single normal component.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Boundary`] when `name` is not a single normal
    /// component.
    pub fn child(&self, name: &std::ffi::OsStr, label: &str) -> SandboxResult<Self> {
        let mut components = Path::new(name).components();
        let (Some(Component::Normal(part)), None) = (components.next(), components.next()) else {
            return Err(SandboxError::boundary(label, &name.to_string_lossy(), "invalid_entry"));
        };
        Ok(Self {
            relative: self.relative.join(part),
            absolute: self.absolute.join(part),
        })
    }
}

// ============================================================================
// SECTION: Boundary Resolver
// ============================================================================

/// Stateless resolver enforcing the project boundary.
///
/// # Invariants
/// - Holds no per-invocation state; safe to share across threads and roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryResolver {
    /// Maximum accepted length of a relative path request, in bytes.
    max_path_length: usize,
}

impl Default for BoundaryResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH_LENGTH)
    }
}

impl BoundaryResolver {
    /// Creates a resolver with the given path length limit.
    #[must_use]
    pub const fn new(max_path_length: usize) -> Self {
        Self {
            max_path_length,
        }
    }

    /// Resolves `relative` against `root`, labelling failures with `label`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Boundary`] when the input is empty, contains a
    /// null byte, is absolute, is oversized, or canonicalizes outside `root`.
    pub fn resolve(
        &self,
        root: &ProjectRoot,
        relative: &str,
        label: &str,
    ) -> SandboxResult<ValidatedPath> {
        if relative.trim().is_empty() {
            return Err(SandboxError::boundary(label, relative, "empty"));
        }
        if relative.contains('\0') {
            return Err(SandboxError::boundary(label, relative, "null_byte"));
        }
        if relative.len() > self.max_path_length {
            return Err(SandboxError::boundary(label, relative, "too_long"));
        }
        let normalized = normalize_lexically(relative, label)?;
        let absolute = if normalized.as_os_str().is_empty() {
            root.as_path().to_path_buf()
        } else {
            root.as_path().join(&normalized)
        };
        let canonical = canonicalize_existing_prefix(root, &absolute, relative, label)?;
        if !root.contains(&canonical) {
            return Err(SandboxError::boundary(label, relative, "escapes_root"));
        }
        Ok(ValidatedPath {
            relative: normalized,
            absolute,
        })
    }

    /// Returns a validated path designating the root itself.
    #[must_use]
    pub fn root_path(&self, root: &ProjectRoot) -> ValidatedPath {
        ValidatedPath {
            relative: PathBuf::new(),
            absolute: root.as_path().to_path_buf(),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes `.` and `..` segments without touching the filesystem.
fn normalize_lexically(relative: &str, label: &str) -> SandboxResult<PathBuf> {
    let mut stack: Vec<OsString> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(SandboxError::boundary(label, relative, "absolute"));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return Err(SandboxError::boundary(label, relative, "escapes_root"));
                }
            }
            Component::Normal(part) => {
                if part.len() > MAX_PATH_COMPONENT_LENGTH {
                    return Err(SandboxError::boundary(label, relative, "component_too_long"));
                }
                stack.push(part.to_os_string());
            }
        }
    }
    Ok(stack.iter().collect())
}

/// Canonicalizes the deepest existing ancestor of `absolute` and re-appends the
/// missing tail, resolving symlinked segments that already exist.
fn canonicalize_existing_prefix(
    root: &ProjectRoot,
    absolute: &Path,
    relative: &str,
    label: &str,
) -> SandboxResult<PathBuf> {
    let mut existing = absolute.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        match fs::symlink_metadata(&existing) {
            Ok(_) => break,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let Some(name) = existing.file_name() else {
                    return Err(SandboxError::boundary(label, relative, "unresolvable"));
                };
                tail.push(name.to_os_string());
                if !existing.pop() || !root.contains(&existing) {
                    return Err(SandboxError::boundary(label, relative, "unresolvable"));
                }
            }
            Err(err) => return Err(SandboxError::from_io(label, relative, &err)),
        }
    }
    // A dangling symlink exists but cannot be canonicalized; reject it rather
    // than letting a later write follow it.
    let mut canonical = fs::canonicalize(&existing)
        .map_err(|_| SandboxError::boundary(label, relative, "unresolvable"))?;
    for name in tail.iter().rev() {
        canonical.push(name);
    }
    Ok(canonical)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
