// crates/stencil-core/src/error.rs
// ============================================================================
// Module: Sandbox Errors
// Description: Closed error taxonomy returned to setup hosts.
// Purpose: Carry sanitized, operation-tagged failures across the sandbox.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every capability operation either succeeds or fails with a [`SandboxError`].
//! Messages are sanitized at construction: they never embed absolute host
//! paths or OS error strings, only the operation label and the relative input
//! the caller supplied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable classification of sandbox failures.
///
/// # Invariants
/// - Variants are stable for audit labeling and programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxErrorKind {
    /// Path escapes or malforms the project boundary.
    Boundary,
    /// Malformed context, options, dimension, or argument input.
    Validation,
    /// Missing file, marker, or value for a read-class operation.
    NotFound,
    /// Target collision for a write-class operation without overwrite.
    Conflict,
    /// Unexpected low-level I/O failure.
    Io,
}

impl SandboxErrorKind {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boundary => "boundary",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Io => "io",
        }
    }
}

// ============================================================================
// SECTION: Sandbox Error
// ============================================================================

/// Errors raised by the sandbox and its capability surfaces.
///
/// # Invariants
/// - `operation` names the capability operation (or caller label) that failed.
/// - No variant carries an absolute resolved path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// Path escapes or malforms the project boundary.
    #[error("{operation}: path rejected by project boundary ({reason}): {path}")]
    Boundary {
        /// Operation label supplied by the caller.
        operation: String,
        /// Offending relative path exactly as supplied.
        path: String,
        /// Short reason label.
        reason: String,
    },
    /// Malformed input.
    #[error("{operation}: invalid input: {message}")]
    Validation {
        /// Operation that rejected the input.
        operation: String,
        /// Sanitized description.
        message: String,
    },
    /// Missing file, marker, or value.
    #[error("{operation}: not found: {message}")]
    NotFound {
        /// Operation that failed the lookup.
        operation: String,
        /// Sanitized description.
        message: String,
    },
    /// Existing target collides with a write.
    #[error("{operation}: conflict: {message}")]
    Conflict {
        /// Operation that detected the collision.
        operation: String,
        /// Sanitized description.
        message: String,
    },
    /// Unexpected I/O failure.
    #[error("{operation}: io failure: {message}")]
    Io {
        /// Operation that performed the I/O.
        operation: String,
        /// Error kind label (never the OS message).
        message: String,
    },
}

impl SandboxError {
    /// Builds a boundary error for a rejected relative path.
    #[must_use]
    pub fn boundary(operation: &str, path: &str, reason: &str) -> Self {
        Self::Boundary {
            operation: operation.to_string(),
            path: sanitize_input(path),
            reason: reason.to_string(),
        }
    }

    /// Builds a validation error.
    #[must_use]
    pub fn validation(operation: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Builds a not-found error.
    #[must_use]
    pub fn not_found(operation: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Builds a conflict error.
    #[must_use]
    pub fn conflict(operation: &str, message: impl Into<String>) -> Self {
        Self::Conflict {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Maps an I/O error for the relative `path` into a sandbox error.
    ///
    /// `NotFound` and `AlreadyExists` keep their taxonomy meaning; everything
    /// else is reported by kind label only.
    #[must_use]
    pub fn from_io(operation: &str, path: &str, err: &io::Error) -> Self {
        let path = sanitize_input(path);
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(operation, path),
            io::ErrorKind::AlreadyExists => {
                Self::conflict(operation, format!("{path} already exists"))
            }
            kind => Self::Io {
                operation: operation.to_string(),
                message: format!("{path}: {kind}"),
            },
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> SandboxErrorKind {
        match self {
            Self::Boundary {
                ..
            } => SandboxErrorKind::Boundary,
            Self::Validation {
                ..
            } => SandboxErrorKind::Validation,
            Self::NotFound {
                ..
            } => SandboxErrorKind::NotFound,
            Self::Conflict {
                ..
            } => SandboxErrorKind::Conflict,
            Self::Io {
                ..
            } => SandboxErrorKind::Io,
        }
    }

    /// Returns the operation label that raised the error.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Boundary {
                operation, ..
            }
            | Self::Validation {
                operation, ..
            }
            | Self::NotFound {
                operation, ..
            }
            | Self::Conflict {
                operation, ..
            }
            | Self::Io {
                operation, ..
            } => operation,
        }
    }
}

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maximum characters of caller input echoed back in an error.
const MAX_ECHO_CHARS: usize = 256;

/// Strips control characters and truncates caller input before echoing it.
fn sanitize_input(input: &str) -> String {
    let mut out: String =
        input.chars().filter(|ch| !ch.is_control()).take(MAX_ECHO_CHARS).collect();
    if input.chars().count() > MAX_ECHO_CHARS {
        out.push_str("...");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
