// crates/stencil-core/src/lib.rs
// ============================================================================
// Module: Stencil Core Library
// Description: Boundary resolution, structured-data editing, and options.
// Purpose: Pure building blocks shared by the setup sandbox and its hosts.
// Dependencies: regex, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `stencil-core` holds the pieces of the setup sandbox that do not own a
//! filesystem handle: the [`BoundaryResolver`] that turns caller paths into
//! [`ValidatedPath`]s, the JSON path and text-marker engines, the token
//! renderer, the options/dimension resolver, and the immutable [`Context`].
//!
//! Security posture: every input reaching this crate is author or user
//! controlled. Functions fail closed with a [`SandboxError`] rather than
//! substituting defaults.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod boundary;
pub mod context;
pub mod error;
pub mod json_edit;
pub mod json_path;
pub mod options;
pub mod render;
pub mod text_edit;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use boundary::BoundaryResolver;
pub use boundary::ProjectRoot;
pub use boundary::ValidatedPath;
pub use context::AuthoringMode;
pub use context::Context;
pub use context::ContextSpec;
pub use context::InputValue;
pub use error::SandboxError;
pub use error::SandboxErrorKind;
pub use error::SandboxResult;
pub use json_edit::SetOptions;
pub use json_path::JsonPath;
pub use json_path::PathSegment;
pub use options::CombinationViolation;
pub use options::DimensionDefinition;
pub use options::DimensionKind;
pub use options::DimensionPolicy;
pub use options::DimensionSet;
pub use options::NormalizedOptions;
pub use options::RawOptions;
pub use options::RawSelection;
pub use options::Selection;
pub use render::Rendered;
pub use text_edit::SearchPattern;
