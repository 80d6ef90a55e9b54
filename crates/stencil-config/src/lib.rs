// crates/stencil-config/src/lib.rs
// ============================================================================
// Module: Stencil Config Library
// Description: Canonical config model and validation for stencil.toml.
// Purpose: Single source of truth for sandbox limits and audit routing.
// Dependencies: serde, stencil-sandbox, toml
// ============================================================================

//! ## Overview
//! `stencil-config` loads `stencil.toml`, validates it fail-closed, and
//! converts it into the plain value types the sandbox consumes
//! ([`stencil_sandbox::SandboxLimits`], [`stencil_sandbox::SandboxSettings`],
//! and an audit sink).
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
