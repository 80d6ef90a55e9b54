// crates/stencil-sandbox/src/lib.rs
// ============================================================================
// Module: Stencil Sandbox Library
// Description: Capability-scoped sandbox for template setup procedures.
// Purpose: Expose bounded filesystem, JSON, text, and template surfaces.
// Dependencies: cap-std, cap-primitives, serde, serde_json, stencil-core
// ============================================================================

//! ## Overview
//! The sandbox turns a validated [`SetupRequest`] into a frozen
//! [`stencil_core::Context`] plus a [`Capabilities`] object, then lets a
//! [`ScriptHost`] invoke the template's setup procedure once. All file access
//! goes through a capability handle on the project root opened with
//! `cap-std`; symlinks are never followed and writes are atomic.
//!
//! Security posture: setup procedures are semi-trusted and requests are
//! untrusted; see [`gate`] for the admission checks and [`audit`] for the
//! event trail.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod capabilities;
mod fs;
pub mod gate;
pub mod limits;
pub mod plan;
pub mod procedure;
mod scope;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SandboxAuditEvent;
pub use audit::SandboxAuditSink;
pub use audit::StderrAuditSink;
pub use capabilities::Capabilities;
pub use capabilities::PlaceholderReport;
pub use gate::ReportError;
pub use gate::SetupGate;
pub use gate::SetupReport;
pub use gate::SetupRequest;
pub use gate::SetupStatus;
pub use limits::SandboxLimits;
pub use limits::SandboxSettings;
pub use plan::PlanHost;
pub use plan::SetupPlan;
pub use procedure::HostOutcome;
pub use procedure::ProcedureError;
pub use procedure::ProcedureHost;
pub use procedure::ScriptHost;
pub use procedure::SetupProcedure;
