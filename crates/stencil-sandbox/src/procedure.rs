// crates/stencil-sandbox/src/procedure.rs
// ============================================================================
// Module: Setup Procedures
// Description: Procedure and script host interfaces invoked by the gate.
// Purpose: Define how author-supplied setup logic receives capabilities.
// Dependencies: stencil-core, thiserror
// ============================================================================

//! ## Overview
//! A [`SetupProcedure`] receives the frozen [`Context`] and the
//! [`Capabilities`] object and nothing else. A [`ScriptHost`] locates the
//! procedure for a template and invokes it at most once per setup run.
//!
//! Security posture: procedures are semi-trusted; their failures are reported
//! to the host and never retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use stencil_core::Context;
use stencil_core::SandboxError;
use thiserror::Error;

use crate::capabilities::Capabilities;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure raised by a setup procedure.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// A capability call failed.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    /// The procedure reported its own failure.
    #[error("setup procedure failed: {0}")]
    Failed(String),
}

impl ProcedureError {
    /// Returns the stable kind label used in reports and audit events.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Sandbox(err) => err.kind().as_str(),
            Self::Failed(_) => "procedure",
        }
    }

    /// Returns the operation that raised the failure, when known.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Sandbox(err) => Some(err.operation()),
            Self::Failed(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Procedure
// ============================================================================

/// Author-supplied setup logic.
pub trait SetupProcedure {
    /// Runs the procedure against the project.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError`] when a capability call or the procedure
    /// itself fails. Files written before the failure are left in place.
    fn run(&self, context: &Context, capabilities: &Capabilities) -> Result<(), ProcedureError>;
}

impl<F> SetupProcedure for F
where
    F: Fn(&Context, &Capabilities) -> Result<(), ProcedureError>,
{
    fn run(&self, context: &Context, capabilities: &Capabilities) -> Result<(), ProcedureError> {
        self(context, capabilities)
    }
}

// ============================================================================
// SECTION: Script Host
// ============================================================================

/// Whether the host found a procedure to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOutcome {
    /// The procedure ran to completion.
    Ran,
    /// The template ships no setup procedure.
    NoProcedure,
}

/// Loads and invokes a template's setup procedure.
pub trait ScriptHost {
    /// Invokes the procedure once with `(context, capabilities)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError`] when loading or running the procedure
    /// fails.
    fn invoke(
        &self,
        context: &Context,
        capabilities: &Capabilities,
    ) -> Result<HostOutcome, ProcedureError>;
}

/// Host for a procedure compiled into the caller.
pub struct ProcedureHost<P> {
    /// Wrapped procedure.
    procedure: P,
}

impl<P: SetupProcedure> ProcedureHost<P> {
    /// Wraps `procedure`.
    pub const fn new(procedure: P) -> Self {
        Self {
            procedure,
        }
    }
}

impl<P: SetupProcedure> ScriptHost for ProcedureHost<P> {
    fn invoke(
        &self,
        context: &Context,
        capabilities: &Capabilities,
    ) -> Result<HostOutcome, ProcedureError> {
        self.procedure.run(context, capabilities)?;
        Ok(HostOutcome::Ran)
    }
}
