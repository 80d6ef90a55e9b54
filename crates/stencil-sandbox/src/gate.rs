// crates/stencil-sandbox/src/gate.rs
// ============================================================================
// Module: Setup Gate
// Description: Defense-in-depth entry point for running setup procedures.
// Purpose: Validate raw requests before any capability object exists.
// Dependencies: serde, serde_json, stencil-core
// ============================================================================

//! ## Overview
//! [`SetupGate`] is the only way into the sandbox for a host. It validates
//! the raw [`SetupRequest`] (input counts and sizes, names, option tokens,
//! the project root, dimension selections), freezes the [`Context`], builds
//! the [`Capabilities`], and hands both to the script host exactly once.
//!
//! Security posture: requests are untrusted. A rejected request never
//! reaches capability construction; the rejection is recorded as a security
//! event and returned as an error. Procedure failures are reported in the
//! [`SetupReport`] and never downgraded to success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use stencil_core::AuthoringMode;
use stencil_core::Context;
use stencil_core::ContextSpec;
use stencil_core::DimensionSet;
use stencil_core::InputValue;
use stencil_core::ProjectRoot;
use stencil_core::RawOptions;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::options::MAX_RAW_TOKENS;
use stencil_core::render::is_token_name;

use crate::audit::LifecyclePhase;
use crate::audit::SandboxAuditEvent;
use crate::audit::SandboxAuditSink;
use crate::capabilities::Capabilities;
use crate::limits::SandboxLimits;
use crate::limits::SandboxSettings;
use crate::procedure::HostOutcome;
use crate::procedure::ProcedureError;
use crate::procedure::ScriptHost;

/// Operation label for gate rejections.
const OPERATION: &str = "setup.gate";

// ============================================================================
// SECTION: Request
// ============================================================================

/// Raw setup request assembled by the host.
#[derive(Debug, Clone)]
pub struct SetupRequest {
    /// Absolute path of the freshly provisioned project.
    pub project_dir: PathBuf,
    /// Requested project name.
    pub project_name: String,
    /// Invocation working directory.
    pub cwd: PathBuf,
    /// Authoring mode.
    pub authoring_mode: AuthoringMode,
    /// Raw placeholder inputs.
    pub inputs: BTreeMap<String, InputValue>,
    /// Template constants.
    pub constants: Value,
    /// Raw option payload.
    pub options: RawOptions,
    /// Template-declared dimensions.
    pub dimensions: DimensionSet,
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Final status of a setup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    /// The procedure ran to completion.
    Completed,
    /// The procedure failed; earlier writes are left in place.
    Failed,
    /// The template ships no procedure.
    Skipped,
}

/// Sanitized failure carried by a [`SetupReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportError {
    /// Stable error kind label.
    pub kind: &'static str,
    /// Operation that raised the failure, when known.
    pub operation: Option<String>,
    /// Sanitized message.
    pub message: String,
}

impl From<&ProcedureError> for ReportError {
    fn from(err: &ProcedureError) -> Self {
        Self {
            kind: err.kind_label(),
            operation: err.operation().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Outcome of [`SetupGate::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    /// Final status.
    pub status: SetupStatus,
    /// Failure detail when `status` is `failed`.
    pub error: Option<ReportError>,
    /// Number of audited capability calls.
    pub calls: usize,
    /// Option normalization warnings.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Validating entry point into the sandbox.
pub struct SetupGate {
    /// Sandbox limits.
    limits: SandboxLimits,
    /// Sandbox settings.
    settings: SandboxSettings,
    /// Audit sink shared with the capabilities.
    audit: Arc<dyn SandboxAuditSink>,
}

impl SetupGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(
        limits: SandboxLimits,
        settings: SandboxSettings,
        audit: Arc<dyn SandboxAuditSink>,
    ) -> Self {
        Self {
            limits,
            settings,
            audit,
        }
    }

    /// Validates `request` and freezes it into a context.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for malformed requests; every
    /// rejection is also recorded as a security event.
    pub fn prepare(&self, request: SetupRequest) -> SandboxResult<Context> {
        self.admit(request).inspect_err(|err| {
            self.audit.record(&SandboxAuditEvent::security(
                "gate_rejection",
                err.operation(),
                err.to_string(),
            ));
        })
    }

    /// Validates `request`, then invokes the host's procedure once.
    ///
    /// # Errors
    ///
    /// Returns an error only when the request is rejected; procedure failures
    /// are reported through [`SetupReport::status`].
    pub fn run(&self, request: SetupRequest, host: &dyn ScriptHost) -> SandboxResult<SetupReport> {
        let context = Arc::new(self.prepare(request)?);
        let warnings = context.options().warnings().to_vec();
        self.audit.record(&SandboxAuditEvent::lifecycle(
            LifecyclePhase::Started,
            context.project_name(),
            0,
            None,
        ));
        let capabilities = match Capabilities::new(
            Arc::clone(&context),
            self.limits,
            &self.settings,
            Arc::clone(&self.audit),
        ) {
            Ok(capabilities) => capabilities,
            Err(err) => {
                return Ok(self.conclude(context.project_name(), 0, Err(err.into()), warnings));
            }
        };
        let outcome = host.invoke(&context, &capabilities);
        Ok(self.conclude(context.project_name(), capabilities.calls(), outcome, warnings))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Runs every request check and builds the context.
    fn admit(&self, request: SetupRequest) -> SandboxResult<Context> {
        self.check_inputs(&request.inputs)?;
        check_option_tokens(&request.options)?;
        let project_dir = ProjectRoot::new(&request.project_dir)?;
        let options =
            request.dimensions.normalize(&request.options, &self.settings.default_dimension)?;
        Context::new(ContextSpec {
            project_name: request.project_name,
            project_dir,
            cwd: request.cwd,
            authoring_mode: request.authoring_mode,
            author_assets_dir: self.settings.author_assets_dir.clone(),
            inputs: request.inputs,
            constants: request.constants,
            options,
        })
    }

    /// Enforces input count, name, and value size limits.
    fn check_inputs(&self, inputs: &BTreeMap<String, InputValue>) -> SandboxResult<()> {
        if inputs.len() > self.limits.max_inputs {
            return Err(SandboxError::validation(
                OPERATION,
                format!("too many inputs (limit {})", self.limits.max_inputs),
            ));
        }
        for (name, value) in inputs {
            if !is_token_name(name) {
                return Err(SandboxError::validation(
                    OPERATION,
                    format!("input name '{name}' is not a valid token name"),
                ));
            }
            let too_long = value
                .as_str()
                .is_some_and(|text| text.len() > self.limits.max_input_value_length);
            if too_long {
                return Err(SandboxError::validation(
                    OPERATION,
                    format!(
                        "input '{name}' exceeds {} bytes",
                        self.limits.max_input_value_length
                    ),
                ));
            }
            if value.as_str().is_some_and(|text| text.contains('\0')) {
                return Err(SandboxError::validation(
                    OPERATION,
                    format!("input '{name}' contains a null byte"),
                ));
            }
        }
        Ok(())
    }

    /// Records the final lifecycle event and builds the report.
    fn conclude(
        &self,
        project: &str,
        calls: usize,
        outcome: Result<HostOutcome, ProcedureError>,
        warnings: Vec<String>,
    ) -> SetupReport {
        let (status, phase, error) = match outcome {
            Ok(HostOutcome::Ran) => (SetupStatus::Completed, LifecyclePhase::Completed, None),
            Ok(HostOutcome::NoProcedure) => (SetupStatus::Skipped, LifecyclePhase::Skipped, None),
            Err(err) => {
                (SetupStatus::Failed, LifecyclePhase::Failed, Some(ReportError::from(&err)))
            }
        };
        let failure = error.as_ref().map(|error| (error.kind, error.message.clone()));
        self.audit.record(&SandboxAuditEvent::lifecycle(phase, project, calls, failure));
        SetupReport {
            status,
            error,
            calls,
            warnings,
        }
    }
}

/// Rejects oversized option payloads and control characters.
fn check_option_tokens(options: &RawOptions) -> SandboxResult<()> {
    if options.raw.len() > MAX_RAW_TOKENS || options.by_dimension.len() > MAX_RAW_TOKENS {
        return Err(SandboxError::validation(OPERATION, "too many option tokens"));
    }
    let selections = options.by_dimension.iter().flat_map(|(name, selection)| {
        std::iter::once(name.clone()).chain(selection.to_vec())
    });
    let has_control = options
        .raw
        .iter()
        .cloned()
        .chain(selections)
        .any(|token| token.chars().any(char::is_control));
    if has_control {
        return Err(SandboxError::validation(
            OPERATION,
            "option tokens must not contain control characters",
        ));
    }
    Ok(())
}
