// crates/stencil-sandbox/src/audit.rs
// ============================================================================
// Module: Sandbox Audit Logging
// Description: Structured audit events for capability calls and setup runs.
// Purpose: Emit sanitized JSON-line audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every capability call, boundary violation, procedure log line, and setup
//! lifecycle transition becomes a [`SandboxAuditEvent`] routed to a
//! [`SandboxAuditSink`]. Events never carry absolute host paths; paths are the
//! caller-supplied relative form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;
use stencil_core::SandboxError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label for capability calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// The call succeeded.
    Ok,
    /// The call failed.
    Error,
}

/// Severity of procedure log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Informational message.
    Info,
    /// Warning message.
    Warn,
}

/// Setup lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// The procedure is about to run.
    Started,
    /// The procedure returned successfully.
    Completed,
    /// The procedure failed.
    Failed,
    /// No procedure was found to run.
    Skipped,
}

/// Capability call audit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityCallEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Capability operation name.
    pub operation: String,
    /// Relative path as supplied, when the call names one.
    pub path: Option<String>,
    /// Call outcome.
    pub outcome: CallOutcome,
    /// Error kind label on failure.
    pub error_kind: Option<&'static str>,
}

/// Security audit payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: &'static str,
    /// Operation that detected the violation.
    pub operation: String,
    /// Sanitized detail.
    pub message: String,
}

/// Procedure log payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Severity.
    pub level: LogLevel,
    /// Author message.
    pub message: String,
    /// Optional structured data.
    pub data: Option<Value>,
}

/// Setup lifecycle payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupLifecycleEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle phase.
    pub phase: LifecyclePhase,
    /// Project name.
    pub project: String,
    /// Capability calls made so far.
    pub calls: usize,
    /// Error kind label when failed.
    pub error_kind: Option<&'static str>,
    /// Sanitized error message when failed.
    pub message: Option<String>,
}

/// Any sandbox audit event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SandboxAuditEvent {
    /// Capability call.
    CapabilityCall(CapabilityCallEvent),
    /// Security event.
    Security(SecurityEvent),
    /// Procedure log line.
    ProcedureLog(ProcedureLogEvent),
    /// Lifecycle transition.
    Lifecycle(SetupLifecycleEvent),
}

impl SandboxAuditEvent {
    /// Builds a capability call event from a call result.
    #[must_use]
    pub fn capability_call(
        operation: &str,
        path: Option<&str>,
        error: Option<&SandboxError>,
    ) -> Self {
        Self::CapabilityCall(CapabilityCallEvent {
            event: "capability_call",
            timestamp_ms: now_ms(),
            operation: operation.to_string(),
            path: path.map(str::to_string),
            outcome: if error.is_some() { CallOutcome::Error } else { CallOutcome::Ok },
            error_kind: error.map(|err| err.kind().as_str()),
        })
    }

    /// Builds a security event.
    #[must_use]
    pub fn security(kind: &'static str, operation: &str, message: String) -> Self {
        Self::Security(SecurityEvent {
            event: "security",
            timestamp_ms: now_ms(),
            kind,
            operation: operation.to_string(),
            message,
        })
    }

    /// Builds a procedure log event.
    #[must_use]
    pub fn procedure_log(level: LogLevel, message: &str, data: Option<Value>) -> Self {
        Self::ProcedureLog(ProcedureLogEvent {
            event: "procedure_log",
            timestamp_ms: now_ms(),
            level,
            message: message.to_string(),
            data,
        })
    }

    /// Builds a lifecycle event; `failure` carries the error kind label and
    /// sanitized message.
    #[must_use]
    pub fn lifecycle(
        phase: LifecyclePhase,
        project: &str,
        calls: usize,
        failure: Option<(&'static str, String)>,
    ) -> Self {
        let (error_kind, message) = failure.unzip();
        Self::Lifecycle(SetupLifecycleEvent {
            event: "setup_lifecycle",
            timestamp_ms: now_ms(),
            phase,
            project: project.to_string(),
            calls,
            error_kind,
            message,
        })
    }

    /// Returns the event identifier.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CapabilityCall(event) => event.event,
            Self::Security(event) => event.event,
            Self::ProcedureLog(event) => event.event,
            Self::Lifecycle(event) => event.event,
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for sandbox events.
pub trait SandboxAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &SandboxAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl SandboxAuditSink for StderrAuditSink {
    fn record(&self, event: &SandboxAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl SandboxAuditSink for FileAuditSink {
    fn record(&self, event: &SandboxAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl SandboxAuditSink for NoopAuditSink {
    fn record(&self, _event: &SandboxAuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<SandboxAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SandboxAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the events whose identifier equals `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<SandboxAuditEvent> {
        self.events().into_iter().filter(|event| event.name() == name).collect()
    }
}

impl SandboxAuditSink for MemoryAuditSink {
    fn record(&self, event: &SandboxAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
