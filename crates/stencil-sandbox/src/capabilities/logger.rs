// crates/stencil-sandbox/src/capabilities/logger.rs
// ============================================================================
// Module: Logger Capability
// Description: Structured info/warn logging for setup procedures.
// Purpose: Route procedure messages to the audit sink only.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Messages become `procedure_log` audit events. The logger has no other
//! output channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;

use crate::audit::LogLevel;
use crate::audit::SandboxAuditEvent;
use crate::scope::Scope;

// ============================================================================
// SECTION: Logger Capability
// ============================================================================

/// Procedure logger backed by the audit sink.
#[derive(Clone)]
pub struct LoggerCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl LoggerCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Logs an informational message.
    pub fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message, None);
    }

    /// Logs an informational message with structured data.
    pub fn info_with(&self, message: &str, data: Value) {
        self.emit(LogLevel::Info, message, Some(data));
    }

    /// Logs a warning.
    pub fn warn(&self, message: &str) {
        self.emit(LogLevel::Warn, message, None);
    }

    /// Logs a warning with structured data.
    pub fn warn_with(&self, message: &str, data: Value) {
        self.emit(LogLevel::Warn, message, Some(data));
    }

    /// Records one procedure log event.
    fn emit(&self, level: LogLevel, message: &str, data: Option<Value>) {
        self.scope.record(&SandboxAuditEvent::procedure_log(level, message, data));
    }
}
