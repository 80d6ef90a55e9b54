// crates/stencil-sandbox/src/scope.rs
// ============================================================================
// Module: Capability Scope
// Description: Shared boundary, filesystem, and audit plumbing for surfaces.
// Purpose: Give every capability one chokepoint for path resolution and audit.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! A [`Scope`] binds a `ProjectRoot` to its [`ProjectFs`], the stateless
//! [`BoundaryResolver`], and the audit sink. Capability surfaces hold an
//! `Arc<Scope>` and route every path through [`Scope::resolve`] and every
//! call outcome through [`Scope::finish`]. The scope is crate-private; no
//! surface hands it, the resolver, or the directory handle to callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use stencil_core::BoundaryResolver;
use stencil_core::Context;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::ValidatedPath;

use crate::audit::SandboxAuditEvent;
use crate::audit::SandboxAuditSink;
use crate::fs::ProjectFs;
use crate::limits::SandboxLimits;
use crate::limits::SandboxSettings;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Per-invocation capability scope.
pub(crate) struct Scope {
    /// Frozen setup context.
    context: Arc<Context>,
    /// Stateless boundary resolver.
    resolver: BoundaryResolver,
    /// Root-bound filesystem.
    fs: ProjectFs,
    /// Configured limits.
    limits: SandboxLimits,
    /// Audit sink.
    audit: Arc<dyn SandboxAuditSink>,
    /// Number of capability calls made.
    calls: AtomicUsize,
}

impl Scope {
    /// Opens a scope on the context's project root.
    pub(crate) fn open(
        context: Arc<Context>,
        limits: SandboxLimits,
        settings: &SandboxSettings,
        audit: Arc<dyn SandboxAuditSink>,
    ) -> SandboxResult<Self> {
        let fs = ProjectFs::open(context.project_dir(), &limits, settings)?;
        Ok(Self {
            context,
            resolver: BoundaryResolver::new(limits.max_path_length),
            fs,
            limits,
            audit,
            calls: AtomicUsize::new(0),
        })
    }

    /// Returns the frozen context.
    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the filesystem handle.
    pub(crate) const fn fs(&self) -> &ProjectFs {
        &self.fs
    }

    /// Returns configured limits.
    pub(crate) const fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Returns the number of capability calls recorded so far.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Resolves `relative` against the project root.
    pub(crate) fn resolve(&self, relative: &str, operation: &str) -> SandboxResult<ValidatedPath> {
        self.resolver.resolve(self.context.project_dir(), relative, operation)
    }

    /// Returns the validated path of the project root itself.
    pub(crate) fn root(&self) -> ValidatedPath {
        self.resolver.root_path(self.context.project_dir())
    }

    /// Records a security event for boundary failures.
    fn security(&self, err: &SandboxError) {
        if let SandboxError::Boundary {
            operation,
            path,
            reason,
        } = err
        {
            self.audit.record(&SandboxAuditEvent::security(
                "boundary_violation",
                operation,
                format!("{reason}: {path}"),
            ));
        }
    }

    /// Counts the call and records its outcome.
    ///
    /// Boundary violations are recorded as security events before the call
    /// event.
    pub(crate) fn finish<T>(
        &self,
        operation: &str,
        path: Option<&str>,
        result: SandboxResult<T>,
    ) -> SandboxResult<T> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = &result {
            self.security(err);
        }
        let event = SandboxAuditEvent::capability_call(operation, path, result.as_ref().err());
        self.audit.record(&event);
        result
    }

    /// Records an arbitrary audit event.
    pub(crate) fn record(&self, event: &SandboxAuditEvent) {
        self.audit.record(event);
    }
}
