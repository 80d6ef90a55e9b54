// crates/stencil-sandbox/src/capabilities.rs
// ============================================================================
// Module: Capabilities
// Description: The composed capability object handed to setup procedures.
// Purpose: Bundle every surface over one shared, crate-private scope.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! [`Capabilities`] owns one surface per concern. Every surface shares the
//! same scope, so all of them are bound to the same project root, limits, and
//! audit sink. No accessor exposes the scope, the boundary resolver, or the
//! directory handle.
//!
//! Security posture: setup procedures are semi-trusted; the surfaces are the
//! only filesystem access they receive.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod files;
pub mod inputs;
pub mod json;
pub mod logger;
pub mod options;
pub mod placeholders;
pub mod text;
pub mod templates;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use stencil_core::Context;
use stencil_core::SandboxResult;

pub use self::files::FilesCapability;
pub use self::inputs::InputsCapability;
pub use self::json::JsonCapability;
pub use self::logger::LoggerCapability;
pub use self::options::OptionsCapability;
pub use self::placeholders::PlaceholderReport;
pub use self::placeholders::PlaceholdersCapability;
pub use self::templates::TemplatesCapability;
pub use self::text::TextCapability;
use crate::audit::SandboxAuditSink;
use crate::limits::SandboxLimits;
use crate::limits::SandboxSettings;
use crate::scope::Scope;

// ============================================================================
// SECTION: Capabilities
// ============================================================================

/// Capability object passed to a setup procedure.
///
/// # Invariants
/// - Every surface is bound to the context's project root.
/// - Surfaces expose no mutation of the context.
pub struct Capabilities {
    /// Shared scope, kept for call accounting.
    scope: Arc<Scope>,
    /// File operations.
    files: FilesCapability,
    /// JSON document operations.
    json: JsonCapability,
    /// Text marker operations.
    text: TextCapability,
    /// Template rendering.
    templates: TemplatesCapability,
    /// Placeholder substitution.
    placeholders: PlaceholdersCapability,
    /// Input accessors.
    inputs: InputsCapability,
    /// Procedure logger.
    logger: LoggerCapability,
    /// Option queries.
    options: OptionsCapability,
}

impl Capabilities {
    /// Builds every surface over the context's project root.
    ///
    /// # Errors
    ///
    /// Returns an error when the project root cannot be opened.
    pub fn new(
        context: Arc<Context>,
        limits: SandboxLimits,
        settings: &SandboxSettings,
        audit: Arc<dyn SandboxAuditSink>,
    ) -> SandboxResult<Self> {
        let scope = Arc::new(Scope::open(context, limits, settings, audit)?);
        Ok(Self {
            files: FilesCapability::new(Arc::clone(&scope)),
            json: JsonCapability::new(Arc::clone(&scope)),
            text: TextCapability::new(Arc::clone(&scope)),
            templates: TemplatesCapability::new(Arc::clone(&scope)),
            placeholders: PlaceholdersCapability::new(Arc::clone(&scope)),
            inputs: InputsCapability::new(Arc::clone(&scope)),
            logger: LoggerCapability::new(Arc::clone(&scope)),
            options: OptionsCapability::new(Arc::clone(&scope)),
            scope,
        })
    }

    /// Returns the file surface.
    #[must_use]
    pub const fn files(&self) -> &FilesCapability {
        &self.files
    }

    /// Returns the JSON surface.
    #[must_use]
    pub const fn json(&self) -> &JsonCapability {
        &self.json
    }

    /// Returns the text surface.
    #[must_use]
    pub const fn text(&self) -> &TextCapability {
        &self.text
    }

    /// Returns the template surface.
    #[must_use]
    pub const fn templates(&self) -> &TemplatesCapability {
        &self.templates
    }

    /// Returns the placeholder surface.
    #[must_use]
    pub const fn placeholders(&self) -> &PlaceholdersCapability {
        &self.placeholders
    }

    /// Returns the input surface.
    #[must_use]
    pub const fn inputs(&self) -> &InputsCapability {
        &self.inputs
    }

    /// Returns the logger surface.
    #[must_use]
    pub const fn logger(&self) -> &LoggerCapability {
        &self.logger
    }

    /// Returns the options surface.
    #[must_use]
    pub const fn options(&self) -> &OptionsCapability {
        &self.options
    }

    /// Returns the frozen context the surfaces are bound to.
    #[must_use]
    pub fn context(&self) -> &Context {
        self.scope.context()
    }

    /// Returns the number of audited capability calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.scope.calls()
    }
}
