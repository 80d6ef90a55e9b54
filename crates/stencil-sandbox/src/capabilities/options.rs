// crates/stencil-sandbox/src/capabilities/options.rs
// ============================================================================
// Module: Options Capability
// Description: Query surface over normalized template options.
// Purpose: Let procedures branch on user-selected dimension values.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Delegates to [`NormalizedOptions`] held by the frozen context. The
//! single-argument forms consult the default multi dimension.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use stencil_core::NormalizedOptions;
use stencil_core::SandboxResult;

use crate::scope::Scope;

// ============================================================================
// SECTION: Options Capability
// ============================================================================

/// Read-only options queries.
#[derive(Clone)]
pub struct OptionsCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl OptionsCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Returns the context's normalized options.
    fn options(&self) -> &NormalizedOptions {
        self.scope.context().options()
    }

    /// Returns true when `value` is selected in the default multi dimension
    /// or appears as a raw token.
    #[must_use]
    pub fn has(&self, value: &str) -> bool {
        self.options().has(value)
    }

    /// Returns true when `dimension` selects `value`.
    #[must_use]
    pub fn is_in(&self, dimension: &str, value: &str) -> bool {
        self.options().is_in(dimension, value)
    }

    /// Lists the selection of `dimension`; `None` lists the default dimension.
    #[must_use]
    pub fn list(&self, dimension: Option<&str>) -> Vec<String> {
        self.options().list(dimension)
    }

    /// Fails unless `dimension` selects `value`.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::Validation`] when the value is
    /// not selected.
    pub fn require(&self, dimension: &str, value: &str) -> SandboxResult<()> {
        self.options().require(dimension, value)
    }

    /// Fails unless the default multi dimension selects `value`.
    ///
    /// # Errors
    ///
    /// Returns [`stencil_core::SandboxError::Validation`] when the default
    /// dimension is not declared or does not select the value.
    pub fn require_default(&self, value: &str) -> SandboxResult<()> {
        self.options().require_default(value)
    }

    /// Runs `action` only when [`OptionsCapability::has`] is true.
    pub fn when<R>(&self, value: &str, action: impl FnOnce() -> R) -> Option<R> {
        self.options().when(value, action)
    }

    /// Returns the raw option tokens.
    #[must_use]
    pub fn raw(&self) -> &[String] {
        self.options().raw()
    }
}
