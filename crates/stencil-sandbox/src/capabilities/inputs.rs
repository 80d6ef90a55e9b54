// crates/stencil-sandbox/src/capabilities/inputs.rs
// ============================================================================
// Module: Inputs Capability
// Description: Read-only access to the context's placeholder inputs.
// Purpose: Let procedures query user inputs with fallbacks.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Inputs are served from the frozen context; lookups never touch the
//! filesystem and are not audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use stencil_core::InputValue;

use crate::scope::Scope;

// ============================================================================
// SECTION: Inputs Capability
// ============================================================================

/// Read-only view over context inputs.
#[derive(Clone)]
pub struct InputsCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl InputsCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Returns the input named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.scope.context().inputs().get(name)
    }

    /// Returns the input named `name` as a string, or `fallback`.
    #[must_use]
    pub fn get_or(&self, name: &str, fallback: &str) -> String {
        self.get(name).map_or_else(|| fallback.to_string(), ToString::to_string)
    }

    /// Returns every input.
    #[must_use]
    pub fn all(&self) -> &BTreeMap<String, InputValue> {
        self.scope.context().inputs()
    }
}
