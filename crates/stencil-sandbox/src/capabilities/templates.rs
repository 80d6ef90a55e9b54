// crates/stencil-sandbox/src/capabilities/templates.rs
// ============================================================================
// Module: Templates Capability
// Description: Token rendering for strings and files plus author asset copies.
// Purpose: Render `{{NAME}}` tokens and materialize author-supplied assets.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Rendering substitutes the context token table (inputs plus
//! `PROJECT_NAME`) overlaid with caller-supplied extras. Unknown tokens are
//! left in place; `render_file` records a warning naming them. Asset copies read only from the reserved author assets
//! directory; a subdirectory that resolves outside it is a boundary error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use stencil_core::Context;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::render::referenced_tokens;
use stencil_core::render::render_tokens;

use crate::audit::LogLevel;
use crate::audit::SandboxAuditEvent;
use crate::scope::Scope;

// ============================================================================
// SECTION: Templates Capability
// ============================================================================

/// Template rendering scoped to the project root.
#[derive(Clone)]
pub struct TemplatesCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl TemplatesCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Renders `template` against the token table.
    #[must_use]
    pub fn render_string(&self, template: &str, extra: &BTreeMap<String, String>) -> String {
        let values = token_table(self.scope.context(), extra);
        render_tokens(template, &values).text
    }

    /// Lists the well-formed tokens in `template` that the token table
    /// cannot resolve, in first-use order.
    #[must_use]
    pub fn unresolved_tokens(
        &self,
        template: &str,
        extra: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let values = token_table(self.scope.context(), extra);
        unresolved(template, &values)
    }

    /// Renders `source` into `target` (or in place when `target` is `None`).
    ///
    /// Returns the number of tokens substituted. The target is written only
    /// when the rendered text differs from what it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] when `source` is missing.
    pub fn render_file(
        &self,
        source: &str,
        target: Option<&str>,
        extra: &BTreeMap<String, String>,
    ) -> SandboxResult<usize> {
        const OPERATION: &str = "templates.render_file";
        let result = self.scope.resolve(source, OPERATION).and_then(|resolved_source| {
            let resolved_target = match target {
                Some(target) => self.scope.resolve(target, OPERATION)?,
                None => resolved_source.clone(),
            };
            let content = self.scope.fs().read_string(&resolved_source, OPERATION)?;
            let values = token_table(self.scope.context(), extra);
            let rendered = render_tokens(&content, &values);
            let missing = unresolved(&content, &values);
            if !missing.is_empty() {
                self.scope.record(&SandboxAuditEvent::procedure_log(
                    LogLevel::Warn,
                    "unresolved template tokens",
                    Some(json!({"file": source, "tokens": missing})),
                ));
            }
            let existing = if resolved_target == resolved_source {
                Some(content)
            } else {
                self.scope.fs().read_string_optional(&resolved_target, OPERATION)?
            };
            if existing.as_deref() != Some(rendered.text.as_str()) {
                self.scope.fs().write(&resolved_target, rendered.text.as_bytes(), OPERATION)?;
            }
            Ok(rendered.replaced)
        });
        self.scope.finish(OPERATION, Some(source), result)
    }

    /// Copies `<author_assets_dir>/<subdir>` into `target`.
    ///
    /// Returns the number of files copied.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Boundary`] when `subdir` escapes the assets
    /// directory and [`SandboxError::Conflict`] when the target exists and
    /// `overwrite` is false.
    pub fn copy_assets(&self, subdir: &str, target: &str, overwrite: bool) -> SandboxResult<usize> {
        const OPERATION: &str = "templates.copy_assets";
        let assets = self.scope.context().author_assets_dir();
        let result = self.scope.resolve(&format!("{assets}/{subdir}"), OPERATION).and_then(
            |source| {
                if !source.relative().starts_with(assets) {
                    return Err(SandboxError::boundary(OPERATION, subdir, "escapes_assets"));
                }
                let destination = self.scope.resolve(target, OPERATION)?;
                self.scope.fs().copy(&source, &destination, overwrite, OPERATION)
            },
        );
        self.scope.finish(OPERATION, Some(subdir), result)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the context token table overlaid with `extra`.
pub(crate) fn token_table(
    context: &Context,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut values = context.token_values();
    values.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    values
}

/// Filters the tokens referenced by `template` down to those absent from
/// `values`.
fn unresolved(template: &str, values: &BTreeMap<String, String>) -> Vec<String> {
    referenced_tokens(template).into_iter().filter(|name| !values.contains_key(name)).collect()
}
