// crates/stencil-sandbox/src/capabilities/json.rs
// ============================================================================
// Module: JSON Capability
// Description: Path-addressed edits of JSON files inside the project.
// Purpose: Persist structured-data edits with size and depth limits.
// Dependencies: serde_json, stencil-core
// ============================================================================

//! ## Overview
//! Each call loads the file, applies one `stencil_core::json_edit` operation,
//! and writes the result back pretty-printed with a trailing newline. Path
//! expressions are parsed per call. Writers treat a missing file as an empty
//! object; `remove` on a missing file is a no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use stencil_core::JsonPath;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::SetOptions;
use stencil_core::ValidatedPath;
use stencil_core::json_edit;

use crate::scope::Scope;

// ============================================================================
// SECTION: JSON Capability
// ============================================================================

/// JSON document operations scoped to the project root.
#[derive(Clone)]
pub struct JsonCapability {
    /// Shared capability scope.
    scope: Arc<Scope>,
}

impl JsonCapability {
    /// Creates the surface over `scope`.
    pub(crate) const fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
        }
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] for missing files and
    /// [`SandboxError::Validation`] for invalid or too deeply nested JSON.
    pub fn read(&self, file: &str) -> SandboxResult<Value> {
        const OPERATION: &str = "json.read";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            self.load(&resolved, OPERATION)?
                .ok_or_else(|| SandboxError::not_found(OPERATION, resolved.display_relative()))
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Reads a JSON file, returning `default` when it does not exist.
    ///
    /// # Errors
    ///
    /// Parse failures still fail.
    pub fn read_or(&self, file: &str, default: Value) -> SandboxResult<Value> {
        const OPERATION: &str = "json.read_or";
        let result = self
            .scope
            .resolve(file, OPERATION)
            .and_then(|resolved| self.load(&resolved, OPERATION))
            .map(|loaded| loaded.unwrap_or(default));
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Returns the value at `path` in `file`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] for missing files and
    /// [`SandboxError::Validation`] for malformed path expressions.
    pub fn get(&self, file: &str, path: &str) -> SandboxResult<Option<Value>> {
        const OPERATION: &str = "json.get";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let expression = JsonPath::parse(path, OPERATION)?;
            let document = self
                .load(&resolved, OPERATION)?
                .ok_or_else(|| SandboxError::not_found(OPERATION, resolved.display_relative()))?;
            Ok(json_edit::get(&document, &expression).cloned())
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Writes `value` pretty-printed with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for oversized or too deeply
    /// nested documents.
    pub fn write(&self, file: &str, value: &Value) -> SandboxResult<()> {
        const OPERATION: &str = "json.write";
        let result = self
            .scope
            .resolve(file, OPERATION)
            .and_then(|resolved| self.save(&resolved, value, OPERATION));
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Recursively merges the object `patch` into the file's contents.
    ///
    /// Returns the merged document.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when `patch` is not an object and
    /// [`SandboxError::Conflict`] when the file holds a non-object document.
    pub fn merge(&self, file: &str, patch: Value) -> SandboxResult<Value> {
        const OPERATION: &str = "json.merge";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            if !patch.is_object() {
                return Err(SandboxError::validation(OPERATION, "merge patch must be an object"));
            }
            let mut document = self.load_object(&resolved, OPERATION)?;
            json_edit::deep_merge(&mut document, patch);
            self.save(&resolved, &document, OPERATION)?;
            Ok(document)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Loads the document, hands `edit` a working copy, and persists the
    /// result.
    ///
    /// `edit` may mutate the copy in place or return a replacement document.
    /// A missing file starts as an empty object. Nothing is written when
    /// `edit` fails.
    ///
    /// # Errors
    ///
    /// Returns load and save errors, or the error returned by `edit`.
    pub fn update<F>(&self, file: &str, edit: F) -> SandboxResult<Value>
    where
        F: FnOnce(&mut Value) -> SandboxResult<Option<Value>>,
    {
        const OPERATION: &str = "json.update";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let mut working = self.load(&resolved, OPERATION)?.unwrap_or_else(empty_object);
            let document = edit(&mut working)?.unwrap_or(working);
            self.save(&resolved, &document, OPERATION)?;
            Ok(document)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Sets `value` at the path expression `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Conflict`] for incompatible shapes and
    /// [`SandboxError::Validation`] for malformed expressions.
    pub fn set(
        &self,
        file: &str,
        path: &str,
        value: Value,
        options: SetOptions,
    ) -> SandboxResult<()> {
        const OPERATION: &str = "json.set";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let expression = JsonPath::parse(path, OPERATION)?;
            let mut document = self.load_object(&resolved, OPERATION)?;
            json_edit::set(&mut document, &expression, value, options, OPERATION)?;
            self.save(&resolved, &document, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Removes the value at `path`, returning it when present.
    ///
    /// Missing files and missing intermediates are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Conflict`] for incompatible shapes.
    pub fn remove(&self, file: &str, path: &str) -> SandboxResult<Option<Value>> {
        const OPERATION: &str = "json.remove";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let expression = JsonPath::parse(path, OPERATION)?;
            let Some(mut document) = self.load(&resolved, OPERATION)? else {
                return Ok(None);
            };
            let removed = json_edit::remove(&mut document, &expression, OPERATION)?;
            if removed.is_some() {
                self.save(&resolved, &document, OPERATION)?;
            }
            Ok(removed)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Appends `items` to the array at `path`; returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Conflict`] when the target is not an array.
    pub fn add_to_array(
        &self,
        file: &str,
        path: &str,
        items: Vec<Value>,
        unique: bool,
    ) -> SandboxResult<usize> {
        const OPERATION: &str = "json.add_to_array";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let expression = JsonPath::parse(path, OPERATION)?;
            let mut document = self.load_object(&resolved, OPERATION)?;
            let added =
                json_edit::add_to_array(&mut document, &expression, items, unique, OPERATION)?;
            self.save(&resolved, &document, OPERATION)?;
            Ok(added)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    /// Appends `items` to the array at `path`, upserting by `merge_key`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Conflict`] when the target is not an array.
    pub fn merge_array(
        &self,
        file: &str,
        path: &str,
        items: Vec<Value>,
        merge_key: Option<&str>,
    ) -> SandboxResult<()> {
        const OPERATION: &str = "json.merge_array";
        let result = self.scope.resolve(file, OPERATION).and_then(|resolved| {
            let expression = JsonPath::parse(path, OPERATION)?;
            let mut document = self.load_object(&resolved, OPERATION)?;
            json_edit::merge_array(&mut document, &expression, items, merge_key, OPERATION)?;
            self.save(&resolved, &document, OPERATION)
        });
        self.scope.finish(OPERATION, Some(file), result)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Loads and parses a document; `None` when the file is missing.
    fn load(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<Option<Value>> {
        let Some(bytes) = self.scope.fs().read_optional(path, operation)? else {
            return Ok(None);
        };
        let document: Value = serde_json::from_slice(&bytes).map_err(|err| {
            SandboxError::validation(
                operation,
                format!(
                    "{} is not valid JSON (line {}, column {})",
                    path.display_relative(),
                    err.line(),
                    err.column()
                ),
            )
        })?;
        json_edit::check_depth(&document, self.scope.limits().max_json_depth, operation)?;
        Ok(Some(document))
    }

    /// Loads a document for editing; a missing file is an empty object.
    fn load_object(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<Value> {
        let document = self.load(path, operation)?.unwrap_or_else(empty_object);
        if !document.is_object() {
            return Err(SandboxError::conflict(
                operation,
                format!("{} does not hold a JSON object", path.display_relative()),
            ));
        }
        Ok(document)
    }

    /// Serializes and atomically writes a document.
    fn save(&self, path: &ValidatedPath, document: &Value, operation: &str) -> SandboxResult<()> {
        json_edit::check_depth(document, self.scope.limits().max_json_depth, operation)?;
        let mut text = serde_json::to_string_pretty(document).map_err(|_| {
            SandboxError::validation(operation, "document could not be serialized")
        })?;
        text.push('\n');
        self.scope.fs().write(path, text.as_bytes(), operation)
    }
}

/// Returns an empty JSON object.
fn empty_object() -> Value {
    Value::Object(Map::new())
}
