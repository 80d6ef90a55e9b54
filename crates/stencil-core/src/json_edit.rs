// crates/stencil-core/src/json_edit.rs
// ============================================================================
// Module: JSON Document Editing
// Description: Path-addressed read, set, remove, and array edits on JSON trees.
// Purpose: Implement structured-data mutations independent of storage.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Documents are modelled as [`serde_json::Value`] trees and walked segment by
//! segment. Writers (`set`, `add_to_array`, `merge_array`) create missing
//! intermediate containers on demand, choosing an array when the *next*
//! segment is an index and an object otherwise. Arrays auto-extend with `null`
//! holes up to the addressed index. `remove` treats missing intermediates as a
//! no-op.
//!
//! An intermediate whose existing shape is incompatible with the next segment
//! is a [`SandboxError::Conflict`]. The single exception is `set` with
//! `create_missing` enabled, which replaces scalar intermediates (never a
//! container of the wrong kind).
//!
//! On error the document may be partially edited; callers discard it instead
//! of persisting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::SandboxError;
use crate::error::SandboxResult;
use crate::json_path::JsonPath;
use crate::json_path::PathSegment;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Options for [`set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SetOptions {
    /// Create missing intermediates and replace scalar intermediates.
    #[serde(default = "default_true")]
    pub create_missing: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            create_missing: true,
        }
    }
}

/// Serde default helper for boolean flags that default to `true`.
const fn default_true() -> bool {
    true
}

/// How intermediate containers are treated during a write walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    /// Missing intermediates are an error.
    Strict,
    /// Missing intermediates are created; scalars are a conflict.
    Create,
    /// Missing intermediates are created; scalars are replaced.
    CreateReplacingScalars,
}

// ============================================================================
// SECTION: Read
// ============================================================================

/// Returns the value addressed by `path`, if present.
#[must_use]
pub fn get<'a>(document: &'a Value, path: &JsonPath) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.segments() {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

// ============================================================================
// SECTION: Write Operations
// ============================================================================

/// Sets `value` at `path`, creating intermediates per `options`.
///
/// # Errors
///
/// Returns [`SandboxError::Conflict`] for incompatible shapes and
/// [`SandboxError::NotFound`] for missing intermediates when
/// `create_missing` is disabled.
pub fn set(
    document: &mut Value,
    path: &JsonPath,
    value: Value,
    options: SetOptions,
    operation: &str,
) -> SandboxResult<()> {
    let mode =
        if options.create_missing { WalkMode::CreateReplacingScalars } else { WalkMode::Strict };
    let slot = walk_to_slot(document, path, mode, operation)?;
    *slot = value;
    Ok(())
}

/// Removes the value at `path`, returning it when present.
///
/// Array elements are spliced out so later elements shift down.
///
/// # Errors
///
/// Returns [`SandboxError::Conflict`] when an existing intermediate has an
/// incompatible shape.
pub fn remove(
    document: &mut Value,
    path: &JsonPath,
    operation: &str,
) -> SandboxResult<Option<Value>> {
    let (parents, last) = path.split_last();
    let mut current = document;
    for segment in parents {
        let next = match (segment, current) {
            (_, Value::Null) => return Ok(None),
            (PathSegment::Key(key), Value::Object(map)) => map.get_mut(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get_mut(*index),
            (segment, other) => return Err(shape_conflict(operation, segment, other)),
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    match (last, current) {
        (_, Value::Null) => Ok(None),
        (PathSegment::Key(key), Value::Object(map)) => Ok(map.shift_remove(key.as_str())),
        (PathSegment::Index(index), Value::Array(items)) => {
            if *index < items.len() {
                Ok(Some(items.remove(*index)))
            } else {
                Ok(None)
            }
        }
        (segment, other) => Err(shape_conflict(operation, segment, other)),
    }
}

/// Appends `items` to the array at `path`, creating it when missing.
///
/// With `unique`, items deep-equal to an existing element (or to an item
/// appended earlier in the same call) are skipped. Returns the number of
/// appended items.
///
/// # Errors
///
/// Returns [`SandboxError::Conflict`] when the target exists and is not an
/// array, or an intermediate has an incompatible shape.
pub fn add_to_array(
    document: &mut Value,
    path: &JsonPath,
    items: Vec<Value>,
    unique: bool,
    operation: &str,
) -> SandboxResult<usize> {
    let target = array_slot(document, path, operation)?;
    let mut appended = 0;
    for item in items {
        if unique && target.contains(&item) {
            continue;
        }
        target.push(item);
        appended += 1;
    }
    Ok(appended)
}

/// Appends `items` to the array at `path`, upserting by `merge_key`.
///
/// When `merge_key` is set and an item is an object carrying that key, the
/// first existing object element with an equal key value is shallow-merged
/// with the item instead of appending a duplicate.
///
/// # Errors
///
/// Returns [`SandboxError::Conflict`] when the target exists and is not an
/// array, or an intermediate has an incompatible shape.
pub fn merge_array(
    document: &mut Value,
    path: &JsonPath,
    items: Vec<Value>,
    merge_key: Option<&str>,
    operation: &str,
) -> SandboxResult<()> {
    let target = array_slot(document, path, operation)?;
    for item in items {
        let existing = match (merge_key, &item) {
            (Some(key), Value::Object(fields)) => fields.get(key).and_then(|wanted| {
                target.iter().position(|element| {
                    element.as_object().and_then(|object| object.get(key)) == Some(wanted)
                })
            }),
            _ => None,
        };
        match (existing, item) {
            (Some(position), Value::Object(fields)) => {
                if let Some(Value::Object(object)) = target.get_mut(position) {
                    for (field, value) in fields {
                        object.insert(field, value);
                    }
                }
            }
            (_, item) => target.push(item),
        }
    }
    Ok(())
}

/// Recursively merges `patch` into `target`.
///
/// Objects merge key by key; every other combination replaces the target.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Verifies that `value` does not nest deeper than `max_depth`.
///
/// # Errors
///
/// Returns [`SandboxError::Validation`] when the document is too deep.
pub fn check_depth(value: &Value, max_depth: usize, operation: &str) -> SandboxResult<()> {
    let mut stack = vec![(value, 1_usize)];
    while let Some((current, depth)) = stack.pop() {
        if depth > max_depth {
            return Err(SandboxError::validation(
                operation,
                format!("document nesting exceeds {max_depth} levels"),
            ));
        }
        match current {
            Value::Array(items) => stack.extend(items.iter().map(|item| (item, depth + 1))),
            Value::Object(map) => stack.extend(map.values().map(|item| (item, depth + 1))),
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Walks to the array addressed by `path`, creating it when missing.
fn array_slot<'a>(
    document: &'a mut Value,
    path: &JsonPath,
    operation: &str,
) -> SandboxResult<&'a mut Vec<Value>> {
    let slot = walk_to_slot(document, path, WalkMode::Create, operation)?;
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        other => Err(SandboxError::conflict(
            operation,
            format!("target at {path} is {}, expected array", kind_name(other)),
        )),
    }
}

/// Walks to the slot addressed by `path`, inserting a `null` leaf if absent.
fn walk_to_slot<'a>(
    document: &'a mut Value,
    path: &JsonPath,
    mode: WalkMode,
    operation: &str,
) -> SandboxResult<&'a mut Value> {
    if document.is_null() {
        *document = Value::Object(Map::new());
    }
    if !document.is_object() {
        return Err(SandboxError::conflict(
            operation,
            format!("document root is {}, expected object", kind_name(document)),
        ));
    }
    let segments = path.segments();
    let mut current = document;
    for (position, segment) in segments.iter().enumerate() {
        current = step_into(current, segment, operation)?;
        if let Some(next) = segments.get(position + 1) {
            prepare_container(current, next, mode, operation, segment)?;
        }
    }
    Ok(current)
}

/// Steps from a container into the child addressed by `segment`.
fn step_into<'a>(
    current: &'a mut Value,
    segment: &PathSegment,
    operation: &str,
) -> SandboxResult<&'a mut Value> {
    match (segment, current) {
        (PathSegment::Key(key), Value::Object(map)) => {
            Ok(map.entry(key.clone()).or_insert(Value::Null))
        }
        (PathSegment::Index(index), Value::Array(items)) => {
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            Ok(&mut items[*index])
        }
        (segment, other) => Err(shape_conflict(operation, segment, other)),
    }
}

/// Ensures `value` is a container able to accept `next`.
fn prepare_container(
    value: &mut Value,
    next: &PathSegment,
    mode: WalkMode,
    operation: &str,
    at: &PathSegment,
) -> SandboxResult<()> {
    let fresh = || if next.is_index() { Value::Array(Vec::new()) } else { Value::Object(Map::new()) };
    match value {
        Value::Null => {
            if mode == WalkMode::Strict {
                return Err(SandboxError::not_found(
                    operation,
                    format!("missing intermediate container at {at}"),
                ));
            }
            *value = fresh();
            Ok(())
        }
        Value::Object(_) if !next.is_index() => Ok(()),
        Value::Array(_) if next.is_index() => Ok(()),
        Value::Object(_) | Value::Array(_) => Err(shape_conflict(operation, next, value)),
        _ => {
            if mode == WalkMode::CreateReplacingScalars {
                *value = fresh();
                return Ok(());
            }
            Err(shape_conflict(operation, next, value))
        }
    }
}

/// Builds the conflict error for a segment applied to the wrong shape.
fn shape_conflict(operation: &str, segment: &PathSegment, found: &Value) -> SandboxError {
    let expected = if segment.is_index() { "array" } else { "object" };
    SandboxError::conflict(
        operation,
        format!("segment {segment} expects {expected} but found {}", kind_name(found)),
    )
}

/// Returns a short type label for a JSON value.
const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
