// crates/stencil-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for input parsing and bounded reads.
// Purpose: Ensure CLI inputs fail closed on malformed or oversized data.
// Dependencies: stencil-cli main helpers
// ============================================================================

//! ## Overview
//! Validates `parse_inputs`, `read_bytes_with_limit`, and template metadata
//! loading.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use serde_json::json;
use stencil_core::InputValue;

use super::ReadLimitError;
use super::load_template;
use super::parse_inputs;
use super::read_bytes_with_limit;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn parse_inputs_splits_on_first_equals() {
    let inputs =
        parse_inputs(&[String::from("AUTHOR=Ada"), String::from("URL=a=b")]).unwrap();
    assert_eq!(inputs.get("AUTHOR"), Some(&InputValue::from("Ada")));
    assert_eq!(inputs.get("URL"), Some(&InputValue::from("a=b")));
}

#[test]
fn parse_inputs_rejects_missing_separator_and_duplicates() {
    assert!(parse_inputs(&[String::from("AUTHOR")]).is_err());
    let err =
        parse_inputs(&[String::from("A=1"), String::from("A=2")]).unwrap_err();
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.json");
    fs::write(&path, vec![b' '; 32]).unwrap();
    let err = read_bytes_with_limit(&path, 16).unwrap_err();
    assert!(matches!(err, ReadLimitError::TooLarge { size: 32, limit: 16 }));
    assert_eq!(read_bytes_with_limit(&path, 32).unwrap().len(), 32);
}

#[test]
fn template_metadata_defaults_constants_to_an_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("template.json");
    fs::write(
        &path,
        json!({"dimensions": {"database": {"type": "single", "values": ["none", "sqlite"]}}})
            .to_string(),
    )
    .unwrap();
    let metadata = load_template(&path).unwrap();
    assert_eq!(metadata.constants, json!({}));
    assert!(metadata.dimensions.contains_key("database"));
}

#[test]
fn template_metadata_rejects_unknown_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("template.json");
    fs::write(&path, json!({"dimension": {}}).to_string()).unwrap();
    assert!(load_template(&path).is_err());
}
