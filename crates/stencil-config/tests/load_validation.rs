//! Config load validation tests for stencil-config.
// crates/stencil-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, ranges).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

#![allow(clippy::missing_docs_in_private_items, reason = "Test helpers are self-describing.")]

use std::io::Write;
use std::path::Path;

use stencil_config::AuditSinkKind;
use stencil_config::CONFIG_ENV_VAR;
use stencil_config::ConfigError;
use stencil_config::StencilConfig;
use stencil_sandbox::SandboxAuditEvent;
use stencil_sandbox::SandboxLimits;
use stencil_sandbox::SandboxSettings;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<StencilConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

// ============================================================================
// SECTION: Load Guards
// ============================================================================

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(StencilConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(
        StencilConfig::load(Some(Path::new(&long_component))),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(StencilConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(StencilConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_rejects_missing_explicit_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(StencilConfig::load(Some(&path)), "config io error")
}

#[test]
fn load_without_default_file_yields_defaults() -> TestResult {
    if std::env::var_os(CONFIG_ENV_VAR).is_some() || Path::new("stencil.toml").exists() {
        return Ok(());
    }
    let config = StencilConfig::load(None).map_err(|err| err.to_string())?;
    if config != StencilConfig::default() {
        return Err("expected default config".to_string());
    }
    Ok(())
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let file = write_config("[limits]\nmax_file_byte = 10\n")?;
    assert_invalid(StencilConfig::load(Some(file.path())), "config parse error")
}

// ============================================================================
// SECTION: Sections
// ============================================================================

#[test]
fn empty_config_matches_sandbox_defaults() -> TestResult {
    let config = StencilConfig::from_toml("").map_err(|err| err.to_string())?;
    if config.sandbox_limits() != SandboxLimits::default() {
        return Err("limits differ from sandbox defaults".to_string());
    }
    if config.sandbox_settings() != SandboxSettings::default() {
        return Err("settings differ from sandbox defaults".to_string());
    }
    if config.audit.sink != AuditSinkKind::Stderr {
        return Err("audit sink should default to stderr".to_string());
    }
    Ok(())
}

#[test]
fn full_config_round_trips_into_sandbox_types() -> TestResult {
    let file = write_config(
        r#"
[limits]
max_file_bytes = 1048576
max_inputs = 32
max_json_depth = 16

[sandbox]
ignore_entries = [".git", "target"]
author_assets_dir = "_setup"
default_dimension = "extras"

[audit]
sink = "none"
"#,
    )?;
    let config = StencilConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let limits = config.sandbox_limits();
    if limits.max_file_bytes != 1_048_576 || limits.max_inputs != 32 || limits.max_json_depth != 16
    {
        return Err("limits were not applied".to_string());
    }
    if limits.max_tree_entries != SandboxLimits::default().max_tree_entries {
        return Err("unset limits should keep defaults".to_string());
    }
    let settings = config.sandbox_settings();
    if settings.ignore_entries != [".git", "target"]
        || settings.author_assets_dir != "_setup"
        || settings.default_dimension != "extras"
    {
        return Err("sandbox settings were not applied".to_string());
    }
    if config.source.as_deref() != Some(file.path()) {
        return Err("source path not recorded".to_string());
    }
    Ok(())
}

#[test]
fn limits_out_of_range_are_rejected() -> TestResult {
    assert_invalid(
        StencilConfig::from_toml("[limits]\nmax_file_bytes = 0\n"),
        "limits.max_file_bytes must be greater than zero",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[limits]\nmax_file_bytes = 67108865\n"),
        "limits.max_file_bytes must be at most",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[limits]\nmax_json_depth = 5000\n"),
        "limits.max_json_depth must be at most",
    )
}

#[test]
fn sandbox_names_are_validated() -> TestResult {
    assert_invalid(
        StencilConfig::from_toml("[sandbox]\nignore_entries = [\"a/b\"]\n"),
        "sandbox.ignore_entries contains invalid name",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[sandbox]\nignore_entries = [\"..\"]\n"),
        "sandbox.ignore_entries contains invalid name",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[sandbox]\nauthor_assets_dir = \"../up\"\n"),
        "sandbox.author_assets_dir must be a single directory name",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[sandbox]\ndefault_dimension = \"\"\n"),
        "sandbox.default_dimension must be an identifier",
    )
}

// ============================================================================
// SECTION: Audit
// ============================================================================

#[test]
fn file_sink_requires_path() -> TestResult {
    assert_invalid(
        StencilConfig::from_toml("[audit]\nsink = \"file\"\n"),
        "audit.path is required for the file sink",
    )?;
    assert_invalid(
        StencilConfig::from_toml("[audit]\nsink = \"stderr\"\npath = \"audit.jsonl\"\n"),
        "audit.path is only valid for the file sink",
    )
}

#[test]
fn file_sink_appends_json_lines() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let log = dir.path().join("audit.jsonl");
    let toml = format!("[audit]\nsink = \"file\"\npath = '{}'\n", log.display());
    let config = StencilConfig::from_toml(&toml).map_err(|err| err.to_string())?;
    let sink = config.audit.build_sink().map_err(|err| err.to_string())?;
    sink.record(&SandboxAuditEvent::security("boundary", "files.write", String::from("denied")));
    sink.record(&SandboxAuditEvent::security("boundary", "files.read", String::from("denied")));
    let content = std::fs::read_to_string(&log).map_err(|err| err.to_string())?;
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() != 2 || !lines.iter().all(|line| line.contains("\"event\":\"security\"")) {
        return Err(format!("unexpected audit log: {content}"));
    }
    Ok(())
}
