// crates/stencil-config/src/config.rs
// ============================================================================
// Module: Stencil Configuration
// Description: Configuration loading and validation for Stencil.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, stencil-core, stencil-sandbox, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path is taken from the caller, then `STENCIL_CONFIG`, then
//! `stencil.toml` in the working directory. Only the last of these may be
//! absent, in which case defaults apply. Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use stencil_core::context::is_directory_name;
use stencil_core::options::is_identifier;
use stencil_sandbox::FileAuditSink;
use stencil_sandbox::NoopAuditSink;
use stencil_sandbox::SandboxAuditSink;
use stencil_sandbox::SandboxLimits;
use stencil_sandbox::SandboxSettings;
use stencil_sandbox::StderrAuditSink;
use stencil_sandbox::limits::MAX_FILE_BYTES_CEILING;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stencil.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STENCIL_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `limits.max_path_length`.
pub(crate) const MAX_PATH_LENGTH_CEILING: usize = 4096;
/// Upper bound for `limits.max_inputs`.
pub(crate) const MAX_INPUTS_CEILING: usize = 4096;
/// Upper bound for `limits.max_input_value_length`.
pub(crate) const MAX_INPUT_VALUE_LENGTH_CEILING: usize = 1024 * 1024;
/// Upper bound for `limits.max_json_depth`.
pub(crate) const MAX_JSON_DEPTH_CEILING: usize = 1024;
/// Upper bound for `limits.max_tree_entries`.
pub(crate) const MAX_TREE_ENTRIES_CEILING: usize = 1_000_000;
/// Maximum number of housekeeping entries.
pub(crate) const MAX_IGNORE_ENTRIES: usize = 64;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Root configuration for Stencil.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StencilConfig {
    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Sandbox housekeeping settings.
    #[serde(default)]
    pub sandbox: SandboxConfig,
    /// Audit routing.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Path the configuration was loaded from, if any (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl StencilConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, required) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml(content)?;
        config.source = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.sandbox.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the sandbox limits.
    #[must_use]
    pub const fn sandbox_limits(&self) -> SandboxLimits {
        self.limits.to_limits()
    }

    /// Returns the sandbox settings.
    #[must_use]
    pub fn sandbox_settings(&self) -> SandboxSettings {
        self.sandbox.to_settings()
    }
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// `[limits]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum file size in bytes.
    pub max_file_bytes: u64,
    /// Maximum relative path length in bytes.
    pub max_path_length: usize,
    /// Maximum number of placeholder inputs.
    pub max_inputs: usize,
    /// Maximum placeholder value length in bytes.
    pub max_input_value_length: usize,
    /// Maximum JSON nesting depth.
    pub max_json_depth: usize,
    /// Maximum entries visited by a single tree walk.
    pub max_tree_entries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            max_file_bytes: limits.max_file_bytes,
            max_path_length: limits.max_path_length,
            max_inputs: limits.max_inputs,
            max_input_value_length: limits.max_input_value_length,
            max_json_depth: limits.max_json_depth,
            max_tree_entries: limits.max_tree_entries,
        }
    }
}

impl LimitsConfig {
    /// Validates every limit against its ceiling.
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("limits.max_file_bytes", self.max_file_bytes, MAX_FILE_BYTES_CEILING)?;
        check_range(
            "limits.max_path_length",
            to_u64(self.max_path_length),
            to_u64(MAX_PATH_LENGTH_CEILING),
        )?;
        check_range("limits.max_inputs", to_u64(self.max_inputs), to_u64(MAX_INPUTS_CEILING))?;
        check_range(
            "limits.max_input_value_length",
            to_u64(self.max_input_value_length),
            to_u64(MAX_INPUT_VALUE_LENGTH_CEILING),
        )?;
        check_range(
            "limits.max_json_depth",
            to_u64(self.max_json_depth),
            to_u64(MAX_JSON_DEPTH_CEILING),
        )?;
        check_range(
            "limits.max_tree_entries",
            to_u64(self.max_tree_entries),
            to_u64(MAX_TREE_ENTRIES_CEILING),
        )
    }

    /// Converts the section into sandbox limits.
    const fn to_limits(&self) -> SandboxLimits {
        SandboxLimits {
            max_file_bytes: self.max_file_bytes,
            max_path_length: self.max_path_length,
            max_inputs: self.max_inputs,
            max_input_value_length: self.max_input_value_length,
            max_json_depth: self.max_json_depth,
            max_tree_entries: self.max_tree_entries,
        }
    }
}

// ============================================================================
// SECTION: Sandbox
// ============================================================================

/// `[sandbox]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Entry names skipped by copy, move, and tree walks.
    pub ignore_entries: Vec<String>,
    /// Author assets directory name inside the project.
    pub author_assets_dir: String,
    /// Name of the default multi-valued dimension.
    pub default_dimension: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let settings = SandboxSettings::default();
        Self {
            ignore_entries: settings.ignore_entries,
            author_assets_dir: settings.author_assets_dir,
            default_dimension: settings.default_dimension,
        }
    }
}

impl SandboxConfig {
    /// Validates names in the section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ignore_entries.len() > MAX_IGNORE_ENTRIES {
            return Err(ConfigError::Invalid("too many sandbox.ignore_entries".to_string()));
        }
        for entry in &self.ignore_entries {
            let separator = entry.contains('/') || entry.contains('\\');
            if entry.is_empty() || separator || entry == "." || entry == ".." {
                return Err(ConfigError::Invalid(format!(
                    "sandbox.ignore_entries contains invalid name '{entry}'"
                )));
            }
            if entry.len() > MAX_PATH_COMPONENT_LENGTH {
                return Err(ConfigError::Invalid(
                    "sandbox.ignore_entries name too long".to_string(),
                ));
            }
        }
        if !is_directory_name(&self.author_assets_dir) {
            return Err(ConfigError::Invalid(format!(
                "sandbox.author_assets_dir must be a single directory name (got '{}')",
                self.author_assets_dir
            )));
        }
        if !is_identifier(&self.default_dimension) {
            return Err(ConfigError::Invalid(format!(
                "sandbox.default_dimension must be an identifier (got '{}')",
                self.default_dimension
            )));
        }
        Ok(())
    }

    /// Converts the section into sandbox settings.
    fn to_settings(&self) -> SandboxSettings {
        SandboxSettings {
            ignore_entries: self.ignore_entries.clone(),
            author_assets_dir: self.author_assets_dir.clone(),
            default_dimension: self.default_dimension.clone(),
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

/// `[audit]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    pub sink: AuditSinkKind,
    /// Log file path for the `file` sink.
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates sink and path consistency.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn SandboxAuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::File, Some(path)) => {
                let sink =
                    FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag is false only for the implicit default.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Rejects zero and values above `ceiling`.
fn check_range(field: &str, value: u64, ceiling: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    if value > ceiling {
        return Err(ConfigError::Invalid(format!("{field} must be at most {ceiling}")));
    }
    Ok(())
}

/// Widens a count for range checks.
fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
