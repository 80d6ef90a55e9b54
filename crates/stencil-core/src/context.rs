// crates/stencil-core/src/context.rs
// ============================================================================
// Module: Setup Context
// Description: Immutable snapshot of project identity, inputs, and options.
// Purpose: Give setup procedures read-only access to invocation state.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Context`] is built once from a [`ContextSpec`] before the setup
//! procedure runs. Construction validates every field; afterwards only read
//! accessors exist, so neither the procedure nor any capability can mutate
//! it. Hosts share it behind an `Arc`.
//!
//! Security posture: every field originates from user or template input and
//! is validated here before any capability object is built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::boundary::ProjectRoot;
use crate::error::SandboxError;
use crate::error::SandboxResult;
use crate::options::NormalizedOptions;
use crate::render::is_token_name;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum project name length.
pub const MAX_PROJECT_NAME_LENGTH: usize = 214;
/// Token name under which the project name is always available.
pub const PROJECT_NAME_TOKEN: &str = "PROJECT_NAME";
/// Operation label for context validation errors.
const OPERATION: &str = "context";

// ============================================================================
// SECTION: Types
// ============================================================================

/// How the template was authored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthoringMode {
    /// Template files are the project files.
    #[default]
    Direct,
    /// Template is assembled from author assets by the setup procedure.
    Composable,
}

impl AuthoringMode {
    /// Returns the stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Composable => "composable",
        }
    }
}

/// Placeholder input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// String value.
    String(String),
}

impl InputValue {
    /// Returns the string payload for string values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Bool(_) | Self::Number(_) => None,
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Unvalidated context fields supplied by the host.
#[derive(Debug, Clone)]
pub struct ContextSpec {
    /// Project name.
    pub project_name: String,
    /// Canonical project root.
    pub project_dir: ProjectRoot,
    /// Invocation working directory.
    pub cwd: PathBuf,
    /// Authoring mode.
    pub authoring_mode: AuthoringMode,
    /// Author assets directory name inside the template.
    pub author_assets_dir: String,
    /// Placeholder inputs.
    pub inputs: BTreeMap<String, InputValue>,
    /// Template constants.
    pub constants: Value,
    /// Normalized options.
    pub options: NormalizedOptions,
}

/// Immutable setup context.
///
/// # Invariants
/// - `project_name` satisfies [`validate_project_name`].
/// - `author_assets_dir` satisfies [`is_directory_name`].
/// - Every input key is a valid token name.
/// - `constants` is a JSON object.
#[derive(Debug, Clone)]
pub struct Context {
    /// Validated project name.
    project_name: String,
    /// Canonical project root.
    project_dir: ProjectRoot,
    /// Invocation working directory.
    cwd: PathBuf,
    /// Authoring mode.
    authoring_mode: AuthoringMode,
    /// Author assets directory name.
    author_assets_dir: String,
    /// Placeholder inputs ordered by name.
    inputs: BTreeMap<String, InputValue>,
    /// Template constants.
    constants: Value,
    /// Normalized options.
    options: NormalizedOptions,
}

impl Context {
    /// Validates `spec` and freezes it into a context.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when any field is malformed.
    pub fn new(spec: ContextSpec) -> SandboxResult<Self> {
        validate_project_name(&spec.project_name)?;
        if !is_directory_name(&spec.author_assets_dir) {
            return Err(SandboxError::validation(
                OPERATION,
                "author assets directory must be a plain directory name",
            ));
        }
        if let Some(bad) = spec.inputs.keys().find(|key| !is_token_name(key)) {
            return Err(SandboxError::validation(
                OPERATION,
                format!("input name '{bad}' is not a valid token name"),
            ));
        }
        let constants = match spec.constants {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::Object(map) => Value::Object(map),
            _ => {
                return Err(SandboxError::validation(OPERATION, "constants must be a JSON object"));
            }
        };
        Ok(Self {
            project_name: spec.project_name,
            project_dir: spec.project_dir,
            cwd: spec.cwd,
            authoring_mode: spec.authoring_mode,
            author_assets_dir: spec.author_assets_dir,
            inputs: spec.inputs,
            constants,
            options: spec.options,
        })
    }

    /// Returns the project name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Returns the canonical project root.
    #[must_use]
    pub const fn project_dir(&self) -> &ProjectRoot {
        &self.project_dir
    }

    /// Returns the invocation working directory.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Returns the authoring mode.
    #[must_use]
    pub const fn authoring_mode(&self) -> AuthoringMode {
        self.authoring_mode
    }

    /// Returns the author assets directory name.
    #[must_use]
    pub fn author_assets_dir(&self) -> &str {
        &self.author_assets_dir
    }

    /// Returns placeholder inputs.
    #[must_use]
    pub const fn inputs(&self) -> &BTreeMap<String, InputValue> {
        &self.inputs
    }

    /// Returns template constants.
    #[must_use]
    pub const fn constants(&self) -> &Value {
        &self.constants
    }

    /// Returns normalized options.
    #[must_use]
    pub const fn options(&self) -> &NormalizedOptions {
        &self.options
    }

    /// Returns the token table used for rendering: every input as a string
    /// plus [`PROJECT_NAME_TOKEN`] unless an input overrides it.
    #[must_use]
    pub fn token_values(&self) -> BTreeMap<String, String> {
        let mut values: BTreeMap<String, String> =
            self.inputs.iter().map(|(key, value)| (key.clone(), value.to_string())).collect();
        values
            .entry(PROJECT_NAME_TOKEN.to_string())
            .or_insert_with(|| self.project_name.clone());
        values
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a project name.
///
/// Accepted names are non-empty, at most [`MAX_PROJECT_NAME_LENGTH`] bytes,
/// start with an ASCII letter, digit, or `@`, and contain only ASCII
/// alphanumerics, `-`, `_`, `.`, `@`, and at most one `/` (scoped names).
///
/// # Errors
///
/// Returns [`SandboxError::Validation`] for names outside that grammar.
pub fn validate_project_name(name: &str) -> SandboxResult<()> {
    let invalid = |reason: &str| {
        SandboxError::validation(OPERATION, format!("invalid project name: {reason}"))
    };
    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_PROJECT_NAME_LENGTH {
        return Err(invalid("too long"));
    }
    let Some(first) = name.chars().next() else {
        return Err(invalid("empty"));
    };
    if !(first.is_ascii_alphanumeric() || first == '@') {
        return Err(invalid("must start with a letter, digit, or '@'"));
    }
    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '@' | '/')) {
        return Err(invalid("contains unsupported characters"));
    }
    if name.matches('/').count() > 1 || name.ends_with('/') || name.contains("/.") {
        return Err(invalid("malformed scope"));
    }
    Ok(())
}

/// Returns true for a single directory name without separators or dot prefix.
#[must_use]
pub fn is_directory_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use serde_json::json;

    use super::*;
    use crate::options::DEFAULT_MULTI_DIMENSION;
    use crate::options::DimensionSet;
    use crate::options::RawOptions;

    fn spec(root: &Path) -> ContextSpec {
        ContextSpec {
            project_name: String::from("demo-app"),
            project_dir: ProjectRoot::new(root).unwrap(),
            cwd: root.to_path_buf(),
            authoring_mode: AuthoringMode::Direct,
            author_assets_dir: String::from("__scaffold__"),
            inputs: BTreeMap::from([(String::from("AUTHOR"), InputValue::from("Ada"))]),
            constants: json!({"license": "MIT"}),
            options: DimensionSet::default()
                .normalize(&RawOptions::default(), DEFAULT_MULTI_DIMENSION)
                .unwrap(),
        }
    }

    #[test]
    fn builds_context_and_exposes_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new(spec(dir.path())).unwrap();
        let tokens = context.token_values();
        assert_eq!(tokens["AUTHOR"], "Ada");
        assert_eq!(tokens[PROJECT_NAME_TOKEN], "demo-app");
        assert_eq!(context.constants()["license"], "MIT");
    }

    #[test]
    fn rejects_bad_project_names() {
        for name in ["", "../x", ".hidden", "a b", "@scope/", "a/b/c", "x/.y"] {
            assert!(validate_project_name(name).is_err(), "{name}");
        }
        for name in ["demo", "@scope/pkg", "my_app.v2"] {
            assert!(validate_project_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_separator_in_assets_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = spec(dir.path());
        bad.author_assets_dir = String::from("a/b");
        assert!(Context::new(bad).is_err());
    }

    #[test]
    fn rejects_non_object_constants_and_bad_input_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = spec(dir.path());
        bad.constants = json!([1, 2]);
        assert!(Context::new(bad).is_err());

        let mut bad = spec(dir.path());
        bad.inputs.insert(String::from("not valid"), InputValue::from("x"));
        assert!(Context::new(bad).is_err());
    }

    #[test]
    fn input_values_render_as_plain_text() {
        let value: InputValue = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(value.to_string(), "3");
        let value: InputValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(value.to_string(), "true");
        assert_eq!(InputValue::from("x").as_str(), Some("x"));
    }
}
