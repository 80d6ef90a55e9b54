// crates/stencil-sandbox/src/limits.rs
// ============================================================================
// Module: Sandbox Limits
// Description: Resource limits and housekeeping settings for the sandbox.
// Purpose: Carry configured bounds into capability surfaces as plain values.
// Dependencies: stencil-core
// ============================================================================

//! ## Overview
//! Hosts translate their configuration into [`SandboxLimits`] and
//! [`SandboxSettings`]; the sandbox never parses configuration itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use stencil_core::boundary::DEFAULT_MAX_PATH_LENGTH;
use stencil_core::options::DEFAULT_MULTI_DIMENSION;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum file size read or written by capabilities.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 8 * 1024 * 1024;
/// Hard ceiling for [`SandboxLimits::max_file_bytes`].
pub const MAX_FILE_BYTES_CEILING: u64 = 64 * 1024 * 1024;
/// Default maximum number of placeholder inputs.
pub const DEFAULT_MAX_INPUTS: usize = 256;
/// Default maximum input value length in bytes.
pub const DEFAULT_MAX_INPUT_VALUE_LENGTH: usize = 16 * 1024;
/// Default maximum JSON nesting depth.
pub const DEFAULT_MAX_JSON_DEPTH: usize = 128;
/// Default maximum number of entries visited by a tree walk.
pub const DEFAULT_MAX_TREE_ENTRIES: usize = 100_000;
/// Default author assets directory name.
pub const DEFAULT_AUTHOR_ASSETS_DIR: &str = "__scaffold__";
/// Default housekeeping entries skipped by copy, move, and listing.
pub const DEFAULT_IGNORE_ENTRIES: [&str; 3] = [".git", "node_modules", ".DS_Store"];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Resource limits enforced by capability surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
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

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            max_inputs: DEFAULT_MAX_INPUTS,
            max_input_value_length: DEFAULT_MAX_INPUT_VALUE_LENGTH,
            max_json_depth: DEFAULT_MAX_JSON_DEPTH,
            max_tree_entries: DEFAULT_MAX_TREE_ENTRIES,
        }
    }
}

/// Non-limit sandbox settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    /// Entry names skipped by copy, move, and listing.
    pub ignore_entries: Vec<String>,
    /// Author assets directory name inside the project.
    pub author_assets_dir: String,
    /// Name of the default multi-valued dimension.
    pub default_dimension: String,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            ignore_entries: DEFAULT_IGNORE_ENTRIES.iter().map(ToString::to_string).collect(),
            author_assets_dir: DEFAULT_AUTHOR_ASSETS_DIR.to_string(),
            default_dimension: DEFAULT_MULTI_DIMENSION.to_string(),
        }
    }
}

impl SandboxSettings {
    /// Returns true when `name` is a housekeeping entry.
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_entries.iter().any(|entry| entry == name)
    }
}
