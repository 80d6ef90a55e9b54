// crates/stencil-sandbox/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared project fixtures for stencil-sandbox tests.
// Purpose: Build throw-away projects, contexts, and capability objects.
// Dependencies: stencil-core, stencil-sandbox, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Each [`Project`] owns a temporary directory nested one level inside a
//! parent directory, so tests can plant files just outside the project root
//! and check that they stay untouched.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    dead_code,
    reason = "Shared fixtures are not used by every test binary."
)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use stencil_core::AuthoringMode;
use stencil_core::Context;
use stencil_core::ContextSpec;
use stencil_core::DimensionSet;
use stencil_core::InputValue;
use stencil_core::ProjectRoot;
use stencil_core::RawOptions;
use stencil_sandbox::Capabilities;
use stencil_sandbox::MemoryAuditSink;
use stencil_sandbox::SandboxLimits;
use stencil_sandbox::SandboxSettings;
use stencil_sandbox::SetupRequest;
use tempfile::TempDir;

// ============================================================================
// SECTION: Project Fixture
// ============================================================================

/// Temporary project plus a memory audit sink.
pub struct Project {
    outer: TempDir,
    root: PathBuf,
    pub audit: Arc<MemoryAuditSink>,
}

impl Project {
    pub fn new() -> Self {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("demo-app");
        fs::create_dir(&root).unwrap();
        Self {
            outer,
            root,
            audit: Arc::new(MemoryAuditSink::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn outside(&self) -> &Path {
        self.outer.path()
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }

    pub fn context(&self, tokens: &[&str]) -> Arc<Context> {
        let raw = RawOptions::from_tokens(tokens.iter().copied()).unwrap();
        let options = dimensions().normalize(&raw, "features").unwrap();
        let context = Context::new(ContextSpec {
            project_name: String::from("demo-app"),
            project_dir: ProjectRoot::new(&self.root).unwrap(),
            cwd: self.outer.path().to_path_buf(),
            authoring_mode: AuthoringMode::Composable,
            author_assets_dir: String::from("__scaffold__"),
            inputs: inputs(),
            constants: json!({"registry": "npm"}),
            options,
        })
        .unwrap();
        Arc::new(context)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities_with(&[], SandboxLimits::default())
    }

    pub fn capabilities_with(&self, tokens: &[&str], limits: SandboxLimits) -> Capabilities {
        let audit: Arc<dyn stencil_sandbox::SandboxAuditSink> = self.audit.clone();
        Capabilities::new(self.context(tokens), limits, &SandboxSettings::default(), audit)
            .unwrap()
    }

    pub fn request(&self, tokens: &[&str]) -> SetupRequest {
        SetupRequest {
            project_dir: self.root.clone(),
            project_name: String::from("demo-app"),
            cwd: self.outer.path().to_path_buf(),
            authoring_mode: AuthoringMode::Direct,
            inputs: inputs(),
            constants: Value::Null,
            options: RawOptions::from_tokens(tokens.iter().copied()).unwrap(),
            dimensions: dimensions(),
        }
    }

    /// Snapshot of every file below the parent directory, for escape checks.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut pending = vec![self.outer.path().to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                if entry.file_type().unwrap().is_dir() {
                    pending.push(path);
                } else {
                    files.insert(path.clone(), fs::read(&path).unwrap_or_default());
                }
            }
        }
        files
    }
}

// ============================================================================
// SECTION: Template Fixtures
// ============================================================================

pub fn inputs() -> BTreeMap<String, InputValue> {
    BTreeMap::from([
        (String::from("AUTHOR"), InputValue::from("Ada")),
        (String::from("PORT"), InputValue::Number(3000.into())),
    ])
}

pub fn dimensions() -> DimensionSet {
    let definitions = serde_json::from_value(json!({
        "database": {"type": "single", "values": ["none", "postgres", "sqlite"], "default": "none"},
        "features": {
            "type": "multi",
            "values": ["auth", "docs", "lint"],
            "default": ["lint"],
            "requires": {"auth": ["docs"]}
        }
    }))
    .unwrap();
    DimensionSet::new(definitions).unwrap()
}
