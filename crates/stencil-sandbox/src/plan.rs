// crates/stencil-sandbox/src/plan.rs
// ============================================================================
// Module: Setup Plans
// Description: Declarative JSON setup plans and the host that runs them.
// Purpose: Provide a built-in script host that needs no code execution.
// Dependencies: serde, serde_json, stencil-core
// ============================================================================

//! ## Overview
//! A setup plan is a JSON document `{"steps": [...]}` where each step names a
//! capability operation through its `op` field plus that operation's
//! arguments. String arguments are rendered against the context token table
//! before the plan runs, and the whole plan is parsed before the first step
//! executes, so a malformed step never leaves a half-applied project.
//!
//! A step may carry `"when": "value"` (default dimension or raw token) or
//! `"when": "dimension=value"`; it is skipped unless the guard holds.
//!
//! [`PlanHost`] loads `<author_assets_dir>/setup.json` through the sandbox's
//! own file surface, or runs a document supplied by the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use stencil_core::Context;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::SearchPattern;
use stencil_core::SetOptions;
use stencil_core::render::render_tokens;

use crate::capabilities::Capabilities;
use crate::capabilities::OptionsCapability;
use crate::procedure::HostOutcome;
use crate::procedure::ProcedureError;
use crate::procedure::ScriptHost;
use crate::procedure::SetupProcedure;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Plan file name inside the author assets directory.
pub const PLAN_FILE_NAME: &str = "setup.json";

/// Maximum number of steps in one plan.
pub const MAX_PLAN_STEPS: usize = 1024;

/// Operation label for plan loading errors.
const LOAD_OPERATION: &str = "plan.load";

// ============================================================================
// SECTION: Plan Model
// ============================================================================

/// One plan step: an optional guard plus a capability action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanStep {
    /// Option guard; the step runs only when it holds.
    #[serde(default)]
    pub when: Option<String>,
    /// Capability action.
    #[serde(flatten)]
    pub action: PlanAction,
}

/// Capability operation invoked by a plan step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op")]
pub enum PlanAction {
    /// `files.write`
    #[serde(rename = "files.write")]
    FilesWrite {
        /// Target path.
        path: String,
        /// File contents.
        contents: String,
    },
    /// `files.copy`
    #[serde(rename = "files.copy")]
    FilesCopy {
        /// Source path.
        from: String,
        /// Target path.
        to: String,
        /// Replace an existing target.
        #[serde(default)]
        overwrite: bool,
    },
    /// `files.move`
    #[serde(rename = "files.move")]
    FilesMove {
        /// Source path.
        from: String,
        /// Target path.
        to: String,
        /// Replace an existing target.
        #[serde(default)]
        overwrite: bool,
    },
    /// `files.remove`
    #[serde(rename = "files.remove")]
    FilesRemove {
        /// Path to remove.
        path: String,
    },
    /// `files.ensure_dirs`
    #[serde(rename = "files.ensure_dirs")]
    FilesEnsureDirs {
        /// Directories to create.
        paths: Vec<String>,
    },
    /// `json.set`
    #[serde(rename = "json.set")]
    JsonSet {
        /// JSON file.
        file: String,
        /// Path expression.
        path: String,
        /// Value to set.
        value: Value,
        /// Create or replace missing intermediates.
        #[serde(default = "default_true")]
        create_missing: bool,
    },
    /// `json.merge`
    #[serde(rename = "json.merge")]
    JsonMerge {
        /// JSON file.
        file: String,
        /// Object merged into the document.
        patch: Value,
    },
    /// `json.remove`
    #[serde(rename = "json.remove")]
    JsonRemove {
        /// JSON file.
        file: String,
        /// Path expression.
        path: String,
    },
    /// `json.add_to_array`
    #[serde(rename = "json.add_to_array")]
    JsonAddToArray {
        /// JSON file.
        file: String,
        /// Path expression of the array.
        path: String,
        /// Items to append.
        items: Vec<Value>,
        /// Skip items already present.
        #[serde(default)]
        unique: bool,
    },
    /// `json.merge_array`
    #[serde(rename = "json.merge_array")]
    JsonMergeArray {
        /// JSON file.
        file: String,
        /// Path expression of the array.
        path: String,
        /// Items to append or upsert.
        items: Vec<Value>,
        /// Upsert key field.
        #[serde(default)]
        merge_key: Option<String>,
    },
    /// `text.insert_after`
    #[serde(rename = "text.insert_after")]
    TextInsertAfter {
        /// Text file.
        file: String,
        /// Anchor marker.
        marker: String,
        /// Block to insert.
        block: String,
    },
    /// `text.ensure_block`
    #[serde(rename = "text.ensure_block")]
    TextEnsureBlock {
        /// Text file.
        file: String,
        /// Anchor marker.
        marker: String,
        /// Block to ensure.
        block: String,
    },
    /// `text.replace_between`
    #[serde(rename = "text.replace_between")]
    TextReplaceBetween {
        /// Text file.
        file: String,
        /// Start marker.
        start: String,
        /// End marker.
        end: String,
        /// Replacement block.
        block: String,
    },
    /// `text.append_lines`
    #[serde(rename = "text.append_lines")]
    TextAppendLines {
        /// Text file.
        file: String,
        /// Lines to append.
        lines: Vec<String>,
    },
    /// `text.replace`
    #[serde(rename = "text.replace")]
    TextReplace {
        /// Text file.
        file: String,
        /// Literal or regex search.
        search: SearchPattern,
        /// Replacement text.
        replacement: String,
        /// Fail when nothing matches.
        #[serde(default)]
        ensure_match: bool,
    },
    /// `templates.render_file`
    #[serde(rename = "templates.render_file")]
    TemplatesRenderFile {
        /// Source file.
        source: String,
        /// Target file; renders in place when absent.
        #[serde(default)]
        target: Option<String>,
    },
    /// `templates.copy_assets`
    #[serde(rename = "templates.copy_assets")]
    TemplatesCopyAssets {
        /// Subdirectory of the author assets directory.
        from: String,
        /// Target path.
        to: String,
        /// Replace an existing target.
        #[serde(default)]
        overwrite: bool,
    },
    /// `placeholders.apply`
    #[serde(rename = "placeholders.apply")]
    PlaceholdersApply {
        /// File globs.
        patterns: Vec<String>,
    },
    /// `placeholders.apply_file`
    #[serde(rename = "placeholders.apply_file")]
    PlaceholdersApplyFile {
        /// Target file.
        file: String,
    },
    /// `log.info`
    #[serde(rename = "log.info")]
    LogInfo {
        /// Message.
        message: String,
        /// Optional structured data.
        #[serde(default)]
        data: Option<Value>,
    },
    /// `log.warn`
    #[serde(rename = "log.warn")]
    LogWarn {
        /// Message.
        message: String,
        /// Optional structured data.
        #[serde(default)]
        data: Option<Value>,
    },
    /// `options.require`
    #[serde(rename = "options.require")]
    OptionsRequire {
        /// Dimension; the default dimension when absent.
        #[serde(default)]
        dimension: Option<String>,
        /// Required value.
        value: String,
    },
}

/// Serde default for flags that are on unless disabled.
const fn default_true() -> bool {
    true
}

/// Top-level plan document before step parsing.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanDocument {
    /// Free-form description, ignored at run time.
    #[serde(default)]
    #[allow(dead_code, reason = "Accepted for authoring; never read.")]
    description: Option<String>,
    /// Raw steps.
    steps: Vec<Value>,
}

/// Parsed setup plan.
///
/// # Invariants
/// - Every step parsed successfully after token rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupPlan {
    /// Steps in execution order.
    steps: Vec<PlanStep>,
}

impl SetupPlan {
    /// Parses `document`, rendering string arguments against `tokens`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for malformed documents or steps.
    pub fn parse(document: Value, tokens: &BTreeMap<String, String>) -> SandboxResult<Self> {
        let document: PlanDocument = serde_json::from_value(document).map_err(|err| {
            SandboxError::validation(LOAD_OPERATION, format!("invalid setup plan: {err}"))
        })?;
        if document.steps.len() > MAX_PLAN_STEPS {
            return Err(SandboxError::validation(
                LOAD_OPERATION,
                format!("setup plan exceeds {MAX_PLAN_STEPS} steps"),
            ));
        }
        let mut steps = Vec::with_capacity(document.steps.len());
        for (index, mut raw) in document.steps.into_iter().enumerate() {
            render_strings(&mut raw, tokens);
            let step: PlanStep = serde_json::from_value(raw).map_err(|err| {
                SandboxError::validation(LOAD_OPERATION, format!("step {index}: {err}"))
            })?;
            steps.push(step);
        }
        Ok(Self {
            steps,
        })
    }

    /// Returns the parsed steps.
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }
}

impl SetupProcedure for SetupPlan {
    fn run(&self, _context: &Context, capabilities: &Capabilities) -> Result<(), ProcedureError> {
        for step in &self.steps {
            if guard_holds(step.when.as_deref(), capabilities.options()) {
                execute(&step.action, capabilities)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Runs one action through the capability surfaces.
fn execute(action: &PlanAction, caps: &Capabilities) -> SandboxResult<()> {
    let no_extra = BTreeMap::new();
    match action {
        PlanAction::FilesWrite {
            path,
            contents,
        } => caps.files().write(path, contents),
        PlanAction::FilesCopy {
            from,
            to,
            overwrite,
        } => caps.files().copy(from, to, *overwrite).map(drop),
        PlanAction::FilesMove {
            from,
            to,
            overwrite,
        } => caps.files().move_to(from, to, *overwrite),
        PlanAction::FilesRemove {
            path,
        } => caps.files().remove(path).map(drop),
        PlanAction::FilesEnsureDirs {
            paths,
        } => caps.files().ensure_dirs(paths),
        PlanAction::JsonSet {
            file,
            path,
            value,
            create_missing,
        } => caps.json().set(
            file,
            path,
            value.clone(),
            SetOptions {
                create_missing: *create_missing,
            },
        ),
        PlanAction::JsonMerge {
            file,
            patch,
        } => caps.json().merge(file, patch.clone()).map(drop),
        PlanAction::JsonRemove {
            file,
            path,
        } => caps.json().remove(file, path).map(drop),
        PlanAction::JsonAddToArray {
            file,
            path,
            items,
            unique,
        } => caps.json().add_to_array(file, path, items.clone(), *unique).map(drop),
        PlanAction::JsonMergeArray {
            file,
            path,
            items,
            merge_key,
        } => caps.json().merge_array(file, path, items.clone(), merge_key.as_deref()),
        PlanAction::TextInsertAfter {
            file,
            marker,
            block,
        } => caps.text().insert_after(file, marker, block).map(drop),
        PlanAction::TextEnsureBlock {
            file,
            marker,
            block,
        } => caps.text().ensure_block(file, marker, block).map(drop),
        PlanAction::TextReplaceBetween {
            file,
            start,
            end,
            block,
        } => caps.text().replace_between(file, start, end, block).map(drop),
        PlanAction::TextAppendLines {
            file,
            lines,
        } => caps.text().append_lines(file, lines),
        PlanAction::TextReplace {
            file,
            search,
            replacement,
            ensure_match,
        } => caps.text().replace(file, search, replacement, *ensure_match).map(drop),
        PlanAction::TemplatesRenderFile {
            source,
            target,
        } => caps.templates().render_file(source, target.as_deref(), &no_extra).map(drop),
        PlanAction::TemplatesCopyAssets {
            from,
            to,
            overwrite,
        } => caps.templates().copy_assets(from, to, *overwrite).map(drop),
        PlanAction::PlaceholdersApply {
            patterns,
        } => caps.placeholders().apply(patterns, &no_extra).map(drop),
        PlanAction::PlaceholdersApplyFile {
            file,
        } => caps.placeholders().apply_file(file, &no_extra).map(drop),
        PlanAction::LogInfo {
            message,
            data,
        } => {
            match data {
                Some(data) => caps.logger().info_with(message, data.clone()),
                None => caps.logger().info(message),
            }
            Ok(())
        }
        PlanAction::LogWarn {
            message,
            data,
        } => {
            match data {
                Some(data) => caps.logger().warn_with(message, data.clone()),
                None => caps.logger().warn(message),
            }
            Ok(())
        }
        PlanAction::OptionsRequire {
            dimension,
            value,
        } => match dimension {
            Some(dimension) => caps.options().require(dimension, value),
            None => caps.options().require_default(value),
        },
    }
}

/// Evaluates a step guard.
fn guard_holds(when: Option<&str>, options: &OptionsCapability) -> bool {
    let Some(expression) = when.map(str::trim) else {
        return true;
    };
    match expression.split_once('=') {
        Some((dimension, value)) => options.is_in(dimension.trim(), value.trim()),
        None => options.has(expression),
    }
}

/// Renders every string inside `value` in place; object keys are untouched.
fn render_strings(value: &mut Value, tokens: &BTreeMap<String, String>) {
    match value {
        Value::String(text) => {
            let rendered = render_tokens(text, tokens);
            if rendered.replaced > 0 {
                *text = rendered.text;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| render_strings(item, tokens)),
        Value::Object(map) => map.values_mut().for_each(|item| render_strings(item, tokens)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

// ============================================================================
// SECTION: Plan Host
// ============================================================================

/// Where a [`PlanHost`] finds its plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanSource {
    /// `<author_assets_dir>/setup.json` inside the project.
    Assets,
    /// A document supplied by the caller.
    Document(Value),
}

/// Script host that runs declarative setup plans.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanHost {
    /// Plan location.
    source: PlanSource,
}

impl PlanHost {
    /// Host that loads the plan from the author assets directory.
    #[must_use]
    pub const fn from_assets() -> Self {
        Self {
            source: PlanSource::Assets,
        }
    }

    /// Host that runs `document`.
    #[must_use]
    pub const fn from_document(document: Value) -> Self {
        Self {
            source: PlanSource::Document(document),
        }
    }
}

impl ScriptHost for PlanHost {
    fn invoke(
        &self,
        context: &Context,
        capabilities: &Capabilities,
    ) -> Result<HostOutcome, ProcedureError> {
        let document = match &self.source {
            PlanSource::Document(document) => document.clone(),
            PlanSource::Assets => {
                let path = format!("{}/{PLAN_FILE_NAME}", context.author_assets_dir());
                if !capabilities.files().exists(&path)? {
                    return Ok(HostOutcome::NoProcedure);
                }
                capabilities.json().read(&path)?
            }
        };
        let plan = SetupPlan::parse(document, &context.token_values())?;
        plan.run(context, capabilities)?;
        Ok(HostOutcome::Ran)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
