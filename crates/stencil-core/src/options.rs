// crates/stencil-core/src/options.rs
// ============================================================================
// Module: Options and Dimensions
// Description: Template dimension definitions and user option normalization.
// Purpose: Resolve raw user selections into a read-only query surface.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Templates declare [`DimensionDefinition`]s: named axes such as `database`
//! with a closed set of values. Users supply a [`RawOptions`] payload (bare
//! tokens plus per-dimension selections). [`DimensionSet::normalize`] runs a
//! single pass that coerces each declared dimension to its kind, applies
//! defaults, and passes undeclared selections through unchanged.
//!
//! `requires`/`conflicts` are declarative; [`DimensionSet::check_combination`]
//! reports violations but normalization never enforces them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SandboxError;
use crate::error::SandboxResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a dimension value identifier.
pub const MAX_DIMENSION_VALUE_LENGTH: usize = 50;
/// Maximum number of values in a single dimension.
pub const MAX_DIMENSION_VALUES: usize = 256;
/// Maximum number of raw option tokens accepted.
pub const MAX_RAW_TOKENS: usize = 256;
/// Conventional name of the default multi-valued dimension.
pub const DEFAULT_MULTI_DIMENSION: &str = "features";
/// Operation label used for option validation errors.
const OPERATION: &str = "options";

// ============================================================================
// SECTION: Dimension Definitions
// ============================================================================

/// Cardinality of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    /// Exactly one value (or none when no default is declared).
    Single,
    /// Any ordered, deduplicated subset of values.
    Multi,
}

/// Handling of selections outside the declared values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// Unknown values are a validation error.
    #[default]
    Strict,
    /// Unknown values are dropped and reported as warnings.
    Warn,
}

/// Default selection for a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionDefault {
    /// Single value default.
    One(String),
    /// Subset default for multi dimensions.
    Many(Vec<String>),
}

/// Template-declared dimension.
///
/// # Invariants
/// - After [`DimensionDefinition::validate`], `values` is non-empty and
///   deduplicated, defaults reference declared values, and conflicts are
///   never self-referential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionDefinition {
    /// Dimension name.
    #[serde(default)]
    pub name: String,
    /// Cardinality.
    #[serde(rename = "type", alias = "kind")]
    pub kind: DimensionKind,
    /// Ordered set of selectable values.
    pub values: Vec<String>,
    /// Default selection.
    #[serde(default)]
    pub default: Option<DimensionDefault>,
    /// Value to co-required values.
    #[serde(default)]
    pub requires: BTreeMap<String, Vec<String>>,
    /// Value to mutually exclusive values.
    #[serde(default)]
    pub conflicts: BTreeMap<String, Vec<String>>,
    /// Unknown value policy.
    #[serde(default)]
    pub policy: DimensionPolicy,
}

impl DimensionDefinition {
    /// Validates the definition in place, deduplicating `values`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when the definition is malformed.
    pub fn validate(&mut self) -> SandboxResult<()> {
        if !is_identifier(&self.name) {
            return Err(invalid(format!("dimension name '{}' is not an identifier", self.name)));
        }
        let mut seen = BTreeSet::new();
        self.values.retain(|value| seen.insert(value.clone()));
        if self.values.is_empty() {
            return Err(invalid(format!("dimension {} declares no values", self.name)));
        }
        if self.values.len() > MAX_DIMENSION_VALUES {
            return Err(invalid(format!("dimension {} declares too many values", self.name)));
        }
        for value in &self.values {
            if value.len() > MAX_DIMENSION_VALUE_LENGTH || !is_identifier(value) {
                return Err(invalid(format!(
                    "dimension {} value '{value}' must be an identifier of at most \
                     {MAX_DIMENSION_VALUE_LENGTH} characters",
                    self.name
                )));
            }
        }
        match (&self.default, self.kind) {
            (None, _) => {}
            (Some(DimensionDefault::One(value)), DimensionKind::Single) => {
                self.ensure_declared(value, "default")?;
            }
            (Some(DimensionDefault::Many(values)), DimensionKind::Single) => {
                return Err(invalid(format!(
                    "single dimension {} declares {} default values",
                    self.name,
                    values.len()
                )));
            }
            (Some(DimensionDefault::One(value)), DimensionKind::Multi) => {
                self.ensure_declared(value, "default")?;
            }
            (Some(DimensionDefault::Many(values)), DimensionKind::Multi) => {
                for value in values {
                    self.ensure_declared(value, "default")?;
                }
            }
        }
        for (value, required) in &self.requires {
            self.ensure_declared(value, "requires")?;
            if required.is_empty() {
                return Err(invalid(format!("dimension {} requires entry is empty", self.name)));
            }
            for needed in required {
                self.ensure_declared(needed, "requires")?;
            }
        }
        for (value, excluded) in &self.conflicts {
            self.ensure_declared(value, "conflicts")?;
            for other in excluded {
                self.ensure_declared(other, "conflicts")?;
                if other == value {
                    return Err(invalid(format!(
                        "dimension {} value {value} conflicts with itself",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns true when `value` is declared.
    #[must_use]
    pub fn declares(&self, value: &str) -> bool {
        self.values.iter().any(|declared| declared == value)
    }

    /// Returns the default selection as an ordered list.
    #[must_use]
    pub fn default_values(&self) -> Vec<String> {
        match &self.default {
            None => Vec::new(),
            Some(DimensionDefault::One(value)) => vec![value.clone()],
            Some(DimensionDefault::Many(values)) => dedupe(values.iter().cloned()),
        }
    }

    /// Fails when `value` is not declared.
    fn ensure_declared(&self, value: &str, field: &str) -> SandboxResult<()> {
        if self.declares(value) {
            return Ok(());
        }
        Err(invalid(format!("dimension {} {field} references undeclared value '{value}'", self.name)))
    }
}

// ============================================================================
// SECTION: Raw Options
// ============================================================================

/// Raw selection for a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSelection {
    /// Scalar selection.
    One(String),
    /// List selection.
    Many(Vec<String>),
}

impl RawSelection {
    /// Returns the selection as an ordered list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }
}

/// Raw option payload supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOptions {
    /// Raw option tokens in user order.
    #[serde(default)]
    pub raw: Vec<String>,
    /// Per-dimension raw selections.
    #[serde(default)]
    pub by_dimension: BTreeMap<String, RawSelection>,
}

impl RawOptions {
    /// Parses CLI-style tokens.
    ///
    /// `name=value` selects a value, `name=a+b` selects several, and bare
    /// tokens stay in [`RawOptions::raw`]. Every token is kept in `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for empty tokens, empty names or
    /// values, or too many tokens.
    pub fn from_tokens<I, S>(tokens: I) -> SandboxResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                return Err(invalid("option token is empty"));
            }
            if options.raw.len() >= MAX_RAW_TOKENS {
                return Err(invalid("too many option tokens"));
            }
            options.raw.push(token.to_string());
            let Some((name, value)) = token.split_once('=') else {
                continue;
            };
            let values: Vec<String> =
                value.split('+').map(str::trim).map(str::to_string).collect();
            if name.trim().is_empty() || values.iter().any(String::is_empty) {
                return Err(invalid(format!("option token '{token}' is malformed")));
            }
            let entry = options.by_dimension.entry(name.trim().to_string());
            match entry {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(if values.len() == 1 {
                        RawSelection::One(values[0].clone())
                    } else {
                        RawSelection::Many(values)
                    });
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let mut merged = slot.get().to_vec();
                    merged.extend(values);
                    slot.insert(RawSelection::Many(merged));
                }
            }
        }
        Ok(options)
    }
}

// ============================================================================
// SECTION: Dimension Set
// ============================================================================

/// Validated collection of dimension definitions keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionSet {
    /// Definitions keyed by dimension name.
    dimensions: BTreeMap<String, DimensionDefinition>,
}

/// A `requires` or `conflicts` violation found by
/// [`DimensionSet::check_combination`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CombinationViolation {
    /// A selected value requires another value that is not selected.
    MissingRequirement {
        /// Dimension name.
        dimension: String,
        /// Selected value.
        value: String,
        /// Required but unselected value.
        requires: String,
    },
    /// Two mutually exclusive values are both selected.
    Conflict {
        /// Dimension name.
        dimension: String,
        /// Selected value.
        value: String,
        /// Conflicting selected value.
        conflicts_with: String,
    },
}

impl DimensionSet {
    /// Validates definitions, filling each definition name from its key.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when any definition is invalid or
    /// a declared name disagrees with its key.
    pub fn new(definitions: BTreeMap<String, DimensionDefinition>) -> SandboxResult<Self> {
        let mut dimensions = BTreeMap::new();
        for (key, mut definition) in definitions {
            if definition.name.is_empty() {
                definition.name.clone_from(&key);
            }
            if definition.name != key {
                return Err(invalid(format!(
                    "dimension key '{key}' disagrees with declared name '{}'",
                    definition.name
                )));
            }
            definition.validate()?;
            dimensions.insert(key, definition);
        }
        Ok(Self {
            dimensions,
        })
    }

    /// Returns the definition for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DimensionDefinition> {
        self.dimensions.get(name)
    }

    /// Iterates over definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &DimensionDefinition> {
        self.dimensions.values()
    }

    /// Normalizes raw options against the declared dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when a strict dimension receives
    /// an undeclared value or a single dimension receives several values.
    pub fn normalize(
        &self,
        raw: &RawOptions,
        default_dimension: &str,
    ) -> SandboxResult<NormalizedOptions> {
        let mut selections = BTreeMap::new();
        let mut warnings = Vec::new();
        for definition in self.dimensions.values() {
            let requested = raw.by_dimension.get(&definition.name).map(RawSelection::to_vec);
            let selected = match requested {
                None => definition.default_values(),
                Some(values) => {
                    let mut kept = Vec::new();
                    let mut dropped = false;
                    for value in dedupe(values) {
                        if definition.declares(&value) {
                            kept.push(value);
                            continue;
                        }
                        match definition.policy {
                            DimensionPolicy::Strict => {
                                return Err(invalid(format!(
                                    "value '{value}' is not declared for dimension {}",
                                    definition.name
                                )));
                            }
                            DimensionPolicy::Warn => {
                                dropped = true;
                                warnings.push(format!(
                                    "ignoring undeclared value '{value}' for dimension {}",
                                    definition.name
                                ));
                            }
                        }
                    }
                    if kept.is_empty() && (dropped || definition.kind == DimensionKind::Single) {
                        definition.default_values()
                    } else {
                        kept
                    }
                }
            };
            let selection = match definition.kind {
                DimensionKind::Single => {
                    if selected.len() > 1 {
                        return Err(invalid(format!(
                            "dimension {} accepts a single value",
                            definition.name
                        )));
                    }
                    Selection::Single(selected.into_iter().next())
                }
                DimensionKind::Multi => Selection::Multi(selected),
            };
            selections.insert(definition.name.clone(), selection);
        }
        for (name, selection) in &raw.by_dimension {
            if !self.dimensions.contains_key(name) {
                selections.insert(name.clone(), Selection::Undeclared(selection.to_vec()));
            }
        }
        Ok(NormalizedOptions {
            raw: raw.raw.clone(),
            selections,
            default_dimension: default_dimension.to_string(),
            warnings,
        })
    }

    /// Reports `requires`/`conflicts` violations for a normalized selection.
    #[must_use]
    pub fn check_combination(&self, options: &NormalizedOptions) -> Vec<CombinationViolation> {
        let mut violations = Vec::new();
        for definition in self.dimensions.values() {
            let selected = options.list(Some(&definition.name));
            for value in &selected {
                if let Some(required) = definition.requires.get(value) {
                    for needed in required {
                        if !selected.contains(needed) {
                            violations.push(CombinationViolation::MissingRequirement {
                                dimension: definition.name.clone(),
                                value: value.clone(),
                                requires: needed.clone(),
                            });
                        }
                    }
                }
                if let Some(excluded) = definition.conflicts.get(value) {
                    for other in excluded {
                        if selected.contains(other) {
                            violations.push(CombinationViolation::Conflict {
                                dimension: definition.name.clone(),
                                value: value.clone(),
                                conflicts_with: other.clone(),
                            });
                        }
                    }
                }
            }
        }
        violations
    }
}

// ============================================================================
// SECTION: Normalized Options
// ============================================================================

/// Resolved selection for a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    /// Single dimension value, if any.
    Single(Option<String>),
    /// Ordered deduplicated multi selection.
    Multi(Vec<String>),
    /// Selection for an undeclared dimension, passed through unchanged.
    Undeclared(Vec<String>),
}

impl Selection {
    /// Returns the selection as an ordered list.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Single(value) => value.iter().cloned().collect(),
            Self::Multi(values) | Self::Undeclared(values) => values.clone(),
        }
    }

    /// Returns true when `value` is selected.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(selected) => selected.as_deref() == Some(value),
            Self::Multi(values) | Self::Undeclared(values) => {
                values.iter().any(|selected| selected == value)
            }
        }
    }
}

/// Read-only normalized options with query primitives.
///
/// # Invariants
/// - Computed once per invocation; no mutating accessors exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedOptions {
    /// Raw option tokens in user order.
    raw: Vec<String>,
    /// Selections keyed by dimension name.
    selections: BTreeMap<String, Selection>,
    /// Name of the default multi dimension used by `has`.
    #[serde(skip)]
    default_dimension: String,
    /// Warnings produced under the `warn` policy.
    #[serde(skip)]
    warnings: Vec<String>,
}

impl NormalizedOptions {
    /// Returns raw option tokens.
    #[must_use]
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Returns the per-dimension selections.
    #[must_use]
    pub const fn selections(&self) -> &BTreeMap<String, Selection> {
        &self.selections
    }

    /// Returns normalization warnings.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Checks the default multi dimension, falling back to raw tokens.
    #[must_use]
    pub fn has(&self, value: &str) -> bool {
        if let Some(selection) = self.selections.get(&self.default_dimension)
            && selection.contains(value)
        {
            return true;
        }
        self.raw.iter().any(|token| token == value)
    }

    /// Returns true when `value` is selected in `dimension`.
    #[must_use]
    pub fn is_in(&self, dimension: &str, value: &str) -> bool {
        self.selections.get(dimension).is_some_and(|selection| selection.contains(value))
    }

    /// Lists a dimension's selection, or (with `None`) the default dimension
    /// selection when declared and the raw tokens otherwise.
    #[must_use]
    pub fn list(&self, dimension: Option<&str>) -> Vec<String> {
        match dimension {
            Some(name) => self.selections.get(name).map(Selection::values).unwrap_or_default(),
            None => self
                .selections
                .get(&self.default_dimension)
                .map_or_else(|| self.raw.clone(), Selection::values),
        }
    }

    /// Fails unless `value` is selected in `dimension`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when the value is not selected.
    pub fn require(&self, dimension: &str, value: &str) -> SandboxResult<()> {
        if self.is_in(dimension, value) {
            return Ok(());
        }
        Err(SandboxError::validation(
            "options.require",
            format!("option '{value}' is required in dimension {dimension}"),
        ))
    }

    /// Fails unless `value` is selected in the default multi dimension.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] when the default dimension is not
    /// declared or the value is not selected.
    pub fn require_default(&self, value: &str) -> SandboxResult<()> {
        match self.selections.get(&self.default_dimension) {
            Some(Selection::Multi(_)) => self.require(&self.default_dimension, value),
            _ => Err(SandboxError::validation(
                "options.require",
                format!("default dimension {} is not declared as multi", self.default_dimension),
            )),
        }
    }

    /// Invokes `action` only when `has(value)` holds.
    pub fn when<R>(&self, value: &str, action: impl FnOnce() -> R) -> Option<R> {
        if self.has(value) { Some(action()) } else { None }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an options validation error.
fn invalid(message: impl Into<String>) -> SandboxError {
    SandboxError::validation(OPERATION, message)
}

/// Returns true for identifiers (`[A-Za-z0-9][A-Za-z0-9_-]*`).
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphanumeric())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

/// Deduplicates while preserving first-seen order.
fn dedupe(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.into_iter().filter(|value| seen.insert(value.clone())).collect()
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

    fn dimensions(value: serde_json::Value) -> DimensionSet {
        let definitions: BTreeMap<String, DimensionDefinition> =
            serde_json::from_value(value).unwrap();
        DimensionSet::new(definitions).unwrap()
    }

    #[test]
    fn validate_dedupes_values_and_rejects_self_conflict() {
        let mut definition: DimensionDefinition = serde_json::from_value(json!({
            "name": "db", "type": "single", "values": ["pg", "pg", "sqlite"],
            "conflicts": {"pg": ["pg"]}
        }))
        .unwrap();
        let err = definition.validate().unwrap_err();
        assert!(err.to_string().contains("conflicts with itself"));
        assert_eq!(definition.values, ["pg", "sqlite"]);
    }

    #[test]
    fn validate_rejects_default_outside_values() {
        let mut definition: DimensionDefinition = serde_json::from_value(json!({
            "name": "db", "type": "single", "values": ["pg"], "default": "mysql"
        }))
        .unwrap();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn validate_rejects_long_values() {
        let long = "x".repeat(MAX_DIMENSION_VALUE_LENGTH + 1);
        let mut definition: DimensionDefinition = serde_json::from_value(json!({
            "name": "db", "type": "single", "values": [long]
        }))
        .unwrap();
        assert!(definition.validate().is_err());
    }

    #[test]
    fn tokens_split_into_dimensions_and_raw() {
        let raw = RawOptions::from_tokens(["db=pg", "features=auth+docs", "typescript"]).unwrap();
        assert_eq!(raw.raw, ["db=pg", "features=auth+docs", "typescript"]);
        assert_eq!(raw.by_dimension["db"], RawSelection::One(String::from("pg")));
        assert_eq!(
            raw.by_dimension["features"],
            RawSelection::Many(vec![String::from("auth"), String::from("docs")])
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(RawOptions::from_tokens(["=pg"]).is_err());
        assert!(RawOptions::from_tokens(["db="]).is_err());
        assert!(RawOptions::from_tokens([" "]).is_err());
    }

    #[test]
    fn single_dimension_falls_back_to_default() {
        let set = dimensions(json!({"dim": {"type": "single", "values": ["a", "b"], "default": "a"}}));
        let options = set.normalize(&RawOptions::default(), DEFAULT_MULTI_DIMENSION).unwrap();
        assert!(options.is_in("dim", "a"));
        assert_eq!(options.list(Some("dim")), ["a"]);
    }

    #[test]
    fn strict_policy_rejects_unknown_values() {
        let set = dimensions(json!({"db": {"type": "single", "values": ["pg"]}}));
        let raw = RawOptions::from_tokens(["db=mysql"]).unwrap();
        assert!(set.normalize(&raw, DEFAULT_MULTI_DIMENSION).is_err());
    }

    #[test]
    fn warn_policy_drops_unknown_values() {
        let set = dimensions(json!({
            "features": {"type": "multi", "values": ["auth", "docs"], "policy": "warn"}
        }));
        let raw = RawOptions::from_tokens(["features=auth+bogus+auth"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        assert_eq!(options.list(Some("features")), ["auth"]);
        assert_eq!(options.warnings().len(), 1);
    }

    #[test]
    fn warn_policy_multi_falls_back_to_default_when_nothing_survives() {
        let set = dimensions(json!({
            "features": {
                "type": "multi",
                "values": ["auth", "docs"],
                "default": ["docs"],
                "policy": "warn"
            }
        }));
        let raw = RawOptions::from_tokens(["features=bogus+oracle"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        assert_eq!(options.list(Some("features")), ["docs"]);
        assert_eq!(options.warnings().len(), 2);
    }

    #[test]
    fn validate_rejects_undeclared_requirement_targets() {
        let mut definition: DimensionDefinition = serde_json::from_value(json!({
            "name": "features", "type": "multi", "values": ["auth", "db"],
            "requires": {"auth": ["postgres"]}
        }))
        .unwrap();
        let err = definition.validate().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn single_dimension_rejects_multiple_values() {
        let set = dimensions(json!({"db": {"type": "single", "values": ["pg", "sqlite"]}}));
        let raw = RawOptions::from_tokens(["db=pg+sqlite"]).unwrap();
        assert!(set.normalize(&raw, DEFAULT_MULTI_DIMENSION).is_err());
    }

    #[test]
    fn undeclared_dimensions_pass_through() {
        let set = DimensionSet::default();
        let raw = RawOptions::from_tokens(["style=tabs"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        assert!(options.is_in("style", "tabs"));
    }

    #[test]
    fn has_checks_default_dimension_then_raw_tokens() {
        let set = dimensions(json!({"features": {"type": "multi", "values": ["auth"]}}));
        let raw = RawOptions::from_tokens(["features=auth", "typescript"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        assert!(options.has("auth"));
        assert!(options.has("typescript"));
        assert!(!options.has("docs"));
        assert_eq!(options.when("auth", || 7), Some(7));
        assert_eq!(options.when("docs", || 7), None);
    }

    #[test]
    fn require_default_errors_without_default_dimension() {
        let options =
            DimensionSet::default().normalize(&RawOptions::default(), DEFAULT_MULTI_DIMENSION).unwrap();
        assert!(options.require_default("auth").is_err());
        assert!(options.require("db", "pg").is_err());
    }

    #[test]
    fn combination_check_reports_requires_and_conflicts() {
        let set = dimensions(json!({
            "features": {
                "type": "multi",
                "values": ["auth", "db", "static"],
                "requires": {"auth": ["db"]},
                "conflicts": {"static": ["db"]}
            }
        }));
        let raw = RawOptions::from_tokens(["features=auth+static"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        let violations = set.check_combination(&options);
        assert_eq!(violations.len(), 1);
        assert!(matches!(violations[0], CombinationViolation::MissingRequirement { .. }));

        let raw = RawOptions::from_tokens(["features=db+static"]).unwrap();
        let options = set.normalize(&raw, DEFAULT_MULTI_DIMENSION).unwrap();
        assert!(matches!(
            set.check_combination(&options).as_slice(),
            [CombinationViolation::Conflict { .. }]
        ));
    }
}
