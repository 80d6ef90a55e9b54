// crates/stencil-sandbox/tests/capability_surfaces.rs
// ============================================================================
// Module: Capability Surface Tests
// Description: End-to-end checks of the surfaces handed to setup procedures.
// Purpose: Pin boundary enforcement, idempotent edits, and audit coverage.
// Dependencies: stencil-core, stencil-sandbox, serde_json, tempfile, proptest
// ============================================================================

//! ## Overview
//! Every test runs against a real temporary project. Escape attempts are
//! checked by snapshotting the project's parent directory before and after.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::missing_docs_in_private_items,
    reason = "Test-only capability checks use panic-based assertions."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use common::Project;
use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use stencil_core::SandboxError;
use stencil_core::SandboxErrorKind;
use stencil_core::SearchPattern;
use stencil_core::SetOptions;
use stencil_sandbox::SandboxAuditEvent;
use stencil_sandbox::SandboxLimits;

fn no_extra() -> BTreeMap<String, String> {
    BTreeMap::new()
}

// ============================================================================
// SECTION: Boundary
// ============================================================================

#[test]
fn write_outside_project_is_rejected_and_nothing_changes() {
    let project = Project::new();
    project.write("keep.txt", "keep");
    let before = project.snapshot();
    let caps = project.capabilities();

    let err = caps.files().write("../../etc/passwd", "x").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Boundary);
    assert_eq!(err.operation(), "files.write");
    let err = caps.files().write("../escaped.txt", "x").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Boundary);

    assert_eq!(before, project.snapshot());
    assert!(!project.outside().join("escaped.txt").exists());
}

#[test]
fn boundary_errors_never_echo_the_host_path() {
    let project = Project::new();
    let caps = project.capabilities();
    let err = caps.json().read("../../secrets.json").unwrap_err();
    let root = project.root().to_string_lossy().into_owned();
    assert!(!err.to_string().contains(&root));
    let SandboxError::Boundary {
        path, ..
    } = err
    else {
        panic!("expected boundary error");
    };
    assert_eq!(path, "../../secrets.json");
}

#[test]
fn boundary_violations_are_audited_as_security_events() {
    let project = Project::new();
    let caps = project.capabilities();
    let _ = caps.text().append_lines("/etc/hosts", &["x"]);
    let security = project.audit.events_named("security");
    assert_eq!(security.len(), 1);
    let SandboxAuditEvent::Security(event) = &security[0] else {
        panic!("expected security event");
    };
    assert_eq!(event.kind, "boundary_violation");
    assert_eq!(event.operation, "text.append_lines");
}

#[cfg(unix)]
#[test]
fn symlinks_inside_the_project_are_never_followed() {
    let project = Project::new();
    std::fs::write(project.outside().join("outside.txt"), "host").unwrap();
    std::os::unix::fs::symlink(project.outside(), project.root().join("link")).unwrap();
    let before = project.snapshot();
    let caps = project.capabilities();

    let err = caps.files().read("link/outside.txt").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Boundary);
    let err = caps.files().write("link/planted.txt", "x").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Boundary);
    assert_eq!(before, project.snapshot());
}

// ============================================================================
// SECTION: Files
// ============================================================================

#[test]
fn copy_skips_housekeeping_entries_and_respects_overwrite() {
    let project = Project::new();
    project.write("template/src/main.rs", "fn main() {}\n");
    project.write("template/.git/HEAD", "ref: main\n");
    project.write("template/node_modules/pkg/index.js", "x");
    let caps = project.capabilities();

    assert_eq!(caps.files().copy("template", "app", false).unwrap(), 1);
    assert_eq!(project.read("app/src/main.rs"), "fn main() {}\n");
    assert!(!project.exists("app/.git"));
    assert!(!project.exists("app/node_modules"));

    let err = caps.files().copy("template", "app", false).unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Conflict);
    assert_eq!(caps.files().copy("template", "app", true).unwrap(), 1);
}

#[test]
fn move_relocates_trees_and_refuses_existing_targets() {
    let project = Project::new();
    project.write("docs/guide.md", "guide");
    project.write("taken/file.txt", "taken");
    let caps = project.capabilities();

    let err = caps.files().move_to("docs", "taken", false).unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Conflict);
    caps.files().move_to("docs", "manual", false).unwrap();
    assert!(!project.exists("docs"));
    assert_eq!(project.read("manual/guide.md"), "guide");
}

#[test]
fn remove_ensure_dirs_and_list_report_relative_paths() {
    let project = Project::new();
    let caps = project.capabilities();
    caps.files().ensure_dirs(&["src/bin", "tests"]).unwrap();
    caps.files().write("src/bin/tool.rs", "fn main() {}\n").unwrap();
    caps.files().write("src/lib.rs", "").unwrap();

    assert_eq!(caps.files().list("src").unwrap(), ["src/bin/tool.rs", "src/lib.rs"]);
    assert!(caps.files().exists("tests").unwrap());
    assert!(caps.files().remove("src/bin").unwrap());
    assert!(!caps.files().remove("src/bin").unwrap());
    assert_eq!(caps.files().remove(".").unwrap_err().kind(), SandboxErrorKind::Validation);
}

#[test]
fn oversized_writes_are_rejected() {
    let project = Project::new();
    let limits = SandboxLimits {
        max_file_bytes: 8,
        ..SandboxLimits::default()
    };
    let caps = project.capabilities_with(&[], limits);
    let err = caps.files().write("big.txt", "0123456789").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Validation);
    assert!(!project.exists("big.txt"));
}

// ============================================================================
// SECTION: JSON
// ============================================================================

#[test]
fn json_write_then_read_round_trips_with_holes() {
    let project = Project::new();
    let caps = project.capabilities();
    let data = json!({"list": [null, null, {"c": 1}], "z": true, "a": "first"});
    caps.json().write("data.json", &data).unwrap();
    assert_eq!(caps.json().read("data.json").unwrap(), data);
    assert!(project.read("data.json").ends_with("}\n"));
}

#[test]
fn json_write_then_read_keeps_every_float_bit() {
    let project = Project::new();
    let caps = project.capabilities();
    let just_below_tenth = f64::from_bits(0x3FB9_9999_9999_9999);
    let data = json!({
        "x": just_below_tenth,
        "y": [f64::MIN_POSITIVE, f64::MAX, -(1.0 + f64::EPSILON)]
    });
    caps.json().write("floats.json", &data).unwrap();
    assert_eq!(caps.json().read("floats.json").unwrap(), data);
}

#[test]
fn json_set_twice_leaves_the_file_byte_identical() {
    let project = Project::new();
    project.write("package.json", "{\"name\": \"demo\"}\n");
    let caps = project.capabilities();
    caps.json().set("package.json", "a.b[2].c", json!("v"), SetOptions::default()).unwrap();
    let first = project.read("package.json");
    caps.json().set("package.json", "a.b[2].c", json!("v"), SetOptions::default()).unwrap();
    assert_eq!(first, project.read("package.json"));
    assert_eq!(caps.json().get("package.json", "a.b[2].c").unwrap(), Some(json!("v")));
}

#[test]
fn json_merge_array_upserts_by_key() {
    let project = Project::new();
    let caps = project.capabilities();
    caps.json().merge_array("list.json", "items", vec![json!({"id": 1, "name": "x"})], Some("id"))
        .unwrap();
    caps.json().merge_array("list.json", "items", vec![json!({"id": 1, "name": "y"})], Some("id"))
        .unwrap();
    assert_eq!(caps.json().read("list.json").unwrap(), json!({"items": [{"id": 1, "name": "y"}]}));
}

#[test]
fn json_merge_treats_missing_files_as_empty_and_preserves_order() {
    let project = Project::new();
    project.write("tsconfig.json", "{\"zeta\": 1, \"alpha\": {\"x\": 1}}\n");
    let caps = project.capabilities();
    caps.json().merge("tsconfig.json", json!({"alpha": {"y": 2}})).unwrap();
    assert_eq!(
        project.read("tsconfig.json"),
        "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"x\": 1,\n    \"y\": 2\n  }\n}\n"
    );
    let merged = caps.json().merge("fresh.json", json!({"k": "v"})).unwrap();
    assert_eq!(merged, json!({"k": "v"}));
    let err = caps.json().merge("fresh.json", json!([1])).unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Validation);
}

#[test]
fn json_update_persists_mutations_and_replacements() {
    let project = Project::new();
    let caps = project.capabilities();
    caps.json()
        .update("state.json", |doc| {
            doc["count"] = json!(1);
            Ok(None)
        })
        .unwrap();
    caps.json().update("state.json", |_| Ok(Some(json!({"replaced": true})))).unwrap();
    assert_eq!(caps.json().read("state.json").unwrap(), json!({"replaced": true}));
}

#[test]
fn json_remove_and_read_or_handle_missing_files() {
    let project = Project::new();
    let caps = project.capabilities();
    assert_eq!(caps.json().remove("absent.json", "a.b").unwrap(), None);
    assert!(!project.exists("absent.json"));
    assert_eq!(caps.json().read_or("absent.json", json!({})).unwrap(), json!({}));
    assert_eq!(caps.json().read("absent.json").unwrap_err().kind(), SandboxErrorKind::NotFound);

    project.write("broken.json", "{not json");
    assert_eq!(
        caps.json().read_or("broken.json", json!({})).unwrap_err().kind(),
        SandboxErrorKind::Validation
    );
}

#[test]
fn json_add_to_array_dedupes_when_unique() {
    let project = Project::new();
    let caps = project.capabilities();
    let added =
        caps.json().add_to_array("p.json", "keywords", vec![json!("a"), json!("b")], true).unwrap();
    assert_eq!(added, 2);
    let added =
        caps.json().add_to_array("p.json", "keywords", vec![json!("b"), json!("c")], true).unwrap();
    assert_eq!(added, 1);
    assert_eq!(caps.json().get("p.json", "keywords").unwrap(), Some(json!(["a", "b", "c"])));
}

// ============================================================================
// SECTION: Text
// ============================================================================

#[test]
fn insert_after_twice_leaves_one_copy() {
    let project = Project::new();
    project.write("src/routes.ts", "// @routes\nexport {};\n");
    let caps = project.capabilities();
    assert!(caps.text().insert_after("src/routes.ts", "// @routes", "import auth;").unwrap());
    assert!(!caps.text().insert_after("src/routes.ts", "// @routes", "import auth;").unwrap());
    assert_eq!(project.read("src/routes.ts"), "// @routes\nimport auth;\nexport {};\n");

    let err = caps.text().insert_after("src/routes.ts", "// @missing", "zzz-block").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::NotFound);
}

#[test]
fn replace_between_with_empty_block_keeps_markers_apart() {
    let project = Project::new();
    project.write("README.md", "top\n<!--A-->\nold\nlines\n<!--B-->\nbottom\n");
    let caps = project.capabilities();
    caps.text().replace_between("README.md", "<!--A-->", "<!--B-->", "").unwrap();
    assert_eq!(project.read("README.md"), "top\n<!--A-->\n<!--B-->\nbottom\n");
    assert!(!caps.text().replace_between("README.md", "<!--A-->", "<!--B-->", "").unwrap());
}

#[test]
fn append_lines_creates_files_and_separates_content() {
    let project = Project::new();
    project.write(".gitignore", "target");
    let caps = project.capabilities();
    caps.text().append_lines(".gitignore", &["dist", ".env"]).unwrap();
    caps.text().append_lines("NOTES", &["first"]).unwrap();
    assert_eq!(project.read(".gitignore"), "target\ndist\n.env\n");
    assert_eq!(project.read("NOTES"), "first\n");
}

#[test]
fn literal_replace_escapes_metacharacters() {
    let project = Project::new();
    project.write("version.txt", "v1.0 (v1x0)\n");
    let caps = project.capabilities();
    let count = caps
        .text()
        .replace("version.txt", &SearchPattern::Literal(String::from("v1.0")), "$2", false)
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(project.read("version.txt"), "$2 (v1x0)\n");

    let missing = SearchPattern::Literal(String::from("nope"));
    assert_eq!(caps.text().replace("version.txt", &missing, "x", false).unwrap(), 0);
    let err = caps.text().replace("version.txt", &missing, "x", true).unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::NotFound);
}

// ============================================================================
// SECTION: Templates and Placeholders
// ============================================================================

#[test]
fn render_file_substitutes_context_tokens() {
    let project = Project::new();
    project.write("README.tpl", "# {{PROJECT_NAME}} by {{AUTHOR}} on {{PORT}} {{UNKNOWN}}\n");
    let caps = project.capabilities();
    let extra = BTreeMap::from([(String::from("AUTHOR"), String::from("Grace"))]);
    let count = caps.templates().render_file("README.tpl", Some("README.md"), &extra).unwrap();
    assert_eq!(count, 3);
    assert_eq!(project.read("README.md"), "# demo-app by Grace on 3000 {{UNKNOWN}}\n");
    assert_eq!(caps.templates().render_string("{{AUTHOR}}", &no_extra()), "Ada");
    let warnings = project.audit.events_named("procedure_log");
    let [SandboxAuditEvent::ProcedureLog(warning)] = warnings.as_slice() else {
        panic!("expected one unresolved-token warning");
    };
    assert_eq!(warning.data, Some(json!({"file": "README.tpl", "tokens": ["UNKNOWN"]})));
    assert_eq!(
        caps.templates()
            .unresolved_tokens("{{AUTHOR}} {{TAGLINE}} {{ bad name }} {{TAGLINE}}", &no_extra()),
        ["TAGLINE"]
    );
}

#[test]
fn copy_assets_reads_only_from_the_assets_directory() {
    let project = Project::new();
    project.write("__scaffold__/auth/login.ts", "export {};\n");
    project.write("src/secret.ts", "secret");
    let caps = project.capabilities();

    assert_eq!(caps.templates().copy_assets("auth", "src/auth", false).unwrap(), 1);
    assert_eq!(project.read("src/auth/login.ts"), "export {};\n");

    let err = caps.templates().copy_assets("../src", "stolen", false).unwrap_err();
    let SandboxError::Boundary {
        reason, ..
    } = err
    else {
        panic!("expected boundary error");
    };
    assert_eq!(reason, "escapes_assets");
    assert!(!project.exists("stolen"));
}

#[test]
fn placeholders_apply_selects_by_glob_and_skips_assets() {
    let project = Project::new();
    project.write("README.md", "{{PROJECT_NAME}}\n");
    project.write("docs/intro.md", "by {{AUTHOR}} ({{AUTHOR}})\n");
    project.write("src/main.rs", "// {{PROJECT_NAME}}\n");
    project.write("__scaffold__/notes.md", "{{PROJECT_NAME}}\n");
    let caps = project.capabilities();

    let report = caps.placeholders().apply(&["*.md"], &no_extra()).unwrap();
    assert_eq!(report.files_changed, 2);
    assert_eq!(report.replacements, 3);
    assert_eq!(project.read("docs/intro.md"), "by Ada (Ada)\n");
    assert_eq!(project.read("src/main.rs"), "// {{PROJECT_NAME}}\n");
    assert_eq!(project.read("__scaffold__/notes.md"), "{{PROJECT_NAME}}\n");

    assert_eq!(caps.placeholders().apply_file("src/main.rs", &no_extra()).unwrap(), 1);
    assert_eq!(caps.placeholders().apply_string("{{PORT}}", &no_extra()), "3000");
}

// ============================================================================
// SECTION: Inputs, Options, Logger
// ============================================================================

#[test]
fn inputs_fall_back_when_absent() {
    let project = Project::new();
    let caps = project.capabilities();
    assert_eq!(caps.inputs().get_or("AUTHOR", "nobody"), "Ada");
    assert_eq!(caps.inputs().get_or("LICENSE", "MIT"), "MIT");
    assert_eq!(caps.inputs().all().len(), 2);
}

#[test]
fn options_default_single_dimension_and_default_multi_queries() {
    let project = Project::new();
    let caps = project.capabilities_with(&["features=auth+docs", "verbose"], SandboxLimits::default());
    assert!(caps.options().is_in("database", "none"));
    assert_eq!(caps.options().list(Some("database")), ["none"]);
    assert!(caps.options().has("auth"));
    assert!(caps.options().has("verbose"));
    assert!(!caps.options().has("lint"));
    assert!(caps.options().require_default("docs").is_ok());
    assert_eq!(
        caps.options().require("database", "postgres").unwrap_err().kind(),
        SandboxErrorKind::Validation
    );
    assert_eq!(caps.options().when("auth", || 7), Some(7));
    assert_eq!(caps.options().when("lint", || 7), None);
}

#[test]
fn logger_writes_procedure_events_only() {
    let project = Project::new();
    let caps = project.capabilities();
    caps.logger().info("configured");
    caps.logger().warn_with("skipped", json!({"step": 2}));
    let logs = project.audit.events_named("procedure_log");
    assert_eq!(logs.len(), 2);
    let SandboxAuditEvent::ProcedureLog(event) = &logs[1] else {
        panic!("expected procedure log");
    };
    assert_eq!(event.data, Some(json!({"step": 2})));
    assert_eq!(caps.calls(), 0);
}

#[test]
fn every_filesystem_call_is_audited() {
    let project = Project::new();
    let caps = project.capabilities();
    caps.files().write("a.txt", "a").unwrap();
    let _ = caps.files().read("missing.txt");
    caps.json().write("b.json", &json!({})).unwrap();
    assert_eq!(caps.calls(), 3);
    assert_eq!(project.audit.events_named("capability_call").len(), 3);
}

// ============================================================================
// SECTION: Properties
// ============================================================================

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        any::<f64>().prop_filter("finite", |value| value.is_finite()).prop_map(Value::from),
        "\\PC{0,8}".prop_map(Value::from),
    ]
}

fn json_tree() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(prop_oneof![Just(Value::Null), inner.clone()], 0 .. 6)
                .prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,6}", inner), 0 .. 6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn json_write_then_read_round_trips_arbitrary_trees(tree in json_tree()) {
        let project = Project::new();
        let caps = project.capabilities();
        let data = json!({"root": tree});
        caps.json().write("tree.json", &data).unwrap();
        prop_assert_eq!(caps.json().read("tree.json").unwrap(), data);
    }

    #[test]
    fn escaping_writes_never_touch_the_filesystem(
        depth in 1usize .. 4,
        inner in prop::collection::vec("[a-z]{1,6}", 0 .. 3),
        name in "[a-z]{1,8}\\.txt",
    ) {
        let project = Project::new();
        let before = project.snapshot();
        let caps = project.capabilities();
        let mut segments = inner.clone();
        segments.extend(std::iter::repeat_n(String::from(".."), inner.len() + depth));
        segments.push(name);
        let err = caps.files().write(&segments.join("/"), "x").unwrap_err();
        prop_assert_eq!(err.kind(), SandboxErrorKind::Boundary);
        prop_assert_eq!(before, project.snapshot());
    }

    #[test]
    fn ensure_block_is_idempotent_on_disk(
        body in "[a-z \\n]{0,40}",
        block in "[a-z]{1,12}",
    ) {
        let project = Project::new();
        project.write("notes.md", &format!("{body}\n<!--marker-->\n"));
        let caps = project.capabilities();
        caps.text().ensure_block("notes.md", "<!--marker-->", &block).unwrap();
        let once = project.read("notes.md");
        prop_assert!(!caps.text().ensure_block("notes.md", "<!--marker-->", &block).unwrap());
        prop_assert_eq!(once, project.read("notes.md"));
    }
}
