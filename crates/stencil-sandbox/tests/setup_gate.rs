// crates/stencil-sandbox/tests/setup_gate.rs
// ============================================================================
// Module: Setup Gate Tests
// Description: Admission checks, reports, and the declarative plan host.
// Purpose: Pin fail-closed admission and exactly-once procedure invocation.
// Dependencies: stencil-core, stencil-sandbox, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Runs whole setups through [`SetupGate`] with compiled-in procedures and
//! JSON plans, checking reports and the lifecycle audit trail.

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
    reason = "Test-only gate checks use panic-based assertions."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;

use common::Project;
use serde_json::json;
use stencil_core::Context;
use stencil_core::InputValue;
use stencil_core::SandboxErrorKind;
use stencil_sandbox::Capabilities;
use stencil_sandbox::PlanHost;
use stencil_sandbox::ProcedureError;
use stencil_sandbox::ProcedureHost;
use stencil_sandbox::SandboxAuditEvent;
use stencil_sandbox::SandboxAuditSink;
use stencil_sandbox::SandboxLimits;
use stencil_sandbox::SandboxSettings;
use stencil_sandbox::SetupGate;
use stencil_sandbox::SetupStatus;
use stencil_sandbox::audit::LifecyclePhase;

fn gate(project: &Project) -> SetupGate {
    let audit: Arc<dyn SandboxAuditSink> = project.audit.clone();
    SetupGate::new(SandboxLimits::default(), SandboxSettings::default(), audit)
}

fn phases(project: &Project) -> Vec<LifecyclePhase> {
    project
        .audit
        .events_named("setup_lifecycle")
        .into_iter()
        .map(|event| match event {
            SandboxAuditEvent::Lifecycle(event) => event.phase,
            _ => panic!("expected lifecycle event"),
        })
        .collect()
}

// ============================================================================
// SECTION: Admission
// ============================================================================

#[test]
fn malformed_requests_never_reach_the_procedure() {
    let project = Project::new();
    let gate = gate(&project);
    let invoked = Cell::new(0);
    let host = ProcedureHost::new(|_: &Context, _: &Capabilities| -> Result<(), ProcedureError> {
        invoked.set(invoked.get() + 1);
        Ok(())
    });

    let mut bad_name = project.request(&[]);
    bad_name.inputs.insert(String::from("NOT A TOKEN"), InputValue::from("x"));
    let mut relative_root = project.request(&[]);
    relative_root.project_dir = PathBuf::from("relative/project");
    let mut oversized = project.request(&[]);
    oversized.inputs.insert(String::from("BLOB"), InputValue::from("x".repeat(20_000).as_str()));
    let mut bad_project_name = project.request(&[]);
    bad_project_name.project_name = String::from("../escape");
    let undeclared_value = project.request(&["database=oracle"]);
    let mut control = project.request(&[]);
    control.options.raw.push(String::from("feat\u{1b}[2J"));

    for request in
        [bad_name, relative_root, oversized, bad_project_name, undeclared_value, control]
    {
        let err = gate.run(request, &host).unwrap_err();
        assert_eq!(err.kind(), SandboxErrorKind::Validation);
    }
    assert_eq!(invoked.get(), 0);
    assert_eq!(project.audit.events_named("security").len(), 6);
    assert!(phases(&project).is_empty());
}

#[test]
fn too_many_inputs_are_rejected() {
    let project = Project::new();
    let audit: Arc<dyn SandboxAuditSink> = project.audit.clone();
    let limits = SandboxLimits {
        max_inputs: 1,
        ..SandboxLimits::default()
    };
    let gate = SetupGate::new(limits, SandboxSettings::default(), audit);
    let err = gate.prepare(project.request(&[])).unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Validation);
}

#[test]
fn prepared_context_is_normalized() {
    let project = Project::new();
    let context = gate(&project).prepare(project.request(&["features=auth"])).unwrap();
    assert_eq!(context.project_name(), "demo-app");
    assert_eq!(context.author_assets_dir(), "__scaffold__");
    assert!(context.options().is_in("database", "none"));
    assert_eq!(context.options().list(Some("features")), ["auth"]);
    assert_eq!(context.constants(), &json!({}));
}

// ============================================================================
// SECTION: Procedures
// ============================================================================

#[test]
fn procedures_run_once_and_report_completion() {
    let project = Project::new();
    let invoked = Cell::new(0);
    let host = ProcedureHost::new(|context: &Context, caps: &Capabilities| -> Result<(), ProcedureError> {
        invoked.set(invoked.get() + 1);
        caps.json().set("package.json", "name", json!(context.project_name()), Default::default())?;
        caps.logger().info("named package");
        Ok(())
    });
    let report = gate(&project).run(project.request(&[]), &host).unwrap();
    assert_eq!(report.status, SetupStatus::Completed);
    assert_eq!(report.calls, 1);
    assert_eq!(report.error, None);
    assert_eq!(invoked.get(), 1);
    assert_eq!(project.read("package.json"), "{\n  \"name\": \"demo-app\"\n}\n");
    assert_eq!(phases(&project), [LifecyclePhase::Started, LifecyclePhase::Completed]);
}

#[test]
fn failures_are_reported_and_partial_writes_remain() {
    let project = Project::new();
    let host = ProcedureHost::new(|_: &Context, caps: &Capabilities| -> Result<(), ProcedureError> {
        caps.files().write("partial.txt", "written")?;
        Err(ProcedureError::Failed(String::from("database driver missing")))
    });
    let report = gate(&project).run(project.request(&[]), &host).unwrap();
    assert_eq!(report.status, SetupStatus::Failed);
    let error = report.error.unwrap();
    assert_eq!(error.kind, "procedure");
    assert!(error.message.contains("database driver missing"));
    assert_eq!(project.read("partial.txt"), "written");
    assert_eq!(phases(&project), [LifecyclePhase::Started, LifecyclePhase::Failed]);
}

#[test]
fn boundary_violations_fail_the_setup() {
    let project = Project::new();
    let host = ProcedureHost::new(|_: &Context, caps: &Capabilities| -> Result<(), ProcedureError> {
        caps.files().write("../../etc/passwd", "x")?;
        Ok(())
    });
    let report = gate(&project).run(project.request(&[]), &host).unwrap();
    assert_eq!(report.status, SetupStatus::Failed);
    let error = report.error.unwrap();
    assert_eq!(error.kind, "boundary");
    assert_eq!(error.operation.as_deref(), Some("files.write"));
    assert_eq!(project.audit.events_named("security").len(), 1);
}

// ============================================================================
// SECTION: Plan Host
// ============================================================================

#[test]
fn plan_from_assets_renders_tokens_and_honors_guards() {
    let project = Project::new();
    project.write("package.json", "{\"name\": \"template\"}\n");
    project.write("README.md", "# title\n<!--deps-->\n<!--/deps-->\n");
    project.write(
        "__scaffold__/setup.json",
        &json!({
            "description": "demo plan",
            "steps": [
                {"op": "json.set", "file": "package.json", "path": "name", "value": "{{PROJECT_NAME}}"},
                {"op": "json.set", "file": "package.json", "path": "author", "value": "{{AUTHOR}}"},
                {"op": "text.replace_between", "file": "README.md", "start": "<!--deps-->", "end": "<!--/deps-->", "block": "- auth"},
                {"op": "files.write", "path": "src/auth.ts", "contents": "export {};\n", "when": "auth"},
                {"op": "files.write", "path": "src/db.ts", "contents": "export {};\n", "when": "database=postgres"},
                {"op": "log.info", "message": "done"}
            ]
        })
        .to_string(),
    );
    let report =
        gate(&project).run(project.request(&["features=auth+docs"]), &PlanHost::from_assets()).unwrap();
    assert_eq!(report.status, SetupStatus::Completed);
    assert_eq!(
        project.read("package.json"),
        "{\n  \"name\": \"demo-app\",\n  \"author\": \"Ada\"\n}\n"
    );
    assert_eq!(project.read("README.md"), "# title\n<!--deps-->\n- auth\n<!--/deps-->\n");
    assert!(project.exists("src/auth.ts"));
    assert!(!project.exists("src/db.ts"));
    assert_eq!(project.audit.events_named("procedure_log").len(), 1);
}

#[test]
fn missing_plan_is_skipped() {
    let project = Project::new();
    let report = gate(&project).run(project.request(&[]), &PlanHost::from_assets()).unwrap();
    assert_eq!(report.status, SetupStatus::Skipped);
    assert_eq!(phases(&project), [LifecyclePhase::Started, LifecyclePhase::Skipped]);
}

#[test]
fn malformed_plans_fail_before_any_step_runs() {
    let project = Project::new();
    let plan = json!({"steps": [
        {"op": "files.write", "path": "first.txt", "contents": "x"},
        {"op": "files.write", "path": "second.txt"}
    ]});
    let report = gate(&project).run(project.request(&[]), &PlanHost::from_document(plan)).unwrap();
    assert_eq!(report.status, SetupStatus::Failed);
    assert_eq!(report.error.unwrap().kind, "validation");
    assert!(!project.exists("first.txt"));
}

#[test]
fn plans_cannot_escape_the_project() {
    let project = Project::new();
    let before = project.snapshot();
    let plan = json!({"steps": [{"op": "files.copy", "from": "../", "to": "loot"}]});
    let report = gate(&project).run(project.request(&[]), &PlanHost::from_document(plan)).unwrap();
    assert_eq!(report.status, SetupStatus::Failed);
    assert_eq!(report.error.unwrap().kind, "boundary");
    assert_eq!(before, project.snapshot());
}
