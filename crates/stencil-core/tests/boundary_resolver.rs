// crates/stencil-core/tests/boundary_resolver.rs
// ============================================================================
// Module: Boundary Resolver Tests
// Description: Boundary invariant checks for relative path resolution.
// Purpose: Ensure every resolved path stays inside the project root.
// Dependencies: stencil-core, proptest, tempfile
// ============================================================================

//! ## Overview
//! Exercises traversal, absolute, null-byte, and symlink escapes plus a
//! property test over generated in-root paths.
//! Security posture: relative paths are author controlled and untrusted.

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
    reason = "Test-only boundary checks use panic-based assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use proptest::prelude::*;
use stencil_core::BoundaryResolver;
use stencil_core::ProjectRoot;
use stencil_core::SandboxError;
use stencil_core::SandboxErrorKind;
use tempfile::TempDir;
use tempfile::tempdir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn project() -> (TempDir, ProjectRoot) {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/nested")).unwrap();
    let root = ProjectRoot::new(dir.path()).unwrap();
    (dir, root)
}

fn boundary_reason(err: &SandboxError) -> String {
    match err {
        SandboxError::Boundary {
            reason, ..
        } => reason.clone(),
        other => panic!("expected boundary error, got {other}"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn rejects_empty_whitespace_and_null_byte_inputs() {
    let (_dir, root) = project();
    let resolver = BoundaryResolver::default();
    for input in ["", "   ", "a\0b"] {
        let err = resolver.resolve(&root, input, "files.read").unwrap_err();
        assert_eq!(err.kind(), SandboxErrorKind::Boundary);
        assert_eq!(err.operation(), "files.read");
    }
}

#[test]
fn rejects_traversal_and_absolute_inputs() {
    let (_dir, root) = project();
    let resolver = BoundaryResolver::default();
    for input in ["../../etc/passwd", "..", "src/../../x", "/etc/passwd"] {
        let err = resolver.resolve(&root, input, "files.write").unwrap_err();
        assert_eq!(err.kind(), SandboxErrorKind::Boundary, "{input}");
    }
}

#[test]
fn error_carries_relative_input_not_absolute_root() {
    let (dir, root) = project();
    let err = BoundaryResolver::default().resolve(&root, "../outside", "files.write").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("../outside"));
    assert!(!message.contains(&dir.path().display().to_string()));
}

#[test]
fn inner_parent_segments_that_stay_inside_resolve() {
    let (_dir, root) = project();
    let path = BoundaryResolver::default().resolve(&root, "src/nested/../main.rs", "t").unwrap();
    assert_eq!(path.display_relative(), "src/main.rs");
    assert!(path.absolute().starts_with(root.as_path()));
}

#[test]
fn dot_resolves_to_root() {
    let (_dir, root) = project();
    let path = BoundaryResolver::default().resolve(&root, ".", "t").unwrap();
    assert!(path.is_root());
    assert_eq!(path.display_relative(), ".");
}

#[test]
fn rejects_overlong_input() {
    let (_dir, root) = project();
    let resolver = BoundaryResolver::new(16);
    let err = resolver.resolve(&root, "aaaaaaaaaaaaaaaaaaaaaa", "t").unwrap_err();
    assert_eq!(boundary_reason(&err), "too_long");
}

#[cfg(unix)]
#[test]
fn rejects_symlinked_directory_escape() {
    let outside = tempdir().unwrap();
    let (dir, root) = project();
    std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
    let err = BoundaryResolver::default().resolve(&root, "link/secret.txt", "t").unwrap_err();
    assert_eq!(boundary_reason(&err), "escapes_root");
}

#[cfg(unix)]
#[test]
fn rejects_dangling_symlink() {
    let (dir, root) = project();
    std::os::unix::fs::symlink("/nonexistent/stencil/target", dir.path().join("dangling")).unwrap();
    let err = BoundaryResolver::default().resolve(&root, "dangling", "t").unwrap_err();
    assert_eq!(err.kind(), SandboxErrorKind::Boundary);
}

#[cfg(unix)]
#[test]
fn accepts_symlink_that_stays_inside() {
    let (dir, root) = project();
    std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("alias")).unwrap();
    let path = BoundaryResolver::default().resolve(&root, "alias/nested", "t").unwrap();
    assert_eq!(path.display_relative(), "alias/nested");
}

#[test]
fn project_root_rejects_relative_and_missing_paths() {
    assert!(ProjectRoot::new(std::path::Path::new("relative/dir")).is_err());
    let dir = tempdir().unwrap();
    assert!(ProjectRoot::new(&dir.path().join("missing")).is_err());
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn leading_parent_segments_always_escape(
        depth in 1usize .. 6,
        tail in proptest::collection::vec("[a-z]{1,8}", 0 .. 4),
    ) {
        let (_dir, root) = project();
        let mut input = "../".repeat(depth);
        input.push_str(&tail.join("/"));
        let err = BoundaryResolver::default().resolve(&root, &input, "prop").unwrap_err();
        prop_assert_eq!(err.kind(), SandboxErrorKind::Boundary);
    }

    #[test]
    fn in_root_paths_resolve_under_root(
        segments in proptest::collection::vec("[a-zA-Z0-9_-]{1,12}", 1 .. 6),
    ) {
        let (_dir, root) = project();
        let input = segments.join("/");
        let path = BoundaryResolver::default().resolve(&root, &input, "prop").unwrap();
        prop_assert!(path.absolute().starts_with(root.as_path()));
        prop_assert_eq!(path.display_relative(), input);
    }

    #[test]
    fn arbitrary_input_never_panics(input in ".{0,64}") {
        let (_dir, root) = project();
        if let Ok(path) = BoundaryResolver::default().resolve(&root, &input, "prop") {
            prop_assert!(path.absolute().starts_with(root.as_path()));
        }
    }
}
