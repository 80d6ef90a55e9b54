// crates/stencil-sandbox/src/fs.rs
// ============================================================================
// Module: Project Filesystem
// Description: Capability-based file access rooted at the project directory.
// Purpose: Perform all sandbox I/O through a no-follow directory handle.
// Dependencies: cap-std, cap-primitives, stencil-core
// ============================================================================

//! ## Overview
//! [`ProjectFs`] owns a `cap_std::fs::Dir` opened on the project root and
//! accepts only [`ValidatedPath`]s. Every path component is opened without
//! following symlinks, so a symlink planted after boundary resolution still
//! cannot redirect I/O. Writes go to a `create_new` temporary sibling and are
//! renamed over the target.
//!
//! Security posture: paths reaching this module have passed the boundary
//! resolver; this layer is the second, independent check.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use cap_primitives::fs::FollowSymlinks;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use cap_std::fs::OpenOptions;
use stencil_core::ProjectRoot;
use stencil_core::SandboxError;
use stencil_core::SandboxResult;
use stencil_core::ValidatedPath;

use crate::limits::SandboxLimits;
use crate::limits::SandboxSettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of temporary names tried before an atomic write gives up.
const MAX_TEMP_ATTEMPTS: u32 = 64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Kind of an existing directory entry (never following symlinks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link.
    Symlink,
    /// Anything else (sockets, devices, fifos).
    Other,
}

/// Files and directories found by a tree walk, relative to the walk root.
#[derive(Debug, Default)]
struct Tree {
    /// Directories in creation order (parents first).
    dirs: Vec<PathBuf>,
    /// Regular files.
    files: Vec<PathBuf>,
    /// Whether any entry was skipped (housekeeping name, symlink, special).
    skipped: bool,
}

/// Capability-scoped filesystem for a single project root.
///
/// # Invariants
/// - All I/O is relative to `dir`; absolute paths are never opened.
/// - Symlinks are never followed.
pub struct ProjectFs {
    /// Handle to the project root.
    dir: Dir,
    /// Maximum file size in bytes.
    max_file_bytes: u64,
    /// Maximum entries visited by a tree walk.
    max_tree_entries: usize,
    /// Naming settings; supplies the entries skipped by tree walks.
    settings: SandboxSettings,
}

impl ProjectFs {
    /// Opens the project root as a capability handle.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Io`] when the root cannot be opened.
    pub fn open(
        root: &ProjectRoot,
        limits: &SandboxLimits,
        settings: &SandboxSettings,
    ) -> SandboxResult<Self> {
        let dir = Dir::open_ambient_dir(root.as_path(), ambient_authority())
            .map_err(|err| SandboxError::from_io("project_root", ".", &err))?;
        Ok(Self {
            dir,
            max_file_bytes: limits.max_file_bytes,
            max_tree_entries: limits.max_tree_entries,
            settings: settings.clone(),
        })
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Reads a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] for missing files,
    /// [`SandboxError::Validation`] for oversized or non-regular files, and
    /// [`SandboxError::Boundary`] when a symlink is encountered.
    pub fn read(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<Vec<u8>> {
        let (parent, name) = self.open_parent(path, false, operation)?;
        read_file_in(&parent, Path::new(&name), self.max_file_bytes)
            .map_err(|err| map_io(operation, path, &err))?
            .ok_or_else(|| {
                SandboxError::validation(
                    operation,
                    format!(
                        "{} is not a regular file or exceeds {} bytes",
                        path.display_relative(),
                        self.max_file_bytes
                    ),
                )
            })
    }

    /// Reads a regular file, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectFs::read`] except for missing files.
    pub fn read_optional(
        &self,
        path: &ValidatedPath,
        operation: &str,
    ) -> SandboxResult<Option<Vec<u8>>> {
        match self.read(path, operation) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(SandboxError::NotFound {
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads a UTF-8 text file.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectFs::read`], plus [`SandboxError::Validation`] for
    /// invalid UTF-8.
    pub fn read_string(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<String> {
        let bytes = self.read(path, operation)?;
        String::from_utf8(bytes).map_err(|_| {
            SandboxError::validation(
                operation,
                format!("{} is not valid UTF-8", path.display_relative()),
            )
        })
    }

    /// Reads a UTF-8 text file, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectFs::read_string`] except for missing files.
    pub fn read_string_optional(
        &self,
        path: &ValidatedPath,
        operation: &str,
    ) -> SandboxResult<Option<String>> {
        match self.read_string(path, operation) {
            Ok(text) => Ok(Some(text)),
            Err(SandboxError::NotFound {
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns the kind of the entry at `path` without following symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error when a parent component is a symlink or unreadable.
    pub fn entry_kind(
        &self,
        path: &ValidatedPath,
        operation: &str,
    ) -> SandboxResult<Option<EntryKind>> {
        if path.is_root() {
            return Ok(Some(EntryKind::Dir));
        }
        let (parent, name) = match self.open_parent(path, false, operation) {
            Ok(found) => found,
            Err(SandboxError::NotFound {
                ..
            }) => return Ok(None),
            Err(err) => return Err(err),
        };
        match parent.symlink_metadata(Path::new(&name)) {
            Ok(metadata) => Ok(Some(classify(&metadata.file_type()))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(operation, path, &err)),
        }
    }

    /// Returns true when an entry exists at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectFs::entry_kind`].
    pub fn exists(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<bool> {
        Ok(self.entry_kind(path, operation)?.is_some())
    }

    /// Lists regular files below `path`, as sorted project-relative paths.
    ///
    /// Housekeeping entries and symlinks are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] when `path` does not exist and
    /// [`SandboxError::Validation`] when the walk exceeds the entry limit.
    pub fn list_files(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<Vec<String>> {
        let base = self.open_dir(path, false, operation)?;
        let tree = self.walk(&base, path, operation)?;
        let files: BTreeSet<String> =
            tree.files.iter().map(|file| join_display(path.relative(), file)).collect();
        Ok(files.into_iter().collect())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Atomically writes `bytes` to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for oversized payloads or the root
    /// path, [`SandboxError::Conflict`] when the target is a directory, and
    /// [`SandboxError::Boundary`] when a symlink is encountered.
    pub fn write(&self, path: &ValidatedPath, bytes: &[u8], operation: &str) -> SandboxResult<()> {
        let within_limit = u64::try_from(bytes.len()).is_ok_and(|len| len <= self.max_file_bytes);
        if !within_limit {
            return Err(SandboxError::validation(
                operation,
                format!("payload exceeds {} bytes", self.max_file_bytes),
            ));
        }
        let (parent, name) = self.open_parent(path, true, operation)?;
        match parent.symlink_metadata(Path::new(&name)) {
            Ok(metadata) if metadata.is_dir() => {
                return Err(SandboxError::conflict(
                    operation,
                    format!("{} is a directory", path.display_relative()),
                ));
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(map_io(operation, path, &err)),
        }
        write_file_atomic(&parent, &name, bytes).map_err(|err| map_io(operation, path, &err))
    }

    /// Creates `path` and any missing parents as directories.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Conflict`] when a component is a file and
    /// [`SandboxError::Boundary`] when a component is a symlink.
    pub fn create_dirs(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<()> {
        self.open_dir(path, true, operation).map(|_| ())
    }

    /// Removes the file or directory tree at `path`.
    ///
    /// Symlinks are removed, never followed. Returns false when nothing
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Validation`] for the project root itself.
    pub fn remove(&self, path: &ValidatedPath, operation: &str) -> SandboxResult<bool> {
        if path.is_root() {
            return Err(SandboxError::validation(operation, "refusing to remove the project root"));
        }
        let Some(kind) = self.entry_kind(path, operation)? else {
            return Ok(false);
        };
        let (parent, name) = self.open_parent(path, false, operation)?;
        let result = match kind {
            EntryKind::Dir => parent.remove_dir_all(Path::new(&name)),
            EntryKind::File | EntryKind::Symlink | EntryKind::Other => {
                parent.remove_file(Path::new(&name))
            }
        };
        result.map_err(|err| map_io(operation, path, &err))?;
        Ok(true)
    }

    /// Copies a file or directory tree, skipping housekeeping entries and
    /// symlinks inside trees. Returns the number of files copied.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] for a missing source,
    /// [`SandboxError::Conflict`] when a target file exists and `overwrite`
    /// is false, and [`SandboxError::Validation`] when the destination lies
    /// inside the source.
    pub fn copy(
        &self,
        from: &ValidatedPath,
        to: &ValidatedPath,
        overwrite: bool,
        operation: &str,
    ) -> SandboxResult<usize> {
        match self.entry_kind(from, operation)? {
            None => Err(SandboxError::not_found(operation, from.display_relative())),
            Some(EntryKind::File) => {
                self.ensure_target_free(to, overwrite, operation)?;
                let bytes = self.read(from, operation)?;
                self.write(to, &bytes, operation)?;
                Ok(1)
            }
            Some(EntryKind::Dir) => {
                let tree = self.plan_tree_copy(from, to, operation)?;
                self.copy_tree(from, to, &tree, overwrite, operation)
            }
            Some(EntryKind::Symlink | EntryKind::Other) => Err(SandboxError::validation(
                operation,
                format!("{} is not a regular file or directory", from.display_relative()),
            )),
        }
    }

    /// Moves a file or directory, falling back to copy and delete when the
    /// rename fails or the tree holds entries a copy would skip.
    ///
    /// # Errors
    ///
    /// Same as [`ProjectFs::copy`]; an existing target without `overwrite`
    /// is a [`SandboxError::Conflict`].
    pub fn rename(
        &self,
        from: &ValidatedPath,
        to: &ValidatedPath,
        overwrite: bool,
        operation: &str,
    ) -> SandboxResult<()> {
        if from.is_root() || to.is_root() {
            return Err(SandboxError::validation(operation, "cannot move the project root"));
        }
        if from.relative() == to.relative() {
            return Ok(());
        }
        if from.relative().starts_with(to.relative()) {
            return Err(SandboxError::validation(
                operation,
                format!(
                    "destination {} contains source {}",
                    to.display_relative(),
                    from.display_relative()
                ),
            ));
        }
        let kind = self.entry_kind(from, operation)?;
        let tree = match kind {
            None => return Err(SandboxError::not_found(operation, from.display_relative())),
            Some(EntryKind::Dir) => Some(self.plan_tree_copy(from, to, operation)?),
            Some(_) => None,
        };
        if self.exists(to, operation)? {
            if !overwrite {
                return Err(SandboxError::conflict(
                    operation,
                    format!("{} already exists", to.display_relative()),
                ));
            }
            self.remove(to, operation)?;
        }
        let needs_copy = tree.as_ref().is_some_and(|tree| tree.skipped);
        if !needs_copy && self.try_rename(from, to, operation)? {
            return Ok(());
        }
        match &tree {
            Some(tree) => {
                self.copy_tree(from, to, tree, true, operation)?;
            }
            None => {
                let bytes = self.read(from, operation)?;
                self.write(to, &bytes, operation)?;
            }
        }
        self.remove(from, operation).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Attempts a direct rename; returns false when a fallback is needed.
    fn try_rename(
        &self,
        from: &ValidatedPath,
        to: &ValidatedPath,
        operation: &str,
    ) -> SandboxResult<bool> {
        let (from_parent, from_name) = self.open_parent(from, false, operation)?;
        let (to_parent, to_name) = self.open_parent(to, true, operation)?;
        match from_parent.rename(Path::new(&from_name), &to_parent, Path::new(&to_name)) {
            Ok(()) => Ok(true),
            Err(err) if is_symlink_refusal(&err) => Err(map_io(operation, from, &err)),
            Err(_) => Ok(false),
        }
    }

    /// Fails when `to` exists and `overwrite` is false.
    fn ensure_target_free(
        &self,
        to: &ValidatedPath,
        overwrite: bool,
        operation: &str,
    ) -> SandboxResult<()> {
        if !overwrite && self.exists(to, operation)? {
            return Err(SandboxError::conflict(
                operation,
                format!("{} already exists", to.display_relative()),
            ));
        }
        Ok(())
    }

    /// Validates a tree copy and walks the source.
    fn plan_tree_copy(
        &self,
        from: &ValidatedPath,
        to: &ValidatedPath,
        operation: &str,
    ) -> SandboxResult<Tree> {
        if to.relative().starts_with(from.relative()) {
            return Err(SandboxError::validation(
                operation,
                format!(
                    "destination {} lies inside source {}",
                    to.display_relative(),
                    from.display_relative()
                ),
            ));
        }
        let source = self.open_dir(from, false, operation)?;
        self.walk(&source, from, operation)
    }

    /// Copies the files of `tree` from `from` into `to`.
    fn copy_tree(
        &self,
        from: &ValidatedPath,
        to: &ValidatedPath,
        tree: &Tree,
        overwrite: bool,
        operation: &str,
    ) -> SandboxResult<usize> {
        if !overwrite {
            for file in &tree.files {
                let target = extend(to, file, operation)?;
                self.ensure_target_free(&target, false, operation)?;
            }
        }
        self.create_dirs(to, operation)?;
        for dir in &tree.dirs {
            self.create_dirs(&extend(to, dir, operation)?, operation)?;
        }
        for file in &tree.files {
            let source = extend(from, file, operation)?;
            let target = extend(to, file, operation)?;
            let bytes = self.read(&source, operation)?;
            self.write(&target, &bytes, operation)?;
        }
        Ok(tree.files.len())
    }

    /// Walks `base` (opened from `path`) without following symlinks.
    fn walk(&self, base: &Dir, path: &ValidatedPath, operation: &str) -> SandboxResult<Tree> {
        let mut tree = Tree::default();
        let mut visited = 0_usize;
        let mut pending: Vec<(Dir, PathBuf)> = vec![(
            base.try_clone().map_err(|err| map_io(operation, path, &err))?,
            PathBuf::new(),
        )];
        while let Some((dir, prefix)) = pending.pop() {
            let entries = dir.entries().map_err(|err| map_io(operation, path, &err))?;
            for entry in entries {
                let entry = entry.map_err(|err| map_io(operation, path, &err))?;
                visited += 1;
                if visited > self.max_tree_entries {
                    return Err(SandboxError::validation(
                        operation,
                        format!("tree exceeds {} entries", self.max_tree_entries),
                    ));
                }
                let name = entry.file_name();
                if self.is_ignored(&name) {
                    tree.skipped = true;
                    continue;
                }
                let relative = prefix.join(&name);
                let file_type = entry.file_type().map_err(|err| map_io(operation, path, &err))?;
                match classify(&file_type) {
                    EntryKind::Dir => {
                        let child = open_child_dir_nofollow(&dir, Path::new(&name))
                            .map_err(|err| map_io(operation, path, &err))?;
                        tree.dirs.push(relative.clone());
                        pending.push((child, relative));
                    }
                    EntryKind::File => tree.files.push(relative),
                    EntryKind::Symlink | EntryKind::Other => tree.skipped = true,
                }
            }
        }
        tree.dirs.sort();
        tree.files.sort();
        Ok(tree)
    }

    /// Returns true when `name` is a housekeeping entry.
    fn is_ignored(&self, name: &std::ffi::OsStr) -> bool {
        name.to_str().is_some_and(|name| self.settings.is_ignored(name))
    }

    /// Opens the directory designated by `path`.
    fn open_dir(&self, path: &ValidatedPath, create: bool, operation: &str) -> SandboxResult<Dir> {
        let mut current = self.dir.try_clone().map_err(|err| map_io(operation, path, &err))?;
        for component in path.relative().components() {
            let Component::Normal(name) = component else {
                return Err(SandboxError::boundary(
                    operation,
                    &path.display_relative(),
                    "invalid_component",
                ));
            };
            current = open_or_create_child_dir_nofollow(&current, Path::new(name), create)
                .map_err(|err| map_io(operation, path, &err))?;
        }
        Ok(current)
    }

    /// Opens the parent directory of `path` and returns it with the final name.
    fn open_parent(
        &self,
        path: &ValidatedPath,
        create: bool,
        operation: &str,
    ) -> SandboxResult<(Dir, OsString)> {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(SandboxError::validation(
                operation,
                "operation requires a path below the project root",
            ));
        };
        let dir = self.open_dir(&parent, create, operation).map_err(|err| match err {
            SandboxError::NotFound {
                operation, ..
            } => SandboxError::not_found(&operation, path.display_relative()),
            other => other,
        })?;
        Ok((dir, name.to_os_string()))
    }
}

// ============================================================================
// SECTION: Directory Helpers
// ============================================================================

/// Opens a child directory without following symlinks.
fn open_child_dir_nofollow(parent: &Dir, child: &Path) -> io::Result<Dir> {
    let mut options = OpenOptions::new();
    options.read(true);
    options._cap_fs_ext_follow(FollowSymlinks::No);
    let file = parent.open_with(child, &options)?;
    let metadata = file.metadata()?;
    if !metadata.is_dir() {
        return Err(io::Error::new(ErrorKind::NotADirectory, "path component is not a directory"));
    }
    Ok(Dir::from_std_file(file.into_std()))
}

/// Opens or creates a child directory without following symlinks.
fn open_or_create_child_dir_nofollow(parent: &Dir, child: &Path, create: bool) -> io::Result<Dir> {
    match open_child_dir_nofollow(parent, child) {
        Ok(dir) => Ok(dir),
        Err(err) if err.kind() == ErrorKind::NotFound && create => {
            match parent.create_dir(child) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err),
            }
            open_child_dir_nofollow(parent, child)
        }
        Err(err) => Err(err),
    }
}

/// Reads a regular file without following symlinks.
///
/// Returns `Ok(None)` for non-regular files or files above `max_bytes`.
fn read_file_in(parent: &Dir, name: &Path, max_bytes: u64) -> io::Result<Option<Vec<u8>>> {
    let mut options = OpenOptions::new();
    options.read(true);
    options._cap_fs_ext_follow(FollowSymlinks::No);
    let file = parent.open_with(name, &options)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() || metadata.len() > max_bytes {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    file.take(max_bytes.saturating_add(1)).read_to_end(&mut bytes)?;
    if !u64::try_from(bytes.len()).is_ok_and(|len| len <= max_bytes) {
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Writes file bytes using a temporary sibling and atomic rename.
fn write_file_atomic(parent: &Dir, file_name: &OsString, bytes: &[u8]) -> io::Result<()> {
    for attempt in 0 .. MAX_TEMP_ATTEMPTS {
        let temp_name = temp_file_name(file_name, attempt);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        options._cap_fs_ext_follow(FollowSymlinks::No);
        match parent.open_with(&temp_name, &options) {
            Ok(mut temp_file) => {
                let written = temp_file
                    .write_all(bytes)
                    .and_then(|()| temp_file.sync_all())
                    .and_then(|()| parent.rename(&temp_name, parent, Path::new(file_name)));
                if let Err(err) = written {
                    let _ = parent.remove_file(&temp_name);
                    return Err(err);
                }
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(ErrorKind::AlreadyExists, "unable to allocate temporary file"))
}

/// Builds a deterministic temporary file name for atomic writes.
fn temp_file_name(file_name: &OsString, attempt: u32) -> PathBuf {
    let mut temp = OsString::from(".tmp-");
    temp.push(file_name);
    temp.push(format!(".{}.{}", std::process::id(), attempt));
    PathBuf::from(temp)
}

/// Classifies a file type without following symlinks.
fn classify(file_type: &cap_std::fs::FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

/// Extends a validated path with walk-relative normal components.
fn extend(base: &ValidatedPath, relative: &Path, operation: &str) -> SandboxResult<ValidatedPath> {
    let mut current = base.clone();
    for component in relative.components() {
        current = current.child(component.as_os_str(), operation)?;
    }
    Ok(current)
}

/// Joins a base and walk-relative path into a `/`-separated string.
fn join_display(base: &Path, relative: &Path) -> String {
    base.join(relative)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Returns true when `err` reports a refused symlink traversal.
fn is_symlink_refusal(err: &io::Error) -> bool {
    #[cfg(target_os = "linux")]
    if err.raw_os_error() == Some(40) {
        return true;
    }
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    if err.raw_os_error() == Some(62) {
        return true;
    }
    #[cfg(windows)]
    if matches!(err.raw_os_error(), Some(681 | 1920)) {
        return true;
    }
    let _ = err;
    false
}

/// Maps a low-level I/O error into the sandbox taxonomy.
fn map_io(operation: &str, path: &ValidatedPath, err: &io::Error) -> SandboxError {
    let display = path.display_relative();
    if is_symlink_refusal(err) {
        return SandboxError::boundary(operation, &display, "symlink");
    }
    match err.kind() {
        ErrorKind::NotADirectory => SandboxError::conflict(
            operation,
            format!("{display}: path component is not a directory"),
        ),
        ErrorKind::IsADirectory => {
            SandboxError::conflict(operation, format!("{display} is a directory"))
        }
        _ => SandboxError::from_io(operation, &display, err),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
