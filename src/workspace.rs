//! Workspace root anchoring and path containment
//!
//! Every filesystem operation the server performs must resolve to a
//! descendant of one workspace root chosen at startup. Escape attempts
//! (absolute paths outside the root, `..` traversal, symlink escapes) are
//! terminal input errors, never silently corrected.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::FakesmithError;

pub const ENV_WORKSPACE_ROOT: &str = "FAKESMITH_WORKSPACE_ROOT";

/// Hidden state directory under the workspace root
const STATE_DIR: &str = ".fakesmith";

/// Immutable workspace anchor, set once at process start.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    /// Anchor to an explicit root. The directory must exist so symlinks in
    /// the root itself can be resolved away up front.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FakesmithError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Anchor from `FAKESMITH_WORKSPACE_ROOT`, falling back to the current
    /// working directory.
    pub fn detect() -> Result<Self, FakesmithError> {
        match std::env::var(ENV_WORKSPACE_ROOT) {
            Ok(configured) if !configured.trim().is_empty() => Self::new(configured),
            _ => Self::new(std::env::current_dir()?),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` (joining to the root when relative) and require it to
    /// stay inside the workspace root.
    pub fn ensure_within_workspace(&self, path: &Path) -> Result<PathBuf, FakesmithError> {
        let resolved = self.resolve(path);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(FakesmithError::PathOutsideWorkspace {
                path: resolved.display().to_string(),
            })
        }
    }

    /// Resolve `path` and require it to stay inside `base`, where `base`
    /// itself must be inside the workspace root. This is what keeps per-run
    /// artifact reads confined to that run's own directory even though the
    /// runs root is shared.
    pub fn ensure_within(&self, base: &Path, path: &Path) -> Result<PathBuf, FakesmithError> {
        let base_resolved = self.ensure_within_workspace(base)?;
        let resolved = self.ensure_within_workspace(path)?;
        if resolved.starts_with(&base_resolved) {
            Ok(resolved)
        } else {
            Err(FakesmithError::PathOutsideBase {
                path: resolved.display().to_string(),
            })
        }
    }

    /// Directory holding all run directories, created on first use.
    pub fn runs_root(&self) -> Result<PathBuf, FakesmithError> {
        let runs = self.root.join(STATE_DIR).join("runs");
        std::fs::create_dir_all(&runs)?;
        Ok(runs)
    }

    /// Resolve to a real, symlink-free path. The path is walked component by
    /// component: every prefix that exists is canonicalized, so a symlink
    /// anywhere in the existing part is resolved for real even when the tail
    /// does not exist yet (e.g. an output file inside a fresh run directory).
    /// `..` after the deepest existing ancestor collapses lexically, which is
    /// safe because a nonexistent component cannot be a symlink.
    fn resolve(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let mut out = PathBuf::new();
        let mut exists = true;
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => {
                    out.push(other);
                    if exists {
                        match out.canonicalize() {
                            Ok(real) => out = real,
                            Err(_) => exists = false,
                        }
                    }
                }
            }
        }
        out
    }
}

/// Shared handle passed into every operation handler.
pub type SharedWorkspace = Arc<WorkspacePaths>;
