//! Run identity and per-run artifact directories
//!
//! Each engine invocation owns one uniquely named directory under
//! `<workspace>/.fakesmith/runs/`. The id is generated before the directory
//! is created and directory creation is idempotent per id, so uniqueness
//! holds even under concurrent callers. The store never deletes run
//! directories; retention is an operational concern.

use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::FakesmithError;
use crate::workspace::SharedWorkspace;

/// Run ids are 128-bit random tokens rendered as 32 lowercase hex chars.
static RUN_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{32}$").unwrap());

/// Validated, opaque run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse an externally supplied id (e.g. from a resource URI).
    pub fn parse(raw: &str) -> Result<Self, FakesmithError> {
        if RUN_ID_RE.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(FakesmithError::InvalidRunId { id: raw.to_string() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and resolves run directories under the workspace.
#[derive(Debug, Clone)]
pub struct RunStore {
    workspace: SharedWorkspace,
}

impl RunStore {
    pub fn new(workspace: SharedWorkspace) -> Self {
        Self { workspace }
    }

    /// Allocate a fresh run directory and return its id.
    pub fn new_run(&self) -> Result<(RunId, PathBuf), FakesmithError> {
        let id = RunId::generate();
        let dir = self.workspace.runs_root()?.join(id.as_str());
        std::fs::create_dir_all(&dir)?;
        Ok((id, dir))
    }

    /// Resolve an existing run's directory, enforcing workspace containment.
    pub fn run_dir(&self, id: &RunId) -> Result<PathBuf, FakesmithError> {
        let dir = self.workspace.runs_root()?.join(id.as_str());
        self.workspace.ensure_within_workspace(&dir)
    }

    /// Resolve an artifact path inside a run, confined to that run's own
    /// directory via the two-argument containment check.
    pub fn resolve_artifact(
        &self,
        id: &RunId,
        artifact: &str,
    ) -> Result<PathBuf, FakesmithError> {
        let run_dir = self.run_dir(id)?;
        self.workspace
            .ensure_within(&run_dir, &run_dir.join(artifact))
    }
}
