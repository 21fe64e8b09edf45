//! Read-only access to previously produced run artifacts
//!
//! Dereferences `fakesmith://runs/{run_id}/{artifact}` locators. Files come
//! back as text; directories come back as a sorted listing of the files
//! beneath them, relative to the run directory, forward-slash separated
//! regardless of host path conventions.

use serde_json::json;
use walkdir::WalkDir;

use crate::error::FakesmithError;
use crate::runstore::{RunId, RunStore};

/// What an artifact read yields: file text or a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContent {
    Text(String),
    Listing(Vec<String>),
}

impl ArtifactContent {
    /// JSON form served over the resource interface: plain text for files,
    /// `{"files": [...]}` for directories.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArtifactContent::Text(text) => json!(text),
            ArtifactContent::Listing(files) => json!({ "files": files }),
        }
    }
}

/// Read one artifact from a run, confined to that run's own directory.
pub fn read_artifact(
    store: &RunStore,
    run_id: &RunId,
    artifact: &str,
) -> Result<ArtifactContent, FakesmithError> {
    let run_dir = store.run_dir(run_id)?;
    let path = store.resolve_artifact(run_id, artifact)?;

    if path.is_dir() {
        let mut files: Vec<String> = WalkDir::new(&path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&run_dir)
                    .ok()
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        files.sort();
        return Ok(ArtifactContent::Listing(files));
    }

    if !path.is_file() {
        return Err(FakesmithError::ArtifactNotFound {
            path: artifact.to_string(),
        });
    }

    Ok(ArtifactContent::Text(std::fs::read_to_string(&path)?))
}
