//! Recipe input normalization and output truncation

use std::path::Path;

use serde::Deserialize;

use crate::error::FakesmithError;
use crate::workspace::WorkspacePaths;

/// Marker appended to truncated captures so agents can detect truncation
/// programmatically.
pub const TRUNCATION_MARKER: &str = "\n…(truncated)…\n";

/// A recipe supplied either as a workspace path or as inline text.
/// Exactly one of the two must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeInput {
    pub recipe_path: Option<String>,
    pub recipe_text: Option<String>,
}

impl RecipeInput {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            recipe_path: Some(path.into()),
            recipe_text: None,
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            recipe_path: None,
            recipe_text: Some(text.into()),
        }
    }

    /// Normalize to recipe text. Inline text is returned verbatim; a path is
    /// joined to the workspace root (unless absolute), containment-checked,
    /// and read as UTF-8.
    pub fn resolve(&self, workspace: &WorkspacePaths) -> Result<String, FakesmithError> {
        match (&self.recipe_path, &self.recipe_text) {
            (Some(_), Some(_)) | (None, None) => Err(FakesmithError::RecipeInputExclusive),
            (None, Some(text)) => Ok(text.clone()),
            (Some(path), None) => {
                let resolved = workspace.ensure_within_workspace(Path::new(path))?;
                Ok(std::fs::read_to_string(&resolved)?)
            }
        }
    }
}

/// Cap `text` at `max_chars` characters, appending [`TRUNCATION_MARKER`] when
/// anything was cut. Returns the (possibly shortened) text and whether
/// truncation happened.
pub fn truncate(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((byte_idx, _)) => {
            let mut out = text[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            (out, true)
        }
    }
}
