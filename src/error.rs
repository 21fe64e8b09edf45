//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
/// Some variants are only constructed in library code/tests.
#[derive(Error, Debug)]
pub enum FakesmithError {
    // ─────────────────────────────────────────────────────────────
    // Input contract violations (kind: InvalidInput)
    // ─────────────────────────────────────────────────────────────

    #[error("Provide exactly one of recipe_path or recipe_text")]
    RecipeInputExclusive,

    #[error("Path is outside workspace root: {path}")]
    PathOutsideWorkspace { path: String },

    #[error("Path is outside allowed directory: {path}")]
    PathOutsideBase { path: String },

    #[error("Invalid run id: {id}")]
    InvalidRunId { id: String },

    #[error("Unsupported output_format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Provide only one of reps or target_number")]
    StoppingConflict,

    #[error("reps must be >= 1")]
    RepsTooSmall,

    #[error("reps exceeds server limit ({limit})")]
    RepsExceedLimit { limit: u32 },

    #[error("target_number.table must be a non-empty string")]
    TargetTableEmpty,

    #[error("target_number.count must be >= 1")]
    TargetCountTooSmall,

    #[error("target_number.count exceeds server limit ({limit})")]
    TargetCountExceedsLimit { limit: u64 },

    #[error("name must be a relative path without '..' or empty segments: {name}")]
    UnsafeAssetPath { name: String },

    // ─────────────────────────────────────────────────────────────
    // Dispatch errors (serve loop / tool registry)
    // ─────────────────────────────────────────────────────────────

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool '{tool}': {details}")]
    InvalidArguments { tool: String, details: String },

    #[error("Unknown resource: {uri}")]
    UnknownResource { uri: String },

    // ─────────────────────────────────────────────────────────────
    // Execution failures
    // ─────────────────────────────────────────────────────────────

    #[error("Operation exceeded {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: String },

    #[error("Asset not found: {name}")]
    AssetNotFound { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FakesmithError {
    /// Coarse classification used by the structured error records agents see.
    pub fn kind(&self) -> &'static str {
        match self {
            FakesmithError::RecipeInputExclusive
            | FakesmithError::PathOutsideWorkspace { .. }
            | FakesmithError::PathOutsideBase { .. }
            | FakesmithError::InvalidRunId { .. }
            | FakesmithError::UnsupportedFormat { .. }
            | FakesmithError::StoppingConflict
            | FakesmithError::RepsTooSmall
            | FakesmithError::RepsExceedLimit { .. }
            | FakesmithError::TargetTableEmpty
            | FakesmithError::TargetCountTooSmall
            | FakesmithError::TargetCountExceedsLimit { .. }
            | FakesmithError::UnsafeAssetPath { .. }
            | FakesmithError::UnknownTool { .. }
            | FakesmithError::InvalidArguments { .. }
            | FakesmithError::UnknownResource { .. } => "InvalidInput",
            FakesmithError::Timeout { .. } => "Timeout",
            FakesmithError::ArtifactNotFound { .. } | FakesmithError::AssetNotFound { .. } => {
                "NotFound"
            }
            FakesmithError::Io(_) => "IoError",
        }
    }
}

impl FixSuggestion for FakesmithError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FakesmithError::RecipeInputExclusive => {
                Some("Pass either recipe_path (file under the workspace) or recipe_text (inline YAML), not both")
            }
            FakesmithError::PathOutsideWorkspace { .. } | FakesmithError::PathOutsideBase { .. } => {
                Some("Use paths relative to the workspace root, without '..' segments")
            }
            FakesmithError::InvalidRunId { .. } => {
                Some("Use the run_id returned by a previous run_recipe call (32 hex chars)")
            }
            FakesmithError::UnsupportedFormat { .. } => {
                Some("Call list_capabilities for the supported output formats")
            }
            FakesmithError::StoppingConflict => {
                Some("Pick one stopping rule: reps for repetition count, target_number for a per-table goal")
            }
            FakesmithError::RepsTooSmall | FakesmithError::TargetCountTooSmall => {
                Some("Counts must be at least 1")
            }
            FakesmithError::RepsExceedLimit { .. }
            | FakesmithError::TargetCountExceedsLimit { .. } => {
                Some("Lower the requested count or raise the server limit via environment")
            }
            FakesmithError::TargetTableEmpty => {
                Some("Set target_number.table to an entity name from the recipe")
            }
            FakesmithError::UnsafeAssetPath { .. } => {
                Some("Use a plain relative name, e.g. 'salesforce/accounts.yml'")
            }
            FakesmithError::UnknownTool { .. } => {
                Some("Call list_capabilities to enumerate available tools")
            }
            FakesmithError::InvalidArguments { .. } => Some("Check the tool's argument schema"),
            FakesmithError::UnknownResource { .. } => {
                Some("Resource URIs look like fakesmith://runs/{run_id}/{artifact}")
            }
            FakesmithError::Timeout { .. } => {
                Some("Reduce reps/target_number or raise FAKESMITH_TIMEOUT_SECONDS")
            }
            FakesmithError::ArtifactNotFound { .. } => {
                Some("List the run directory first; artifacts exist only if the run reported them")
            }
            FakesmithError::AssetNotFound { .. } => {
                Some("Check the name against list_examples or the docs listing")
            }
            FakesmithError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
