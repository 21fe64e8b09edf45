//! Execution pipeline: validate / run / generate-mapping
//!
//! The orchestrator behind every generation tool. One invocation is strictly
//! sequential: resolve input → check format and stopping bounds → allocate a
//! run → invoke the engine under the wall-clock deadline → capture, truncate
//! and classify. Input contract violations surface as hard errors to the
//! immediate caller; engine content errors, timeouts and unexpected system
//! conditions are downgraded to structured results so agents always receive
//! parseable JSON, never a transport-level fault.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Limits;
use crate::engine::{Engine, EngineError, GenerateRequest, OutputFormat, StoppingCriterion};
use crate::error::FakesmithError;
use crate::recipe::{truncate, RecipeInput};
use crate::runstore::{RunId, RunStore};
use crate::timeout::with_time_limit;
use crate::workspace::SharedWorkspace;

/// URI scheme for artifact resource locators
pub const URI_SCHEME: &str = "fakesmith";

/// Locator for one run artifact: `fakesmith://runs/{run_id}/{artifact}`
pub fn resource_uri(run_id: &RunId, artifact: &str) -> String {
    format!("{URI_SCHEME}://runs/{run_id}/{artifact}")
}

/// Uniform error record surfaced to agents: coarse kind, message, and
/// editor-style location when the engine supplies one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: String,
    pub message: String,
    pub filename: Option<String>,
    pub line: Option<u64>,
}

impl From<&FakesmithError> for ToolError {
    fn from(err: &FakesmithError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            filename: None,
            line: None,
        }
    }
}

impl From<EngineError> for ToolError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Content {
                kind,
                message,
                filename,
                line,
            } => Self {
                kind,
                message,
                filename,
                line,
            },
            EngineError::Unavailable(message) => Self {
                kind: "EngineUnavailable".to_string(),
                message,
                filename: None,
                line: None,
            },
            EngineError::Io(e) => Self {
                kind: "IoError".to_string(),
                message: e.to_string(),
                filename: None,
                line: None,
            },
        }
    }
}

/// Result of `validate_recipe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResult {
    pub valid: bool,
    pub errors: Vec<ToolError>,
}

/// Per-table stopping goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNumber {
    pub table: String,
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    pub strict_mode: bool,
    pub options: BTreeMap<String, String>,
    pub plugin_options: BTreeMap<String, String>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            strict_mode: true,
            options: BTreeMap::new(),
            plugin_options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub options: BTreeMap<String, String>,
    pub plugin_options: BTreeMap<String, String>,
    pub reps: Option<u32>,
    pub target_number: Option<TargetNumber>,
    pub output_format: String,
    pub capture_output: bool,
    pub strict_mode: bool,
    pub validate_only: bool,
    pub generate_continuation: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            options: BTreeMap::new(),
            plugin_options: BTreeMap::new(),
            reps: None,
            target_number: None,
            output_format: "txt".to_string(),
            capture_output: true,
            strict_mode: true,
            validate_only: false,
            generate_continuation: false,
        }
    }
}

/// Successful run outcome. `ok` is always `true`; it is a concrete field so
/// the serialized shape matches what agents pattern-match on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSuccess {
    pub run_id: String,
    pub ok: bool,
    pub output_format: String,
    pub stdout_text: String,
    pub stdout_truncated: bool,
    pub resources: Vec<String>,
    pub summary: String,
}

/// Failed run outcome. No artifacts are promised even if partially written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub run_id: String,
    pub ok: bool,
    pub error: ToolError,
    pub resources: Vec<String>,
}

impl RunFailure {
    fn new(run_id: &RunId, error: ToolError) -> Self {
        Self {
            run_id: run_id.to_string(),
            ok: false,
            error,
            resources: Vec::new(),
        }
    }
}

/// Tagged outcome of `run_recipe`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Ok(RunSuccess),
    Err(RunFailure),
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Ok(_))
    }
}

/// Successful mapping outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSuccess {
    pub run_id: String,
    pub ok: bool,
    pub mapping_preview: String,
    pub mapping_truncated: bool,
    pub resources: Vec<String>,
}

/// Tagged outcome of `generate_mapping`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingOutcome {
    Ok(MappingSuccess),
    Err(RunFailure),
}

impl MappingOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, MappingOutcome::Ok(_))
    }
}

/// The orchestrator. Constructed once at startup and shared by reference
/// into every operation handler; holds no mutable state of its own.
pub struct Pipeline {
    workspace: SharedWorkspace,
    limits: Limits,
    store: RunStore,
    engine: Arc<dyn Engine>,
}

impl Pipeline {
    pub fn new(workspace: SharedWorkspace, limits: Limits, engine: Arc<dyn Engine>) -> Self {
        let store = RunStore::new(Arc::clone(&workspace));
        Self {
            workspace,
            limits,
            store,
            engine,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn workspace(&self) -> &SharedWorkspace {
        &self.workspace
    }

    /// Check a recipe's syntax and structure without materializing records.
    ///
    /// Only input contract violations (bad path/text combination, path
    /// escape) are returned as `Err`; every other failure mode is a
    /// structured `valid: false` result.
    pub async fn validate(
        &self,
        input: &RecipeInput,
        opts: ValidateOptions,
    ) -> Result<ValidateResult, FakesmithError> {
        let text = input.resolve(&self.workspace)?;

        let mut request = GenerateRequest::validate(text, opts.strict_mode);
        request.user_options = opts.options;
        request.plugin_options = opts.plugin_options;

        debug!(engine = self.engine.name(), "validating recipe");
        match with_time_limit(self.limits.timeout_seconds, self.engine.generate(request)).await {
            Ok(Ok(_)) => Ok(ValidateResult {
                valid: true,
                errors: vec![],
            }),
            Ok(Err(engine_err)) => Ok(ValidateResult {
                valid: false,
                errors: vec![engine_err.into()],
            }),
            Err(timeout) => Ok(ValidateResult {
                valid: false,
                errors: vec![ToolError::from(&timeout)],
            }),
        }
    }

    /// Run a recipe (or validate-only) and return captured output plus run
    /// artifact locators.
    pub async fn run(
        &self,
        input: &RecipeInput,
        opts: RunOptions,
    ) -> Result<RunOutcome, FakesmithError> {
        let text = input.resolve(&self.workspace)?;

        // Format and stopping bounds are checked before any run directory is
        // allocated; neither may rely on the engine to self-limit.
        let format: OutputFormat = opts.output_format.parse()?;
        let stopping = stopping_criterion(&self.limits, opts.reps, opts.target_number.as_ref())?;

        let (run_id, run_dir) = self.store.new_run()?;
        info!(%run_id, format = format.extension(), "run allocated");

        let artifact_name = format!("output.{}", format.extension());
        let capture = opts.capture_output && format.is_text_capturable();

        let mut output_file = None;
        let mut output_folder = None;
        if format.is_directory_output() {
            let csv_dir = run_dir.join("csv");
            std::fs::create_dir_all(&csv_dir)?;
            output_folder = Some(csv_dir);
        } else {
            output_file = Some(run_dir.join(&artifact_name));
        }

        let continuation_file = opts
            .generate_continuation
            .then(|| run_dir.join("continuation.yml"));

        let request = GenerateRequest {
            recipe_text: text,
            user_options: opts.options,
            plugin_options: opts.plugin_options,
            stopping,
            output_format: format,
            output_file,
            output_folder,
            capture,
            strict_mode: opts.strict_mode,
            validate_only: opts.validate_only,
            continuation_file: continuation_file.clone(),
            mapping_file: None,
            load_declarations: Vec::new(),
        };

        let generated =
            match with_time_limit(self.limits.timeout_seconds, self.engine.generate(request)).await
            {
                Ok(Ok(output)) => output,
                Ok(Err(engine_err)) => {
                    return Ok(RunOutcome::Err(RunFailure::new(&run_id, engine_err.into())))
                }
                Err(timeout) => {
                    return Ok(RunOutcome::Err(RunFailure::new(
                        &run_id,
                        ToolError::from(&timeout),
                    )))
                }
            };

        let captured = generated.captured.unwrap_or_default();
        let (stdout_text, stdout_truncated) = truncate(&captured, self.limits.max_capture_chars);

        // Artifact existence is verified on disk rather than inferred from
        // the request; engines may silently skip writing empty outputs.
        let mut resources = Vec::new();
        if run_dir.join(&artifact_name).is_file() {
            resources.push(resource_uri(&run_id, &artifact_name));
        }
        if format.is_directory_output() && run_dir.join("csv").is_dir() {
            resources.push(resource_uri(&run_id, "csv"));
        }
        if continuation_file.is_some() && run_dir.join("continuation.yml").is_file() {
            resources.push(resource_uri(&run_id, "continuation.yml"));
        }

        Ok(RunOutcome::Ok(RunSuccess {
            run_id: run_id.to_string(),
            ok: true,
            output_format: format.extension().to_string(),
            stdout_text,
            stdout_truncated,
            resources,
            summary: generated.summary,
        }))
    }

    /// Drive one record per top-level entity and produce a relational
    /// mapping descriptor for the recipe.
    pub async fn generate_mapping(
        &self,
        input: &RecipeInput,
        load_declarations_paths: &[String],
    ) -> Result<MappingOutcome, FakesmithError> {
        let text = input.resolve(&self.workspace)?;

        // One bad declaration path fails the whole call up front.
        let load_declarations: Vec<PathBuf> = load_declarations_paths
            .iter()
            .map(|p| self.workspace.ensure_within_workspace(Path::new(p)))
            .collect::<Result<_, _>>()?;

        let (run_id, run_dir) = self.store.new_run()?;
        let mapping_path = run_dir.join("mapping.yml");

        let request = GenerateRequest {
            recipe_text: text,
            user_options: BTreeMap::new(),
            plugin_options: BTreeMap::new(),
            stopping: StoppingCriterion::Reps(1),
            output_format: OutputFormat::Txt,
            output_file: None,
            output_folder: None,
            capture: false,
            strict_mode: true,
            validate_only: false,
            continuation_file: None,
            mapping_file: Some(mapping_path.clone()),
            load_declarations,
        };

        match with_time_limit(self.limits.timeout_seconds, self.engine.generate(request)).await {
            Ok(Ok(_)) => {}
            Ok(Err(engine_err)) => {
                return Ok(MappingOutcome::Err(RunFailure::new(
                    &run_id,
                    engine_err.into(),
                )))
            }
            Err(timeout) => {
                return Ok(MappingOutcome::Err(RunFailure::new(
                    &run_id,
                    ToolError::from(&timeout),
                )))
            }
        }

        // An engine that reports success without writing the mapping file is
        // a benign degenerate case, not an error.
        let mapping_text = if mapping_path.is_file() {
            std::fs::read_to_string(&mapping_path)?
        } else {
            String::new()
        };
        let (mapping_preview, mapping_truncated) =
            truncate(&mapping_text, self.limits.max_capture_chars);

        let mut resources = Vec::new();
        if mapping_path.is_file() {
            resources.push(resource_uri(&run_id, "mapping.yml"));
        }

        Ok(MappingOutcome::Ok(MappingSuccess {
            run_id: run_id.to_string(),
            ok: true,
            mapping_preview,
            mapping_truncated,
            resources,
        }))
    }
}

/// Compute the stopping rule, enforcing mutual exclusion and server limits.
/// Defaults to one repetition when neither rule is supplied.
fn stopping_criterion(
    limits: &Limits,
    reps: Option<u32>,
    target_number: Option<&TargetNumber>,
) -> Result<StoppingCriterion, FakesmithError> {
    match (reps, target_number) {
        (Some(_), Some(_)) => Err(FakesmithError::StoppingConflict),
        (None, None) => Ok(StoppingCriterion::Reps(1)),
        (Some(reps), None) => {
            if reps < 1 {
                return Err(FakesmithError::RepsTooSmall);
            }
            if reps > limits.max_reps {
                return Err(FakesmithError::RepsExceedLimit {
                    limit: limits.max_reps,
                });
            }
            Ok(StoppingCriterion::Reps(reps))
        }
        (None, Some(target)) => {
            if target.table.is_empty() {
                return Err(FakesmithError::TargetTableEmpty);
            }
            if target.count < 1 {
                return Err(FakesmithError::TargetCountTooSmall);
            }
            if target.count > limits.max_target_count {
                return Err(FakesmithError::TargetCountExceedsLimit {
                    limit: limits.max_target_count,
                });
            }
            Ok(StoppingCriterion::TargetCount {
                table: target.table.clone(),
                count: target.count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits::testing()
    }

    #[test]
    fn default_stopping_is_one_rep() {
        let rule = stopping_criterion(&limits(), None, None).unwrap();
        assert_eq!(rule, StoppingCriterion::Reps(1));
    }

    #[test]
    fn reps_and_target_are_mutually_exclusive() {
        let target = TargetNumber {
            table: "Account".to_string(),
            count: 10,
        };
        let err = stopping_criterion(&limits(), Some(2), Some(&target)).unwrap_err();
        assert!(matches!(err, FakesmithError::StoppingConflict));
    }

    #[test]
    fn reps_above_limit_are_rejected() {
        let err = stopping_criterion(&limits(), Some(6), None).unwrap_err();
        assert!(matches!(err, FakesmithError::RepsExceedLimit { limit: 5 }));
    }

    #[test]
    fn reps_of_zero_are_rejected() {
        assert!(matches!(
            stopping_criterion(&limits(), Some(0), None),
            Err(FakesmithError::RepsTooSmall)
        ));
    }

    #[test]
    fn target_count_is_bounded() {
        let target = TargetNumber {
            table: "Account".to_string(),
            count: 51,
        };
        let err = stopping_criterion(&limits(), None, Some(&target)).unwrap_err();
        assert!(matches!(
            err,
            FakesmithError::TargetCountExceedsLimit { limit: 50 }
        ));
    }

    #[test]
    fn empty_target_table_is_rejected() {
        let target = TargetNumber {
            table: String::new(),
            count: 10,
        };
        assert!(matches!(
            stopping_criterion(&limits(), None, Some(&target)),
            Err(FakesmithError::TargetTableEmpty)
        ));
    }

    #[test]
    fn valid_target_passes_through() {
        let target = TargetNumber {
            table: "Contact".to_string(),
            count: 25,
        };
        let rule = stopping_criterion(&limits(), None, Some(&target)).unwrap();
        assert_eq!(
            rule,
            StoppingCriterion::TargetCount {
                table: "Contact".to_string(),
                count: 25
            }
        );
    }

    #[test]
    fn tool_error_serializes_null_locations() {
        let err = ToolError::from(&FakesmithError::Timeout { seconds: 30 });
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "Timeout");
        assert_eq!(json["message"], "Operation exceeded 30s");
        assert!(json["filename"].is_null());
        assert!(json["line"].is_null());
    }

    #[test]
    fn resource_uris_have_the_documented_shape() {
        let id = RunId::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(
            resource_uri(&id, "output.txt"),
            "fakesmith://runs/0123456789abcdef0123456789abcdef/output.txt"
        );
    }
}
