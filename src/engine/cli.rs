//! Production engine driving the generator CLI binary
//!
//! Writes the recipe to a scratch file, executes the configured engine
//! binary with flags derived from the request, and parses engine error
//! output into structured content errors. Subprocess work runs on the
//! blocking pool; a hard child deadline kills runaway processes so an
//! abandoned call cannot outlive the server indefinitely.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use wait_timeout::ChildExt;

use super::{Engine, EngineError, GenerateOutput, GenerateRequest, StoppingCriterion};

pub const ENV_ENGINE_BIN: &str = "FAKESMITH_ENGINE_BIN";

/// Hard kill bound for the child process. The pipeline's own wall-clock
/// deadline is expected to fire first; this is the backstop for abandoned
/// calls.
const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(900);

/// `<Kind>Error: message` lines in engine stderr
static ERROR_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*([A-Za-z]+Error)\s*:?\s*(.*)$").unwrap());

/// `... near line 12 ...` location hints
static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bline\s+(\d+)").unwrap());

/// `... in file recipe.yml ...` location hints
static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bfile\s+([^\s:,]+)").unwrap());

/// Engine implementation shelling out to the generator CLI.
pub struct CliEngine {
    bin: String,
    execute_timeout: Duration,
}

impl CliEngine {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
        }
    }

    /// Binary from `FAKESMITH_ENGINE_BIN`, defaulting to `snowfakery`.
    pub fn from_env() -> Self {
        let bin = std::env::var(ENV_ENGINE_BIN).unwrap_or_else(|_| "snowfakery".to_string());
        Self::new(bin)
    }

    /// Override the hard child deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = timeout;
        self
    }

    fn build_command(&self, recipe_path: &std::path::Path, request: &GenerateRequest) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg(recipe_path);
        cmd.arg("--output-format").arg(request.output_format.extension());

        match &request.stopping {
            StoppingCriterion::Reps(n) => {
                cmd.arg("--reps").arg(n.to_string());
            }
            StoppingCriterion::TargetCount { table, count } => {
                cmd.arg("--target-number").arg(count.to_string()).arg(table);
            }
        }

        if let Some(file) = &request.output_file {
            cmd.arg("--output-file").arg(file);
        }
        if let Some(folder) = &request.output_folder {
            cmd.arg("--output-folder").arg(folder);
        }
        if let Some(continuation) = &request.continuation_file {
            cmd.arg("--generate-continuation-file").arg(continuation);
        }
        if let Some(mapping) = &request.mapping_file {
            cmd.arg("--generate-mapping-file").arg(mapping);
        }
        for declaration in &request.load_declarations {
            cmd.arg("--load-declarations").arg(declaration);
        }
        for (name, value) in &request.user_options {
            cmd.arg("--option").arg(name).arg(value);
        }
        for (name, value) in &request.plugin_options {
            cmd.arg("--plugin-option").arg(name).arg(value);
        }
        if request.strict_mode {
            cmd.arg("--strict");
        }
        if request.validate_only {
            cmd.arg("--validate-only");
        }

        cmd
    }
}

#[async_trait]
impl Engine for CliEngine {
    fn name(&self) -> &str {
        "cli"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, EngineError> {
        let bin = self.bin.clone();
        let execute_timeout = self.execute_timeout;

        // Command construction borrows `self`; do it before moving into the
        // blocking closure.
        let mut recipe_file = tempfile::Builder::new()
            .prefix("fakesmith-recipe-")
            .suffix(".yml")
            .tempfile()?;
        recipe_file.write_all(request.recipe_text.as_bytes())?;
        recipe_file.flush()?;
        let mut cmd = self.build_command(recipe_file.path(), &request);
        let capture = request.capture;

        let result = tokio::task::spawn_blocking(move || -> Result<GenerateOutput, EngineError> {
            // Keep the scratch recipe alive for the child's lifetime.
            let _recipe_file = recipe_file;

            cmd.stdin(Stdio::null())
                .stdout(if capture { Stdio::piped() } else { Stdio::null() })
                .stderr(Stdio::piped());

            let mut child = cmd.spawn().map_err(|e| {
                EngineError::Unavailable(format!("failed to start engine '{bin}': {e}"))
            })?;

            // Drain both pipes on their own threads before waiting: a child
            // producing more output than the pipe buffer holds would block on
            // write and never exit, turning a successful run into a timeout.
            let stdout_reader = child.stdout.take().map(drain_pipe);
            let stderr_reader = child.stderr.take().map(drain_pipe);

            let status = match child.wait_timeout(execute_timeout)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Unavailable(format!(
                        "engine '{bin}' did not finish within {}s",
                        execute_timeout.as_secs()
                    )));
                }
            };

            let stdout = stdout_reader
                .map(|r| r.join().unwrap_or_default())
                .unwrap_or_default();
            let stderr = stderr_reader
                .map(|r| r.join().unwrap_or_default())
                .unwrap_or_default();

            if !status.success() {
                return Err(parse_engine_error(&stderr, status.code()));
            }

            let summary = match stderr.trim() {
                "" => "Generation complete".to_string(),
                s => s.lines().last().unwrap_or(s).trim().to_string(),
            };

            Ok(GenerateOutput {
                summary,
                captured: capture.then_some(stdout),
            })
        })
        .await;

        match result {
            Ok(output) => output,
            Err(join_err) => Err(EngineError::Unavailable(format!(
                "engine task failed: {join_err}"
            ))),
        }
    }
}

/// Read a child pipe to the end on a dedicated thread.
fn drain_pipe<R: std::io::Read + Send + 'static>(
    mut pipe: R,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

/// Best-effort mapping of engine stderr to a structured content error.
fn parse_engine_error(stderr: &str, exit_code: Option<i32>) -> EngineError {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return EngineError::Unavailable(format!(
            "engine exited with status {}",
            exit_code.map_or("unknown".to_string(), |c| c.to_string())
        ));
    }

    let (kind, message) = match ERROR_LINE_RE.captures_iter(trimmed).last() {
        Some(caps) => {
            let kind = caps.get(1).map_or("DataGenError", |m| m.as_str()).to_string();
            let msg = caps.get(2).map_or("", |m| m.as_str()).trim();
            let msg = if msg.is_empty() { trimmed } else { msg };
            (kind, msg.to_string())
        }
        None => ("DataGenError".to_string(), trimmed.to_string()),
    };

    let line = LINE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());
    let filename = FILE_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    EngineError::Content {
        kind,
        message,
        filename,
        line,
    }
}
