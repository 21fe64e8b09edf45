//! # Engine Abstraction Layer
//!
//! Trait and implementations for the external synthetic-data engine.
//!
//! ## Overview
//!
//! The engine module defines how fakesmith drives a generation pass:
//!
//! - [`Engine`] - Core trait: one bounded `generate` call per run
//! - [`CliEngine`] - Production engine driving the engine CLI binary
//! - [`MockEngine`] - Test engine with scripted outcomes
//!
//! ## Available Engines
//!
//! | Engine | Use Case | Features |
//! |--------|----------|----------|
//! | `cli`  | Production | Real generation, subprocess deadline kill |
//! | `mock` | Testing | Scripted outcomes, request recording |
//!
//! Use [`create_engine`] to instantiate an engine by name.

mod cli;
mod mock;

pub use cli::CliEngine;
pub use mock::{MockBehavior, MockEngine};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::FakesmithError;

/// Output encodings the engine declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Txt,
    Json,
    Csv,
    Sql,
    Dot,
    Svg,
    Svgz,
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::Txt,
        OutputFormat::Json,
        OutputFormat::Csv,
        OutputFormat::Sql,
        OutputFormat::Dot,
        OutputFormat::Svg,
        OutputFormat::Svgz,
        OutputFormat::Png,
    ];

    /// File extension / wire token for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Sql => "sql",
            OutputFormat::Dot => "dot",
            OutputFormat::Svg => "svg",
            OutputFormat::Svgz => "svgz",
            OutputFormat::Png => "png",
        }
    }

    /// Whether captured text output makes sense for this format.
    /// Csv is multi-file and png is binary; neither is captured inline.
    pub fn is_text_capturable(&self) -> bool {
        matches!(
            self,
            OutputFormat::Txt
                | OutputFormat::Json
                | OutputFormat::Sql
                | OutputFormat::Dot
                | OutputFormat::Svg
                | OutputFormat::Svgz
        )
    }

    /// Csv output goes to a directory of per-table files instead of a single
    /// artifact file.
    pub fn is_directory_output(&self) -> bool {
        matches!(self, OutputFormat::Csv)
    }
}

impl FromStr for OutputFormat {
    type Err = FakesmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "sql" => Ok(OutputFormat::Sql),
            "dot" => Ok(OutputFormat::Dot),
            "svg" => Ok(OutputFormat::Svg),
            "svgz" => Ok(OutputFormat::Svgz),
            "png" => Ok(OutputFormat::Png),
            _ => Err(FakesmithError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// When the engine stops generating: a fixed repetition count over the whole
/// recipe, or a target record count for one named table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoppingCriterion {
    Reps(u32),
    TargetCount { table: String, count: u64 },
}

/// One generation pass, fully described.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub recipe_text: String,
    pub user_options: BTreeMap<String, String>,
    pub plugin_options: BTreeMap<String, String>,
    pub stopping: StoppingCriterion,
    pub output_format: OutputFormat,
    /// Single-file artifact destination (`output.<fmt>` in the run dir)
    pub output_file: Option<PathBuf>,
    /// Multi-file destination for csv output
    pub output_folder: Option<PathBuf>,
    /// Return generated text inline alongside the artifact file
    pub capture: bool,
    pub strict_mode: bool,
    /// Check syntax and structure without materializing records
    pub validate_only: bool,
    pub continuation_file: Option<PathBuf>,
    pub mapping_file: Option<PathBuf>,
    pub load_declarations: Vec<PathBuf>,
}

impl GenerateRequest {
    /// Minimal request for validation-style calls.
    pub fn validate(recipe_text: String, strict_mode: bool) -> Self {
        Self {
            recipe_text,
            user_options: BTreeMap::new(),
            plugin_options: BTreeMap::new(),
            stopping: StoppingCriterion::Reps(1),
            output_format: OutputFormat::Txt,
            output_file: None,
            output_folder: None,
            capture: false,
            strict_mode,
            validate_only: true,
            continuation_file: None,
            mapping_file: None,
            load_declarations: Vec::new(),
        }
    }
}

/// What a successful generation pass yields.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    /// Human-readable generation summary
    pub summary: String,
    /// Captured text output, present when the request asked for capture
    pub captured: Option<String>,
}

/// Engine failures, split between recipe-content rejections (which carry
/// editor-style location info) and engine-side system conditions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind}: {message}")]
    Content {
        /// Engine-specific exception class name, e.g. `DataGenSyntaxError`
        kind: String,
        message: String,
        filename: Option<String>,
        line: Option<u64>,
    },

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One bounded generation pass. Implementations treat the call as
/// synchronous, blocking work; callers impose the wall-clock deadline.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Output format tokens this engine supports.
    fn supported_formats(&self) -> Vec<&'static str> {
        OutputFormat::ALL.iter().map(|f| f.extension()).collect()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, EngineError>;
}

/// Instantiate an engine by name (`cli` or `mock`).
pub fn create_engine(name: &str) -> anyhow::Result<Arc<dyn Engine>> {
    match name {
        "cli" => Ok(Arc::new(CliEngine::from_env())),
        "mock" => Ok(Arc::new(MockEngine::new())),
        other => anyhow::bail!("Unknown engine: {other} (expected 'cli' or 'mock')"),
    }
}
