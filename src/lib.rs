//! Fakesmith - recipe-based synthetic data generation for tool-using agents

pub mod artifacts;
pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod recipe;
pub mod runstore;
pub mod server;
pub mod timeout;
pub mod tools;
pub mod workspace;

pub use config::Limits;
pub use engine::{create_engine, Engine, EngineError, MockBehavior, MockEngine, OutputFormat};
pub use error::{FakesmithError, FixSuggestion};
pub use pipeline::{
    MappingOutcome, Pipeline, RunOptions, RunOutcome, TargetNumber, ToolError, ValidateOptions,
    ValidateResult, URI_SCHEME,
};
pub use recipe::{truncate, RecipeInput, TRUNCATION_MARKER};
pub use runstore::{RunId, RunStore};
pub use tools::{ServerContext, ToolRegistry};
pub use workspace::{SharedWorkspace, WorkspacePaths};
