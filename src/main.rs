//! Fakesmith CLI - serve tools to agents or drive the pipeline directly

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;

use fakesmith::error::{FakesmithError, FixSuggestion};
use fakesmith::{
    create_engine, Limits, RecipeInput, RunOptions, ServerContext, ToolRegistry, ValidateOptions,
    WorkspacePaths,
};

const ENV_ENGINE: &str = "FAKESMITH_ENGINE";

#[derive(Parser)]
#[command(name = "fakesmith")]
#[command(about = "Fakesmith - recipe-based synthetic data generation for agents")]
#[command(version)]
struct Cli {
    /// Engine backend (cli, mock); defaults to $FAKESMITH_ENGINE or "cli"
    #[arg(short, long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tool calls as line-delimited JSON on stdin/stdout
    Serve,

    /// Validate a recipe file without generating data
    Validate {
        /// Path to a recipe file (relative to the workspace root)
        file: String,

        /// Allow undefined field references
        #[arg(long)]
        lenient: bool,
    },

    /// Run a recipe and print the structured outcome
    Run {
        /// Path to a recipe file (relative to the workspace root)
        file: String,

        /// Repetition count
        #[arg(short, long)]
        reps: Option<u32>,

        /// Output format (txt, json, csv, sql, dot, svg, svgz, png)
        #[arg(short, long, default_value = "txt")]
        format: String,

        /// Skip inline output capture
        #[arg(long)]
        no_capture: bool,

        /// Check the recipe without materializing records
        #[arg(long)]
        validate_only: bool,

        /// Also emit a continuation descriptor
        #[arg(long)]
        continuation: bool,
    },

    /// Generate a relational mapping descriptor from a recipe
    Mapping {
        /// Path to a recipe file (relative to the workspace root)
        file: String,

        /// Load declaration files to pass through to the engine
        #[arg(long = "load-declarations")]
        load_declarations: Vec<String>,
    },

    /// Print engine, format, and limit information
    Capabilities,

    /// List bundled example recipes
    Examples {
        /// Filter by name prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let engine_name = cli
        .engine
        .clone()
        .or_else(|| std::env::var(ENV_ENGINE).ok())
        .unwrap_or_else(|| "cli".to_string());

    if let Err(e) = execute(cli, &engine_name).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(fakesmith_err) = e.downcast_ref::<FakesmithError>() {
            if let Some(suggestion) = fakesmith_err.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
        }
        std::process::exit(1);
    }
}

async fn execute(cli: Cli, engine_name: &str) -> anyhow::Result<()> {
    let workspace = Arc::new(WorkspacePaths::detect()?);
    let limits = Limits::from_env();
    let engine = create_engine(engine_name)?;
    let ctx = Arc::new(ServerContext::new(workspace, limits, engine));
    let registry = ToolRegistry::new(Arc::clone(&ctx))?;

    match cli.command {
        Commands::Serve => fakesmith::server::serve(registry).await,
        Commands::Validate { file, lenient } => {
            let input = RecipeInput::from_path(file);
            let opts = ValidateOptions {
                strict_mode: !lenient,
                ..ValidateOptions::default()
            };
            let result = ctx.pipeline.validate(&input, opts).await?;
            let valid = result.valid;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Run {
            file,
            reps,
            format,
            no_capture,
            validate_only,
            continuation,
        } => {
            let input = RecipeInput::from_path(file);
            let opts = RunOptions {
                reps,
                output_format: format,
                capture_output: !no_capture,
                validate_only,
                generate_continuation: continuation,
                ..RunOptions::default()
            };
            let outcome = ctx.pipeline.run(&input, opts).await?;
            let ok = outcome.is_ok();
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Mapping {
            file,
            load_declarations,
        } => {
            let input = RecipeInput::from_path(file);
            let outcome = ctx
                .pipeline
                .generate_mapping(&input, &load_declarations)
                .await?;
            let ok = outcome.is_ok();
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Capabilities => {
            let caps = registry.dispatch("list_capabilities", json!({})).await?;
            println!("{}", serde_json::to_string_pretty(&caps)?);
            Ok(())
        }
        Commands::Examples { prefix } => {
            let listed = registry
                .dispatch("list_examples", json!({ "prefix": prefix }))
                .await?;
            println!("{}", serde_json::to_string_pretty(&listed)?);
            Ok(())
        }
    }
}
