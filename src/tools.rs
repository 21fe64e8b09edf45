//! Tool registry and resource reads
//!
//! Every protocol-facing operation is registered here as a named tool with a
//! JSON schema; arguments are validated against the schema before dispatch.
//! Handlers receive one shared [`ServerContext`] built at startup — no
//! ambient globals, no "has the server started" checks.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::artifacts::read_artifact;
use crate::assets::{docs_source, examples_source, recipe_schema_text, AssetSource};
use crate::config::Limits;
use crate::engine::Engine;
use crate::error::FakesmithError;
use crate::pipeline::{Pipeline, RunOptions, ValidateOptions, URI_SCHEME};
use crate::recipe::RecipeInput;
use crate::runstore::RunId;
use crate::workspace::SharedWorkspace;

/// Everything an operation handler needs, constructed once at process start.
pub struct ServerContext {
    pub pipeline: Pipeline,
    pub examples: Box<dyn AssetSource>,
    pub docs: Box<dyn AssetSource>,
}

impl ServerContext {
    pub fn new(workspace: SharedWorkspace, limits: Limits, engine: Arc<dyn Engine>) -> Self {
        let examples = examples_source(&workspace);
        let docs = docs_source(&workspace);
        Self {
            pipeline: Pipeline::new(workspace, limits, engine),
            examples,
            docs,
        }
    }
}

/// Declared surface of one tool.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

/// Named-operation dispatch with schema-validated arguments.
pub struct ToolRegistry {
    ctx: Arc<ServerContext>,
    specs: Vec<ToolSpec>,
    validators: HashMap<&'static str, Validator>,
}

#[derive(Deserialize)]
struct MappingArgs {
    #[serde(default)]
    load_declarations_paths: Vec<String>,
}

#[derive(Deserialize)]
struct ListExamplesArgs {
    prefix: Option<String>,
}

#[derive(Deserialize)]
struct GetExampleArgs {
    name: String,
}

#[derive(Deserialize)]
struct SearchDocsArgs {
    query: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

impl ToolRegistry {
    pub fn new(ctx: Arc<ServerContext>) -> anyhow::Result<Self> {
        let specs = tool_specs();
        let mut validators = HashMap::new();
        for spec in &specs {
            validators.insert(spec.name, jsonschema::validator_for(&spec.schema)?);
        }
        Ok(Self {
            ctx,
            specs,
            validators,
        })
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Dispatch one structured call. Returns the tool's JSON result, or an
    /// error for contract violations the protocol layer must surface.
    pub async fn dispatch(&self, tool: &str, args: Value) -> Result<Value, FakesmithError> {
        let validator = self
            .validators
            .get(tool)
            .ok_or_else(|| FakesmithError::UnknownTool {
                name: tool.to_string(),
            })?;

        let violations: Vec<String> = validator.iter_errors(&args).map(|e| e.to_string()).collect();
        if !violations.is_empty() {
            return Err(FakesmithError::InvalidArguments {
                tool: tool.to_string(),
                details: violations.join("; "),
            });
        }

        debug!(tool, "dispatching tool call");
        match tool {
            "validate_recipe" => {
                let input: RecipeInput = parse_args(tool, &args)?;
                let opts: ValidateOptions = parse_args(tool, &args)?;
                let result = self.ctx.pipeline.validate(&input, opts).await?;
                Ok(serde_json::to_value(result).expect("serializable result"))
            }
            "run_recipe" => {
                let input: RecipeInput = parse_args(tool, &args)?;
                let opts: RunOptions = parse_args(tool, &args)?;
                let outcome = self.ctx.pipeline.run(&input, opts).await?;
                Ok(serde_json::to_value(outcome).expect("serializable result"))
            }
            "generate_mapping" => {
                let input: RecipeInput = parse_args(tool, &args)?;
                let mapping_args: MappingArgs = parse_args(tool, &args)?;
                let outcome = self
                    .ctx
                    .pipeline
                    .generate_mapping(&input, &mapping_args.load_declarations_paths)
                    .await?;
                Ok(serde_json::to_value(outcome).expect("serializable result"))
            }
            "list_capabilities" => Ok(self.list_capabilities()),
            "list_examples" => {
                let ListExamplesArgs { prefix } = parse_args(tool, &args)?;
                let mut names = self.ctx.examples.list_files(&[".yml"]);
                if let Some(prefix) = prefix {
                    names.retain(|n| n.starts_with(&prefix));
                }
                Ok(json!({ "examples": names }))
            }
            "get_example" => {
                let GetExampleArgs { name } = parse_args(tool, &args)?;
                let text = self.ctx.examples.read_text(&name)?;
                Ok(json!({ "name": name, "text": text }))
            }
            "search_docs" => {
                let SearchDocsArgs { query, limit } = parse_args(tool, &args)?;
                Ok(self.search_docs(&query, limit))
            }
            "get_schema" => Ok(json!({
                "uri": format!("{URI_SCHEME}://schema/recipe-jsonschema"),
                "schema": recipe_schema_text(),
            })),
            _ => unreachable!("validator map and dispatch table share keys"),
        }
    }

    /// Dereference a resource locator: run artifacts, bundled examples/docs,
    /// or the recipe schema.
    pub fn read_resource(&self, uri: &str) -> Result<Value, FakesmithError> {
        let prefix = format!("{URI_SCHEME}://");
        let rest = uri
            .strip_prefix(&prefix)
            .ok_or_else(|| FakesmithError::UnknownResource {
                uri: uri.to_string(),
            })?;

        if let Some(run_part) = rest.strip_prefix("runs/") {
            let (run_id, artifact) =
                run_part
                    .split_once('/')
                    .ok_or_else(|| FakesmithError::UnknownResource {
                        uri: uri.to_string(),
                    })?;
            let run_id = RunId::parse(run_id)?;
            let content = read_artifact(self.ctx.pipeline.store(), &run_id, artifact)?;
            return Ok(content.to_json());
        }
        if let Some(name) = rest.strip_prefix("examples/") {
            return Ok(json!(self.ctx.examples.read_text(name)?));
        }
        if let Some(name) = rest.strip_prefix("docs/") {
            return Ok(json!(self.ctx.docs.read_text(name)?));
        }
        if rest == "schema/recipe-jsonschema" {
            return Ok(json!(recipe_schema_text()));
        }

        Err(FakesmithError::UnknownResource {
            uri: uri.to_string(),
        })
    }

    fn list_capabilities(&self) -> Value {
        let limits = self.ctx.pipeline.limits();
        json!({
            "engine": self.ctx.pipeline.engine().name(),
            "supported_output_formats": self.ctx.pipeline.engine().supported_formats(),
            "limits": {
                "timeout_seconds": limits.timeout_seconds,
                "max_capture_chars": limits.max_capture_chars,
                "max_reps": limits.max_reps,
                "max_target_count": limits.max_target_count,
            },
            "tools": self.specs.iter().map(|s| s.name).collect::<Vec<_>>(),
            "resources": {
                "schema": format!("{URI_SCHEME}://schema/recipe-jsonschema"),
                "examples": format!("{URI_SCHEME}://examples/{{name}}"),
                "docs": format!("{URI_SCHEME}://docs/{{name}}"),
                "runs": format!("{URI_SCHEME}://runs/{{run_id}}/{{artifact}}"),
            },
        })
    }

    fn search_docs(&self, query: &str, limit: usize) -> Value {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        for doc in self.ctx.docs.list_files(&[".md"]) {
            let Ok(text) = self.ctx.docs.read_text(&doc) else {
                continue;
            };
            for (idx, line) in text.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    hits.push(json!({
                        "doc": doc,
                        "line": idx + 1,
                        "snippet": line.trim(),
                    }));
                    if hits.len() >= limit {
                        return json!({ "query": query, "hits": hits, "truncated": true });
                    }
                }
            }
        }
        json!({ "query": query, "hits": hits, "truncated": false })
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: &Value,
) -> Result<T, FakesmithError> {
    serde_json::from_value(args.clone()).map_err(|e| FakesmithError::InvalidArguments {
        tool: tool.to_string(),
        details: e.to_string(),
    })
}

fn recipe_input_properties() -> Value {
    json!({
        "recipe_path": { "type": ["string", "null"], "description": "Recipe file path relative to the workspace root" },
        "recipe_text": { "type": ["string", "null"], "description": "Inline recipe YAML" },
    })
}

fn tool_specs() -> Vec<ToolSpec> {
    let mut recipe_props = recipe_input_properties();
    let options_props = json!({
        "options": { "type": "object", "additionalProperties": { "type": "string" } },
        "plugin_options": { "type": "object", "additionalProperties": { "type": "string" } },
    });
    merge(&mut recipe_props, &options_props);

    let mut validate_props = recipe_props.clone();
    merge(
        &mut validate_props,
        &json!({ "strict_mode": { "type": "boolean", "default": true } }),
    );

    let mut run_props = validate_props.clone();
    merge(
        &mut run_props,
        &json!({
            "reps": { "type": ["integer", "null"], "minimum": 0 },
            "target_number": {
                "type": ["object", "null"],
                "properties": {
                    "table": { "type": "string" },
                    "count": { "type": "integer", "minimum": 0 },
                },
                "required": ["table", "count"],
            },
            "output_format": { "type": "string", "default": "txt" },
            "capture_output": { "type": "boolean", "default": true },
            "validate_only": { "type": "boolean", "default": false },
            "generate_continuation": { "type": "boolean", "default": false },
        }),
    );

    let mut mapping_props = recipe_input_properties();
    merge(
        &mut mapping_props,
        &json!({
            "load_declarations_paths": { "type": "array", "items": { "type": "string" } },
        }),
    );

    vec![
        ToolSpec {
            name: "validate_recipe",
            description: "Validate a recipe's syntax and structure without generating data",
            schema: object_schema(validate_props),
        },
        ToolSpec {
            name: "run_recipe",
            description: "Run a recipe (or validate-only) and return captured output plus run artifacts",
            schema: object_schema(run_props),
        },
        ToolSpec {
            name: "generate_mapping",
            description: "Generate a relational mapping descriptor from a recipe",
            schema: object_schema(mapping_props),
        },
        ToolSpec {
            name: "list_capabilities",
            description: "Describe engine, output formats, server limits, tools, and resources",
            schema: object_schema(json!({})),
        },
        ToolSpec {
            name: "list_examples",
            description: "List bundled example recipes, optionally filtered by prefix",
            schema: object_schema(json!({
                "prefix": { "type": ["string", "null"] },
            })),
        },
        ToolSpec {
            name: "get_example",
            description: "Fetch a bundled example recipe by name",
            schema: {
                let mut s = object_schema(json!({ "name": { "type": "string", "minLength": 1 } }));
                s["required"] = json!(["name"]);
                s
            },
        },
        ToolSpec {
            name: "search_docs",
            description: "Search the documentation for a query string",
            schema: {
                let mut s = object_schema(json!({
                    "query": { "type": "string", "minLength": 1 },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200, "default": 20 },
                }));
                s["required"] = json!(["query"]);
                s
            },
        },
        ToolSpec {
            name: "get_schema",
            description: "Return the recipe JSON schema",
            schema: object_schema(json!({})),
        },
    ]
}

fn object_schema(properties: Value) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false,
    })
}

fn merge(base: &mut Value, extra: &Value) {
    if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_map {
            base_map.insert(k.clone(), v.clone());
        }
    }
}
