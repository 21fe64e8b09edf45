//! Line-delimited JSON dispatch loop
//!
//! One request per line on stdin, one response per line on stdout. Protocol
//! wire framing beyond this is out of scope; the loop's only job is to turn
//! structured calls into tool dispatches and raised contract violations into
//! structured error responses. Stdout carries responses exclusively; all
//! logging goes to stderr.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::pipeline::ToolError;
use crate::tools::ToolRegistry;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    args: Option<Value>,
    #[serde(default)]
    resource: Option<String>,
}

/// Serve requests from stdin until EOF.
pub async fn serve(registry: ToolRegistry) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!(
        tools = registry.specs().len(),
        "serving tool calls on stdin"
    );

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let response = handle_line(&registry, &line).await;
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn handle_line(registry: &ToolRegistry, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "unparseable request line");
            return failure(
                None,
                ToolError {
                    kind: "InvalidInput".to_string(),
                    message: format!("request is not valid JSON: {e}"),
                    filename: None,
                    line: None,
                },
            );
        }
    };

    let outcome = match (&request.tool, &request.resource) {
        (Some(tool), None) => {
            let args = request.args.clone().unwrap_or_else(|| json!({}));
            registry.dispatch(tool, args).await
        }
        (None, Some(uri)) => registry.read_resource(uri),
        _ => {
            return failure(
                request.id,
                ToolError {
                    kind: "InvalidInput".to_string(),
                    message: "provide exactly one of 'tool' or 'resource'".to_string(),
                    filename: None,
                    line: None,
                },
            )
        }
    };

    match outcome {
        Ok(result) => json!({ "id": request.id, "ok": true, "result": result }),
        Err(err) => failure(request.id, ToolError::from(&err)),
    }
}

fn failure(id: Option<Value>, error: ToolError) -> Value {
    json!({ "id": id, "ok": false, "error": error })
}
