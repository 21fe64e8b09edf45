//! Mock engine for testing
//!
//! Returns scripted outcomes without running a real generation pass.
//! Essential for unit tests and CI pipelines.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Engine, EngineError, GenerateOutput, GenerateRequest};

/// One scripted outcome for a [`MockEngine`] call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Succeed, writing `output` to every requested destination
    Succeed { output: String, summary: String },
    /// Reject the recipe's content, engine-style
    ContentError {
        kind: String,
        message: String,
        filename: Option<String>,
        line: Option<u64>,
    },
    /// Sleep before succeeding, for timeout tests
    Block(Duration),
    /// Fail with an engine-side system condition
    Fail(String),
}

/// Mock engine with a FIFO queue of behaviors and request recording.
pub struct MockEngine {
    behaviors: Arc<Mutex<Vec<MockBehavior>>>,
    default_output: String,
    /// Track all requests made (for assertions)
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl MockEngine {
    /// Create a mock that echoes a fixed record per call
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(Mutex::new(vec![])),
            default_output: "Account(id=1)\n".to_string(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create with a queue of behaviors (consumed front to back)
    pub fn with_behaviors(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Arc::new(Mutex::new(behaviors)),
            default_output: "Account(id=1)\n".to_string(),
            requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Set the default output used when the queue is empty
    pub fn with_default_output(mut self, output: impl Into<String>) -> Self {
        self.default_output = output.into();
        self
    }

    /// Append a behavior to the queue
    pub fn queue(&self, behavior: MockBehavior) {
        self.behaviors.lock().unwrap().push(behavior);
    }

    /// Get all requests made to this engine
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of generate calls made
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_behavior(&self) -> MockBehavior {
        let mut queue = self.behaviors.lock().unwrap();
        if queue.is_empty() {
            MockBehavior::Succeed {
                output: self.default_output.clone(),
                summary: "Generated 1 record".to_string(),
            }
        } else {
            queue.remove(0)
        }
    }

    fn write_destinations(request: &GenerateRequest, output: &str) -> Result<(), EngineError> {
        if request.validate_only {
            return Ok(());
        }
        if let Some(file) = &request.output_file {
            std::fs::write(file, output)?;
        }
        if let Some(folder) = &request.output_folder {
            std::fs::create_dir_all(folder)?;
            std::fs::write(folder.join("data.csv"), output)?;
        }
        if let Some(mapping) = &request.mapping_file {
            std::fs::write(mapping, output)?;
        }
        if let Some(continuation) = &request.continuation_file {
            std::fs::write(continuation, output)?;
        }
        Ok(())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateOutput, EngineError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut behavior = self.next_behavior();
        if let MockBehavior::Block(duration) = behavior {
            tokio::time::sleep(duration).await;
            behavior = MockBehavior::Succeed {
                output: self.default_output.clone(),
                summary: "Generated 1 record".to_string(),
            };
        }

        match behavior {
            MockBehavior::Succeed { output, summary } => {
                Self::write_destinations(&request, &output)?;
                Ok(GenerateOutput {
                    summary,
                    captured: request.capture.then_some(output),
                })
            }
            MockBehavior::ContentError {
                kind,
                message,
                filename,
                line,
            } => Err(EngineError::Content {
                kind,
                message,
                filename,
                line,
            }),
            MockBehavior::Fail(message) => Err(EngineError::Unavailable(message)),
            MockBehavior::Block(_) => unreachable!("handled above"),
        }
    }
}
