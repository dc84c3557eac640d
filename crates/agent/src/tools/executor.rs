use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::args::ToolArgs;
use super::handlers::ClinicTools;
use super::injection::{inject_defaults, InjectionContext};
use super::{ToolError, ToolName, ToolResult};

/// Validates, injects and dispatches tool calls. Nothing raised by a handler
/// escapes: every failure becomes a [`ToolResult::Error`].
#[derive(Clone)]
pub struct ToolExecutor {
    tools: Arc<ClinicTools>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ClinicTools>, timeout: Duration) -> Self {
        Self { tools, timeout }
    }

    pub fn prepare(&self, name: &str, arguments: &Map<String, Value>) -> Result<ToolArgs, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        ToolArgs::parse(tool, arguments)
    }

    pub async fn run(&self, args: ToolArgs, correlation_id: &str) -> ToolResult {
        let tool = args.tool();
        let started = Instant::now();

        let outcome =
            match tokio::time::timeout(self.timeout, self.tools.dispatch(args, correlation_id)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ToolError::TimedOut { tool, seconds: self.timeout.as_secs() }),
            };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => info!(
                event_name = "tool.executed",
                correlation_id,
                tool = tool.as_str(),
                elapsed_ms,
                "tool call completed"
            ),
            Err(error) => warn!(
                event_name = "tool.failed",
                correlation_id,
                tool = tool.as_str(),
                elapsed_ms,
                error = %error,
                "tool call failed"
            ),
        }

        ToolResult::from(outcome)
    }

    /// Full path for one model-requested call: parse, fill defaults, run.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        injection: &InjectionContext<'_>,
        correlation_id: &str,
    ) -> ToolResult {
        let mut args = match self.prepare(name, arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!(
                    event_name = "tool.rejected",
                    correlation_id,
                    tool = name,
                    error = %error,
                    "tool call rejected before dispatch"
                );
                return ToolResult::from(Err(error));
            }
        };

        let injected = inject_defaults(&mut args, injection);
        if !injected.is_empty() {
            info!(
                event_name = "tool.arguments_injected",
                correlation_id,
                tool = name,
                fields = ?injected,
                "filled omitted tool arguments from caller context"
            );
        }

        self.run(args, correlation_id).await
    }
}
