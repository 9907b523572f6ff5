//! Text-embedded tool invocations: `[USE_TOOL: name]` followed by a JSON object and
//! `[END_TOOL]`, answered inline with a `[RESULTADO DE NAME]` block.

use std::ops::Range;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::tools::{ToolError, ToolOutput, ToolRegistry};

pub const START_MARKER: &str = "[USE_TOOL:";
pub const END_MARKER: &str = "[END_TOOL]";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("tool call mal formateada: {0}")]
    MalformedToolCall(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
    span: Range<usize>,
}

impl ToolCall {
    pub fn parsed_arguments(&self) -> Result<Value, ToolError> {
        if self.arguments.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&self.arguments)
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))
    }
}

/// First invocation in `text`, if any.
pub fn detect(text: &str) -> Result<Option<ToolCall>, ProtocolError> {
    let Some(start) = text.find(START_MARKER) else {
        return Ok(None);
    };
    let name_start = start + START_MARKER.len();

    let end = text[name_start..]
        .find(END_MARKER)
        .map(|offset| name_start + offset)
        .ok_or(ProtocolError::MalformedToolCall("falta [END_TOOL]"))?;
    let name_end = text[name_start..end]
        .find(']')
        .map(|offset| name_start + offset)
        .ok_or(ProtocolError::MalformedToolCall("falta ] después del nombre"))?;

    Ok(Some(ToolCall {
        name: text[name_start..name_end].trim().to_string(),
        arguments: text[name_end + 1..end].trim().to_string(),
        span: start..end + END_MARKER.len(),
    }))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedTool {
    pub name: String,
    pub output: ToolOutput,
}

/// Outcome of resolving one assistant message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub executed: Option<ExecutedTool>,
    pub error: Option<String>,
}

impl Resolution {
    pub fn is_passthrough(&self) -> bool {
        self.executed.is_none() && self.error.is_none()
    }
}

#[derive(Clone)]
pub struct ToolCallHandler {
    registry: Arc<ToolRegistry>,
}

impl ToolCallHandler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let arguments = call.parsed_arguments()?;
        self.registry.execute(&call.name, arguments).await
    }

    /// Runs the first invocation found in `text` and splices its result back in.
    pub async fn resolve(&self, text: &str) -> Resolution {
        let call = match detect(text) {
            Ok(Some(call)) => call,
            Ok(None) => {
                return Resolution { text: text.to_string(), executed: None, error: None };
            }
            Err(error) => {
                warn!(event_name = "agent.tool.malformed", error = %error, "malformed tool call");
                return with_error(text, error.to_string());
            }
        };

        match self.execute(&call).await {
            Ok(output) => {
                info!(
                    event_name = "agent.tool.executed",
                    tool = %call.name,
                    created_reservation = output.created_reservation.map(|id| id.0),
                    "tool executed"
                );
                let mut resolved = String::with_capacity(text.len() + output.text.len() + 48);
                resolved.push_str(&text[..call.span.start]);
                resolved.push_str(&text[call.span.end..]);
                resolved.push_str(&format!(
                    "\n\n[RESULTADO DE {}]:\n{}\n[FIN RESULTADO]\n",
                    call.name.to_uppercase(),
                    output.text
                ));
                Resolution {
                    text: resolved,
                    executed: Some(ExecutedTool { name: call.name, output }),
                    error: None,
                }
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = %call.name,
                    error = %error,
                    "tool execution failed"
                );
                with_error(text, format!("error ejecutando herramienta {}: {error}", call.name))
            }
        }
    }
}

fn with_error(text: &str, message: String) -> Resolution {
    Resolution { text: format!("{text}\n\n[ERROR]: {message}"), executed: None, error: Some(message) }
}
