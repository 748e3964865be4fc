// SPDX-License-Identifier: MIT

//! Tool traits
//!
//! [`Tool`] is a single callable capability. [`ToolExecutor`] is the
//! collaborator the flow engine talks to: it receives a named call and returns
//! a success flag plus output, optionally with a span it recorded itself.

use crate::adk::error::BoxError;
use crate::adk::span::ExecutionSpan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for tools that can be invoked from a flow.
///
/// `name()` and `description()` return `&str` and `schema()` returns `&Value`
/// so implementations can keep them in struct fields without cloning.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, BoxError>;
}

/// A request to run one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Execution context handed to the tool collaborator
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub attempt_id: String,
    pub parent_span_id: Option<String>,
    pub sequence: u64,
}

/// Outcome of a tool call as reported by the tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(message.into()),
        }
    }
}

/// Result plus an optional span recorded by the collaborator
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: ToolResult,
    pub span: Option<ExecutionSpan>,
}

impl From<ToolResult> for ToolOutcome {
    fn from(result: ToolResult) -> Self {
        Self { result, span: None }
    }
}

/// Tool invocation collaborator
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(&self, call: ToolCall, ctx: &ToolContext)
        -> Result<ToolOutcome, BoxError>;
}
