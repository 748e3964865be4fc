// SPDX-License-Identifier: MIT

//! In-process tool collaborator backed by a name-to-tool map

use crate::adk::error::BoxError;
use crate::adk::tool::{Tool, ToolCall, ToolContext, ToolExecutor, ToolOutcome, ToolResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

static ECHO_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "additionalProperties": true
    })
});

/// Built-in tool that returns its arguments unchanged
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns its arguments unchanged"
    }

    fn schema(&self) -> &Value {
        &ECHO_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, BoxError> {
        Ok(input)
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A registry holding the built-in tools
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(EchoTool)).await;
        registry
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        log::debug!("Registering tool {}", tool.name());
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Name, description and input schema of every tool, sorted by name
    pub async fn definitions(&self) -> Vec<Value> {
        let tools = self.tools.read().await;
        let mut definitions: Vec<Value> = tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.schema(),
                })
            })
            .collect();
        definitions.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    /// Unknown tools and tool errors become failed results; this never
    /// returns `Err`.
    async fn execute_tool(
        &self,
        call: ToolCall,
        _ctx: &ToolContext,
    ) -> Result<ToolOutcome, BoxError> {
        let Some(tool) = self.get(&call.name).await else {
            log::warn!("Tool not found: {}", call.name);
            return Ok(ToolResult::failed(format!("Tool not found: {}", call.name)).into());
        };

        log::info!("Executing tool {} (call {})", call.name, call.id);
        let result = match tool.execute(call.arguments).await {
            Ok(output) => ToolResult::ok(output),
            Err(e) => {
                log::error!("Tool {} failed: {}", call.name, e);
                ToolResult::failed(e.to_string())
            }
        };
        Ok(result.into())
    }
}
