// SPDX-License-Identifier: MIT

//! Flow type definitions
//!
//! Steps arrive from the application layer as JSON with camelCase keys. The
//! `config` bag stays untyped here; each handler reads the keys it knows.

use crate::adk::span::ExecutionSpan;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of step. Unrecognized names are kept so the executor can report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    Start,
    Prompt,
    Tool,
    Condition,
    Loop,
    Output,
    Other(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            StepType::Start => "start",
            StepType::Prompt => "prompt",
            StepType::Tool => "tool",
            StepType::Condition => "condition",
            StepType::Loop => "loop",
            StepType::Output => "output",
            StepType::Other(name) => name,
        }
    }
}

impl From<String> for StepType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "start" => StepType::Start,
            "prompt" => StepType::Prompt,
            "tool" => StepType::Tool,
            "condition" => StepType::Condition,
            "loop" => StepType::Loop,
            "output" => StepType::Output,
            _ => StepType::Other(name),
        }
    }
}

impl From<StepType> for String {
    fn from(step_type: StepType) -> Self {
        step_type.as_str().to_string()
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outgoing edges of a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_true: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_false: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
}

impl Connections {
    /// All declared targets, labelled by edge kind
    pub fn targets(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("next", &self.next),
            ("onTrue", &self.on_true),
            ("onFalse", &self.on_false),
            ("onError", &self.on_error),
        ]
        .into_iter()
        .filter_map(|(kind, target)| target.as_deref().map(|t| (kind, t)))
    }
}

/// A step in the flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    /// Unique identifier for this step
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub name: String,
    /// Type-specific settings
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub connections: Connections,
}

impl FlowStep {
    /// Create a step with empty config and no connections
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            step_type,
            config: Map::new(),
            connections: Connections::default(),
        }
    }

    /// Set a config key
    pub fn with_config(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    pub fn with_next(mut self, target: &str) -> Self {
        self.connections.next = Some(target.to_string());
        self
    }

    pub fn with_on_true(mut self, target: &str) -> Self {
        self.connections.on_true = Some(target.to_string());
        self
    }

    pub fn with_on_false(mut self, target: &str) -> Self {
        self.connections.on_false = Some(target.to_string());
        self
    }

    pub fn with_on_error(mut self, target: &str) -> Self {
        self.connections.on_error = Some(target.to_string());
        self
    }

    /// Read the config bag as a typed view. Unknown keys are ignored.
    pub fn config_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.config.clone()))
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Agent-level settings shared by every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            model: default_model(),
        }
    }
}

/// Input of one execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInput {
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
}

impl ExecutionInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A flow definition as stored in a YAML or JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

/// Result of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowExecutionResult {
    pub success: bool,
    pub output: String,
    pub spans: Vec<ExecutionSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub steps_executed: usize,
    pub variables: Map<String, Value>,
}
