// SPDX-License-Identifier: MIT

//! Execution spans - one trace entry per step invocation
//!
//! Spans are produced by the flow engine and handed to a [`SpanRecorder`].
//! The recorder decides whether a span is durably persisted; either way the
//! returned span is kept in the execution result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of work a span describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    LlmCall,
    ToolCall,
    ToolResult,
    #[default]
    Reasoning,
    Output,
}

/// Everything needed to create a span, minus its id
#[derive(Debug, Clone, Default)]
pub struct SpanInput {
    pub attempt_id: String,
    pub parent_span_id: Option<String>,
    pub sequence: u64,
    pub span_type: SpanType,
    pub step_id: Option<String>,
    pub step_type: Option<String>,
    pub input: String,
    pub output: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub model_id: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub tool_name: Option<String>,
    pub tool_args: Option<Value>,
    pub tool_result: Option<Value>,
    pub tool_error: Option<String>,
}

/// A recorded span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpan {
    pub id: String,
    pub attempt_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub sequence: u64,
    #[serde(rename = "type")]
    pub span_type: SpanType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_error: Option<String>,
}

impl ExecutionSpan {
    /// Materialize a span with a fresh id
    pub fn from_input(input: SpanInput) -> Self {
        let duration_ms = (input.ended_at - input.started_at)
            .num_milliseconds()
            .max(0) as u64;

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            attempt_id: input.attempt_id,
            parent_span_id: input.parent_span_id,
            sequence: input.sequence,
            span_type: input.span_type,
            step_id: input.step_id,
            step_type: input.step_type,
            input: input.input,
            output: input.output,
            error: input.error,
            started_at: input.started_at,
            ended_at: input.ended_at,
            duration_ms,
            model_id: input.model_id,
            prompt_tokens: input.prompt_tokens,
            completion_tokens: input.completion_tokens,
            tool_name: input.tool_name,
            tool_args: input.tool_args,
            tool_result: input.tool_result,
            tool_error: input.tool_error,
        }
    }
}

/// Span persistence collaborator
#[async_trait]
pub trait SpanRecorder: Send + Sync {
    /// Create a span. When `enabled` is false the span must still be
    /// returned, it is just not persisted.
    async fn create_span(&self, input: SpanInput, enabled: bool) -> ExecutionSpan;
}

/// Recorder that only builds spans in memory
#[derive(Debug, Default, Clone)]
pub struct TransientSpanRecorder;

#[async_trait]
impl SpanRecorder for TransientSpanRecorder {
    async fn create_span(&self, input: SpanInput, _enabled: bool) -> ExecutionSpan {
        ExecutionSpan::from_input(input)
    }
}
