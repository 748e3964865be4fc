// SPDX-License-Identifier: MIT

//! Tool step: one call to the tool collaborator

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::span::SpanType;
use crate::adk::tool::{ToolCall, ToolResult};
use crate::flow::context::ExecutionContext;
use crate::flow::state::{interpolate, value_to_text, Variables};
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ToolConfig {
    tool_name: Option<String>,
    args: Option<Map<String, Value>>,
    /// Older name for `args`
    parameters: Option<Map<String, Value>>,
    /// Single templated string passed as `input`
    input_mapping: Option<String>,
    output_variable: Option<String>,
}

impl ToolConfig {
    fn arguments(self, vars: &Variables) -> Map<String, Value> {
        let raw = match (self.args, self.parameters, self.input_mapping) {
            (Some(args), _, _) => args,
            (None, Some(parameters), _) => parameters,
            (None, None, Some(mapping)) => {
                let mut args = Map::new();
                args.insert("input".to_string(), Value::String(mapping));
                args
            }
            (None, None, None) => Map::new(),
        };

        raw.into_iter()
            .map(|(key, value)| match value {
                Value::String(template) => (key, Value::String(interpolate(&template, vars))),
                other => (key, other),
            })
            .collect()
    }
}

pub struct ToolHandler;

#[async_trait]
impl StepHandler for ToolHandler {
    fn step_type(&self) -> StepType {
        StepType::Tool
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let mut config: ToolConfig = read_config(step)?;

        let tool_name = config
            .tool_name
            .take()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| FlowError::missing_config(&step.id, "toolName"))?;
        let output_variable = config.output_variable.take();
        let arguments = Value::Object(config.arguments(&ctx.variables));

        let call = ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name: tool_name.clone(),
            arguments: arguments.clone(),
        };

        log::info!("Tool step {}: calling {}", step.id, tool_name);
        let tool_ctx = ctx.tool_context();
        let outcome = match ctx.tools().execute_tool(call, &tool_ctx).await {
            Ok(outcome) => outcome,
            Err(e) => ToolResult::failed(e.to_string()).into(),
        };
        let result = outcome.result;

        ctx.variables.set("lastToolResult", result.output.clone());
        ctx.variables.set("lastToolSuccess", Value::Bool(result.success));
        if result.success {
            if let Some(name) = &output_variable {
                ctx.variables.set(name, result.output.clone());
            }
        } else {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "tool reported failure".to_string());
            ctx.variables.set("error", Value::String(message));
        }

        match outcome.span {
            Some(span) => {
                ctx.push_external_span(span);
            }
            None => {
                let mut span = step_span(step, SpanType::ToolCall, started_at);
                span.input = arguments.to_string();
                span.output = value_to_text(&result.output);
                span.error = result.error.clone();
                span.tool_name = Some(tool_name.clone());
                span.tool_args = Some(arguments);
                span.tool_result = Some(result.output.clone());
                span.tool_error = result.error.clone();
                ctx.record_span(span).await;
            }
        }

        if result.success {
            return Ok(StepResult::next(step.connections.next.clone()).with_output(result.output));
        }

        let error = FlowError::Tool {
            name: tool_name,
            message: result.error.unwrap_or_default(),
        };
        log::warn!("Tool step {} failed: {}", step.id, error);
        Ok(StepResult::failed(
            error.to_string(),
            step.connections.on_error.clone(),
        ))
    }
}
