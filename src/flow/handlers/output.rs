// SPDX-License-Identifier: MIT

//! Output step: produces the flow's final answer and ends the flow

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::span::SpanType;
use crate::flow::context::ExecutionContext;
use crate::flow::state::{interpolate, value_to_text};
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OutputConfig {
    template: Option<String>,
    variable: Option<String>,
}

pub struct OutputHandler;

impl OutputHandler {
    /// Resolve the final value. The raw flow input is never a candidate: it
    /// may be an internal instruction string.
    fn resolve(config: OutputConfig, ctx: &ExecutionContext) -> Value {
        if let Some(template) = config.template.filter(|t| !t.is_empty()) {
            return Value::String(interpolate(&template, &ctx.variables));
        }
        let present = |value: Option<&Value>| value.filter(|v| !v.is_null()).cloned();
        if let Some(value) = config
            .variable
            .and_then(|name| present(ctx.variables.get_path(&name)))
        {
            return value;
        }
        present(ctx.variables.get("lastOutput")).unwrap_or_else(|| Value::String(String::new()))
    }
}

#[async_trait]
impl StepHandler for OutputHandler {
    fn step_type(&self) -> StepType {
        StepType::Output
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let config: OutputConfig = read_config(step)?;
        let output = Self::resolve(config, ctx);

        let mut span = step_span(step, SpanType::Output, started_at);
        span.output = value_to_text(&output);
        ctx.record_span(span).await;

        Ok(StepResult::next(None).with_output(output))
    }
}
