// SPDX-License-Identifier: MIT

//! Prompt step: one call to the text generator

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::model::{GenerationConfig, GenerationRequest};
use crate::adk::span::SpanType;
use crate::flow::context::ExecutionContext;
use crate::flow::state::interpolate;
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

const LAST_OUTPUT: &str = "lastOutput";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptConfig {
    template: Option<String>,
    system_prompt: Option<String>,
    output_variable: Option<String>,
}

pub struct PromptHandler;

#[async_trait]
impl StepHandler for PromptHandler {
    fn step_type(&self) -> StepType {
        StepType::Prompt
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let config: PromptConfig = read_config(step)?;

        let prompt = match config.template.as_deref() {
            Some(template) if !template.trim().is_empty() => interpolate(template, &ctx.variables),
            _ => ctx.current_input(),
        };
        let system_prompt = config
            .system_prompt
            .or_else(|| ctx.agent.system_prompt.clone())
            .filter(|s| !s.trim().is_empty());

        let request = GenerationRequest {
            system_prompt,
            prompt: prompt.clone(),
            config: GenerationConfig {
                temperature: Some(ctx.agent.temperature),
                max_output_tokens: Some(ctx.agent.max_tokens),
                model: Some(ctx.agent.model.clone()),
            },
        };

        log::info!("Prompt step {}: generating with {}", step.id, ctx.agent.model);
        let generated = ctx.generator().generate(request).await;

        let mut span = step_span(step, SpanType::LlmCall, started_at);
        span.input = prompt;
        span.model_id = Some(ctx.agent.model.clone());

        match generated {
            Ok(generation) => {
                let output_variable = config
                    .output_variable
                    .unwrap_or_else(|| LAST_OUTPUT.to_string());
                let text = Value::String(generation.text.clone());
                ctx.variables.set(&output_variable, text.clone());
                ctx.variables.set(LAST_OUTPUT, text.clone());

                span.output = generation.text;
                if let Some(usage) = generation.usage {
                    span.prompt_tokens = Some(usage.prompt_tokens);
                    span.completion_tokens = Some(usage.completion_tokens);
                }
                ctx.record_span(span).await;

                Ok(StepResult::next(step.connections.next.clone()).with_output(text))
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Prompt step {} failed: {}", step.id, message);
                span.error = Some(message.clone());
                ctx.record_span(span).await;

                let error = FlowError::Generation(message.clone()).to_string();
                match step.connections.on_error.clone() {
                    Some(handler) => {
                        ctx.variables.set("error", Value::String(message));
                        Ok(StepResult::failed(error, Some(handler)))
                    }
                    None => Ok(StepResult::failed(error, None)),
                }
            }
        }
    }
}
