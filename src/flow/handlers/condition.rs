// SPDX-License-Identifier: MIT

//! Condition step: two-way branch

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::span::SpanType;
use crate::flow::context::ExecutionContext;
use crate::flow::expression::safe_evaluate_condition;
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConditionConfig {
    condition: Option<String>,
}

pub struct ConditionHandler;

impl ConditionHandler {
    fn condition(step: &FlowStep) -> Result<String, FlowError> {
        let config: ConditionConfig = read_config(step)?;
        config
            .condition
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| FlowError::missing_config(&step.id, "condition"))
    }
}

#[async_trait]
impl StepHandler for ConditionHandler {
    fn step_type(&self) -> StepType {
        StepType::Condition
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let connections = &step.connections;

        let condition = match Self::condition(step) {
            Ok(condition) => condition,
            Err(e) => {
                log::warn!("Condition step {}: {}", step.id, e);
                let mut span = step_span(step, SpanType::Reasoning, started_at);
                span.error = Some(e.to_string());
                ctx.record_span(span).await;

                let fallback = connections
                    .on_error
                    .clone()
                    .or_else(|| connections.on_false.clone());
                return Ok(StepResult::failed(e.to_string(), fallback));
            }
        };

        let outcome = safe_evaluate_condition(&condition, &ctx.variables);
        log::debug!("Condition step {}: '{}' is {}", step.id, condition, outcome);

        let mut span = step_span(step, SpanType::Reasoning, started_at);
        span.input = condition;
        span.output = outcome.to_string();
        ctx.record_span(span).await;

        let next = if outcome {
            connections.on_true.clone()
        } else {
            connections.on_false.clone()
        };
        Ok(StepResult::next(next))
    }
}
