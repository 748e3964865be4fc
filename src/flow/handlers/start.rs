// SPDX-License-Identifier: MIT

//! Start step: seeds the variable environment

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::span::SpanType;
use crate::flow::context::ExecutionContext;
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StartConfig {
    variables: Option<Map<String, Value>>,
}

pub struct StartHandler;

#[async_trait]
impl StepHandler for StartHandler {
    fn step_type(&self) -> StepType {
        StepType::Start
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let config: StartConfig = read_config(step)?;

        ctx.variables.set("input", Value::String(ctx.input.content.clone()));
        if let Some(session) = ctx.input.context.clone() {
            ctx.variables.set("sessionContext", Value::String(session));
        }
        if let Some(variables) = config.variables {
            log::debug!("Start step {} seeds {} variables", step.id, variables.len());
            ctx.variables.merge(variables);
        }

        let mut span = step_span(step, SpanType::Reasoning, started_at);
        span.input = ctx.input.content.clone();
        span.output = "Flow started".to_string();
        ctx.record_span(span).await;

        Ok(StepResult::next(step.connections.next.clone()))
    }
}
