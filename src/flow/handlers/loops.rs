// SPDX-License-Identifier: MIT

//! Loop step: bounded counter or walk over an array variable
//!
//! State is created on the first visit and removed once exhausted, so a flow
//! that reaches the same loop again starts a fresh iteration.

use super::{read_config, step_span, StepHandler, StepResult};
use crate::adk::error::FlowError;
use crate::adk::span::SpanType;
use crate::flow::context::{ExecutionContext, LoopState};
use crate::flow::state::Variables;
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::hash_map::Entry;

const DEFAULT_MAX_ITERATIONS: usize = 10;
const DEFAULT_ITEM_VARIABLE: &str = "item";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoopConfig {
    max_iterations: Option<usize>,
    items_variable: Option<String>,
    item_variable: Option<String>,
}

impl LoopConfig {
    fn initial_state(&self, vars: &Variables) -> LoopState {
        let Some(items_variable) = &self.items_variable else {
            return LoopState::counter(self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS));
        };

        let items = match vars.get_path(items_variable) {
            Some(Value::Array(items)) => items.clone(),
            other => {
                log::warn!(
                    "Loop variable '{}' is not an array ({:?}), nothing to iterate",
                    items_variable,
                    other
                );
                Vec::new()
            }
        };
        let item_variable = self
            .item_variable
            .clone()
            .unwrap_or_else(|| DEFAULT_ITEM_VARIABLE.to_string());
        LoopState::over(items, item_variable)
    }
}

/// One visit of a loop step
enum Visit {
    Iterate {
        index: usize,
        item: Option<(String, Value)>,
    },
    Exhausted {
        iterations: usize,
    },
}

pub struct LoopHandler;

#[async_trait]
impl StepHandler for LoopHandler {
    fn step_type(&self) -> StepType {
        StepType::Loop
    }

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError> {
        let started_at = Utc::now();
        let config: LoopConfig = read_config(step)?;

        let state = match ctx.loop_states.entry(step.id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(config.initial_state(&ctx.variables)),
        };

        let visit = if state.is_exhausted() {
            Visit::Exhausted {
                iterations: state.max_iterations,
            }
        } else {
            let index = state.current_index;
            let item = state
                .item_variable
                .clone()
                .zip(state.current_item().cloned());
            state.current_index += 1;
            Visit::Iterate { index, item }
        };

        let connections = &step.connections;
        let mut span = step_span(step, SpanType::Reasoning, started_at);
        let next = match visit {
            Visit::Iterate { index, item } => {
                ctx.variables.set("loopIndex", Value::from(index));
                if let Some((name, value)) = item {
                    ctx.variables.set(&name, value);
                }
                span.output = format!("iteration {}", index);
                connections
                    .on_true
                    .clone()
                    .or_else(|| connections.next.clone())
            }
            Visit::Exhausted { iterations } => {
                ctx.loop_states.remove(&step.id);
                log::debug!("Loop {} finished after {} iterations", step.id, iterations);
                span.output = format!("completed after {} iterations", iterations);
                connections
                    .on_false
                    .clone()
                    .or_else(|| connections.next.clone())
            }
        };
        ctx.record_span(span).await;

        Ok(StepResult::next(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::context::tests::test_context;
    use serde_json::json;

    async fn visit(step: &FlowStep, ctx: &mut ExecutionContext) -> Option<String> {
        LoopHandler.execute(step, ctx).await.unwrap().next_step_id
    }

    #[tokio::test]
    async fn test_counter_loop() {
        let mut ctx = test_context("");
        let step = FlowStep::new("l1", StepType::Loop)
            .with_config("maxIterations", json!(2))
            .with_on_true("body")
            .with_on_false("done");

        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        assert_eq!(ctx.variables.get("loopIndex"), Some(&json!(0)));
        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        assert_eq!(ctx.variables.get("loopIndex"), Some(&json!(1)));
        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("done"));
        assert!(ctx.loop_states.is_empty());

        // Re-entering starts over
        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        assert_eq!(ctx.variables.get("loopIndex"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_default_max_iterations() {
        let mut ctx = test_context("");
        let step = FlowStep::new("l1", StepType::Loop).with_on_true("body");

        for _ in 0..DEFAULT_MAX_ITERATIONS {
            assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        }
        assert_eq!(visit(&step, &mut ctx).await, None);
        assert_eq!(ctx.spans.len(), DEFAULT_MAX_ITERATIONS + 1);
    }

    #[tokio::test]
    async fn test_items_loop_exposes_item() {
        let mut ctx = test_context("");
        ctx.variables.set("docs", json!(["a.md", "b.md"]));
        let step = FlowStep::new("l1", StepType::Loop)
            .with_config("itemsVariable", json!("docs"))
            .with_config("itemVariable", json!("doc"))
            .with_next("after")
            .with_on_true("body");

        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        assert_eq!(ctx.variables.get("doc"), Some(&json!("a.md")));
        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("body"));
        assert_eq!(ctx.variables.get("doc"), Some(&json!("b.md")));
        assert_eq!(ctx.variables.get("loopIndex"), Some(&json!(1)));
        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_default_item_variable_and_next_fallback() {
        let mut ctx = test_context("");
        ctx.variables.set("list", json!([7]));
        let step = FlowStep::new("l1", StepType::Loop)
            .with_config("itemsVariable", json!("list"))
            .with_next("somewhere");

        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("somewhere"));
        assert_eq!(ctx.variables.get("item"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_non_array_items_are_empty() {
        let mut ctx = test_context("");
        ctx.variables.set("list", json!("not a list"));
        let step = FlowStep::new("l1", StepType::Loop)
            .with_config("itemsVariable", json!("list"))
            .with_on_true("body")
            .with_on_false("done");

        assert_eq!(visit(&step, &mut ctx).await.as_deref(), Some("done"));
        assert_eq!(ctx.variables.get("loopIndex"), None);
    }
}
