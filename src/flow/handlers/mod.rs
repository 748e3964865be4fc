// SPDX-License-Identifier: MIT

//! Step handlers
//!
//! One handler per step type. A handler reads a typed view of the step's
//! config, mutates the execution context, records one span and says where to
//! go next.
//!
//! Failures come in two shapes:
//! - `Ok(StepResult { success: false, .. })` is a failure the handler already
//!   dealt with (span recorded, `variables.error` set, `onError` chosen).
//! - `Err(FlowError)` is thrown; the executor records it and follows the
//!   step's `onError` connection if there is one.

mod condition;
mod loops;
mod output;
mod prompt;
mod start;
mod tool;

pub use condition::ConditionHandler;
pub use loops::LoopHandler;
pub use output::OutputHandler;
pub use prompt::PromptHandler;
pub use start::StartHandler;
pub use tool::ToolHandler;

use crate::adk::error::FlowError;
use crate::adk::span::{SpanInput, SpanType};
use crate::flow::context::ExecutionContext;
use crate::flow::types::{FlowStep, StepType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler reports back to the executor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    /// Value produced by the step; control-flow steps produce none
    pub output: Option<Value>,
    pub next_step_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl StepResult {
    /// Successful step continuing at `next`
    pub fn next(next: Option<String>) -> Self {
        Self {
            output: None,
            next_step_id: next,
            success: true,
            error: None,
        }
    }

    /// Handled failure, optionally continuing at an error handler
    pub fn failed(error: impl Into<String>, next: Option<String>) -> Self {
        Self {
            output: None,
            next_step_id: next,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }
}

/// Executes one kind of step
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Step type this handler is registered under
    fn step_type(&self) -> StepType;

    async fn execute(
        &self,
        step: &FlowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepResult, FlowError>;
}

/// Handlers keyed by the step type they serve
pub type HandlerRegistry = HashMap<StepType, Arc<dyn StepHandler>>;

/// Registry with the six built-in handlers
pub fn default_handlers() -> HandlerRegistry {
    let handlers: Vec<Arc<dyn StepHandler>> = vec![
        Arc::new(StartHandler),
        Arc::new(PromptHandler),
        Arc::new(ToolHandler),
        Arc::new(ConditionHandler),
        Arc::new(LoopHandler),
        Arc::new(OutputHandler),
    ];
    handlers
        .into_iter()
        .map(|handler| (handler.step_type(), handler))
        .collect()
}

/// Read a step's config as the handler's typed view
pub(crate) fn read_config<T: DeserializeOwned>(step: &FlowStep) -> Result<T, FlowError> {
    step.config_as().map_err(|e| FlowError::invalid_config(&step.id, e.to_string()))
}

/// Span skeleton for a step; sequence and identity are filled on record
pub(crate) fn step_span(
    step: &FlowStep,
    span_type: SpanType,
    started_at: DateTime<Utc>,
) -> SpanInput {
    SpanInput {
        span_type,
        step_id: Some(step.id.clone()),
        step_type: Some(step.step_type.to_string()),
        started_at,
        ended_at: Utc::now(),
        ..Default::default()
    }
}
