// SPDX-License-Identifier: MIT

//! Per-execution context threaded through the step handlers
//!
//! One [`ExecutionContext`] is built for every flow execution and dropped when
//! it finishes. It owns the variables, the span trace, the sequence counter and
//! the loop states; collaborators are shared handles.

use crate::adk::model::TextGenerator;
use crate::adk::span::{ExecutionSpan, SpanInput, SpanRecorder};
use crate::adk::tool::{ToolContext, ToolExecutor};
use crate::flow::executor::ExecutorOptions;
use crate::flow::state::Variables;
use crate::flow::types::{AgentConfig, ExecutionInput};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared external collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn TextGenerator>,
    pub tools: Arc<dyn ToolExecutor>,
    pub recorder: Arc<dyn SpanRecorder>,
}

/// Iteration state of one loop step
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    pub current_index: usize,
    pub max_iterations: usize,
    /// Elements being iterated, when the loop walks a collection
    pub items: Option<Vec<Value>>,
    pub item_variable: Option<String>,
}

impl LoopState {
    /// Counter loop
    pub fn counter(max_iterations: usize) -> Self {
        Self {
            current_index: 0,
            max_iterations,
            items: None,
            item_variable: None,
        }
    }

    /// Loop over a collection, one visit per element
    pub fn over(items: Vec<Value>, item_variable: String) -> Self {
        Self {
            current_index: 0,
            max_iterations: items.len(),
            items: Some(items),
            item_variable: Some(item_variable),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.max_iterations
    }

    /// Element for the current index, if iterating a collection
    pub fn current_item(&self) -> Option<&Value> {
        self.items.as_ref()?.get(self.current_index)
    }
}

/// Mutable state of a single flow execution
pub struct ExecutionContext {
    pub agent: AgentConfig,
    pub input: ExecutionInput,
    pub variables: Variables,
    /// Sequence number the next span receives
    pub sequence: u64,
    pub spans: Vec<ExecutionSpan>,
    pub loop_states: HashMap<String, LoopState>,
    pub attempt_id: String,
    pub parent_span_id: Option<String>,
    collaborators: Collaborators,
    persist_spans: bool,
}

impl ExecutionContext {
    pub fn new(
        agent: AgentConfig,
        input: ExecutionInput,
        collaborators: Collaborators,
        options: &ExecutorOptions,
    ) -> Self {
        Self {
            agent,
            input,
            variables: Variables::empty(),
            sequence: options.initial_sequence,
            spans: Vec::new(),
            loop_states: HashMap::new(),
            attempt_id: options.attempt_id.clone(),
            parent_span_id: options.parent_span_id.clone(),
            collaborators,
            persist_spans: options.persist_spans,
        }
    }

    pub fn generator(&self) -> Arc<dyn TextGenerator> {
        Arc::clone(&self.collaborators.generator)
    }

    pub fn tools(&self) -> Arc<dyn ToolExecutor> {
        Arc::clone(&self.collaborators.tools)
    }

    /// Input a step works on when it has nothing more specific
    pub fn current_input(&self) -> String {
        self.variables
            .get_str("input")
            .map(str::to_string)
            .unwrap_or_else(|| self.input.content.clone())
    }

    /// Context handed to the tool collaborator for the next span
    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            attempt_id: self.attempt_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            sequence: self.sequence,
        }
    }

    /// Stamp the input with this execution's identity and the next sequence
    /// number, hand it to the recorder and append the span.
    pub async fn record_span(&mut self, mut input: SpanInput) -> &ExecutionSpan {
        input.attempt_id = self.attempt_id.clone();
        input.parent_span_id = self.parent_span_id.clone();
        input.sequence = self.sequence;
        self.sequence += 1;

        let recorder = Arc::clone(&self.collaborators.recorder);
        let span = recorder.create_span(input, self.persist_spans).await;
        self.push(span)
    }

    /// Append a span produced elsewhere, renumbered into this trace
    pub fn push_external_span(&mut self, mut span: ExecutionSpan) -> &ExecutionSpan {
        span.sequence = self.sequence;
        self.sequence += 1;
        self.push(span)
    }

    fn push(&mut self, span: ExecutionSpan) -> &ExecutionSpan {
        log::debug!(
            "Span {} ({:?}) recorded for step {:?}",
            span.sequence,
            span.span_type,
            span.step_id
        );
        self.spans.push(span);
        &self.spans[self.spans.len() - 1]
    }
}
