// SPDX-License-Identifier: MIT

//! Flow executor
//!
//! Walks the step graph from its entry step, dispatching each step to the
//! handler registered for its type, until a step has nowhere to go. Cycles are
//! legal (loops); the step-count limit is what bounds them.

use crate::adk::error::FlowError;
use crate::adk::model::{GenerationConfig, GenerationRequest, TextGenerator};
use crate::adk::span::{SpanInput, SpanRecorder, SpanType, TransientSpanRecorder};
use crate::adk::tool::ToolExecutor;
use crate::flow::context::{Collaborators, ExecutionContext};
use crate::flow::handlers::{default_handlers, step_span, HandlerRegistry, StepHandler};
use crate::flow::state::value_to_text;
use crate::flow::types::{AgentConfig, ExecutionInput, FlowExecutionResult, FlowStep, StepType};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-execution settings
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Upper bound on handler invocations
    pub max_steps: usize,
    /// Passed to the span recorder as its `enabled` flag
    pub persist_spans: bool,
    pub attempt_id: String,
    pub parent_span_id: Option<String>,
    /// Sequence number of the first span
    pub initial_sequence: u64,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_steps: 100,
            persist_spans: true,
            attempt_id: uuid::Uuid::new_v4().to_string(),
            parent_span_id: None,
            initial_sequence: 0,
        }
    }
}

/// How [`FlowExecutor::execute_with_retry`] re-runs failed executions
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Counters kept while walking the graph
#[derive(Default)]
struct Progress {
    steps_executed: usize,
    output: Option<Value>,
}

/// Step-graph executor
pub struct FlowExecutor {
    collaborators: Collaborators,
    handlers: HandlerRegistry,
}

impl FlowExecutor {
    /// Create an executor with the built-in handlers and in-memory spans
    pub fn new(generator: Arc<dyn TextGenerator>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            collaborators: Collaborators {
                generator,
                tools,
                recorder: Arc::new(TransientSpanRecorder),
            },
            handlers: default_handlers(),
        }
    }

    /// Use a different span recorder
    pub fn with_recorder(mut self, recorder: Arc<dyn SpanRecorder>) -> Self {
        self.collaborators.recorder = recorder;
        self
    }

    /// Register a handler, replacing any handler for the same step type
    pub fn with_handler(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.insert(handler.step_type(), handler);
        self
    }

    /// Execute a flow. Never fails: every problem ends up in the result.
    pub async fn execute(
        &self,
        agent: &AgentConfig,
        steps: &[FlowStep],
        input: ExecutionInput,
        options: &ExecutorOptions,
    ) -> FlowExecutionResult {
        self.run(agent, steps, input, options).await.0
    }

    /// Execute, re-running failed executions per `policy`. Hitting the step
    /// limit is returned as is.
    pub async fn execute_with_retry(
        &self,
        agent: &AgentConfig,
        steps: &[FlowStep],
        input: ExecutionInput,
        options: &ExecutorOptions,
        policy: &RetryPolicy,
    ) -> FlowExecutionResult {
        let mut retries = 0;
        loop {
            let (result, error) = self.run(agent, steps, input.clone(), options).await;
            let Some(error) = error else {
                return result;
            };

            if !error.is_retryable() {
                log::warn!("Not retrying flow: {}", error);
                return result;
            }
            if retries >= policy.max_retries {
                log::error!("Flow failed after {} retries: {}", retries, error);
                return result;
            }

            retries += 1;
            log::warn!(
                "Flow failed ({}), retry {}/{} in {:?}",
                error,
                retries,
                policy.max_retries,
                policy.delay
            );
            tokio::time::sleep(policy.delay).await;
        }
    }

    async fn run(
        &self,
        agent: &AgentConfig,
        steps: &[FlowStep],
        input: ExecutionInput,
        options: &ExecutorOptions,
    ) -> (FlowExecutionResult, Option<FlowError>) {
        let started = Instant::now();
        let mut ctx =
            ExecutionContext::new(agent.clone(), input, self.collaborators.clone(), options);
        let mut progress = Progress::default();

        let outcome = if steps.is_empty() {
            self.single_prompt(&mut ctx, &mut progress).await
        } else {
            self.walk(steps, &mut ctx, options.max_steps, &mut progress)
                .await
        };

        let error = outcome.err();
        match &error {
            Some(e) => log::error!("Flow execution failed: {}", e),
            None => log::info!(
                "Flow completed: {} steps, {} spans",
                progress.steps_executed,
                ctx.spans.len()
            ),
        }

        let result = FlowExecutionResult {
            success: error.is_none(),
            output: progress
                .output
                .as_ref()
                .map(value_to_text)
                .unwrap_or_default(),
            spans: ctx.spans,
            error: error.as_ref().map(ToString::to_string),
            duration_ms: started.elapsed().as_millis() as u64,
            steps_executed: progress.steps_executed,
            variables: ctx.variables.as_map().clone(),
        };
        (result, error)
    }

    async fn walk(
        &self,
        steps: &[FlowStep],
        ctx: &mut ExecutionContext,
        max_steps: usize,
        progress: &mut Progress,
    ) -> Result<(), FlowError> {
        let lookup: HashMap<&str, &FlowStep> =
            steps.iter().map(|step| (step.id.as_str(), step)).collect();

        // Flows without a start step begin at their first step
        let mut current = steps
            .iter()
            .find(|step| step.step_type == StepType::Start)
            .or_else(|| steps.first())
            .ok_or(FlowError::EmptyFlow)?;

        loop {
            if progress.steps_executed >= max_steps {
                return Err(FlowError::MaxStepsExceeded { limit: max_steps });
            }
            progress.steps_executed += 1;

            let handler = self
                .handlers
                .get(&current.step_type)
                .ok_or_else(|| FlowError::UnknownStepType(current.step_type.to_string()))?;

            log::info!("Executing step {} ({})", current.id, current.step_type);
            let started_at = Utc::now();

            let next = match handler.execute(current, ctx).await {
                Ok(result) => {
                    if let Some(output) = result.output {
                        progress.output = Some(output);
                    }
                    match (result.success, result.next_step_id) {
                        (true, Some(next)) => next,
                        (true, None) => return Ok(()),
                        (false, Some(next)) => {
                            log::warn!(
                                "Step {} failed ({}), continuing at {}",
                                current.id,
                                result.error.as_deref().unwrap_or("no error"),
                                next
                            );
                            next
                        }
                        (false, None) => {
                            return Err(FlowError::step_failed(
                                &current.id,
                                result.error.unwrap_or_else(|| "step failed".to_string()),
                            ))
                        }
                    }
                }
                Err(e) => {
                    log::error!("Step {} raised: {}", current.id, e);
                    let mut span = step_span(current, SpanType::Reasoning, started_at);
                    span.error = Some(e.to_string());
                    ctx.record_span(span).await;

                    match current.connections.on_error.clone() {
                        Some(on_error) => {
                            ctx.variables.set("error", Value::String(e.to_string()));
                            on_error
                        }
                        None => return Err(e),
                    }
                }
            };

            current = lookup
                .get(next.as_str())
                .copied()
                .ok_or(FlowError::StepNotFound(next))?;
        }
    }

    /// A flow with no steps is a single generation with the agent's system
    /// prompt over the raw input.
    async fn single_prompt(
        &self,
        ctx: &mut ExecutionContext,
        progress: &mut Progress,
    ) -> Result<(), FlowError> {
        let system_prompt = ctx
            .agent
            .system_prompt
            .clone()
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or(FlowError::EmptyFlow)?;

        let started_at = Utc::now();
        let request = GenerationRequest {
            system_prompt: Some(system_prompt),
            prompt: ctx.input.content.clone(),
            config: GenerationConfig {
                temperature: Some(ctx.agent.temperature),
                max_output_tokens: Some(ctx.agent.max_tokens),
                model: Some(ctx.agent.model.clone()),
            },
        };

        log::info!("Empty flow, running a single prompt");
        let generated = ctx.generator().generate(request).await;

        let mut span = SpanInput {
            span_type: SpanType::LlmCall,
            input: ctx.input.content.clone(),
            model_id: Some(ctx.agent.model.clone()),
            started_at,
            ended_at: Utc::now(),
            ..Default::default()
        };

        match generated {
            Ok(generation) => {
                span.output = generation.text.clone();
                if let Some(usage) = generation.usage {
                    span.prompt_tokens = Some(usage.prompt_tokens);
                    span.completion_tokens = Some(usage.completion_tokens);
                }
                ctx.record_span(span).await;

                let text = Value::String(generation.text);
                ctx.variables.set("lastOutput", text.clone());
                progress.output = Some(text);
                Ok(())
            }
            Err(e) => {
                span.error = Some(e.to_string());
                ctx.record_span(span).await;
                Err(FlowError::Generation(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::BoxError;
    use crate::adk::model::Generation;
    use crate::flow::context::tests::EchoTools;
    use crate::flow::handlers::StepResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Generator that plays back scripted replies, then echoes
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(Generation::text(text)),
                Some(Err(message)) => Err(message.into()),
                None => Ok(Generation::text(format!("echo: {}", request.prompt))),
            }
        }
    }

    fn executor(generator: Arc<ScriptedGenerator>) -> FlowExecutor {
        FlowExecutor::new(generator, Arc::new(EchoTools))
    }

    fn simple_flow() -> Vec<FlowStep> {
        vec![
            FlowStep::new("start", StepType::Start).with_next("p1"),
            FlowStep::new("p1", StepType::Prompt).with_next("out"),
            FlowStep::new("out", StepType::Output),
        ]
    }

    fn spinning_flow(iterations: u64) -> Vec<FlowStep> {
        vec![
            FlowStep::new("start", StepType::Start).with_next("loop"),
            FlowStep::new("loop", StepType::Loop)
                .with_config("maxIterations", json!(iterations))
                .with_on_true("body")
                .with_on_false("out"),
            FlowStep::new("body", StepType::Prompt).with_next("loop"),
            FlowStep::new("out", StepType::Output),
        ]
    }

    #[tokio::test]
    async fn test_three_step_traversal() {
        let generator = ScriptedGenerator::new(vec![Ok("Generated answer")]);
        let options = ExecutorOptions {
            initial_sequence: 5,
            ..Default::default()
        };

        let result = executor(generator)
            .execute(
                &AgentConfig::default(),
                &simple_flow(),
                ExecutionInput::new("question"),
                &options,
            )
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.steps_executed, 3);
        assert_eq!(result.output, "Generated answer");
        let order: Vec<_> = result
            .spans
            .iter()
            .map(|s| s.step_id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(order, vec!["start", "p1", "out"]);
        let sequences: Vec<_> = result.spans.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![5, 6, 7]);
        assert!(result.spans.iter().all(|s| s.attempt_id == options.attempt_id));
    }

    #[tokio::test]
    async fn test_max_steps_bounds_runaway_loop() {
        let generator = ScriptedGenerator::new(vec![]);
        let options = ExecutorOptions {
            max_steps: 10,
            ..Default::default()
        };

        let result = executor(generator)
            .execute(
                &AgentConfig::default(),
                &spinning_flow(1000),
                ExecutionInput::new("go"),
                &options,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.steps_executed, 10);
        assert!(result.error.unwrap().contains("maximum steps limit"));
        assert_eq!(result.spans.len(), 10);
    }

    #[tokio::test]
    async fn test_output_does_not_leak_input() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("out"),
            FlowStep::new("out", StepType::Output),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("SYSTEM: internal instruction"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output, "");
    }

    #[tokio::test]
    async fn test_prompt_failure_follows_error_handler() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("p1"),
            FlowStep::new("p1", StepType::Prompt)
                .with_next("out")
                .with_on_error("recover"),
            FlowStep::new("recover", StepType::Output)
                .with_config("template", json!("Recovered from: {{error}}")),
            FlowStep::new("out", StepType::Output),
        ];

        let result = executor(ScriptedGenerator::new(vec![Err("provider down")]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.variables["error"], json!("provider down"));
        assert_eq!(result.output, "Recovered from: provider down");
        assert_eq!(result.steps_executed, 3);
    }

    #[tokio::test]
    async fn test_unhandled_prompt_failure_stops() {
        let result = executor(ScriptedGenerator::new(vec![Err("provider down")]))
            .execute(
                &AgentConfig::default(),
                &simple_flow(),
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.steps_executed, 2);
        let error = result.error.unwrap();
        assert!(error.contains("p1") && error.contains("provider down"), "{}", error);
    }

    #[tokio::test]
    async fn test_thrown_error_follows_error_handler() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("t1"),
            FlowStep::new("t1", StepType::Tool)
                .with_next("out")
                .with_on_error("out"),
            FlowStep::new("out", StepType::Output).with_config("variable", json!("error")),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert!(result.output.contains("toolName"));
        assert_eq!(result.spans.len(), 3);
        assert!(result.spans[1].error.is_some());
    }

    #[tokio::test]
    async fn test_thrown_error_without_handler_stops() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("t1"),
            FlowStep::new("t1", StepType::Tool).with_next("out"),
            FlowStep::new("out", StepType::Output),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(FlowError::missing_config("t1", "toolName").to_string())
        );
        assert_eq!(result.spans.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_step_type() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("x"),
            FlowStep::new("x", StepType::Other("webhook".to_string())),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown step type: webhook"));
    }

    #[tokio::test]
    async fn test_dangling_connection() {
        let steps = vec![FlowStep::new("start", StepType::Start).with_next("ghost")];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Step not found: ghost"));
        assert_eq!(result.steps_executed, 1);
    }

    #[tokio::test]
    async fn test_first_step_is_entry_without_start() {
        let steps = vec![
            FlowStep::new("p1", StepType::Prompt).with_next("out"),
            FlowStep::new("out", StepType::Output),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("question"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output, "echo: question");
    }

    #[tokio::test]
    async fn test_empty_flow_single_prompt() {
        let agent = AgentConfig {
            system_prompt: Some("Answer briefly".to_string()),
            ..Default::default()
        };

        let result = executor(ScriptedGenerator::new(vec![Ok("42")]))
            .execute(
                &agent,
                &[],
                ExecutionInput::new("meaning of life?"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output, "42");
        assert_eq!(result.steps_executed, 0);
        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.spans[0].span_type, SpanType::LlmCall);
    }

    #[tokio::test]
    async fn test_empty_flow_without_system_prompt() {
        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &[],
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.error, Some(FlowError::EmptyFlow.to_string()));
    }

    #[tokio::test]
    async fn test_object_output_is_json() {
        let steps = vec![
            FlowStep::new("start", StepType::Start)
                .with_config("variables", json!({"report": {"score": 3}}))
                .with_next("out"),
            FlowStep::new("out", StepType::Output).with_config("variable", json!("report")),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
            )
            .await;

        assert_eq!(result.output, r#"{"score":3}"#);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let generator = ScriptedGenerator::new(vec![Err("flaky"), Err("flaky"), Ok("finally")]);
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        };

        let result = executor(generator.clone())
            .execute_with_retry(
                &AgentConfig::default(),
                &simple_flow(),
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
                &policy,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output, "finally");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let generator = ScriptedGenerator::new(vec![Err("down"); 5]);
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(1),
        };

        let result = executor(generator.clone())
            .execute_with_retry(
                &AgentConfig::default(),
                &simple_flow(),
                ExecutionInput::new("hi"),
                &ExecutorOptions::default(),
                &policy,
            )
            .await;

        assert!(!result.success);
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_max_steps_is_not_retried() {
        let generator = ScriptedGenerator::new(vec![]);
        let options = ExecutorOptions {
            max_steps: 6,
            ..Default::default()
        };
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        };

        let result = executor(generator.clone())
            .execute_with_retry(
                &AgentConfig::default(),
                &spinning_flow(1000),
                ExecutionInput::new("go"),
                &options,
                &policy,
            )
            .await;

        assert!(!result.success);
        // start, loop, body, loop, body, loop
        assert_eq!(generator.calls(), 2);
    }

    /// Handler for a custom step type that upper-cases the input
    struct ShoutHandler;

    #[async_trait]
    impl StepHandler for ShoutHandler {
        fn step_type(&self) -> StepType {
            StepType::Other("shout".to_string())
        }

        async fn execute(
            &self,
            step: &FlowStep,
            ctx: &mut ExecutionContext,
        ) -> Result<StepResult, FlowError> {
            let loud = ctx.current_input().to_uppercase();
            ctx.variables.set("lastOutput", json!(loud));
            let span = step_span(step, SpanType::Reasoning, Utc::now());
            ctx.record_span(span).await;
            Ok(StepResult::next(step.connections.next.clone()))
        }
    }

    #[tokio::test]
    async fn test_custom_handler() {
        let steps = vec![
            FlowStep::new("start", StepType::Start).with_next("s"),
            FlowStep::new("s", StepType::Other("shout".to_string())).with_next("out"),
            FlowStep::new("out", StepType::Output),
        ];

        let result = executor(ScriptedGenerator::new(vec![]))
            .with_handler(Arc::new(ShoutHandler))
            .execute(
                &AgentConfig::default(),
                &steps,
                ExecutionInput::new("quiet"),
                &ExecutorOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.output, "QUIET");
    }
}
