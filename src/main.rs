use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use evoflow_rs::adk::model::openai::OpenAIModel;
use evoflow_rs::flow::expression::{safe_evaluate, safe_evaluate_condition};
use evoflow_rs::flow::loader::FlowLoader;
use evoflow_rs::flow::registry::ToolRegistry;
use evoflow_rs::flow::state::Variables;
use evoflow_rs::flow::types::StepType;
use evoflow_rs::flow::{validate_flow, ExecutionInput, ExecutorOptions, FlowExecutor, RetryPolicy};

use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a flow from a file
    Run {
        /// Path to the flow file (YAML or JSON)
        #[arg(short, long)]
        file: String,

        /// Input to the flow
        #[arg(short, long)]
        input: String,

        /// Prior session context
        #[arg(short, long)]
        context: Option<String>,

        /// Override the agent's model
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of steps
        #[arg(long, default_value_t = 100)]
        max_steps: usize,

        /// Retries after a failed execution
        #[arg(long, default_value_t = 0)]
        retries: u32,

        /// Delay between retries in milliseconds
        #[arg(long, default_value_t = 1000)]
        retry_delay_ms: u64,

        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a flow file without running it
    Validate {
        /// Path to the flow file (YAML or JSON)
        #[arg(short, long)]
        file: String,
    },
    /// Evaluate an expression against JSON variables
    Eval {
        /// The expression
        expression: String,

        /// Variables as a JSON object
        #[arg(short, long, default_value = "{}")]
        vars: String,

        /// Evaluate as a condition (shorthands allowed, never fails)
        #[arg(long)]
        condition: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            file,
            input,
            context,
            model,
            max_steps,
            retries,
            retry_delay_ms,
            json,
        } => {
            let mut document = FlowLoader::new()
                .load_flow(&file)
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("Could not load flow {}", file))?;
            if let Some(model) = model {
                document.agent.model = model;
            }

            let report = validate_flow(&document.steps);
            for warning in &report.warnings {
                log::warn!("{}", warning);
            }

            log::info!("Using model: {}", document.agent.model);
            let generator =
                OpenAIModel::new(document.agent.model.clone()).map_err(|e| anyhow!(e))?;
            let tools = ToolRegistry::with_builtins().await;
            for step in document.steps.iter().filter(|s| s.step_type == StepType::Tool) {
                let name = step.config.get("toolName").and_then(|v| v.as_str());
                if let Some(name) = name {
                    if tools.get(name).await.is_none() {
                        log::warn!("Step '{}' uses unregistered tool '{}'", step.id, name);
                    }
                }
            }
            let executor = FlowExecutor::new(Arc::new(generator), Arc::new(tools));

            let mut execution_input = ExecutionInput::new(input);
            if let Some(context) = context {
                execution_input = execution_input.with_context(context);
            }
            let options = ExecutorOptions {
                max_steps,
                persist_spans: false,
                ..Default::default()
            };
            let policy = RetryPolicy {
                max_retries: retries,
                delay: Duration::from_millis(retry_delay_ms),
            };

            println!("Running flow: {}", document.name);
            let result = executor
                .execute_with_retry(
                    &document.agent,
                    &document.steps,
                    execution_input,
                    &options,
                    &policy,
                )
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Response: {}", result.output);
            }
            if let Some(error) = result.error {
                bail!("Flow failed after {} steps: {}", result.steps_executed, error);
            }
        }
        Commands::Validate { file } => {
            let document = FlowLoader::new()
                .load_flow(&file)
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("Could not load flow {}", file))?;

            let report = validate_flow(&document.steps);
            for error in &report.errors {
                println!("error: {}", error);
            }
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            if !report.valid {
                bail!("{} has {} error(s)", file, report.errors.len());
            }
            println!("{} is valid", file);
        }
        Commands::Eval {
            expression,
            vars,
            condition,
            json: as_json,
        } => {
            let json: serde_json::Value =
                serde_json::from_str(&vars).context("--vars must be a JSON object")?;
            if !json.is_object() {
                bail!("--vars must be a JSON object");
            }
            let variables = Variables::from_json(json);

            if condition {
                println!("{}", safe_evaluate_condition(&expression, &variables));
            } else {
                let value = safe_evaluate(&expression, &variables)?;
                if as_json {
                    println!("{}", value.to_json());
                } else {
                    println!("{} ({})", value, value.type_name());
                }
            }
        }
    }

    Ok(())
}
