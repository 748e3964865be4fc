// SPDX-License-Identifier: MIT

//! Step-based flow engine
//!
//! - [expression] - sandboxed expression language and conditions
//! - [state] - variable environment and template interpolation
//! - [types] - steps, connections, agent config, execution result
//! - [handlers] - one handler per step type
//! - [executor] - graph walk, step bounding, retries
//! - [validator] - static checks on a flow definition
//! - [loader] - YAML/JSON flow documents
//! - [registry] - in-process tool collaborator

pub mod context;
pub mod executor;
pub mod expression;
pub mod handlers;
pub mod loader;
pub mod registry;
pub mod state;
pub mod types;
pub mod validator;

pub use executor::{ExecutorOptions, FlowExecutor, RetryPolicy};
pub use types::{
    AgentConfig, Connections, ExecutionInput, FlowDocument, FlowExecutionResult, FlowStep,
    StepType,
};
pub use validator::{validate_flow, ValidationReport};
