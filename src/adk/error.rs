// SPDX-License-Identifier: MIT

//! Typed error handling for evoflow-rs
//!
//! Two families of errors live here:
//! - [`ExprError`] is raised by the expression tokenizer and parser. Syntax
//!   problems and security-boundary violations share the type but can be told
//!   apart with [`ExprError::is_security_violation`].
//! - [`FlowError`] describes why a step or a whole flow execution failed.
//!
//! Collaborators (text generation, tools) report failures as [`BoxError`].

use thiserror::Error;

/// Error type returned by external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while tokenizing or parsing an expression
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// A string literal was opened but never closed
    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// A character outside the expression alphabet
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    /// A token that does not fit the grammar at this point
    #[error("Unexpected token '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    /// An opening parenthesis without its closing partner
    #[error("Expected ')' at position {position}")]
    UnmatchedParen { position: usize },

    /// A '.' that is not followed by a property name
    #[error("Expected property name after '.' at position {position}")]
    ExpectedProperty { position: usize },

    /// Parentheses, prefix operators or operator chains nested past the limit
    #[error("Expression nested too deeply at position {position}")]
    TooDeep { position: usize },

    /// Identifier rejected by the deny-list
    #[error("Access to '{0}' is not allowed")]
    BlockedIdentifier(String),

    /// Property name rejected by the deny-list
    #[error("Access to property '{0}' is not allowed")]
    BlockedProperty(String),
}

impl ExprError {
    /// True when the error comes from the deny-list rather than from syntax
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            ExprError::BlockedIdentifier(_) | ExprError::BlockedProperty(_)
        )
    }
}

/// Errors raised while executing a flow
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FlowError {
    /// No handler is registered for the step's type
    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    /// A connection or entry point references an id that is not in the flow
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// The step-count guard tripped
    #[error("Flow exceeded maximum steps limit ({limit})")]
    MaxStepsExceeded { limit: usize },

    /// A required config key is absent
    #[error("Step '{step_id}' is missing required config '{field}'")]
    MissingConfig { step_id: String, field: String },

    /// The config bag could not be read as the step type expects
    #[error("Step '{step_id}' has invalid config: {message}")]
    InvalidConfig { step_id: String, message: String },

    /// The text generator rejected the request
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The tool collaborator reported a failure
    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    /// A handler reported failure and nothing handled it
    #[error("Step '{step_id}' failed: {message}")]
    StepFailed { step_id: String, message: String },

    /// Nothing to execute
    #[error("Flow has no steps and the agent has no system prompt")]
    EmptyFlow,
}

impl FlowError {
    /// Create a missing config error
    pub fn missing_config(step_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingConfig {
            step_id: step_id.into(),
            field: field.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            step_id: step_id.into(),
            message: message.into(),
        }
    }

    /// Create a step failure
    pub fn step_failed(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepFailed {
            step_id: step_id.into(),
            message: message.into(),
        }
    }

    /// Whether re-running the flow could change the outcome.
    ///
    /// Hitting the step limit is deterministic for a given flow, so retrying
    /// it only burns budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FlowError::MaxStepsExceeded { .. })
    }
}
