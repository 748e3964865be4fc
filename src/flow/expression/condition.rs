// SPDX-License-Identifier: MIT

//! Condition evaluation for flow branching
//!
//! Conditions accept a few natural-language shorthands before falling back to
//! the full expression language:
//! - `result exists` / `exists result`
//! - `items is empty` / `items is not empty`
//! - `message contains 'error'`
//!
//! [`safe_evaluate_condition`] never fails: anything that cannot be evaluated
//! is `false`.

use super::ast::Expr;
use super::evaluator::{evaluate, safe_evaluate};
use super::lexer::is_blocked;
use super::parser::parse;
use super::value::Value;
use crate::adk::error::ExprError;
use crate::flow::state::Variables;
use once_cell::sync::Lazy;
use regex::Regex;

const PATH: &str = r"[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z0-9_$]+)*";

static EXISTS_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*({})\s+exists\s*$", PATH)).expect("exists pattern is valid")
});

static EXISTS_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*exists\s+({})\s*$", PATH)).expect("exists pattern is valid")
});

static IS_EMPTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*({})\s+is\s+(not\s+)?empty\s*$", PATH))
        .expect("empty pattern is valid")
});

static CONTAINS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)^\s*({})\s+contains\s+(?:'([^']*)'|"([^"]*)")\s*$"#,
        PATH
    ))
    .expect("contains pattern is valid")
});

/// A recognized shorthand condition
#[derive(Debug, Clone, PartialEq)]
enum Shorthand {
    Exists(String),
    Empty { path: String, negated: bool },
    Contains { path: String, needle: String },
}

fn match_shorthand(condition: &str) -> Option<Shorthand> {
    if let Some(caps) = EXISTS_AFTER
        .captures(condition)
        .or_else(|| EXISTS_BEFORE.captures(condition))
    {
        return Some(Shorthand::Exists(caps[1].to_string()));
    }
    if let Some(caps) = IS_EMPTY.captures(condition) {
        return Some(Shorthand::Empty {
            path: caps[1].to_string(),
            negated: caps.get(2).is_some(),
        });
    }
    if let Some(caps) = CONTAINS.captures(condition) {
        let needle = caps.get(2).or_else(|| caps.get(3))?;
        return Some(Shorthand::Contains {
            path: caps[1].to_string(),
            needle: needle.as_str().to_string(),
        });
    }
    None
}

impl Shorthand {
    fn path(&self) -> &str {
        match self {
            Shorthand::Exists(path) => path,
            Shorthand::Empty { path, .. } | Shorthand::Contains { path, .. } => path,
        }
    }

    fn evaluate(&self, vars: &Variables) -> Result<bool, ExprError> {
        let value = resolve(self.path(), vars)?;
        let result = match self {
            Shorthand::Exists(_) => !value.is_nullish(),
            Shorthand::Empty { negated, .. } => is_empty(&value) != *negated,
            Shorthand::Contains { needle, .. } => contains(&value, needle),
        };
        Ok(result)
    }
}

/// Resolve a dotted path, enforcing the deny-list on every segment
fn resolve(path: &str, vars: &Variables) -> Result<Value, ExprError> {
    let mut segments = path.split('.').map(str::to_string);
    let root = segments.next().unwrap_or_default();
    if is_blocked(&root) {
        return Err(ExprError::BlockedIdentifier(root));
    }
    let properties: Vec<String> = segments.collect();
    if let Some(blocked) = properties.iter().find(|p| is_blocked(p)) {
        return Err(ExprError::BlockedProperty(blocked.clone()));
    }
    Ok(evaluate(&Expr::Path { root, properties }, vars))
}

/// Emptiness: nullish, blank strings, empty arrays and objects
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.contains(needle),
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(needle)),
        _ => false,
    }
}

/// Evaluate a condition to a boolean. Never fails; errors yield `false`.
pub fn safe_evaluate_condition(condition: &str, vars: &Variables) -> bool {
    let result = match match_shorthand(condition) {
        Some(shorthand) => shorthand.evaluate(vars),
        None => safe_evaluate(condition, vars).map(|v| v.to_bool()),
    };

    result.unwrap_or_else(|e| {
        if e.is_security_violation() {
            log::warn!("Blocked condition '{}': {}", condition, e);
        } else {
            log::debug!("Condition '{}' failed to evaluate: {}", condition, e);
        }
        false
    })
}

/// Statically check that a condition can be evaluated
pub fn check_condition(condition: &str) -> Result<(), ExprError> {
    match match_shorthand(condition) {
        Some(shorthand) => resolve(shorthand.path(), &Variables::empty()).map(|_| ()),
        None => parse(condition).map(|_| ()),
    }
}
