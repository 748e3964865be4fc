// SPDX-License-Identifier: MIT

//! Static flow validation
//!
//! Inspects a flow without running it. Errors mean the flow cannot run
//! safely; warnings are advisory.

use crate::flow::expression::check_condition;
use crate::flow::types::{FlowStep, StepType};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Findings for one flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate a flow definition
pub fn validate_flow(steps: &[FlowStep]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut lookup: HashMap<&str, &FlowStep> = HashMap::new();
    for step in steps {
        if lookup.insert(step.id.as_str(), step).is_some() {
            errors.push(format!("Duplicate step id '{}'", step.id));
        }
    }

    let start = steps.iter().find(|s| s.step_type == StepType::Start);
    if start.is_none() {
        errors.push("Flow has no start step".to_string());
    }
    if !steps.iter().any(|s| s.step_type == StepType::Output) {
        warnings.push("Flow has no output step".to_string());
    }

    for step in steps {
        for (kind, target) in step.connections.targets() {
            if !lookup.contains_key(target) {
                errors.push(format!(
                    "Step '{}' has {} connection to unknown step '{}'",
                    step.id, kind, target
                ));
            }
        }

        match step.step_type {
            StepType::Condition => check_condition_step(step, &mut errors, &mut warnings),
            StepType::Loop if step.connections.on_true.is_none() => {
                warnings.push(format!("Loop step '{}' has no onTrue (body) connection", step.id));
            }
            StepType::Tool if !has_text(step, "toolName") => {
                errors.push(format!("Tool step '{}' is missing toolName", step.id));
            }
            _ => {}
        }
    }

    if let Some(start) = start {
        let reachable = reachable_from(start, &lookup);
        for step in steps {
            if !reachable.contains(step.id.as_str()) {
                warnings.push(format!(
                    "Step '{}' is unreachable from the start step",
                    step.id
                ));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_condition_step(step: &FlowStep, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let connections = &step.connections;
    if connections.on_true.is_none() && connections.on_false.is_none() {
        warnings.push(format!(
            "Condition step '{}' has neither onTrue nor onFalse",
            step.id
        ));
    }

    match step.config.get("condition").and_then(|c| c.as_str()) {
        Some(condition) if !condition.trim().is_empty() => {
            if let Err(e) = check_condition(condition) {
                errors.push(format!(
                    "Condition step '{}' has an invalid condition: {}",
                    step.id, e
                ));
            }
        }
        _ => warnings.push(format!("Condition step '{}' has no condition", step.id)),
    }
}

fn has_text(step: &FlowStep, key: &str) -> bool {
    step.config
        .get(key)
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty())
}

/// Breadth-first walk over every connection kind
fn reachable_from<'a>(
    start: &'a FlowStep,
    lookup: &HashMap<&str, &'a FlowStep>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::from([start.id.as_str()]);
    let mut queue = VecDeque::from([start]);

    while let Some(step) = queue.pop_front() {
        for (_, target) in step.connections.targets() {
            if let Some(&next) = lookup.get(target) {
                if seen.insert(next.id.as_str()) {
                    queue.push_back(next);
                }
            }
        }
    }
    seen
}
