// SPDX-License-Identifier: MIT

//! Expression evaluator

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::is_blocked;
use super::parser::parse;
use super::value::Value;
use crate::adk::error::ExprError;
use crate::flow::state::Variables;

/// Parse and evaluate an expression against a variable environment
pub fn safe_evaluate(source: &str, vars: &Variables) -> Result<Value, ExprError> {
    let expr = parse(source)?;
    Ok(evaluate(&expr, vars))
}

/// Evaluate a parsed expression. Evaluation itself cannot fail: every
/// rejection happens while parsing.
pub fn evaluate(expr: &Expr, vars: &Variables) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Path { root, properties } => resolve_path(root, properties, vars),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, vars);
            match op {
                UnaryOp::Not => Value::Bool(!value.to_bool()),
                UnaryOp::Neg => Value::Number(-value.to_number()),
            }
        }
        Expr::Binary { op, left, right } => evaluate_binary(*op, left, right, vars),
    }
}

fn resolve_path(root: &str, properties: &[String], vars: &Variables) -> Value {
    let mut current = vars.get(root).map(Value::from_json).unwrap_or_default();
    for name in properties {
        // Parsed paths never contain blocked names; ASTs built by hand might
        if is_blocked(name) || current.is_nullish() {
            return Value::Undefined;
        }
        current = current.property(name);
    }
    current
}

fn evaluate_binary(op: BinaryOp, left: &Expr, right: &Expr, vars: &Variables) -> Value {
    match op {
        BinaryOp::Or => {
            Value::Bool(evaluate(left, vars).to_bool() || evaluate(right, vars).to_bool())
        }
        BinaryOp::And => {
            Value::Bool(evaluate(left, vars).to_bool() && evaluate(right, vars).to_bool())
        }
        _ => {
            let l = evaluate(left, vars);
            let r = evaluate(right, vars);
            apply_binary(op, &l, &r)
        }
    }
}

fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(l.loose_equals(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNotEq => Value::Bool(!l.strict_equals(r)),
        BinaryOp::Lt => compare(l, r, |a, b| a < b, |a, b| a < b),
        BinaryOp::Gt => compare(l, r, |a, b| a > b, |a, b| a > b),
        BinaryOp::Lte => compare(l, r, |a, b| a <= b, |a, b| a <= b),
        BinaryOp::Gte => compare(l, r, |a, b| a >= b, |a, b| a >= b),
        BinaryOp::Add => add(l, r),
        BinaryOp::Sub => Value::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Number(l.to_number() / r.to_number()),
        BinaryOp::Mod => Value::Number(l.to_number() % r.to_number()),
        BinaryOp::Or => Value::Bool(l.to_bool() || r.to_bool()),
        BinaryOp::And => Value::Bool(l.to_bool() && r.to_bool()),
    }
}

fn compare<N, S>(l: &Value, r: &Value, numeric: N, lexical: S) -> Value
where
    N: Fn(f64, f64) -> bool,
    S: Fn(&str, &str) -> bool,
{
    match (l, r) {
        (Value::String(a), Value::String(b)) => Value::Bool(lexical(a.as_str(), b.as_str())),
        // NaN on either side makes every comparison false
        _ => Value::Bool(numeric(l.to_number(), r.to_number())),
    }
}

fn add(l: &Value, r: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(l) || stringy(r) {
        Value::String(format!("{}{}", l.to_js_string(), r.to_js_string()))
    } else {
        Value::Number(l.to_number() + r.to_number())
    }
}
