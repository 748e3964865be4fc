// SPDX-License-Identifier: MIT

//! Sandboxed expression language
//!
//! A closed grammar over literals, variable paths and JavaScript-style
//! operators, used by condition and loop steps:
//! - `intent == 'search'`
//! - `confidence > 0.8 && !draft`
//! - `user.profile.name + '!'`
//!
//! Nothing here executes host code. Names on the deny-list are rejected by
//! the tokenizer and again on property access.

mod ast;
mod condition;
mod evaluator;
mod lexer;
mod parser;
mod value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use condition::{check_condition, safe_evaluate_condition};
pub use evaluator::{evaluate, safe_evaluate};
pub use lexer::{is_blocked, tokenize, Token, TokenKind, TokenValue, DENY_LIST};
pub use parser::parse;
pub use value::Value;
