// SPDX-License-Identifier: MIT

//! Agent development kit - collaborator interfaces and shared errors
//!
//! - [model] - text generation
//! - [tool] - tool invocation
//! - [span] - execution trace recording
//! - [error] - typed errors

pub mod error;
pub mod model;
pub mod span;
pub mod tool;
