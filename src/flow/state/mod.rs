// SPDX-License-Identifier: MIT

//! State management for flow execution
//!
//! This module provides:
//! - `Variables` - the mutable variable environment of one execution
//! - `interpolate` - `{{path}}` template substitution against it

mod interpolate;
mod store;

pub use interpolate::{interpolate, value_to_text};
pub use store::Variables;
