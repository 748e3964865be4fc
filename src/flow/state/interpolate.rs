// SPDX-License-Identifier: MIT

//! `{{path}}` template interpolation

use super::store::Variables;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is valid")
});

/// Replace every `{{path}}` with the value found at `path`.
///
/// Placeholders that resolve to nothing (missing or null) are left as-is.
pub fn interpolate(template: &str, vars: &Variables) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get_path(&caps[1]) {
            None | Some(Value::Null) => caps[0].to_string(),
            Some(value) => value_to_text(value),
        })
        .into_owned()
}

/// Stringify a variable for display: strings verbatim, structures as JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    }
}
