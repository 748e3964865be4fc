// SPDX-License-Identifier: MIT

//! Runtime variable storage for flow execution

use serde_json::{Map, Value};

/// Variable environment of one flow execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    fields: Map<String, Value>,
}

impl Variables {
    /// Create an empty environment
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a JSON object. Anything else yields an empty environment.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::empty(),
        }
    }

    /// Set a top-level variable
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Remove a top-level variable
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Merge an object into the environment, overwriting existing keys
    pub fn merge(&mut self, values: Map<String, Value>) {
        for (k, v) in values {
            self.fields.insert(k, v);
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Get a nested field value using dot notation (e.g., "user.name").
    /// Numeric segments index into arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl From<Map<String, Value>> for Variables {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
