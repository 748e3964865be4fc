// SPDX-License-Identifier: MIT

//! Flow loader - reads flow documents from YAML or JSON files

use crate::adk::error::BoxError;
use crate::flow::types::FlowDocument;
use std::fs;
use std::path::Path;

/// Loads flow documents from disk
pub struct FlowLoader;

impl FlowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a flow document. `.json` files are parsed as JSON, anything else
    /// as YAML.
    pub fn load_flow<P: AsRef<Path>>(&self, path: P) -> Result<FlowDocument, BoxError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let document = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse_yaml(&content)?
        };

        log::info!(
            "Loaded flow '{}' with {} steps from {}",
            document.name,
            document.steps.len(),
            path.display()
        );
        Ok(document)
    }

    /// Parse a flow document from a YAML string
    pub fn parse_yaml(content: &str) -> Result<FlowDocument, BoxError> {
        let document: FlowDocument = serde_yaml::from_str(content)?;
        Ok(document)
    }

    /// Parse a flow document from a JSON string
    pub fn parse_json(content: &str) -> Result<FlowDocument, BoxError> {
        let document: FlowDocument = serde_json::from_str(content)?;
        Ok(document)
    }
}

impl Default for FlowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::types::StepType;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_flow() {
        let yaml = r#"
name: Triage
description: "Routes support questions"

agent:
  systemPrompt: "You are a support agent."
  temperature: 0.2

steps:
  - id: start
    type: start
    connections:
      next: check
  - id: check
    type: condition
    config:
      condition: "input contains 'refund'"
    connections:
      onTrue: refund
      onFalse: answer
  - id: refund
    type: tool
    config:
      toolName: open_ticket
      args:
        summary: "{{input}}"
    connections:
      next: answer
  - id: answer
    type: prompt
    config:
      template: "Reply to: {{input}}"
    connections:
      next: out
  - id: out
    type: output
"#;
        let doc = FlowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(doc.name, "Triage");
        assert_eq!(doc.agent.temperature, 0.2);
        assert_eq!(doc.agent.max_tokens, 2048);
        assert_eq!(doc.steps.len(), 5);
        assert_eq!(doc.steps[1].step_type, StepType::Condition);
        assert_eq!(doc.steps[1].connections.on_false.as_deref(), Some("answer"));
        assert_eq!(doc.steps[2].config["args"], json!({"summary": "{{input}}"}));
    }

    #[test]
    fn test_parse_json_flow() {
        let doc = FlowLoader::parse_json(
            r#"{"name": "Echo", "steps": [{"id": "out", "type": "output"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.description, "");
        assert_eq!(doc.agent.model, "gpt-4o-mini");
        assert_eq!(doc.steps[0].step_type, StepType::Output);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(FlowLoader::parse_yaml("name: [unclosed").is_err());
        assert!(FlowLoader::parse_json(r#"{"steps": []}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FlowLoader::new()
            .load_flow("/definitely/not/here.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = std::env::temp_dir();
        let json_path = dir.join(format!("evoflow-{}.json", uuid::Uuid::new_v4()));
        fs::write(&json_path, r#"{"name": "FromJson"}"#).unwrap();

        let doc = FlowLoader::new().load_flow(&json_path).unwrap();
        assert_eq!(doc.name, "FromJson");
        assert!(doc.steps.is_empty());

        fs::remove_file(json_path).unwrap();
    }
}
