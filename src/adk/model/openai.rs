// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation

use super::{Generation, GenerationRequest, TextGenerator, TokenUsage};
use crate::adk::error::BoxError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

/// OpenAI-compatible chat completions backend
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, BoxError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY must be set")?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Build the request body for a generation request
    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            if !system.is_empty() {
                messages.push(json!({ "role": "system", "content": system }));
            }
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let model = request
            .config
            .model
            .as_deref()
            .unwrap_or(self.model_name.as_str());

        let mut body = json!({
            "model": model,
            "messages": messages
        });

        if let Some(temp) = request.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = request.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    /// Parse an OpenAI response into a Generation
    fn parse_response(response: &Value) -> Result<Generation, BoxError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or("No choices in OpenAI response")?;

        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let usage = response.get("usage").and_then(|u| {
            Some(TokenUsage {
                prompt_tokens: u["prompt_tokens"].as_u64()? as u32,
                completion_tokens: u["completion_tokens"].as_u64()? as u32,
            })
        });

        Ok(Generation { text, usage })
    }
}

#[async_trait]
impl TextGenerator for OpenAIModel {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BoxError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(format!("OpenAI API error: {}", text).into());
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
