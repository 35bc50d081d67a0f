// Copyright (c) 2026 Relay Labs, Inc.
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Adapter - Anti-Corruption Layer Implementation
//
// HTTP adapter for OpenAI-compatible chat completion endpoints, translating
// between the domain's CompletionProvider seam and the wire API. Structured
// completions send the expected JSON schema as a response-format hint; the
// judge still validates whatever comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::domain::llm::{CompletionError, CompletionOptions, CompletionProvider};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiCompatAdapter {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn send(&self, request: ChatRequest) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(DEFAULT_REQUEST_TIMEOUT.as_secs())
                } else {
                    CompletionError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::Request("response contained no choices".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatAdapter {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        self.send(ChatRequest {
            model: self.model.clone(),
            messages: messages(system_prompt, user_prompt),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: None,
        })
        .await
    }

    async fn complete_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        json_schema: &Value,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        self.send(ChatRequest {
            model: self.model.clone(),
            messages: messages(system_prompt, user_prompt),
            // Deterministic unless the caller asks for sampling spread.
            temperature: options.temperature.or(Some(0.0)),
            max_tokens: options.max_tokens,
            response_format: Some(ResponseFormat {
                kind: "json_schema",
                json_schema: json_schema.clone(),
            }),
        })
        .await
    }
}

fn messages(system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: system_prompt.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user_prompt.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_empty_options() {
        let request = ChatRequest {
            model: "relay-judge".to_string(),
            messages: messages("sys", "usr"),
            temperature: None,
            max_tokens: None,
            response_format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn test_structured_request_carries_schema() {
        let request = ChatRequest {
            model: "relay-judge".to_string(),
            messages: messages("sys", "usr"),
            temperature: Some(0.0),
            max_tokens: None,
            response_format: Some(ResponseFormat {
                kind: "json_schema",
                json_schema: serde_json::json!({"type": "object"}),
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["type"], "object");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"content":"{\"ok\":true}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"ok\":true}");
    }
}
