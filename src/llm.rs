// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for OpenAI-compatible inference servers (LM Studio, vLLM, OpenAI)

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::ai::{Generation, GenerationOptions, ImageGenerator, TextGenerator, TokenUsage};
use crate::config::EngineConfig;
use crate::{DadabaseError, Result};

/// OpenAI-compatible API client
pub struct LlmClient {
    client: Client,
    base_url: String,
    model: String,
    image_model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<UsageBlock>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageBlock {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

impl LlmClient {
    /// Create a client from the engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DadabaseError::Config(format!("Failed to create HTTP client: {}", e)))?;

        // Normalize URL
        let base_url = config
            .url
            .trim_end_matches('/')
            .trim_end_matches("/chat/completions")
            .to_string();

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            image_model: config.image_model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Map a non-success status to an error carrying the body text
    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return Err(DadabaseError::AiUnavailable(format!(
                "Rate limited by {}",
                self.base_url
            )));
        }
        Err(DadabaseError::AiUnavailable(format!(
            "AI engine returned status {}: {}",
            status, body
        )))
    }

    /// Check if the engine is reachable
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                DadabaseError::AiUnavailable(format!(
                    "Cannot connect to AI engine at {}: {}",
                    self.base_url, e
                ))
            })?;
        self.check_status(response).await?;
        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let models: ModelsResponse = self.check_status(response).await?.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Check if the configured text model is served
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == &self.model || m.starts_with(&self.model)))
    }

    /// One chat completion with an optional system message
    pub async fn chat(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system_prompt.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: Some(options.max_tokens.unwrap_or(self.max_tokens)),
            temperature: Some(options.temperature.unwrap_or(self.temperature)),
        };

        debug!("Sending chat request: model={}", self.model);

        let response = self.authorize(self.client.post(&url)).json(&request).send().await?;
        let result: ChatResponse = self.check_status(response).await?.json().await?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DadabaseError::AiUnavailable("No choices in AI response".to_string()))?;
        let usage = result.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        Ok(Generation { content, usage })
    }

    /// Generate a 1024x1024 image and return the decoded PNG bytes
    pub async fn image(&self, description: &str) -> Result<Vec<u8>> {
        let url = format!("{}/images/generations", self.base_url);
        let request = ImageRequest {
            model: &self.image_model,
            prompt: description,
            n: 1,
            size: "1024x1024",
            response_format: "b64_json",
        };

        debug!("Sending image request: model={}", self.image_model);

        let response = self.authorize(self.client.post(&url)).json(&request).send().await?;
        let result: ImageResponse = self.check_status(response).await?.json().await?;

        let encoded = result
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .ok_or_else(|| DadabaseError::Image("No image data in response".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DadabaseError::Image(format!("Invalid image encoding: {}", e)))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation> {
        self.chat(prompt, options).await
    }
}

#[async_trait]
impl ImageGenerator for LlmClient {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>> {
        self.image(description).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalized() {
        let config = EngineConfig {
            url: "http://localhost:1234/v1/chat/completions/".to_string(),
            api_key: Some("  ".to_string()),
            ..EngineConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "phi-4",
            messages: vec![
                ChatMessage { role: "system", content: "be brief" },
                ChatMessage { role: "user", content: "hi" },
            ],
            max_tokens: Some(400),
            temperature: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["max_tokens"], 400);
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_chat_response_parses_usage() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}],
                      "usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("ok"));
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 12);
    }

    #[tokio::test]
    async fn test_unreachable_engine_reports_unavailable() {
        let config = EngineConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..EngineConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        let err = client.health_check().await.unwrap_err();
        assert!(matches!(err, DadabaseError::AiUnavailable(_)));
    }
}
