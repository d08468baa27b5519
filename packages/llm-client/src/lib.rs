//! Provider-agnostic chat completion client.
//!
//! A minimal REST client covering the five providers the matching pipeline
//! supports (OpenAI, DeepSeek, Google, Azure OpenAI, Ollama) with no domain
//! logic. OpenAI-compatible providers share one request path; Google uses its
//! `generateContent` surface; Azure differs only in routing and auth header.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{LlmClient, Message, ProviderConfig};
//!
//! let client = LlmClient::new(ProviderConfig::deepseek(api_key))?;
//! let reply = client
//!     .chat(&[Message::system("You are terse."), Message::user("Hello!")], false)
//!     .await?;
//! ```

pub mod error;
pub mod parse;
pub mod types;

pub use error::{LlmError, Result};
pub use types::{FunctionSpec, Message, Provider, ProviderConfig};

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

/// Hard per-call timeout. A hung provider must not stall a whole batch.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Azure OpenAI API version used for deployment-scoped routes.
const AZURE_API_VERSION: &str = "2024-06-01";

/// Provider-agnostic chat client.
#[derive(Clone)]
pub struct LlmClient {
    http_client: reqwest::Client,
    config: ProviderConfig,
}

impl LlmClient {
    /// Create a client for one configured provider.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.is_empty() && config.provider != Provider::Ollama {
            return Err(LlmError::Config(format!(
                "missing API key for provider {}",
                config.provider
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// The provider this client talks to.
    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    /// Whether the provider reliably honours forced function calls.
    pub fn supports_function_calls(&self) -> bool {
        self.config.supports_function_calls
    }

    /// Chat completion returning the assistant message body.
    ///
    /// With `json_only` set, providers that support a JSON response mode are
    /// asked for one; the caller must still parse defensively.
    pub async fn chat(&self, messages: &[Message], json_only: bool) -> Result<String> {
        match self.config.provider {
            Provider::Google => self.generate_content(messages, json_only).await,
            _ => self.chat_completion(messages, json_only).await,
        }
    }

    /// Forced function call returning the parsed arguments object.
    ///
    /// Only meaningful for providers with `supports_function_calls`; others
    /// get a configuration error so callers fall through to [`chat`].
    pub async fn function_call(
        &self,
        messages: &[Message],
        function: &FunctionSpec,
    ) -> Result<serde_json::Value> {
        if !self.config.supports_function_calls {
            return Err(LlmError::Config(format!(
                "provider {} does not support function calls",
                self.config.provider
            )));
        }

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": 2000,
            "tools": [{ "type": "function", "function": function }],
            "tool_choice": { "type": "function", "function": { "name": function.name } },
        });

        let raw: types::ChatResponseRaw = self.post_openai_style(&body).await?;
        let call = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.tool_calls.into_iter().next())
            .ok_or_else(|| LlmError::Parse("no tool call in response".into()))?;

        if call.function.name != function.name {
            return Err(LlmError::Parse(format!(
                "unexpected tool call: {}",
                call.function.name
            )));
        }

        serde_json::from_str(&call.function.arguments)
            .map_err(|e| LlmError::Parse(format!("invalid tool call arguments: {e}")))
    }

    // =========================================================================
    // OpenAI-compatible path (OpenAI, DeepSeek, Azure, Ollama)
    // =========================================================================

    async fn chat_completion(&self, messages: &[Message], json_only: bool) -> Result<String> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": 2000,
        });
        if json_only {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let raw: types::ChatResponseRaw = self.post_openai_style(&body).await?;
        raw.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("empty completion response".into()))
    }

    async fn post_openai_style<T: serde::de::DeserializeOwned>(
        &self,
        body: &serde_json::Value,
    ) -> Result<T> {
        let start = std::time::Instant::now();

        let request = match self.config.provider {
            Provider::AzureOpenAi => self
                .http_client
                .post(format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    self.config.base_url.trim_end_matches('/'),
                    self.config.model,
                    AZURE_API_VERSION,
                ))
                .header("api-key", &self.config.api_key),
            _ => {
                let builder = self.http_client.post(format!(
                    "{}/chat/completions",
                    self.config.base_url.trim_end_matches('/')
                ));
                if self.config.api_key.is_empty() {
                    builder
                } else {
                    builder.header("Authorization", format!("Bearer {}", self.config.api_key))
                }
            }
        };

        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = %self.config.provider, error = %e, "chat request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(provider = %self.config.provider, status = %status, error = %error_text, "provider returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis(),
            "chat completion"
        );

        response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }

    // =========================================================================
    // Google Gemini path
    // =========================================================================

    async fn generate_content(&self, messages: &[Message], json_only: bool) -> Result<String> {
        // Gemini has no system role on this surface; fold everything into one
        // user turn in order.
        let combined = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut generation_config = json!({ "temperature": self.config.temperature });
        if json_only {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": combined }] }],
            "generationConfig": generation_config,
        });

        let response = self
            .http_client
            .post(format!(
                "{}/models/{}:generateContent",
                self.config.base_url.trim_end_matches('/'),
                self.config.model,
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                LlmError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Gemini returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let raw: types::GenerateContentRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        raw.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| LlmError::Parse("empty Gemini response".into()))
    }
}
