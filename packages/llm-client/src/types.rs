//! Request and response types shared across providers.

use serde::{Deserialize, Serialize};

// =============================================================================
// Providers
// =============================================================================

/// Supported language-model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl Provider {
    /// Parse a provider key as it appears in task instructions.
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "deepseek" => Some(Provider::DeepSeek),
            "google" => Some(Provider::Google),
            "azure_openai" => Some(Provider::AzureOpenAi),
            "ollama" => Some(Provider::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
            Provider::Google => "google",
            Provider::AzureOpenAi => "azure_openai",
            Provider::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider connection settings.
///
/// `temperature` defaults low (0.2) to stabilize scoring output across runs.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub supports_function_calls: bool,
    pub temperature: f32,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            supports_function_calls: true,
            temperature: 0.2,
        }
    }

    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::DeepSeek,
            api_key: api_key.into(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            supports_function_calls: false,
            temperature: 0.2,
        }
    }

    pub fn google(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Google,
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            supports_function_calls: false,
            temperature: 0.2,
        }
    }

    /// Azure routes by deployment name; `endpoint` is the resource URL
    /// (e.g. `https://my-resource.openai.azure.com`).
    pub fn azure_openai(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            provider: Provider::AzureOpenAi,
            api_key: api_key.into(),
            base_url: endpoint.into(),
            model: deployment.into(),
            supports_function_calls: true,
            temperature: 0.2,
        }
    }

    pub fn ollama(base_url: impl Into<String>) -> Self {
        Self {
            provider: Provider::Ollama,
            api_key: String::new(),
            base_url: base_url.into(),
            model: "llama3.1".to_string(),
            supports_function_calls: false,
            temperature: 0.2,
        }
    }

    /// Override the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

// =============================================================================
// Chat messages
// =============================================================================

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A function the model is forced to call, with its JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// =============================================================================
// Raw response shapes (internal parsing)
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallRaw {
    pub function: ToolCallFunctionRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallFunctionRaw {
    pub name: String,
    /// JSON-encoded arguments string.
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentRaw {
    pub candidates: Vec<CandidateRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateRaw {
    pub content: CandidateContentRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContentRaw {
    #[serde(default)]
    pub parts: Vec<CandidatePartRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidatePartRaw {
    #[serde(default)]
    pub text: Option<String>,
}
