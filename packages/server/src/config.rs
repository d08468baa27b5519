use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;

use llm_client::ProviderConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Headless Chrome binary for the scraper; absent means plain HTTP fetching.
    pub chrome_binary: Option<String>,
    /// Job-board origin the scraper targets (deployment parameter).
    pub seek_base_url: String,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_deployment: Option<String>,
    pub ollama_base_url: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::validate_env_vars();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            chrome_binary: env::var("CHROME_BINARY").ok(),
            seek_base_url: env::var("SEEK_BASE_URL")
                .unwrap_or_else(|_| "https://www.seek.com.au".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            deepseek_api_key: env::var("DEEPSEEK_API_KEY").ok(),
            google_api_key: env::var("GOOGLE_API_KEY").ok(),
            azure_openai_api_key: env::var("AZURE_OPENAI_API_KEY").ok(),
            azure_openai_endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok(),
            azure_openai_deployment: env::var("AZURE_OPENAI_DEPLOYMENT").ok(),
            ollama_base_url: env::var("OLLAMA_BASE_URL").ok(),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| {
                    if cfg!(debug_assertions) {
                        "http://localhost:3000,http://localhost:5173".to_string()
                    } else {
                        "".to_string()
                    }
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Build the provider registry from whichever keys are configured.
    ///
    /// Model names can be overridden per provider with `*_MODEL` variables.
    pub fn provider_configs(&self) -> HashMap<String, ProviderConfig> {
        let mut providers = HashMap::new();

        if let Some(key) = &self.openai_api_key {
            let config = ProviderConfig::openai(key.clone());
            providers.insert(
                "openai".to_string(),
                with_model_override(config, "OPENAI_MODEL"),
            );
        }
        if let Some(key) = &self.deepseek_api_key {
            let config = ProviderConfig::deepseek(key.clone());
            providers.insert(
                "deepseek".to_string(),
                with_model_override(config, "DEEPSEEK_MODEL"),
            );
        }
        if let Some(key) = &self.google_api_key {
            let config = ProviderConfig::google(key.clone());
            providers.insert(
                "google".to_string(),
                with_model_override(config, "GOOGLE_MODEL"),
            );
        }
        if let (Some(key), Some(endpoint), Some(deployment)) = (
            &self.azure_openai_api_key,
            &self.azure_openai_endpoint,
            &self.azure_openai_deployment,
        ) {
            providers.insert(
                "azure_openai".to_string(),
                ProviderConfig::azure_openai(key.clone(), endpoint.clone(), deployment.clone()),
            );
        }
        if let Some(base_url) = &self.ollama_base_url {
            let config = ProviderConfig::ollama(base_url.clone());
            providers.insert(
                "ollama".to_string(),
                with_model_override(config, "OLLAMA_MODEL"),
            );
        }

        providers
    }

    /// Validate environment variables and print warnings
    fn validate_env_vars() {
        let required_vars = ["DATABASE_URL"];

        let optional_vars = [
            ("PORT", "8080"),
            ("CHROME_BINARY", "none - scraper uses plain HTTP"),
            ("SEEK_BASE_URL", "https://www.seek.com.au"),
            ("DEEPSEEK_API_KEY", "provider disabled"),
            ("OPENAI_API_KEY", "provider disabled"),
            ("GOOGLE_API_KEY", "provider disabled"),
            ("AZURE_OPENAI_API_KEY", "provider disabled"),
            ("OLLAMA_BASE_URL", "provider disabled"),
            ("ALLOWED_ORIGINS", "auto-configured"),
        ];

        let mut missing_required = Vec::new();
        let mut missing_optional = Vec::new();

        for var in &required_vars {
            if env::var(var).is_err() {
                missing_required.push(*var);
            }
        }

        for (var, default) in &optional_vars {
            if env::var(var).is_err() {
                missing_optional.push((*var, *default));
            }
        }

        if !missing_optional.is_empty() {
            tracing::warn!("Optional environment variables not set (using defaults):");
            for (var, default) in missing_optional {
                tracing::warn!("  {} (default: {})", var, default);
            }
        }

        if !missing_required.is_empty() {
            tracing::error!("Required environment variables are missing:");
            for var in &missing_required {
                tracing::error!("  {}", var);
            }
            tracing::error!("Server will fail to start without these variables!");
        }
    }
}

fn with_model_override(config: ProviderConfig, var: &str) -> ProviderConfig {
    match env::var(var) {
        Ok(model) if !model.is_empty() => config.with_model(model),
        _ => config,
    }
}
