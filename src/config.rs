//! Configuration for the chat assistant
//!
//! Settings come from three layers, later ones winning: built-in defaults, an
//! optional TOML file, and environment variables (after `.env` has been
//! loaded by the binary). Credentials are only ever read from the environment
//! and are never serialized back out.

use crate::http::HttpSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_API_BASE_URL_ENV: &str = "OPENAI_API_BASE_URL";
pub const MODEL_NAME_ENV: &str = "MODEL_NAME";
pub const SERPAPI_API_KEY_ENV: &str = "SERPAPI_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub services: ServicesSection,
}

/// Chat model settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Resolved from OPENAI_API_KEY
    #[serde(skip)]
    pub api_key: String,
    /// OpenAI-compatible API root
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    /// Model turns allowed per user message
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Request timeout for the chat endpoint
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: None,
            max_tokens: None,
            max_turns: default_max_turns(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Endpoints and limits for the wrapped third-party APIs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicesSection {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_serpapi_url")]
    pub serpapi_url: String,
    /// Resolved from SERPAPI_API_KEY; search tools report an error without it
    #[serde(skip)]
    pub serpapi_api_key: Option<String>,
    /// Transport timeout applied to every tool request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Timeout for fetching arbitrary web pages
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// User agent presented to arbitrary web pages
    #[serde(default = "default_browser_user_agent")]
    pub browser_user_agent: String,
    /// Upper bound on page text returned by web_fetch
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            serpapi_url: default_serpapi_url(),
            serpapi_api_key: None,
            timeout_secs: default_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            browser_user_agent: default_browser_user_agent(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_turns() -> usize {
    10
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_serpapi_url() -> String {
    "https://serpapi.com/search".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_max_content_chars() -> usize {
    20_000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}. Set it in your environment or .env file")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    /// Load from an optional TOML file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.resolve_env(|name| std::env::var(name).ok())
    }

    /// Parse a TOML file without resolving credentials
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Overlay environment values and validate
    ///
    /// Empty variables count as unset.
    pub fn resolve_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        self.llm.api_key = get(OPENAI_API_KEY_ENV)
            .ok_or_else(|| ConfigError::EnvVarNotFound(OPENAI_API_KEY_ENV.to_string()))?;

        if let Some(base_url) = get(OPENAI_API_BASE_URL_ENV) {
            self.llm.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get(MODEL_NAME_ENV) {
            self.llm.model = model;
        }
        self.services.serpapi_api_key = get(SERPAPI_API_KEY_ENV);

        self.validate()?;
        Ok(self)
    }

    /// Check URLs and limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("llm.base_url", &self.llm.base_url)?;
        validate_url("services.geocoding_url", &self.services.geocoding_url)?;
        validate_url("services.forecast_url", &self.services.forecast_url)?;
        validate_url("services.serpapi_url", &self.services.serpapi_url)?;

        if self.llm.max_turns == 0 {
            return Err(ConfigError::InvalidConfig(
                "llm.max_turns must be at least 1".to_string(),
            ));
        }
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature must be between 0.0 and 2.0, got {temperature}"
                )));
            }
        }
        if self.services.timeout_secs == 0 || self.services.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "service timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Transport settings for the tool HTTP adapter
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.services.timeout_secs),
            ..Default::default()
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let mut config = Self::default();
        config.llm.api_key = "test-key".to_string();
        config.services.serpapi_api_key = Some("serp-key".to_string());
        config
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} '{value}' is not a valid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidConfig(format!(
            "{field} must use http or https, got '{scheme}'"
        ))),
    }
}
