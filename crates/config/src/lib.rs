//! Configuration loading, validation, and management for DataBot.
//!
//! Loads configuration from `~/.databot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use databot_core::search::FallbackPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.databot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Search index configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Chat model configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Planner (prompt + retrieval budget) configuration
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve the embedded test chat page at `/` and `/test`.
    #[serde(default = "default_true")]
    pub serve_test_page: bool,
}

fn default_port() -> u16 {
    3978
}
fn default_host() -> String {
    "localhost".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            serve_test_page: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Service endpoint, e.g. `https://my-service.search.windows.net`
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    /// Fields projected from each document
    #[serde(default = "default_select_fields")]
    pub select_fields: Vec<String>,

    /// Field the category filter applies to
    #[serde(default = "default_category_field")]
    pub category_field: String,

    /// Categories the primary request is restricted to (empty = no filter)
    #[serde(default = "default_preferred_categories")]
    pub preferred_categories: Vec<String>,

    /// Named scoring profile for the primary request
    #[serde(default = "default_scoring_profile", skip_serializing_if = "Option::is_none")]
    pub scoring_profile: Option<String>,

    /// Result cap per request
    #[serde(default = "default_top")]
    pub top: usize,

    /// Which primary failures fall back to a degraded request.
    ///
    /// The default, `capability_only`, retries only when the index rejects
    /// the request shape (HTTP 400). Outages, timeouts and auth failures
    /// surface immediately without a second call. Set `any_error` to retry
    /// once without filter and scoring profile after any primary failure.
    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_index_name() -> String {
    "data-dictionary".into()
}
fn default_search_api_version() -> String {
    "2023-11-01".into()
}
fn default_select_fields() -> Vec<String> {
    ["name", "column", "full_description", "tags", "type"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_category_field() -> String {
    "type".into()
}
fn default_preferred_categories() -> Vec<String> {
    vec!["iv".into(), "rv".into()]
}
fn default_scoring_profile() -> Option<String> {
    Some("custom_scoring".into())
}
fn default_top() -> usize {
    5
}
fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            index_name: default_index_name(),
            api_key: None,
            api_version: default_search_api_version(),
            select_fields: default_select_fields(),
            category_field: default_category_field(),
            preferred_categories: default_preferred_categories(),
            scoring_profile: default_scoring_profile(),
            top: default_top(),
            fallback: FallbackPolicy::default(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("api_key", &redact(&self.api_key))
            .field("api_version", &self.api_version)
            .field("select_fields", &self.select_fields)
            .field("category_field", &self.category_field)
            .field("preferred_categories", &self.preferred_categories)
            .field("scoring_profile", &self.scoring_profile)
            .field("top", &self.top)
            .field("fallback", &self.fallback)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Chat model configuration.
///
/// `kind = "openai"` talks to `{api_url}/chat/completions`;
/// `kind = "azure"` talks to an Azure OpenAI deployment named by `model`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model name, or deployment name for Azure
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure OpenAI API version
    #[serde(default = "default_openai_api_version")]
    pub api_version: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_openai_api_version() -> String {
    "2024-06-01".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: None,
            api_url: None,
            model: default_model(),
            api_version: default_openai_api_version(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// System prompt. `{{data_source}}` is replaced by the retrieved records.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    /// Token budget for the retrieved data source
    #[serde(default = "default_retrieval_max_tokens")]
    pub retrieval_max_tokens: usize,

    /// Reply used when the planner produced nothing
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Prefix for replies describing a processing failure
    #[serde(default = "default_error_prefix")]
    pub error_prefix: String,
}

pub const DATA_SOURCE_PLACEHOLDER: &str = "{{data_source}}";

fn default_prompt_template() -> String {
    "You are DataBot, an assistant that explains data dictionary entries \
     (indicator variables and report variables) to business users.\n\
     Answer only from the records below. If they do not cover the question, say so.\n\n\
     Records:\n{{data_source}}"
        .into()
}
fn default_retrieval_max_tokens() -> usize {
    2000
}
fn default_fallback_reply() -> String {
    "Sorry, I couldn't process your question.".into()
}
fn default_error_prefix() -> String {
    "An error occurred while processing your request".into()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            prompt_template: default_prompt_template(),
            retrieval_max_tokens: default_retrieval_max_tokens(),
            fallback_reply: default_fallback_reply(),
            error_prefix: default_error_prefix(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.databot/config.toml),
    /// then apply environment overrides from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// - `AZURE_SEARCH_ENDPOINT`, `AZURE_SEARCH_INDEX`, `AZURE_SEARCH_KEY`
    /// - `AZURE_OPENAI_ENDPOINT` + `AZURE_OPENAI_API_KEY` (switches to `kind = "azure"`)
    /// - `OPENAI_API_KEY`, `DATABOT_API_KEY` (highest priority for the model key)
    /// - `DATABOT_MODEL`, `PORT`
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = var("AZURE_SEARCH_ENDPOINT") {
            self.search.endpoint = endpoint;
        }
        if let Some(index) = var("AZURE_SEARCH_INDEX") {
            self.search.index_name = index;
        }
        if let Some(key) = var("AZURE_SEARCH_KEY") {
            self.search.api_key = Some(key);
        }

        if let Some(endpoint) = var("AZURE_OPENAI_ENDPOINT") {
            self.provider.kind = "azure".into();
            self.provider.api_url = Some(endpoint);
        }

        if let Some(key) = var("DATABOT_API_KEY")
            .or_else(|| var("AZURE_OPENAI_API_KEY"))
            .or_else(|| var("OPENAI_API_KEY"))
        {
            self.provider.api_key = Some(key);
        }

        if let Some(model) = var("DATABOT_MODEL") {
            self.provider.model = model;
        }

        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".databot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.provider.kind.as_str(), "openai" | "azure") {
            return Err(ConfigError::ValidationError(format!(
                "provider.kind must be \"openai\" or \"azure\", got \"{}\"",
                self.provider.kind
            )));
        }

        if self.search.top == 0 {
            return Err(ConfigError::ValidationError("search.top must be > 0".into()));
        }

        if self.search.select_fields.is_empty() {
            return Err(ConfigError::ValidationError(
                "search.select_fields must not be empty".into(),
            ));
        }

        if !self.planner.prompt_template.contains(DATA_SOURCE_PLACEHOLDER) {
            tracing::warn!(
                "planner.prompt_template has no {} placeholder; retrieved data will be ignored",
                DATA_SOURCE_PLACEHOLDER
            );
        }

        Ok(())
    }

    /// Whether enough search settings are present to reach an index.
    pub fn has_search_backend(&self) -> bool {
        !self.search.endpoint.is_empty() && self.search.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 3978);
        assert_eq!(config.search.top, 5);
        assert_eq!(config.search.preferred_categories, vec!["iv", "rv"]);
        assert_eq!(config.search.scoring_profile.as_deref(), Some("custom_scoring"));
        assert_eq!(config.search.fallback, FallbackPolicy::CapabilityOnly);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.search.select_fields, config.search.select_fields);
        assert_eq!(parsed.planner.prompt_template, config.planner.prompt_template);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[search]
endpoint = "https://example.search.windows.net"
index_name = "glossary"
fallback = "any_error"
preferred_categories = []
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.search.endpoint, "https://example.search.windows.net");
        assert_eq!(config.search.index_name, "glossary");
        assert_eq!(config.search.fallback, FallbackPolicy::AnyError);
        assert!(config.search.preferred_categories.is_empty());
        assert_eq!(config.search.top, 5);
        assert_eq!(config.gateway.port, 3978);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search\nendpoint = ").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_provider_kind_rejected() {
        let mut config = AppConfig::default();
        config.provider.kind = "bedrock".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_top_rejected() {
        let mut config = AppConfig::default();
        config.search.top = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.port, 3978);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AZURE_SEARCH_ENDPOINT", "https://svc.search.windows.net"),
            ("AZURE_SEARCH_KEY", "search-key"),
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "aoai-key"),
            ("OPENAI_API_KEY", "ignored"),
            ("PORT", "8080"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.search.endpoint, "https://svc.search.windows.net");
        assert_eq!(config.search.api_key.as_deref(), Some("search-key"));
        assert_eq!(config.provider.kind, "azure");
        assert_eq!(config.provider.api_key.as_deref(), Some("aoai-key"));
        assert_eq!(config.gateway.port, 8080);
        assert!(config.has_search_backend());
    }

    #[test]
    fn invalid_port_override_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.gateway.port, 3978);
    }

    #[test]
    fn debug_output_redacts_keys() {
        let mut config = AppConfig::default();
        config.search.api_key = Some("super-secret".into());
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("custom_scoring"));
        assert!(toml_str.contains("3978"));
    }
}
