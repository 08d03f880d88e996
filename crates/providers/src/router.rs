//! Provider selection: builds the configured chat provider.

use std::sync::Arc;
use std::time::Duration;

use databot_config::ProviderConfig;
use databot_core::error::ProviderError;
use databot_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider described by the `[provider]` config section.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "No API key set (AZURE_OPENAI_API_KEY, OPENAI_API_KEY or DATABOT_API_KEY)".into(),
        )
    })?;
    let timeout = Duration::from_secs(config.timeout_secs);

    let provider = match config.kind.as_str() {
        "azure" => {
            let resource = config.api_url.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "provider.api_url must point at the Azure OpenAI resource".into(),
                )
            })?;
            OpenAiCompatProvider::azure(resource, &config.api_version, api_key, timeout)?
        }
        _ => {
            let base_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| default_base_url().into());
            OpenAiCompatProvider::new("openai", base_url, api_key, timeout)?
        }
    };

    Ok(Arc::new(provider))
}

fn default_base_url() -> &'static str {
    "https://api.openai.com/v1"
}
