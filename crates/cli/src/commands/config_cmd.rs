//! `databot config`: Configuration management commands.

use databot_config::AppConfig;
use databot_core::provider::Provider;
use databot_core::search::SearchBackend;
use databot_search::AzureSearchClient;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Search:    {} / {}", display_or_unset(&config.search.endpoint), config.search.index_name);
            println!("   Fallback:  {:?}", config.search.fallback);
            println!("   Provider:  {}", config.provider.kind);
            println!("   Model:     {}", config.provider.model);
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );

            println!();
            if config.has_search_backend() {
                println!("   Search index: {}", check_search(&config).await);
            }
            println!("   Chat model:   {}", check_provider(&config).await);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

async fn check_search(config: &AppConfig) -> String {
    let client = match AzureSearchClient::from_config(&config.search) {
        Ok(client) => client,
        Err(e) => return format!("not usable ({e})"),
    };
    match client.health_check().await {
        Ok(true) => "reachable".into(),
        Ok(false) => "responded with an error status".into(),
        Err(e) => format!("unreachable ({e})"),
    }
}

/// Lists models on the configured provider to confirm endpoint and key.
async fn check_provider(config: &AppConfig) -> String {
    let provider = match databot_providers::build_from_config(&config.provider) {
        Ok(provider) => provider,
        Err(e) => return format!("not usable ({e})"),
    };
    match provider.health_check().await {
        Ok(true) => "reachable".into(),
        Ok(false) => "responded with an error status".into(),
        Err(e) => format!("unreachable ({e})"),
    }
}

/// Problems that do not stop the config from loading but will stop a turn.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_search_backend() {
        warnings.push("Search backend not configured (set AZURE_SEARCH_ENDPOINT and AZURE_SEARCH_KEY)");
    }

    if config.provider.api_key.is_none() {
        warnings.push("No provider API key set (set AZURE_OPENAI_API_KEY or OPENAI_API_KEY)");
    }

    if config.provider.kind == "azure" && config.provider.api_url.is_none() {
        warnings.push("Azure provider needs provider.api_url (set AZURE_OPENAI_ENDPOINT)");
    }

    if !config
        .planner
        .prompt_template
        .contains(databot_config::DATA_SOURCE_PLACEHOLDER)
    {
        warnings.push("Prompt template has no {{data_source}} placeholder; retrieved records are dropped");
    }

    warnings
}

fn redacted(mut config: AppConfig) -> AppConfig {
    if config.search.api_key.is_some() {
        config.search.api_key = Some("***".into());
    }
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("***".into());
    }
    config
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(unset)" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn default_config_warns_about_missing_backends() {
        let warnings = warnings(&AppConfig::default());
        assert!(warnings.iter().any(|w| w.contains("AZURE_SEARCH_ENDPOINT")));
        assert!(warnings.iter().any(|w| w.contains("API key")));
    }

    #[test]
    fn complete_config_has_no_warnings() {
        let mut config = AppConfig::default();
        config.search.endpoint = "https://example.search.windows.net".into();
        config.search.api_key = Some("search-key".into());
        config.provider.api_key = Some("sk-test".into());
        assert!(warnings(&config).is_empty());
    }

    async fn models_endpoint(status: axum::http::StatusCode) -> String {
        let app = axum::Router::new().route("/v1/models", axum::routing::get(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn provider_check_lists_models() {
        let mut config = AppConfig::default();
        config.provider.api_url = Some(models_endpoint(axum::http::StatusCode::OK).await);
        config.provider.api_key = Some("sk-test".into());
        assert_eq!(check_provider(&config).await, "reachable");
    }

    #[tokio::test]
    async fn provider_check_reports_rejected_key() {
        let mut config = AppConfig::default();
        config.provider.api_url = Some(models_endpoint(axum::http::StatusCode::UNAUTHORIZED).await);
        config.provider.api_key = Some("sk-wrong".into());
        assert_eq!(check_provider(&config).await, "responded with an error status");
    }

    #[tokio::test]
    async fn provider_check_without_key_is_not_usable() {
        let report = check_provider(&AppConfig::default()).await;
        assert!(report.starts_with("not usable"), "{report}");
    }

    #[test]
    fn show_redacts_secrets() {
        let mut config = AppConfig::default();
        config.search.api_key = Some("search-secret".into());
        config.provider.api_key = Some("sk-secret".into());

        let toml_str = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!toml_str.contains("search-secret"));
        assert!(!toml_str.contains("sk-secret"));
        assert!(toml_str.contains("***"));
    }
}
