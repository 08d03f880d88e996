//! `databot serve`: Start the HTTP chat gateway.

use databot_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("DataBot Gateway");
    println!("   Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Index:      {}", config.search.index_name);
    println!("   Model:      {} ({})", config.provider.model, config.provider.kind);
    if config.gateway.serve_test_page {
        println!(
            "   Test page:  http://{}:{}/test",
            config.gateway.host, config.gateway.port
        );
    }

    databot_gateway::start(config).await?;

    Ok(())
}
