//! `databot ask`: Answer one question without the HTTP layer.

use databot_config::AppConfig;
use databot_core::turn::ReplyBuffer;
use tracing::debug;

pub async fn run(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let message = message.trim();
    if message.is_empty() {
        return Err("Message is required".into());
    }

    let planner = databot_gateway::build_planner(&config)?;
    debug!(provider = %planner.provider_name(), "Planner ready");

    let replies = ReplyBuffer::new();
    planner.respond(message, &replies).await?;

    match replies.last_reply() {
        Some(reply) => println!("{reply}"),
        None => println!("{}", config.planner.fallback_reply),
    }

    Ok(())
}
