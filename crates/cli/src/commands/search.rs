//! `databot search`: Print the token-bounded context blob for a query.

use databot_config::AppConfig;
use databot_search::RetrievalAssembler;
use tracing::debug;

pub async fn run(query: &str, budget: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let budget = budget.unwrap_or(config.planner.retrieval_max_tokens);

    let assembler = RetrievalAssembler::from_config(&config.search)?;
    debug!(options = ?assembler.options(), "Rendering retrieval context");
    let result = assembler.render(query, budget).await?;

    if result.is_empty() {
        eprintln!("No records matched (budget {budget}, truncated: {})", result.truncated);
        return Ok(());
    }

    println!("{}", result.output);
    eprintln!();
    eprintln!(
        "{} / {budget} tokens{}",
        result.tokens_used,
        if result.truncated { ", truncated" } else { "" }
    );

    Ok(())
}
