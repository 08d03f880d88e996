//! The single-turn planner.

use std::sync::Arc;

use databot_config::{AppConfig, DATA_SOURCE_PLACEHOLDER};
use databot_core::error::Result;
use databot_core::message::Message;
use databot_core::provider::{Provider, ProviderRequest};
use databot_core::turn::TurnContext;
use databot_search::RetrievalAssembler;
use tracing::{debug, info, warn};

use crate::plan::{Plan, PlanCommand, format_say};

/// Turns a user question into a [`Plan`] and carries it out.
///
/// Each turn renders a retrieval blob for the question, splices it into the
/// system prompt and asks the provider for one reply.
pub struct Planner {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Retrieval over the search index
    assembler: Arc<RetrievalAssembler>,

    /// Model or Azure deployment name
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// System prompt containing the data source placeholder
    prompt_template: String,

    /// Token budget for the retrieved records
    retrieval_budget: usize,
}

impl Planner {
    pub fn new(
        provider: Arc<dyn Provider>,
        assembler: Arc<RetrievalAssembler>,
        model: impl Into<String>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            assembler,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            prompt_template: prompt_template.into(),
            retrieval_budget: 2000,
        }
    }

    /// Build a planner with model settings and budgets taken from config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        assembler: Arc<RetrievalAssembler>,
    ) -> Self {
        Self::new(
            provider,
            assembler,
            &config.provider.model,
            &config.planner.prompt_template,
        )
        .with_temperature(config.provider.temperature)
        .with_max_tokens(config.provider.max_tokens)
        .with_retrieval_budget(config.planner.retrieval_max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_retrieval_budget(mut self, budget: usize) -> Self {
        self.retrieval_budget = budget;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Substitute the rendered data source into the prompt template.
    pub fn system_prompt(&self, data_source: &str) -> String {
        self.prompt_template.replace(DATA_SOURCE_PLACEHOLDER, data_source)
    }

    /// Retrieve context for `input` and ask the model what to say.
    pub async fn begin_task(&self, input: &str) -> Result<Plan> {
        let rendered = self.assembler.render(input, self.retrieval_budget).await?;
        debug!(
            tokens = rendered.tokens_used,
            truncated = rendered.truncated,
            "Rendered data source"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(self.system_prompt(&rendered.output)),
                Message::user(input),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Provider usage"
            );
        }

        let content = response.message.content;
        if content.trim().is_empty() {
            warn!(provider = %self.provider.name(), "Provider returned an empty reply");
            return Ok(Plan::default());
        }
        Ok(Plan::say(content))
    }

    /// Run every command of `plan` against the turn context.
    pub async fn execute(&self, plan: &Plan, ctx: &dyn TurnContext) -> Result<()> {
        for command in &plan.commands {
            match command {
                PlanCommand::Say { content } => match format_say(content) {
                    Ok(text) => ctx.send(&text).await?,
                    Err(e) if !content.is_empty() => {
                        warn!(error = %e, "Say step failed, sending raw content");
                        ctx.send(content).await?;
                    }
                    Err(e) => debug!(error = %e, "Skipping empty say command"),
                },
            }
        }
        Ok(())
    }

    /// Plan and execute one turn.
    pub async fn respond(&self, input: &str, ctx: &dyn TurnContext) -> Result<()> {
        let plan = self.begin_task(input).await?;
        info!(commands = plan.commands.len(), "Executing plan");
        self.execute(&plan, ctx).await
    }
}
