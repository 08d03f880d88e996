//! Bounded retrieval: turns a user query into a token-bounded context blob.
//!
//! # Flow
//!
//! 1. Empty query → empty result, no backend call
//! 2. Primary request: projection + category filter + cap + scoring profile
//! 3. On a fallback-eligible failure, one degraded request (no filter, no profile)
//! 4. Pack records in backend order until the next one would exceed the budget
//! 5. Emit the accepted records as one pretty-printed JSON array

use std::sync::Arc;

use databot_config::SearchConfig;
use databot_core::error::SearchError;
use databot_core::search::{Candidate, FallbackPolicy, SearchBackend, SearchRequest, SearchResults};
use databot_core::tokenizer::{HeuristicTokenizer, TiktokenTokenizer, Tokenizer};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::azure::AzureSearchClient;

/// Output of a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    /// The assembled context blob (empty when nothing was accepted)
    pub output: String,
    /// Tokens consumed by the accepted records
    pub tokens_used: usize,
    /// A fetched record was dropped because it did not fit the budget
    pub truncated: bool,
}

impl RenderResult {
    pub fn empty() -> Self {
        Self {
            output: String::new(),
            tokens_used: 0,
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }
}

/// The normalized projection of a candidate placed into the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    pub column: String,
    pub description: String,
    pub tags: String,
    pub score: f64,
}

impl From<&Candidate> for ContextRecord {
    fn from(c: &Candidate) -> Self {
        Self {
            name: c.name.clone(),
            category: c.category.clone(),
            column: c.column.clone(),
            description: c.description.clone(),
            tags: c.tags.clone(),
            score: c.relevance_score,
        }
    }
}

/// Request shape used by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub top: usize,
    pub scoring_profile: Option<String>,
    pub fallback: FallbackPolicy,
}

impl RetrievalOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            select: config.select_fields.clone(),
            filter: category_filter(&config.category_field, &config.preferred_categories),
            top: config.top,
            scoring_profile: config
                .scoring_profile
                .clone()
                .filter(|p| !p.trim().is_empty()),
            fallback: config.fallback,
        }
    }

    /// The full-capability request for `query`.
    pub fn primary_request(&self, query: &str) -> SearchRequest {
        let mut request = SearchRequest::new(query, self.select.clone(), self.top).with_total_count();
        if let Some(filter) = &self.filter {
            request = request.with_filter(filter.clone());
        }
        if let Some(profile) = &self.scoring_profile {
            request = request.with_scoring_profile(profile.clone());
        }
        request
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Build an OData filter matching any of `categories` on `field`.
///
/// Returns `None` for an empty category list. Single quotes are doubled.
pub fn category_filter(field: &str, categories: &[String]) -> Option<String> {
    if categories.is_empty() {
        return None;
    }
    let clauses: Vec<String> = categories
        .iter()
        .map(|c| format!("{field} eq '{}'", c.replace('\'', "''")))
        .collect();
    Some(clauses.join(" or "))
}

/// `cl100k_base` BPE, or the byte heuristic if its tables fail to load.
pub(crate) fn default_tokenizer() -> Arc<dyn Tokenizer> {
    match TiktokenTokenizer::cl100k() {
        Ok(bpe) => Arc::new(bpe),
        Err(e) => {
            warn!(error = %e, "BPE tokenizer unavailable, estimating token counts");
            Arc::new(HeuristicTokenizer)
        }
    }
}

/// Queries a search backend and packs results under a token budget.
///
/// Holds no per-call state; share it behind an `Arc` across requests.
pub struct RetrievalAssembler {
    backend: Arc<dyn SearchBackend>,
    tokenizer: Arc<dyn Tokenizer>,
    options: RetrievalOptions,
}

impl RetrievalAssembler {
    pub fn new(backend: Arc<dyn SearchBackend>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            backend,
            tokenizer,
            options: RetrievalOptions::default(),
        }
    }

    /// Assemble over Azure AI Search as described by `[search]`.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = AzureSearchClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), default_tokenizer())
            .with_options(RetrievalOptions::from_config(config)))
    }

    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Render the context blob for `query` within `token_budget` tokens.
    pub async fn render(&self, query: &str, token_budget: usize) -> Result<RenderResult, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty query, skipping retrieval");
            return Ok(RenderResult::empty());
        }

        let results = self.fetch(query).await?;
        if results.is_empty() {
            info!(backend = %self.backend.name(), "Search returned no results");
            return Ok(RenderResult::empty());
        }

        let rendered = pack_records(&results.candidates, self.tokenizer.as_ref(), token_budget)?;

        info!(
            backend = %self.backend.name(),
            query_len = query.len(),
            results = results.len(),
            total = ?results.total_count,
            tokens_used = rendered.tokens_used,
            token_budget,
            truncated = rendered.truncated,
            "Retrieval rendered"
        );

        Ok(rendered)
    }

    async fn fetch(&self, query: &str) -> Result<SearchResults, SearchError> {
        let primary = self.options.primary_request(query);

        match self.backend.search(&primary).await {
            Ok(results) => Ok(results),
            Err(e) if self.options.fallback.should_fall_back(&e) => {
                warn!(
                    backend = %self.backend.name(),
                    error = %e,
                    "Primary search failed, retrying without filter or scoring profile"
                );
                self.backend.search(&primary.degraded()).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Accept candidates in order while their cumulative cost fits `token_budget`.
pub fn pack_records(
    candidates: &[Candidate],
    tokenizer: &dyn Tokenizer,
    token_budget: usize,
) -> Result<RenderResult, SearchError> {
    let mut accepted: Vec<ContextRecord> = Vec::new();
    let mut tokens_used = 0usize;
    let mut truncated = false;

    for candidate in candidates {
        let record = ContextRecord::from(candidate);
        let text = serde_json::to_string(&record)
            .map_err(|e| SearchError::Serialization(e.to_string()))?;
        let cost = tokenizer.count(&text);

        if tokens_used + cost > token_budget {
            debug!(
                name = %record.name,
                cost,
                tokens_used,
                token_budget,
                "Record exceeds remaining budget"
            );
            truncated = true;
            break;
        }

        accepted.push(record);
        tokens_used += cost;
    }

    if accepted.is_empty() {
        return Ok(RenderResult {
            output: String::new(),
            tokens_used: 0,
            truncated,
        });
    }

    let output = serde_json::to_string_pretty(&accepted)
        .map_err(|e| SearchError::Serialization(e.to_string()))?;

    Ok(RenderResult {
        output,
        tokens_used,
        truncated,
    })
}
