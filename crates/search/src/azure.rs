//! Azure AI Search backend over the REST API.
//!
//! Endpoint: `POST {endpoint}/indexes/{index}/docs/search?api-version=…`
//! authenticated with an `api-key` header. HTTP failures are classified
//! into [`SearchError`] kinds so the assembler can tell a refused request
//! (retryable in a simpler form) from an outage.

use async_trait::async_trait;
use databot_config::SearchConfig;
use databot_core::error::SearchError;
use databot_core::search::{Candidate, SearchBackend, SearchRequest, SearchResults};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Index field holding each candidate attribute.
const FIELD_ID: &str = "docId";
const FIELD_NAME: &str = "name";
const FIELD_COLUMN: &str = "column";
const FIELD_DESCRIPTION: &str = "full_description";
const FIELD_TAGS: &str = "tags";
const FIELD_CATEGORY: &str = "type";
const FIELD_SCORE: &str = "@search.score";

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// A client for one Azure AI Search index.
pub struct AzureSearchClient {
    endpoint: String,
    index_name: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureSearchClient {
    /// Create a client with the given request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            api_key: api_key.into(),
            api_version: "2023-11-01".into(),
            client,
        })
    }

    /// Build a client from the `[search]` config section.
    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        if config.endpoint.is_empty() {
            return Err(SearchError::NotConfigured(
                "search.endpoint is empty (set AZURE_SEARCH_ENDPOINT)".into(),
            ));
        }
        let api_key = config.api_key.clone().ok_or_else(|| {
            SearchError::NotConfigured("search.api_key is missing (set AZURE_SEARCH_KEY)".into())
        })?;

        Ok(Self::new(
            &config.endpoint,
            &config.index_name,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_api_version(&config.api_version))
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    fn stats_url(&self) -> String {
        format!(
            "{}/indexes/{}/stats?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    /// Translate a request into the REST body.
    fn to_api_body(request: &SearchRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "search": request.query,
            "top": request.top,
        });

        if !request.select.is_empty() {
            body["select"] = serde_json::json!(request.select.join(","));
        }
        if let Some(filter) = &request.filter {
            body["filter"] = serde_json::json!(filter);
        }
        if request.include_total_count {
            body["count"] = serde_json::json!(true);
        }
        if let Some(profile) = &request.scoring_profile {
            body["scoringProfile"] = serde_json::json!(profile);
        }

        body
    }

    fn classify_error(&self, status: u16, retry_after: Option<u64>, body: &str) -> SearchError {
        let message = api_error_message(body);
        match status {
            400 => SearchError::CapabilityUnsupported { message },
            401 | 403 => SearchError::Authentication(message),
            404 => SearchError::IndexNotFound(self.index_name.clone()),
            429 => SearchError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            500..=599 => SearchError::Unavailable { status, message },
            _ => SearchError::Api { status, message },
        }
    }
}

fn transport_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout(e.to_string())
    } else {
        SearchError::Network(e.to_string())
    }
}

/// Pull `error.message` out of an Azure error body, or fall back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse a search response body into ranked candidates.
fn parse_response(body: &str) -> Result<SearchResults, SearchError> {
    let api: ApiSearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

    Ok(SearchResults {
        candidates: api.value.iter().map(candidate_from_document).collect(),
        total_count: api.count,
    })
}

fn candidate_from_document(doc: &serde_json::Map<String, serde_json::Value>) -> Candidate {
    Candidate {
        identifier: field_text(doc.get(FIELD_ID)),
        name: field_text(doc.get(FIELD_NAME)),
        column: field_text(doc.get(FIELD_COLUMN)),
        description: field_text(doc.get(FIELD_DESCRIPTION)),
        tags: field_text(doc.get(FIELD_TAGS)),
        category: field_text(doc.get(FIELD_CATEGORY)),
        relevance_score: doc.get(FIELD_SCORE).and_then(|v| v.as_f64()).unwrap_or(0.0),
    }
}

/// Render a document field as text: collections are joined with ", ".
fn field_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| field_text(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl SearchBackend for AzureSearchClient {
    fn name(&self) -> &str {
        "azure-ai-search"
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        let body = Self::to_api_body(request);

        debug!(
            index = %self.index_name,
            filter = ?request.filter,
            scoring_profile = ?request.scoring_profile,
            top = request.top,
            "Sending search request"
        );

        let response = self
            .client
            .post(self.search_url())
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let text = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            let err = self.classify_error(status, retry_after, &text);
            warn!(status, index = %self.index_name, error = %err, "Search returned error");
            return Err(err);
        }

        parse_response(&text)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .get(self.stats_url())
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status().is_success())
    }
}

// --- Azure API types ---

#[derive(Deserialize)]
struct ApiSearchResponse {
    #[serde(rename = "@odata.count", default)]
    count: Option<u64>,
    #[serde(default)]
    value: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}
