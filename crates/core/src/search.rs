//! Search backend trait: the abstraction over hosted document indexes.
//!
//! A backend takes a [`SearchRequest`] and returns ranked [`Candidate`]
//! records. Implementations: Azure AI Search (REST), test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// A single query against a search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    /// Fields to project from each matching document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,

    /// Boolean filter expression (OData syntax for Azure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Maximum number of results
    pub top: usize,

    /// Ask the backend for the total match count
    #[serde(default)]
    pub include_total_count: bool,

    /// Named scoring profile configured on the index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_profile: Option<String>,
}

impl SearchRequest {
    /// A plain request: query, projection, and cap only.
    pub fn new(query: impl Into<String>, select: Vec<String>, top: usize) -> Self {
        Self {
            query: query.into(),
            select,
            filter: None,
            top,
            include_total_count: false,
            scoring_profile: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_scoring_profile(mut self, profile: impl Into<String>) -> Self {
        self.scoring_profile = Some(profile.into());
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.include_total_count = true;
        self
    }

    /// Drop every optional capability, keeping query, projection and cap.
    pub fn degraded(&self) -> Self {
        Self::new(self.query.clone(), self.select.clone(), self.top)
    }
}

/// One retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub relevance_score: f64,
}

/// Results of a search, in backend rank order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub candidates: Vec<Candidate>,

    /// Total matches in the index, when requested and reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// Which primary-request failures are retried as a degraded request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Only requests the index refused as unsupported.
    #[default]
    CapabilityOnly,
    /// Any failure, including outages and timeouts.
    AnyError,
}

impl FallbackPolicy {
    pub fn should_fall_back(&self, error: &SearchError) -> bool {
        match self {
            Self::CapabilityOnly => error.is_capability_error(),
            Self::AnyError => true,
        }
    }
}

/// The core search backend trait.
///
/// Implementations must be safe to share across tasks; `search` is read-only.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "azure-ai-search").
    fn name(&self) -> &str;

    /// Run a query and return ranked candidates.
    async fn search(&self, request: &SearchRequest) -> std::result::Result<SearchResults, SearchError>;

    /// Health check: is the index reachable?
    async fn health_check(&self) -> std::result::Result<bool, SearchError> {
        Ok(true)
    }
}
