//! Error types for the DataBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all DataBot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Search errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the document search backend.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The index rejected the request shape (unknown scoring profile,
    /// filter on a non-filterable field, ...). Safe to retry with a
    /// simpler request.
    #[error("Search capability unsupported: {message}")]
    CapabilityUnsupported { message: String },

    #[error("Search index not found: {0}")]
    IndexNotFound(String),

    #[error("Search authentication failed: {0}")]
    Authentication(String),

    #[error("Search rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Search service unavailable (status: {status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("Search request failed: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Search request timed out: {0}")]
    Timeout(String),

    #[error("Search network error: {0}")]
    Network(String),

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    #[error("Failed to serialize search record: {0}")]
    Serialization(String),

    #[error("Search backend not configured: {0}")]
    NotConfigured(String),
}

impl SearchError {
    /// Whether the backend refused the request itself rather than failing
    /// to serve it.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, Self::CapabilityUnsupported { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },
}

/// The say step left nothing to send; the planner recovers locally.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Say command produced no content")]
    EmptySay,
}

/// The BPE rank tables could not be loaded.
#[derive(Debug, Error)]
#[error("Failed to load tokenizer '{encoding}': {reason}")]
pub struct TokenizerError {
    pub encoding: String,
    pub reason: String,
}
