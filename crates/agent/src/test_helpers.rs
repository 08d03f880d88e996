//! Shared test doubles for planner tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use databot_core::error::{ChannelError, ProviderError, SearchError};
use databot_core::message::Message;
use databot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use databot_core::search::{Candidate, SearchBackend, SearchRequest, SearchResults};
use databot_core::tokenizer::HeuristicTokenizer;
use databot_core::turn::TurnContext;
use databot_search::RetrievalAssembler;

/// A provider that replays scripted outcomes and records every request.
///
/// Panics if more calls are made than outcomes provided.
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn replies(texts: &[&str]) -> Self {
        Self {
            outcomes: Mutex::new(texts.iter().map(|t| Ok(make_text_response(t))).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more responses")
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A search backend that always returns the same candidates (or error).
pub struct StaticBackend {
    outcome: Result<Vec<Candidate>, SearchError>,
    queries: Mutex<Vec<String>>,
}

impl StaticBackend {
    pub fn empty() -> Self {
        Self::with_names(&[])
    }

    pub fn with_names(names: &[&str]) -> Self {
        let candidates = names
            .iter()
            .map(|n| Candidate {
                name: n.to_string(),
                category: "iv".into(),
                relevance_score: 1.0,
                ..Candidate::default()
            })
            .collect();
        Self {
            outcome: Ok(candidates),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SearchError) -> Self {
        Self {
            outcome: Err(error),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for StaticBackend {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, SearchError> {
        self.queries.lock().unwrap().push(request.query.clone());
        self.outcome.clone().map(|candidates| SearchResults {
            total_count: Some(candidates.len() as u64),
            candidates,
        })
    }
}

pub fn assembler(backend: Arc<StaticBackend>) -> RetrievalAssembler {
    RetrievalAssembler::new(backend, Arc::new(HeuristicTokenizer))
}

/// A turn context whose channel is gone.
pub struct FailingContext;

#[async_trait]
impl TurnContext for FailingContext {
    async fn send(&self, _text: &str) -> Result<(), ChannelError> {
        Err(ChannelError::DeliveryFailed {
            channel: "test".into(),
            reason: "connection closed".into(),
        })
    }
}
