//! Exercises `AzureSearchClient` and `RetrievalAssembler` against an
//! in-process fake of the Azure AI Search REST API.
//!
//! The fake binds 127.0.0.1 on a random port, records every request body,
//! and replays scripted `(status, body)` replies in order.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use databot_core::error::SearchError;
use databot_core::search::{FallbackPolicy, SearchBackend, SearchRequest};
use databot_core::tokenizer::HeuristicTokenizer;
use databot_search::{AzureSearchClient, RetrievalAssembler, RetrievalOptions};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Recorded {
    index: String,
    api_version: Option<String>,
    api_key: Option<String>,
    body: serde_json::Value,
}

#[derive(Default)]
struct FakeState {
    replies: VecDeque<(u16, String)>,
    requests: Vec<Recorded>,
}

struct FakeSearchService {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSearchService {
    async fn start(replies: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(FakeState {
            replies: replies.into_iter().map(|(s, b)| (s, b.to_string())).collect(),
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/indexes/{index}/docs/search", post(search_handler))
            .route("/indexes/{index}/stats", get(stats_handler))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn client(&self) -> AzureSearchClient {
        AzureSearchClient::new(self.base_url(), "glossary", "test-key", Duration::from_secs(5))
            .unwrap()
    }

    async fn requests(&self) -> Vec<Recorded> {
        self.state.lock().await.requests.clone()
    }
}

async fn search_handler(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path(index): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let mut state = state.lock().await;
    state.requests.push(Recorded {
        index,
        api_version: params.get("api-version").cloned(),
        api_key: headers
            .get("api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    let (status, body) = state
        .replies
        .pop_front()
        .unwrap_or((500, r#"{"error":{"message":"no scripted reply"}}"#.into()));

    let mut response = (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response();
    if status == 429 {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, "7".parse().unwrap());
    }
    response
}

async fn stats_handler(Path(_index): Path<String>) -> impl IntoResponse {
    Json(serde_json::json!({"documentCount": 3, "storageSize": 1024}))
}

const THREE_DOCS: &str = r#"{
  "@odata.count": 3,
  "value": [
    {"@search.score": 3.1, "name": "Revenue", "column": "rev_amt", "full_description": "Recognized revenue", "tags": "finance", "type": "iv"},
    {"@search.score": 2.4, "name": "Net Revenue", "column": "net_rev", "full_description": "Revenue after returns", "tags": ["finance"], "type": "rv"},
    {"@search.score": 0.9, "name": "Gross Margin", "column": "gm_pct", "full_description": "Margin ratio", "tags": "finance", "type": "iv"}
  ]
}"#;

const BAD_PROFILE: &str =
    r#"{"error":{"code":"","message":"The scoring profile 'custom_scoring' does not exist."}}"#;

fn request() -> SearchRequest {
    SearchRequest::new("revenue", vec!["name".into(), "type".into()], 5)
        .with_filter("type eq 'iv' or type eq 'rv'")
        .with_scoring_profile("custom_scoring")
        .with_total_count()
}

#[tokio::test]
async fn search_sends_expected_request() {
    let fake = FakeSearchService::start(vec![(200, THREE_DOCS)]).await;
    let results = fake.client().search(&request()).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results.total_count, Some(3));
    assert_eq!(results.candidates[1].tags, "finance");

    let recorded = fake.requests().await;
    assert_eq!(recorded.len(), 1);
    let r = &recorded[0];
    assert_eq!(r.index, "glossary");
    assert_eq!(r.api_version.as_deref(), Some("2023-11-01"));
    assert_eq!(r.api_key.as_deref(), Some("test-key"));
    assert_eq!(r.body["search"], "revenue");
    assert_eq!(r.body["select"], "name,type");
    assert_eq!(r.body["scoringProfile"], "custom_scoring");
    assert_eq!(r.body["count"], true);
}

#[tokio::test]
async fn bad_request_is_capability_error() {
    let fake = FakeSearchService::start(vec![(400, BAD_PROFILE)]).await;
    let err = fake.client().search(&request()).await.unwrap_err();

    assert!(err.is_capability_error());
    assert!(err.to_string().contains("custom_scoring"));
}

#[tokio::test]
async fn throttling_reads_retry_after() {
    let fake = FakeSearchService::start(vec![(429, "{}")]).await;
    let err = fake.client().search(&request()).await.unwrap_err();

    assert!(matches!(err, SearchError::RateLimited { retry_after_secs: 7 }));
}

#[tokio::test]
async fn unreachable_service_is_network_error() {
    let client = AzureSearchClient::new(
        "http://127.0.0.1:1",
        "glossary",
        "key",
        Duration::from_secs(2),
    )
    .unwrap();
    let err = client.search(&request()).await.unwrap_err();

    assert!(matches!(err, SearchError::Network(_) | SearchError::Timeout(_)));
    assert!(!err.is_capability_error());
}

#[tokio::test]
async fn health_check_hits_stats() {
    let fake = FakeSearchService::start(vec![]).await;
    assert!(fake.client().health_check().await.unwrap());
}

#[tokio::test]
async fn assembler_falls_back_when_profile_missing() {
    let fake = FakeSearchService::start(vec![(400, BAD_PROFILE), (200, THREE_DOCS)]).await;
    let assembler = RetrievalAssembler::new(Arc::new(fake.client()), Arc::new(HeuristicTokenizer));

    let result = assembler.render("revenue", 10_000).await.unwrap();
    assert!(!result.truncated);
    assert!(result.output.contains("Gross Margin"));

    let recorded = fake.requests().await;
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].body.get("filter").is_some());
    assert!(recorded[0].body.get("scoringProfile").is_some());
    assert!(recorded[1].body.get("filter").is_none());
    assert!(recorded[1].body.get("scoringProfile").is_none());
    assert_eq!(recorded[1].body["top"], 5);
}

#[tokio::test]
async fn assembler_propagates_outage_without_fallback() {
    let fake = FakeSearchService::start(vec![(503, "Service Unavailable")]).await;
    let assembler = RetrievalAssembler::new(Arc::new(fake.client()), Arc::new(HeuristicTokenizer));

    let err = assembler.render("revenue", 1000).await.unwrap_err();
    assert!(matches!(err, SearchError::Unavailable { status: 503, .. }));
    assert_eq!(fake.requests().await.len(), 1);
}

#[tokio::test]
async fn assembler_retries_outage_when_any_error_allowed() {
    let fake = FakeSearchService::start(vec![(503, "Service Unavailable"), (200, THREE_DOCS)]).await;
    let options = RetrievalOptions {
        fallback: FallbackPolicy::AnyError,
        ..RetrievalOptions::default()
    };
    let assembler = RetrievalAssembler::new(Arc::new(fake.client()), Arc::new(HeuristicTokenizer))
        .with_options(options);

    let result = assembler.render("revenue", 1000).await.unwrap();
    assert!(result.output.contains("Revenue"));

    let recorded = fake.requests().await;
    assert_eq!(recorded.len(), 2);
    assert!(recorded[1].body.get("filter").is_none());
    assert!(recorded[1].body.get("scoringProfile").is_none());
}

#[tokio::test]
async fn assembler_truncates_to_budget() {
    let fake = FakeSearchService::start(vec![(200, THREE_DOCS)]).await;
    let assembler = RetrievalAssembler::new(Arc::new(fake.client()), Arc::new(HeuristicTokenizer));

    // Records cost 28-30 heuristic tokens each, so only two fit.
    let result = assembler.render("revenue", 60).await.unwrap();
    assert!(result.truncated);
    assert!(result.tokens_used <= 60);
    assert!(result.output.contains("Revenue"));
    assert!(!result.output.contains("Gross Margin"));
}
