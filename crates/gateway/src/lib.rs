//! HTTP chat gateway for DataBot.
//!
//! Bridges web chat clients to the planner:
//!
//! - `POST /api/chat`: JSON `{message}` in, `{response}` out
//! - `POST /api/messages`: Bot Framework activities, expect-replies delivery
//! - `GET /`, `GET /test`: embedded test chat page
//! - `GET /health`
//!
//! Built on Axum.

pub mod activity;
pub mod frontend;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use databot_agent::Planner;
use databot_config::AppConfig;
use databot_core::turn::ReplyBuffer;
use databot_search::RetrievalAssembler;

use activity::{ActivitiesResponse, Activity};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub planner: Arc<Planner>,
}

impl GatewayState {
    pub fn new(config: AppConfig, planner: Arc<Planner>) -> Self {
        Self { config, planner }
    }

    /// Run one turn and reduce it to a single reply string.
    ///
    /// The last captured reply wins. With no reply the configured fallback
    /// text is used; a planner failure becomes `"<error prefix>: <error>"`.
    pub async fn answer(&self, message: &str) -> String {
        let replies = ReplyBuffer::new();
        match self.planner.respond(message, &replies).await {
            Ok(()) => replies.last_reply().unwrap_or_else(|| {
                info!("No reply captured, using fallback reply");
                self.config.planner.fallback_reply.clone()
            }),
            Err(e) => {
                error!(error = %e, "Planner failed");
                format!("{}: {e}", self.config.planner.error_prefix)
            }
        }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the router with all gateway routes.
///
/// Layers applied:
/// - CORS with origins from `gateway.cors_origins`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);
    let serve_test_page = state.config.gateway.serve_test_page;

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/messages", post(messages_handler))
        .with_state(state);

    if serve_test_page {
        router = router.merge(frontend::frontend_router());
    }

    router
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS policy for browser clients. `"*"` anywhere in `origins` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Wire the search client, provider and planner from config.
pub fn build_planner(config: &AppConfig) -> Result<Planner, databot_core::Error> {
    let assembler = RetrievalAssembler::from_config(&config.search)?;
    let provider = databot_providers::build_from_config(&config.provider)?;
    Ok(Planner::from_config(config, provider, Arc::new(assembler)))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let planner = Arc::new(build_planner(&config)?);
    info!(
        provider = %planner.provider_name(),
        index = %config.search.index_name,
        "Planner ready"
    );

    let app = build_router(Arc::new(GatewayState::new(config, planner)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected chat request");
            return bad_request(rejection.body_text());
        }
    };

    let message = request.message.trim();
    if message.is_empty() {
        return bad_request("Message is required");
    }

    info!(message_len = message.len(), "Chat message received");
    let response = state.answer(message).await;

    Json(ChatResponse { response }).into_response()
}

async fn messages_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Response {
    let Json(activity) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let Some(text) = activity.message_text() else {
        info!(kind = %activity.kind, "Ignoring activity without message text");
        return Json(ActivitiesResponse::default()).into_response();
    };

    info!(
        channel = activity.channel_id.as_deref().unwrap_or("unknown"),
        message_len = text.len(),
        "Activity received"
    );
    let reply = state.answer(text).await;

    Json(ActivitiesResponse {
        activities: vec![activity.reply(reply)],
    })
    .into_response()
}
