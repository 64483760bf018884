//! Buffalokart is a user onboarding, referral and purchase-tracking
//! backend persisted as a Neo4j property graph.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod router;
pub mod config;
pub mod error;
pub mod graph;
pub mod product;
pub mod purchase;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use graph::GraphStore;
use user::service::UserService;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use axum::http::header;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<dyn GraphStore>,
}

impl AppState {
    /// Identity service over the shared store handle.
    pub(crate) fn users(&self) -> UserService {
        let digits = self
            .config
            .otp
            .as_ref()
            .map(|otp| otp.digits)
            .unwrap_or(config::DEFAULT_OTP_DIGITS);

        UserService::new(Arc::clone(&self.store), digits)
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers(Any),
        );

    router::router().with_state(state).layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let store = match config.neo4j {
        Some(ref neo4j) => {
            Arc::new(graph::Neo4jStore::connect(neo4j).await?)
                as Arc<dyn GraphStore>
        },
        None => {
            // Every operation goes through the graph.
            tracing::error!("missing `neo4j` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    Ok(AppState { config, store })
}
