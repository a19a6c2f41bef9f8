use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::config::ServerSettings;
use crate::presentation::handlers::{
    health_handler, list_transcriptions_handler, root_handler, search_handler, status_handler,
    transcribe_handler,
};
use crate::presentation::middleware::rate_limit_middleware;
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.uploads.max_request_size_bytes();

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let transcribe = post(transcribe_handler).route_layer(middleware::from_fn_with_state(
        state.transcribe_limiter.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        .route("/", get(root_handler))
        .route("/api/v1/transcribe", transcribe)
        .route("/api/v1/status/{task_id}", get(status_handler))
        .route("/api/v1/transcriptions", get(list_transcriptions_handler))
        .route("/api/v1/search", get(search_handler))
        .route("/api/v1/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors_layer(&state.settings.server))
        .with_state(state)
}

fn cors_layer(server: &ServerSettings) -> CorsLayer {
    let origins = server.cors_origins_list();
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
