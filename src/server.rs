use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{health, logs, session};
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health))
        // Wizard
        .route("/session", get(session::snapshot))
        .route("/session/specification", post(session::submit_specification))
        .route("/session/plan", post(session::edit_plan))
        .route("/session/script", post(session::request_script))
        .route("/session/script/download", get(session::download_script))
        .route("/session/run", post(session::start_run))
        .route("/session/back", post(session::go_back))
        .route("/session/reset", post(session::reset))
        .route("/session/export", post(session::export))
        // Simulated run feed
        .route("/session/progress", get(session::progress))
        .route("/session/stream", get(session::progress_stream))
        // Logs
        .route("/logs/history", get(logs::log_history))
        .route("/logs/stream", get(logs::log_stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
