//! API route definitions

use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers;
use super::handlers::AppState;

/// Create RESTful API router
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // RAG endpoints
        .route("/recommend", post(handlers::recommend))
        .route("/rules/explain", post(handlers::explain_rule))
        .route("/rules/summary", post(handlers::summarize_rule))
        // Corpus listing
        .route("/games", get(handlers::list_games))
        // Session management
        .route("/session/close", post(handlers::close_session))
        .with_state(state)
}
