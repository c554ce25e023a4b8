//! API request handlers

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::error;
use tracing::info;

use crate::api::types::ApiResponse;
use crate::api::types::CloseSessionRequest;
use crate::api::types::CloseSessionResponse;
use crate::api::types::ExplainRuleRequest;
use crate::api::types::ExplainRuleResponse;
use crate::api::types::HealthResponse;
use crate::api::types::RecommendRequest;
use crate::api::types::RecommendResponse;
use crate::api::types::SummarizeRuleRequest;
use crate::api::types::SummarizeRuleResponse;
use crate::rag::RagService;

const NOT_READY: &str = "Service is not initialized yet. Please try again later.";

/// Shared application state. `service` stays `None` when startup
/// initialization failed; the server keeps answering with a structured
/// not-ready error instead of dying.
#[derive(Clone)]
pub struct AppState {
    pub service: Option<Arc<RagService>>,
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let ready = state.service.is_some();
    let local_model_available = state
        .service
        .as_ref()
        .is_some_and(|s| s.local_available());

    Json(ApiResponse::success(HealthResponse {
        ready,
        local_model_available,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Game recommendation (POST /api/recommend)
pub async fn recommend(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> Json<ApiResponse<RecommendResponse>> {
    info!("POST /api/recommend: {}", req.query);

    let Some(service) = &state.service else {
        return Json(ApiResponse::error(NOT_READY));
    };

    match service.recommend(&req.query, &req.session_id, req.top_k).await {
        Ok(reply) => Json(ApiResponse::success(RecommendResponse {
            recommendation: reply.text,
            session_id: reply.session_id,
        })),
        Err(e) => {
            error!("Recommendation failed: {}", e);
            Json(ApiResponse::error("Recommendation failed"))
        }
    }
}

/// Rule question (POST /api/rules/explain)
pub async fn explain_rule(
    State(state): State<AppState>,
    Json(req): Json<ExplainRuleRequest>,
) -> Json<ApiResponse<ExplainRuleResponse>> {
    info!("POST /api/rules/explain: {} - {}", req.game_name, req.question);

    let Some(service) = &state.service else {
        return Json(ApiResponse::error(NOT_READY));
    };

    match service
        .explain_rule(&req.game_name, &req.question, &req.session_id, req.backend)
        .await
    {
        Ok(reply) => Json(ApiResponse::success(ExplainRuleResponse {
            answer: reply.text,
            session_id: reply.session_id,
        })),
        Err(e) => {
            error!("Rule explanation failed: {}", e);
            Json(ApiResponse::error("Rule explanation failed"))
        }
    }
}

/// Rule summary (POST /api/rules/summary)
pub async fn summarize_rule(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRuleRequest>,
) -> Json<ApiResponse<SummarizeRuleResponse>> {
    info!("POST /api/rules/summary: {}", req.game_name);

    let Some(service) = &state.service else {
        return Json(ApiResponse::error(NOT_READY));
    };

    match service
        .summarize_rule(&req.game_name, &req.session_id, req.backend)
        .await
    {
        Ok(reply) => Json(ApiResponse::success(SummarizeRuleResponse {
            summary: reply.text,
            session_id: reply.session_id,
        })),
        Err(e) => {
            error!("Rule summary failed: {}", e);
            Json(ApiResponse::error("Rule summary failed"))
        }
    }
}

/// List known games (GET /api/games)
pub async fn list_games(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    info!("GET /api/games");

    let Some(service) = &state.service else {
        return Json(ApiResponse::error(NOT_READY));
    };

    Json(ApiResponse::success(service.list_games()))
}

/// Close a session in all capability stores (POST /api/session/close)
pub async fn close_session(
    State(state): State<AppState>,
    Json(req): Json<CloseSessionRequest>,
) -> Json<ApiResponse<CloseSessionResponse>> {
    info!("POST /api/session/close: {}", req.session_id);

    let Some(service) = &state.service else {
        return Json(ApiResponse::error(NOT_READY));
    };

    Json(ApiResponse::success(CloseSessionResponse {
        closed: service.close_session(&req.session_id),
    }))
}
