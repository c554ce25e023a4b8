//! API request and response types

use serde::Deserialize;
use serde::Serialize;

use crate::rag::Backend;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ready: bool,
    pub local_model_available: bool,
    pub version: String,
}

/// Game recommendation request
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default = "default_recommend_top_k")]
    pub top_k: usize,
}

fn default_recommend_top_k() -> usize {
    crate::rag::DEFAULT_RECOMMENDATION_TOP_K
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendation: String,
    pub session_id: String,
}

/// Rule question request
#[derive(Debug, Deserialize)]
pub struct ExplainRuleRequest {
    pub game_name: String,
    pub question: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub backend: Backend,
}

#[derive(Debug, Serialize)]
pub struct ExplainRuleResponse {
    pub answer: String,
    pub session_id: String,
}

/// Rule summary request
#[derive(Debug, Deserialize)]
pub struct SummarizeRuleRequest {
    pub game_name: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub backend: Backend,
}

#[derive(Debug, Serialize)]
pub struct SummarizeRuleResponse {
    pub summary: String,
    pub session_id: String,
}

/// Session close request
#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CloseSessionResponse {
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_defaults_to_hosted() {
        let req: ExplainRuleRequest = serde_json::from_str(
            r#"{"game_name": "뱅", "question": "보안관의 역할은?"}"#,
        )
        .unwrap();
        assert_eq!(req.backend, Backend::Hosted);
        assert!(req.session_id.is_empty());

        let req: ExplainRuleRequest = serde_json::from_str(
            r#"{"game_name": "뱅", "question": "q", "backend": "local"}"#,
        )
        .unwrap();
        assert_eq!(req.backend, Backend::Local);
    }
}
