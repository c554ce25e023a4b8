//! HTTP server implementation

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::api::handlers::AppState;
use crate::api::routes;
use crate::config::AppConfig;
use crate::corpus::GameCorpus;
use crate::corpus::RecommendationCorpus;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingClient;
use crate::llm::ChatModel;
use crate::llm::HostedChatModel;
use crate::llm::LocalTextModel;
use crate::llm::TextGenerator;
use crate::rag::RagService;
use crate::session::SessionReaper;
use crate::Result;

/// Start the API server
pub async fn serve_api(config: &AppConfig, host: String, port: u16) -> Result<()> {
    info!("Starting BoardRAG API server...");

    // A failed initialization keeps the server up: every route except
    // /health then answers with a structured not-ready error.
    let service = match init_service(config).await {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            error!("Service initialization failed: {}", e);
            None
        }
    };

    let reaper = service
        .as_ref()
        .map(|s| SessionReaper::spawn(s.session_stores(), &config.session));

    let state = AppState { service };

    let mut app = Router::new().nest("/api", routes::api_routes(state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new()),
    );

    if config.server.enable_cors {
        info!("CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /api/health         - Health check");
    info!("  POST /api/recommend      - Game recommendation");
    info!("  POST /api/rules/explain  - Rule question");
    info!("  POST /api/rules/summary  - Rule summary");
    info!("  GET  /api/games          - List known games");
    info!("  POST /api/session/close  - Close a session");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Join the reaper so shutdown is clean, not fire-and-forget
    if let Some(reaper) = reaper {
        reaper.shutdown().await;
    }
    info!("Server stopped");

    Ok(())
}

/// Load corpora and wire up both generation backends
async fn init_service(config: &AppConfig) -> Result<RagService> {
    let dimension = config.embedding_dimension();

    let games = Arc::new(GameCorpus::load(&config.data, dimension)?);
    let recommendations = Arc::new(RecommendationCorpus::load(&config.data, dimension)?);

    if games.is_empty() {
        warn!("Game corpus is empty - rule questions will report not-found");
    }

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingClient::new(&config.embeddings)?);
    let chat_model: Arc<dyn ChatModel> = Arc::new(HostedChatModel::new(config)?);

    // Local model load failure is non-fatal: the backend is simply
    // unavailable and requests for it fall back to the hosted model.
    let local_model: Option<Arc<dyn TextGenerator>> = if config.local_model.enabled {
        match LocalTextModel::new(&config.local_model) {
            Ok(model) => match model.probe().await {
                Ok(()) => {
                    info!("Local model '{}' available", config.local_model.model);
                    Some(Arc::new(model))
                }
                Err(e) => {
                    warn!("Local model unavailable (continuing without it): {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Local model client setup failed (continuing without it): {}", e);
                None
            }
        }
    } else {
        info!("Local model disabled by configuration");
        None
    };

    Ok(RagService::new(
        embedder,
        chat_model,
        local_model,
        games,
        recommendations,
        config.local_model.max_new_tokens,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
