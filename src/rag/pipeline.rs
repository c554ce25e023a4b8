//! Request router: resolve session → retrieve → fallback → generate
//!
//! [`RagService`] owns the two capability session stores, the retriever and
//! both answer-generation backends, and drives every logical operation the
//! transport exposes. "Not found" outcomes are rendered as user-facing
//! message strings in a success reply; only unexpected faults surface as
//! errors to the caller.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::corpus::GameCorpus;
use crate::corpus::RecommendationCorpus;
use crate::embeddings::Embedder;
use crate::llm::ChatModel;
use crate::llm::TextGenerator;
use crate::rag::generate::AnswerGenerator;
use crate::rag::generate::GenerationRequest;
use crate::rag::generate::HostedAnswerGenerator;
use crate::rag::generate::LocalAnswerGenerator;
use crate::rag::prompts;
use crate::rag::prompts::PromptKind;
use crate::rag::retriever::ContextRetriever;
use crate::rag::retriever::DEFAULT_RULE_TOP_K;
use crate::session::SessionStore;
use crate::Result;

/// Answer-generation backend, selected per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Hosted,
    Local,
}

/// Reply of a session-scoped operation: the answer text plus the (possibly
/// freshly minted) session token.
#[derive(Debug, Clone, Serialize)]
pub struct RagReply {
    pub text: String,
    pub session_id: String,
}

/// Complete RAG service routing every capability
pub struct RagService {
    retriever: ContextRetriever,
    games: Arc<GameCorpus>,
    recommendations: Arc<RecommendationCorpus>,
    hosted: HostedAnswerGenerator,
    local: Option<LocalAnswerGenerator>,
    recommendation_sessions: Arc<SessionStore>,
    rule_sessions: Arc<SessionStore>,
}

impl RagService {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
        local_model: Option<Arc<dyn TextGenerator>>,
        games: Arc<GameCorpus>,
        recommendations: Arc<RecommendationCorpus>,
        max_new_tokens: usize,
    ) -> Self {
        let recommendation_sessions = Arc::new(SessionStore::new("recommendation"));
        let rule_sessions = Arc::new(SessionStore::new("rules"));

        let retriever =
            ContextRetriever::new(embedder, games.clone(), recommendations.clone());
        let hosted = HostedAnswerGenerator::new(
            chat_model,
            recommendation_sessions.clone(),
            rule_sessions.clone(),
        );
        let local = local_model.map(|model| LocalAnswerGenerator::new(model, max_new_tokens));

        Self {
            retriever,
            games,
            recommendations,
            hosted,
            local,
            recommendation_sessions,
            rule_sessions,
        }
    }

    /// Store handles for the session reaper
    #[must_use]
    pub fn session_stores(&self) -> Vec<Arc<SessionStore>> {
        vec![
            self.recommendation_sessions.clone(),
            self.rule_sessions.clone(),
        ]
    }

    /// Whether the local fine-tuned backend loaded at startup
    #[must_use]
    pub fn local_available(&self) -> bool {
        self.local.is_some()
    }

    /// A `local` request with no loaded local model falls back to hosted
    /// rather than failing outright.
    fn generator_for(&self, backend: Backend) -> &dyn AnswerGenerator {
        match backend {
            Backend::Local => match &self.local {
                Some(local) => local,
                None => {
                    warn!("Local backend requested but unavailable, falling back to hosted");
                    &self.hosted
                }
            },
            Backend::Hosted => &self.hosted,
        }
    }

    /// Recommend games for a free-text query. An explicit "N개" count in the
    /// query overrides `top_k`.
    pub async fn recommend(
        &self,
        query: &str,
        session_id: &str,
        top_k: usize,
    ) -> Result<RagReply> {
        let token = SessionStore::resolve_token(session_id);
        let top_k = prompts::parse_requested_count(query).unwrap_or(top_k);

        info!("Recommendation request (session: {}, top_k: {})", token, top_k);

        let context = self
            .retriever
            .recommendation_context(query, top_k)
            .await?;

        if context.trim().is_empty() {
            return Ok(RagReply {
                text: "No recommendation data is available. Please check the corpus files."
                    .to_string(),
                session_id: token,
            });
        }

        let answer = self
            .hosted
            .generate(GenerationRequest {
                kind: PromptKind::Recommendation,
                game_name: "",
                input: query,
                context: &context,
                session_token: &token,
            })
            .await;

        Ok(RagReply {
            text: answer,
            session_id: token,
        })
    }

    /// Answer a rule question for one game. Chunk retrieval misses fall back
    /// to the full rule text; a game with neither yields a "not found" reply.
    pub async fn explain_rule(
        &self,
        game_name: &str,
        question: &str,
        session_id: &str,
        backend: Backend,
    ) -> Result<RagReply> {
        let token = SessionStore::resolve_token(session_id);

        info!(
            "Rule question for '{}' (session: {}, backend: {:?})",
            game_name, token, backend
        );

        let chunk_context = self
            .retriever
            .game_context(game_name, question, DEFAULT_RULE_TOP_K)
            .await?;

        let (kind, context) = if chunk_context.trim().is_empty() {
            match self.full_rule_text(game_name) {
                Some(text) => {
                    info!("Chunk retrieval missed for '{}', using full rules", game_name);
                    (PromptKind::RuleQuestionFullRules, text.to_string())
                }
                None => {
                    return Ok(RagReply {
                        text: game_not_found(game_name),
                        session_id: token,
                    });
                }
            }
        } else {
            (PromptKind::RuleQuestion, chunk_context)
        };

        let answer = self
            .generator_for(backend)
            .generate(GenerationRequest {
                kind,
                game_name,
                input: question,
                context: &context,
                session_token: &token,
            })
            .await;

        Ok(RagReply {
            text: answer,
            session_id: token,
        })
    }

    /// Summarize one game's rules from its full rule text
    pub async fn summarize_rule(
        &self,
        game_name: &str,
        session_id: &str,
        backend: Backend,
    ) -> Result<RagReply> {
        let token = SessionStore::resolve_token(session_id);

        info!(
            "Rule summary for '{}' (session: {}, backend: {:?})",
            game_name, token, backend
        );

        let Some(rule_text) = self.full_rule_text(game_name) else {
            return Ok(RagReply {
                text: game_not_found(game_name),
                session_id: token,
            });
        };
        let rule_text = rule_text.to_string();

        let input = format!("Explain the rules of '{game_name}'.");
        let summary = self
            .generator_for(backend)
            .generate(GenerationRequest {
                kind: PromptKind::RuleSummary,
                game_name,
                input: &input,
                context: &rule_text,
                session_token: &token,
            })
            .await;

        Ok(RagReply {
            text: summary,
            session_id: token,
        })
    }

    /// Names of all known games, preferring the recommendation corpus
    #[must_use]
    pub fn list_games(&self) -> Vec<String> {
        if self.recommendations.names.is_empty() {
            self.games.names()
        } else {
            self.recommendations.names.clone()
        }
    }

    /// Close a session in every capability store. Returns whether any store
    /// held the token.
    pub fn close_session(&self, session_id: &str) -> bool {
        let recommendation_closed = self.recommendation_sessions.close(session_id);
        let rules_closed = self.rule_sessions.close(session_id);
        recommendation_closed || rules_closed
    }

    fn full_rule_text(&self, game_name: &str) -> Option<&str> {
        self.games
            .rule_text(game_name)
            .filter(|text| !text.trim().is_empty())
    }
}

fn game_not_found(game_name: &str) -> String {
    format!(
        "No rule data was found for the game '{game_name}'. \
         Please check that the game is supported."
    )
}
