//! The two interchangeable answer-generation backends
//!
//! Both implement [`AnswerGenerator`]; the router picks one per request. Any
//! model failure is caught here, logged, and rendered as a user-facing
//! message string, never propagated as a hard fault.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::llm::ChatModel;
use crate::llm::TextGenerator;
use crate::rag::prompts;
use crate::rag::prompts::FullRulesVars;
use crate::rag::prompts::PromptKind;
use crate::rag::prompts::RecommendationVars;
use crate::rag::prompts::RuleQuestionVars;
use crate::rag::prompts::RuleSummaryVars;
use crate::session::SessionStore;

/// Generic failure message when a model call fails
pub const GENERATION_FAILED: &str =
    "Sorry, the answer could not be generated right now. Please try again later.";
/// Message when the local model produced no usable output
pub const EMPTY_GENERATION: &str = "Sorry, no answer could be generated.";

/// One generation request, already past retrieval and fallback resolution
pub struct GenerationRequest<'a> {
    pub kind: PromptKind,
    pub game_name: &'a str,
    /// Raw user input for this turn (query or question); this is what gets
    /// appended to session history, not the rendered template.
    pub input: &'a str,
    /// Retrieved chunk context or the full rule text, per `kind`
    pub context: &'a str,
    pub session_token: &'a str,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, req: GenerationRequest<'_>) -> String;
}

/// Backend A: hosted chat model with conversation memory
pub struct HostedAnswerGenerator {
    model: Arc<dyn ChatModel>,
    recommendation_sessions: Arc<SessionStore>,
    rule_sessions: Arc<SessionStore>,
}

impl HostedAnswerGenerator {
    #[must_use]
    pub fn new(
        model: Arc<dyn ChatModel>,
        recommendation_sessions: Arc<SessionStore>,
        rule_sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            model,
            recommendation_sessions,
            rule_sessions,
        }
    }

    /// Explain/summarize share one store so a summary can be followed by a
    /// contextual question.
    fn store_for(&self, kind: PromptKind) -> &SessionStore {
        match kind {
            PromptKind::Recommendation => &self.recommendation_sessions,
            PromptKind::RuleQuestion
            | PromptKind::RuleQuestionFullRules
            | PromptKind::RuleSummary => &self.rule_sessions,
        }
    }
}

#[async_trait]
impl AnswerGenerator for HostedAnswerGenerator {
    async fn generate(&self, req: GenerationRequest<'_>) -> String {
        let store = self.store_for(req.kind);
        let history = store.history(req.session_token);

        let messages = match req.kind {
            PromptKind::Recommendation => prompts::recommendation_messages(
                &RecommendationVars {
                    query: req.input,
                    context: req.context,
                },
                &history,
            ),
            PromptKind::RuleQuestion => prompts::rule_question_messages(
                &RuleQuestionVars {
                    game_name: req.game_name,
                    question: req.input,
                    context: req.context,
                },
                &history,
            ),
            PromptKind::RuleQuestionFullRules => prompts::full_rules_messages(
                &FullRulesVars {
                    game_name: req.game_name,
                    question: req.input,
                    rule_text: req.context,
                },
                &history,
            ),
            PromptKind::RuleSummary => prompts::rule_summary_messages(
                &RuleSummaryVars {
                    game_name: req.game_name,
                    rule_text: req.context,
                },
                &history,
            ),
        };

        match self.model.complete(&messages).await {
            Ok(text) => {
                let answer = text.trim().to_string();
                // Sole write path to conversation history
                store.append_exchange(req.session_token, req.input, answer.clone());
                answer
            }
            Err(e) => {
                error!("Hosted generation failed for session {}: {}", req.session_token, e);
                GENERATION_FAILED.to_string()
            }
        }
    }
}

/// Backend B: locally served fine-tuned model, no memory across calls
pub struct LocalAnswerGenerator {
    model: Arc<dyn TextGenerator>,
    max_new_tokens: usize,
}

impl LocalAnswerGenerator {
    #[must_use]
    pub fn new(model: Arc<dyn TextGenerator>, max_new_tokens: usize) -> Self {
        Self {
            model,
            max_new_tokens,
        }
    }
}

#[async_trait]
impl AnswerGenerator for LocalAnswerGenerator {
    async fn generate(&self, req: GenerationRequest<'_>) -> String {
        let system = match req.kind {
            PromptKind::Recommendation | PromptKind::RuleQuestion => {
                prompts::local_context_system(req.context)
            }
            PromptKind::RuleQuestionFullRules | PromptKind::RuleSummary => {
                prompts::local_full_rules_system(req.game_name, req.context)
            }
        };
        let prompt = prompts::flat_prompt(&system, req.input);

        match self.model.generate(&prompt, self.max_new_tokens).await {
            Ok(raw) => {
                let cleaned = postprocess_local_output(&raw, &prompt);
                if cleaned.is_empty() {
                    EMPTY_GENERATION.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                error!("Local generation failed: {}", e);
                GENERATION_FAILED.to_string()
            }
        }
    }
}

/// Clean raw local-model output: drop the echoed prompt prefix, then for each
/// role marker left-to-right keep only the text after its last occurrence.
#[must_use]
pub fn postprocess_local_output(raw: &str, prompt: &str) -> String {
    let mut content = raw.strip_prefix(prompt).unwrap_or(raw).to_string();

    for marker in [
        prompts::ASSISTANT_MARKER,
        prompts::USER_MARKER,
        prompts::SYSTEM_MARKER,
    ] {
        if let Some(pos) = content.rfind(marker) {
            content = content[pos + marker.len()..].to_string();
        }
    }

    content.trim().to_string()
}
