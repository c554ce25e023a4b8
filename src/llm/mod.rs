//! Language model clients
//!
//! Both generation backends are reached through narrow traits so the RAG
//! pipeline can be exercised against mock models in tests: [`ChatModel`] for
//! the hosted chat-completions API and [`TextGenerator`] for the locally
//! served fine-tuned model.

pub mod hosted;
pub mod local;

pub use hosted::HostedChatModel;
pub use local::LocalTextModel;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Chat message in conversation history and on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user" or "assistant"
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Hosted chat model: full message sequence in, response text out
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Local text-generation model: flat prompt in, raw completion out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String>;
}
