//! RAG pipeline: retrieve → fallback → generate

pub mod generate;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use generate::AnswerGenerator;
pub use generate::GenerationRequest;
pub use generate::HostedAnswerGenerator;
pub use generate::LocalAnswerGenerator;
pub use pipeline::Backend;
pub use pipeline::RagReply;
pub use pipeline::RagService;
pub use prompts::PromptKind;
pub use retriever::ContextRetriever;
pub use retriever::DEFAULT_RECOMMENDATION_TOP_K;
pub use retriever::DEFAULT_RULE_TOP_K;
