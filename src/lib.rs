pub mod api;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod session;

pub use config::AppConfig;
pub use errors::*;
