use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_enable_cors() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub backtrace: bool,
}

/// Paths to the corpus files the service loads once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSON array of `{ "game_name": ..., "text": ... }` full rule entries
    pub game_rules: PathBuf,
    /// Directory of per-game chunk files: `<game name>.json` with
    /// `{ "chunks": [...], "embeddings": [[...]] }`
    pub chunk_dir: PathBuf,
    /// Parallel recommendation corpus files
    pub recommendation_names: PathBuf,
    pub recommendation_texts: PathBuf,
    pub recommendation_embeddings: PathBuf,
    /// Per-game alternate rule sources, applied once at load time.
    /// Replaces the legacy mid-request reload of `data/game2.json` for "뱅".
    #[serde(default)]
    pub rule_overrides: HashMap<String, PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_endpoint: String,
    pub llm_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
}

fn default_max_new_tokens() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are evicted by the reaper
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Reaper cycle period
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Shorter delay before the next cycle after a failed one
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    40 * 60
}

fn default_reap_interval_secs() -> u64 {
    5 * 60
}

fn default_retry_delay_secs() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub data: DataConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    pub local_model: LocalModelConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            println!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::BoardRagError::Config(
                "No config.toml or config.example.toml found".to_string(),
            ))
        }
    }

    #[must_use]
    pub fn llm_endpoint(&self) -> &str {
        &self.llm.llm_endpoint
    }

    #[must_use]
    pub fn llm_key(&self) -> &str {
        &self.llm.llm_key
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm.llm_model
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embeddings.model
    }

    #[must_use]
    pub fn embedding_dimension(&self) -> usize {
        self.embeddings.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 8000

            [logging]
            level = "info"

            [data]
            game_rules = "data/game.json"
            chunk_dir = "data/game_data"
            recommendation_names = "data/game_names.json"
            recommendation_texts = "data/texts.json"
            recommendation_embeddings = "data/game_index.json"

            [data.rule_overrides]
            "뱅" = "data/game2.json"

            [embeddings]
            endpoint = "http://localhost:11434"
            model = "bge-m3"
            dimension = 1024

            [llm]
            llm_endpoint = "https://api.openai.com/v1"
            llm_key = "sk-test"

            [local_model]
            enabled = false
            endpoint = "http://localhost:11434"
            model = "exaone-bang-merged"
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm_model(), "gpt-4o");
        assert_eq!(config.local_model.max_new_tokens, 256);
        assert_eq!(config.session.idle_timeout_secs, 40 * 60);
        assert_eq!(config.session.reap_interval_secs, 5 * 60);
        assert_eq!(
            config.data.rule_overrides.get("뱅").unwrap(),
            &PathBuf::from("data/game2.json")
        );
    }
}
