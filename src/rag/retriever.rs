//! Context retrieval for the two corpus scopes
//!
//! Both modes share one algorithm shape: embed the query, normalize, search
//! the relevant vector index, map candidate indices back to texts and join
//! them with blank lines in similarity-rank order. An empty string is the
//! defined miss signal consumed by the fallback path.

use std::sync::Arc;

use tracing::debug;

use crate::corpus::l2_normalize;
use crate::corpus::GameCorpus;
use crate::corpus::RecommendationCorpus;
use crate::embeddings::Embedder;
use crate::Result;

/// Default top-k for corpus-scoped recommendation retrieval
pub const DEFAULT_RECOMMENDATION_TOP_K: usize = 3;
/// Default top-k for game-scoped rule-chunk retrieval
pub const DEFAULT_RULE_TOP_K: usize = 4;

pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    games: Arc<GameCorpus>,
    recommendations: Arc<RecommendationCorpus>,
}

impl ContextRetriever {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        games: Arc<GameCorpus>,
        recommendations: Arc<RecommendationCorpus>,
    ) -> Self {
        Self {
            embedder,
            games,
            recommendations,
        }
    }

    async fn query_vector(&self, query: &str) -> Result<Vec<f32>> {
        let mut vector = self.embedder.embed(query).await?;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Retrieve rule chunks for one game. An unknown game or an empty chunk
    /// index yields an empty context, not an error.
    pub async fn game_context(
        &self,
        game_name: &str,
        question: &str,
        top_k: usize,
    ) -> Result<String> {
        let Some(chunks) = self.games.chunks(game_name) else {
            debug!("No chunk data for game '{}'", game_name);
            return Ok(String::new());
        };

        let query_vector = self.query_vector(question).await?;
        let hits = chunks.index.search(&query_vector, top_k);

        let blocks: Vec<&str> = hits
            .iter()
            .filter_map(|&(idx, _)| chunks.texts.get(idx).map(String::as_str))
            .collect();

        debug!(
            "Retrieved {} rule chunks for '{}' (top_k: {})",
            blocks.len(),
            game_name,
            top_k
        );

        Ok(blocks.join("\n\n"))
    }

    /// Retrieve recommendation candidates from the global corpus, each hit
    /// rendered as `[game_name]` followed by its description.
    pub async fn recommendation_context(&self, query: &str, top_k: usize) -> Result<String> {
        if self.recommendations.is_empty() {
            debug!("Recommendation corpus is empty");
            return Ok(String::new());
        }

        let query_vector = self.query_vector(query).await?;
        let hits = self.recommendations.index.search(&query_vector, top_k);

        let blocks: Vec<String> = hits
            .iter()
            .filter_map(|&(idx, _)| {
                match (
                    self.recommendations.names.get(idx),
                    self.recommendations.texts.get(idx),
                ) {
                    (Some(name), Some(text)) => Some(format!("[{name}]\n\n{text}")),
                    _ => {
                        debug!("Recommendation index {} out of range", idx);
                        None
                    }
                }
            })
            .collect();

        debug!("Retrieved {} recommendation candidates (top_k: {})", blocks.len(), top_k);

        Ok(blocks.join("\n\n"))
    }
}
