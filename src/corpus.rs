//! Read-only corpora and the in-memory vector index
//!
//! Everything here is loaded once at startup and never mutated afterwards.
//! Per-game alternate rule sources (`rule_overrides` in config) are applied
//! during load, so no request path ever touches corpus state.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use tracing::warn;

use crate::config::DataConfig;
use crate::errors::BoardRagError;
use crate::Result;

/// Normalize a vector to unit L2 norm in place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-8 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Flat nearest-neighbor index over unit-normalized vectors.
///
/// With normalized vectors the inner product equals cosine similarity, so a
/// brute-force scan in rank order matches what the original ANN index
/// returned for these corpus sizes.
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from raw vectors, normalizing each one.
    /// Vectors with a dimension other than `dim` are skipped with a warning.
    #[must_use]
    pub fn from_vectors(dim: usize, vectors: Vec<Vec<f32>>) -> Self {
        let mut kept = Vec::with_capacity(vectors.len());
        for (i, mut v) in vectors.into_iter().enumerate() {
            if v.len() == dim {
                l2_normalize(&mut v);
                kept.push(v);
            } else {
                warn!("Skipping vector {} with dimension {} (expected {})", i, v.len(), dim);
            }
        }
        Self { dim, vectors: kept }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Top-k nearest neighbors by cosine similarity, most similar first.
    /// `k` larger than the index size simply returns fewer results.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dim || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, v)| {
                let dot: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                (idx, dot)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Chunk texts plus their vector index for one game
pub struct GameChunks {
    pub texts: Vec<String>,
    pub index: VectorIndex,
}

#[derive(Deserialize)]
struct GameRuleEntry {
    game_name: String,
    text: String,
}

#[derive(Deserialize)]
struct ChunkFile {
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Full rule texts and per-game chunk indexes
pub struct GameCorpus {
    rules: HashMap<String, String>,
    chunks: HashMap<String, GameChunks>,
}

impl GameCorpus {
    /// Load full rule texts and every per-game chunk file.
    ///
    /// Missing files produce warnings and an emptier corpus rather than a
    /// startup failure; absent data surfaces later as a normal "not found"
    /// outcome.
    pub fn load(config: &DataConfig, dimension: usize) -> Result<Self> {
        let mut rules = load_rule_entries(&config.game_rules).unwrap_or_else(|e| {
            warn!("Failed to load game rules from {:?}: {}", config.game_rules, e);
            HashMap::new()
        });

        // Alternate rule sources replace individual entries at load time
        for (game_name, path) in &config.rule_overrides {
            match load_rule_entries(path) {
                Ok(alternates) => {
                    if let Some(text) = alternates.get(game_name) {
                        info!("Applying rule override for '{}' from {:?}", game_name, path);
                        rules.insert(game_name.clone(), text.clone());
                    } else {
                        warn!("Override file {:?} has no entry for '{}'", path, game_name);
                    }
                }
                Err(e) => warn!("Failed to load rule override {:?}: {}", path, e),
            }
        }

        let chunks = load_chunk_dir(&config.chunk_dir, dimension);

        info!(
            "Game corpus loaded: {} rule texts, {} chunk indexes",
            rules.len(),
            chunks.len()
        );

        Ok(Self { rules, chunks })
    }

    #[must_use]
    pub fn from_parts(rules: HashMap<String, String>, chunks: HashMap<String, GameChunks>) -> Self {
        Self { rules, chunks }
    }

    #[must_use]
    pub fn rule_text(&self, game_name: &str) -> Option<&str> {
        self.rules.get(game_name).map(String::as_str)
    }

    #[must_use]
    pub fn chunks(&self, game_name: &str) -> Option<&GameChunks> {
        self.chunks.get(game_name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.chunks.is_empty()
    }
}

fn load_rule_entries(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<GameRuleEntry> = serde_json::from_str(&content)?;
    Ok(entries
        .into_iter()
        .map(|e| (e.game_name, e.text))
        .collect())
}

fn load_chunk_dir(dir: &Path, dimension: usize) -> HashMap<String, GameChunks> {
    let mut chunks = HashMap::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Chunk directory {:?} not readable: {}", dir, e);
            return chunks;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(game_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match load_chunk_file(&path, dimension) {
            Ok(game_chunks) => {
                chunks.insert(game_name.to_string(), game_chunks);
            }
            Err(e) => warn!("Skipping chunk file {:?}: {}", path, e),
        }
    }

    chunks
}

fn load_chunk_file(path: &Path, dimension: usize) -> Result<GameChunks> {
    let content = std::fs::read_to_string(path)?;
    let file: ChunkFile = serde_json::from_str(&content)?;

    if file.chunks.len() != file.embeddings.len() {
        return Err(BoardRagError::Corpus(format!(
            "{} chunks but {} embeddings",
            file.chunks.len(),
            file.embeddings.len()
        )));
    }

    Ok(GameChunks {
        index: VectorIndex::from_vectors(dimension, file.embeddings),
        texts: file.chunks,
    })
}

/// Parallel name/text arrays plus one global vector index over the texts
pub struct RecommendationCorpus {
    pub names: Vec<String>,
    pub texts: Vec<String>,
    pub index: VectorIndex,
}

impl RecommendationCorpus {
    /// Load the recommendation corpus. Missing or mismatched files yield an
    /// empty corpus with warnings; requests then report a normal miss.
    pub fn load(config: &DataConfig, dimension: usize) -> Result<Self> {
        let names: Vec<String> = match load_json(&config.recommendation_names) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to load recommendation names: {}", e);
                Vec::new()
            }
        };
        let texts: Vec<String> = match load_json(&config.recommendation_texts) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to load recommendation texts: {}", e);
                Vec::new()
            }
        };
        let embeddings: Vec<Vec<f32>> = match load_json(&config.recommendation_embeddings) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to load recommendation embeddings: {}", e);
                Vec::new()
            }
        };

        if names.len() != texts.len() || texts.len() != embeddings.len() {
            warn!(
                "Recommendation corpus arrays misaligned: {} names, {} texts, {} embeddings",
                names.len(),
                texts.len(),
                embeddings.len()
            );
        }

        info!("Recommendation corpus loaded: {} games", names.len());

        Ok(Self {
            index: VectorIndex::from_vectors(dimension, embeddings),
            names,
            texts,
        })
    }

    #[must_use]
    pub fn from_parts(names: Vec<String>, texts: Vec<String>, index: VectorIndex) -> Self {
        Self { names, texts, index }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() || self.texts.is_empty() || self.index.is_empty()
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let index = VectorIndex::from_vectors(
            2,
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        );

        let mut query = vec![1.0, 0.1];
        l2_normalize(&mut query);
        let hits = index.search(&query, 2);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_search_tolerates_oversized_k() {
        let index = VectorIndex::from_vectors(2, vec![vec![1.0, 0.0]]);
        let hits = index.search(&[1.0, 0.0], 100);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::from_vectors(3, Vec::new());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_mismatched_dimension_skipped() {
        let index = VectorIndex::from_vectors(2, vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rule_override_applied_at_load() {
        let dir = tempfile::tempdir().unwrap();

        let rules_path = dir.path().join("game.json");
        std::fs::File::create(&rules_path)
            .unwrap()
            .write_all(
                r#"[{"game_name": "카탄", "text": "catan rules"},
                     {"game_name": "뱅", "text": "stale bang rules"}]"#
                .as_bytes(),
            )
            .unwrap();

        let override_path = dir.path().join("game2.json");
        std::fs::File::create(&override_path)
            .unwrap()
            .write_all(r#"[{"game_name": "뱅", "text": "patched bang rules"}]"#.as_bytes())
            .unwrap();

        let config = DataConfig {
            game_rules: rules_path,
            chunk_dir: dir.path().join("missing_chunks"),
            recommendation_names: dir.path().join("missing.json"),
            recommendation_texts: dir.path().join("missing.json"),
            recommendation_embeddings: dir.path().join("missing.json"),
            rule_overrides: [("뱅".to_string(), override_path)].into_iter().collect(),
        };

        let corpus = GameCorpus::load(&config, 2).unwrap();
        assert_eq!(corpus.rule_text("뱅"), Some("patched bang rules"));
        assert_eq!(corpus.rule_text("카탄"), Some("catan rules"));
        assert!(corpus.chunks("카탄").is_none());
    }

    #[test]
    fn test_chunk_file_length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("뱅.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(br#"{"chunks": ["a", "b"], "embeddings": [[1.0, 0.0]]}"#)
            .unwrap();

        assert!(load_chunk_file(&path, 2).is_err());
    }
}
