//! Embedding service abstraction
//!
//! Provides a unified interface for multiple embedding providers:
//! - Ollama (nomic-embed-text, asymmetric query/document prefixes)
//! - OpenAI-compatible `/embeddings` endpoints
//! - A deterministic mock for tests and offline runs

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which side of the retrieval a text is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRole {
    /// A question being searched for
    Query,
    /// A chunk being indexed
    Document,
}

impl EmbeddingRole {
    /// Task prefix understood by nomic-style embedding models
    pub fn prefix(&self) -> &'static str {
        match self {
            EmbeddingRole::Query => "search_query: ",
            EmbeddingRole::Document => "search_document: ",
        }
    }
}

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String], role: EmbeddingRole) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, role).await?);
        }
        Ok(embeddings)
    }

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

fn ensure_non_empty(embedding: Vec<f32>) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        Err(AppError::EmbeddingEmpty)
    } else {
        Ok(embedding)
    }
}

/// Ollama embedding client
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dimension: usize,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            timeout: config.timeout(),
        })
    }

    async fn make_request(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: format!("{}{}", role.prefix(), text),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::embedding_transport(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::embedding_transport(e, self.timeout))?;

        ensure_non_empty(result.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = self.make_request(text, role).await;
        crate::metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            &self.model,
            1,
            result.is_ok(),
        );
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI-compatible embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "embedding.api_key is required for the openai provider".to_string(),
        })?;

        Ok(Self {
            client: build_client(config.timeout())?,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            timeout: config.timeout(),
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::embedding_transport(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AppError::embedding_transport(e, self.timeout))?;

        if result.data.len() != texts.len() {
            return Err(AppError::EmbeddingUnavailable {
                message: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    result.data.len()
                ),
            });
        }

        result
            .data
            .into_iter()
            .map(|e| ensure_non_empty(e.embedding))
            .collect()
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    // The endpoint is symmetric, so the role is ignored.
    async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()], EmbeddingRole::Query).await?;
        embeddings.into_iter().next().ok_or(AppError::EmbeddingEmpty)
    }

    async fn embed_batch(&self, texts: &[String], _role: EmbeddingRole) -> Result<Vec<Vec<f32>>> {
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let start = Instant::now();
            let result = self.make_request(chunk).await;
            crate::metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                &self.model,
                chunk.len(),
                result.is_ok(),
            );
            all_embeddings.extend(result?);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic bag-of-words embedder
///
/// Each lowercase token is hashed into one signed bucket and the result is
/// L2-normalised, so texts sharing vocabulary land close together.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(768);
        let first = embedder.embed("test text", EmbeddingRole::Query).await.unwrap();
        let second = embedder.embed("test text", EmbeddingRole::Document).await.unwrap();
        assert_eq!(first.len(), 768);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_mock_embedder_shared_vocabulary_is_closer() {
        let embedder = MockEmbedder::new(256);
        let query = embedder
            .embed("inclusion criteria for participants", EmbeddingRole::Query)
            .await
            .unwrap();
        let related = embedder
            .embed("Participants must meet the inclusion criteria below", EmbeddingRole::Document)
            .await
            .unwrap();
        let unrelated = embedder
            .embed("Drug storage temperature and shipping", EmbeddingRole::Document)
            .await
            .unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_mock_batch() {
        let embedder = MockEmbedder::new(64);
        let texts = vec!["text1".to_string(), "text2".to_string()];
        let embeddings = embedder.embed_batch(&texts, EmbeddingRole::Document).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);
    }

    #[test]
    fn test_role_prefixes() {
        assert_eq!(EmbeddingRole::Query.prefix(), "search_query: ");
        assert_eq!(EmbeddingRole::Document.prefix(), "search_document: ");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "carrier-pigeon".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
