// Embeddings Module - HTTP-based embedding provider for the embedder
//. Trimmed to the single provider civic-pipeline actually
// needs: an OpenAI-compatible `/embeddings` endpoint, reachable either at
// the real OpenAI API or at a self-hosted gateway via `api_base`
// (`config::AppConfig::local_llm_base_url`). The local-ONNX provider the
// teacher also carried has no use here — nothing in this crate runs
// inference locally — and was dropped (see DESIGN.md).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
 pub model_name: String,
 pub dimension: usize,
 pub max_batch_size: usize,
 pub api_key: String,
 pub api_base: Option<String>,
}

impl EmbeddingConfig {
 pub fn new(model_name: impl Into<String>, dimension: usize, api_key: impl Into<String>) -> Self {
 Self {
 model_name: model_name.into(),
 dimension,
 max_batch_size: 128,
 api_key: api_key.into(),
 api_base: None,
 }
 }

 pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
 self.api_base = Some(base.into());
 self
 }
}

/// Result of embedding generation.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
 pub embeddings: Vec<Vec<f32>>,
 pub model_used: String,
 pub tokens_used: Option<usize>,
}

/// Trait for embedding providers, generalized so the embedder can be
/// tested against a fake without a live HTTP endpoint.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
 async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

 async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
 let result = self.embed_texts(&[text.to_string()]).await?;
 result
.embeddings
.into_iter()
.next()
.ok_or_else(|| anyhow!("no embedding returned"))
 }

 fn dimension(&self) -> usize;
 fn model_name(&self) -> &str;
 fn max_batch_size(&self) -> usize;
}

/// OpenAI-compatible embedding provider, reqwest-based.
#[derive(Debug)]
pub struct OpenAIEmbeddingProvider {
 config: EmbeddingConfig,
 client: reqwest::Client,
}

impl OpenAIEmbeddingProvider {
 pub fn new(config: EmbeddingConfig) -> Result<Self> {
 let client = reqwest::Client::builder()
.timeout(std::time::Duration::from_secs(30))
.build()?;
 Ok(Self { config, client })
 }

 fn endpoint(&self) -> String {
 format!(
 "{}/embeddings",
 self.config
.api_base
.as_deref()
.unwrap_or("https://api.openai.com/v1")
 )
 }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
 async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
 if texts.is_empty() {
 return Ok(EmbeddingResult {
 embeddings: Vec::new(),
 model_used: self.config.model_name.clone(),
 tokens_used: Some(0),
 });
 }

 #[derive(Serialize)]
 struct EmbeddingRequest {
 input: Vec<String>,
 model: String,
 encoding_format: String,
 }

 #[derive(Deserialize)]
 struct EmbeddingResponse {
 data: Vec<EmbeddingData>,
 usage: Usage,
 }

 #[derive(Deserialize)]
 struct EmbeddingData {
 embedding: Vec<f32>,
 index: usize,
 }

 #[derive(Deserialize)]
 struct Usage {
 total_tokens: usize,
 }

 let request = EmbeddingRequest {
 input: texts.to_vec(),
 model: self.config.model_name.clone(),
 encoding_format: "float".to_string(),
 };

 let response = self
.client
.post(self.endpoint())
.header("Authorization", format!("Bearer {}", self.config.api_key))
.header("Content-Type", "application/json")
.json(&request)
.send()
.await?;

 if !response.status().is_success() {
 let error_text = response.text().await?;
 return Err(anyhow!("embedding API error: {error_text}"));
 }

 let embedding_response: EmbeddingResponse = response.json().await?;

 let mut sorted_data = embedding_response.data;
 sorted_data.sort_by_key(|d| d.index);
 let embeddings = sorted_data.into_iter().map(|d| d.embedding).collect();

 Ok(EmbeddingResult {
 embeddings,
 model_used: self.config.model_name.clone(),
 tokens_used: Some(embedding_response.usage.total_tokens),
 })
 }

 fn dimension(&self) -> usize {
 self.config.dimension
 }

 fn model_name(&self) -> &str {
 &self.config.model_name
 }

 fn max_batch_size(&self) -> usize {
 self.config.max_batch_size
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn endpoint_defaults_to_openai_api() {
 let config = EmbeddingConfig::new("text-embedding-004", 768, "key");
 let provider = OpenAIEmbeddingProvider::new(config).unwrap();
 assert_eq!(provider.endpoint(), "https://api.openai.com/v1/embeddings");
 }

 #[test]
 fn endpoint_respects_custom_base() {
 let config = EmbeddingConfig::new("text-embedding-004", 768, "key").with_api_base("http://localhost:8080/v1");
 let provider = OpenAIEmbeddingProvider::new(config).unwrap();
 assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");
 }
}
