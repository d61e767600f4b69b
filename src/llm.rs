// Structured-output LLM client (`Llm`). No direct teacher
// analogue; grounded on `embeddings::OpenAIEmbeddingProvider`'s
// reqwest-based HTTP client idiom (a thin client holding a `reqwest::Client`
// plus endpoint/credential fields, one async method per capability, JSON
// request/response structs scoped to the function that uses them).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::contracts::{BatchJobState, Llm};
use crate::error::PipelineError;

/// A Gemini-flavored structured-output client. Talks to the
/// `generateContent` endpoint with a `responseSchema` for single calls, and
/// the File API + Batch API for wave-scheduled bulk jobs.
pub struct GeminiClient {
 client: Client,
 api_key: String,
 api_base: String,
 model: String,
}

impl GeminiClient {
 pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
 Self {
 client: Client::builder()
.timeout(Duration::from_secs(60))
.build()
.expect("reqwest client builder should not fail with static config"),
 api_key: api_key.into(),
 api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
 model: model.into(),
 }
 }

 pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
 self.api_base = base.into();
 self
 }

 fn classify_status(status: reqwest::StatusCode, source: &str, body: &str) -> PipelineError {
 if status == 429 || status.is_server_error || body.to_lowercase().contains("overloaded")
 {
 PipelineError::transient(source, format!("{status}: {body}"))
 } else {
 PipelineError::fatal(source, format!("{status}: {body}"))
 }
 }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
 contents: Vec<Content>,
 generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content {
 parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
 Text { text: String },
 InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
 mime_type: &'static str,
 data: String,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
 response_mime_type: &'static str,
 response_schema: &'a Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
 candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
 content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
 parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
 text: String,
}

#[async_trait]
impl Llm for GeminiClient {
 #[instrument(skip(self, prompt, schema, file))]
 async fn generate_structured(
 &self,
 prompt: &str,
 schema: &Value,
 file: Option<&[u8]>,
 ) -> Result<Value> {
 let mut parts = vec![Part::Text {
 text: prompt.to_string(),
 }];
 if let Some(bytes) = file {
 parts.push(Part::InlineData {
 inline_data: InlineData {
 mime_type: "application/pdf",
 data: base64::Engine::encode(
 &base64::engine::general_purpose::STANDARD,
 bytes,
 ),
 },
 });
 }

 let request = GenerateContentRequest {
 contents: vec![Content { parts }],
 generation_config: GenerationConfig {
 response_mime_type: "application/json",
 response_schema: schema,
 },
 };

 let url = format!(
 "{}/models/{}:generateContent?key={}",
 self.api_base, self.model, self.api_key
 );

 let response = self
.client
.post(&url)
.json(&request)
.send()
.await
.map_err(|e| anyhow!(PipelineError::transient("gemini", e.to_string())))?;

 let status = response.status();
 if !status.is_success() {
 let body = response.text().await.unwrap_or_default();
 return Err(anyhow!(Self::classify_status(status, "gemini", &body)));
 }

 let parsed: GenerateContentResponse = response
.json()
.await
.context("failed to decode Gemini response envelope")?;

 let text = parsed
.candidates
.into_iter()
.next()
.and_then(|c| c.content.parts.into_iter().next())
.map(|p| p.text)
.ok_or_else(|| anyhow!(PipelineError::LlmStructuralError {
 detail: "no candidate text in Gemini response".to_string(),
 }))?;

 serde_json::from_str(&text).map_err(|e| {
 anyhow!(PipelineError::LlmStructuralError {
 detail: format!("response was not valid JSON: {e}"),
 })
 })
 }

 async fn batch_submit(
 &self,
 jsonl_uri: &str,
 model: &str,
 display_name: &str,
 ) -> Result<String> {
 #[derive(Serialize)]
 struct BatchRequest<'a> {
 display_name: &'a str,
 input_config: InputConfig<'a>,
 }
 #[derive(Serialize)]
 struct InputConfig<'a> {
 gcs_source: GcsSource<'a>,
 }
 #[derive(Serialize)]
 struct GcsSource<'a> {
 uri: &'a str,
 }
 #[derive(Deserialize)]
 struct BatchResponse {
 name: String,
 }

 let url = format!(
 "{}/models/{}:batchGenerateContent?key={}",
 self.api_base, model, self.api_key
 );
 let request = BatchRequest {
 display_name,
 input_config: InputConfig {
 gcs_source: GcsSource { uri: jsonl_uri },
 },
 };

 let response = self
.client
.post(&url)
.json(&request)
.send()
.await
.map_err(|e| anyhow!(PipelineError::transient("gemini-batch", e.to_string())))?;

 if !response.status().is_success() {
 let status = response.status();
 let body = response.text().await.unwrap_or_default();
 return Err(anyhow!(Self::classify_status(status, "gemini-batch", &body)));
 }

 let parsed: BatchResponse = response
.json()
.await
.context("failed to decode batch submit response")?;
 Ok(parsed.name)
 }

 async fn batch_get(&self, job_name: &str) -> Result<BatchJobState> {
 #[derive(Deserialize)]
 struct BatchStatus {
 state: String,
 }

 let url = format!("{}/{}?key={}", self.api_base, job_name, self.api_key);
 let response = self
.client
.get(&url)
.send()
.await
.map_err(|e| anyhow!(PipelineError::transient("gemini-batch", e.to_string())))?;

 let parsed: BatchStatus = response
.json()
.await
.context("failed to decode batch status response")?;

 Ok(match parsed.state.as_str() {
 "JOB_STATE_PENDING" | "JOB_STATE_QUEUED" => BatchJobState::Pending,
 "JOB_STATE_RUNNING" => BatchJobState::Running,
 "JOB_STATE_SUCCEEDED" => BatchJobState::Succeeded,
 "JOB_STATE_CANCELLED" => BatchJobState::Cancelled,
 _ => BatchJobState::Failed,
 })
 }

 async fn batch_results(&self, job_name: &str) -> Result<HashMap<String, String>> {
 #[derive(Deserialize)]
 struct BatchResults {
 responses: HashMap<String, String>,
 }

 let url = format!("{}/{}:results?key={}", self.api_base, job_name, self.api_key);
 let response = self
.client
.get(&url)
.send()
.await
.map_err(|e| anyhow!(PipelineError::transient("gemini-batch", e.to_string())))?;

 let parsed: BatchResults = response
.json()
.await
.context("failed to decode batch results response")?;
 Ok(parsed.responses)
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn classifies_rate_limit_as_transient() {
 let err = GeminiClient::classify_status(
 reqwest::StatusCode::TOO_MANY_REQUESTS,
 "gemini",
 "overloaded",
 );
 assert!(err.is_retryable());
 }

 #[test]
 fn classifies_bad_request_as_fatal() {
 let err = GeminiClient::classify_status(
 reqwest::StatusCode::BAD_REQUEST,
 "gemini",
 "invalid schema",
 );
 assert!(!err.is_retryable());
 }
}
