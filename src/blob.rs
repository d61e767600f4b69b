// Object storage for extracted document images (`BlobStore`). No
// direct teacher analogue; grounded on the `reqwest`-based HTTP client idiom
// `embeddings::OpenAIEmbeddingProvider` uses for its outbound provider call
// — a thin client holding a `reqwest::Client` plus endpoint/credential
// fields, one async method per capability, errors mapped through
// `anyhow::Context`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::contracts::BlobStore;

/// An S3-compatible object store reached via its virtual-hosted-style PUT
/// API. Works against AWS S3, MinIO, R2, or any compatible endpoint.
pub struct S3BlobStore {
 client: Client,
 endpoint: String,
 bucket: String,
 access_key: String,
 secret_key: String,
}

impl S3BlobStore {
 pub fn new(
 endpoint: impl Into<String>,
 bucket: impl Into<String>,
 access_key: impl Into<String>,
 secret_key: impl Into<String>,
 ) -> Self {
 Self {
 client: Client::new(),
 endpoint: endpoint.into(),
 bucket: bucket.into(),
 access_key: access_key.into(),
 secret_key: secret_key.into(),
 }
 }

 fn object_url(&self, key: &str) -> String {
 format!(
 "{}/{}/{}",
 self.endpoint.trim_end_matches('/'),
 self.bucket,
 key
 )
 }
}

#[async_trait]
impl BlobStore for S3BlobStore {
 async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
 let url = self.object_url(key);
 let response = self
.client
.put(&url)
.basic_auth(&self.access_key, Some(&self.secret_key))
.body(bytes)
.send()
.await
.with_context(|| format!("failed to PUT blob {key}"))?;

 if !response.status().is_success() {
 anyhow::bail!(
 "blob upload to {key} failed with status {}",
 response.status()
 );
 }
 Ok(())
 }
}

/// In-memory store used by tests and the local dev fixture. Not suitable
/// for production: nothing is persisted across process restarts.
#[derive(Default)]
pub struct InMemoryBlobStore {
 objects: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
 pub fn new() -> Self {
 Self::default()
 }

 pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
 self.objects.lock().await.get(key).cloned()
 }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
 async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
 self.objects.lock().await.insert(key.to_string(), bytes);
 Ok(())
 }
}

/// Build an image blob key :
/// `"images/{meeting_id}/{extracted_document_id}/{seq}.{ext}"`.
pub fn image_key(meeting_id: i64, extracted_document_id: i64, seq: u32, ext: &str) -> String {
 format!("images/{meeting_id}/{extracted_document_id}/{seq}.{ext}")
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn builds_image_key() {
 assert_eq!(image_key(12, 34, 0, "png"), "images/12/34/0.png");
 }

 #[tokio::test]
 async fn in_memory_store_roundtrips() {
 let store = InMemoryBlobStore::new();
 store.put("images/1/2/0.png", vec![1, 2, 3]).await.unwrap();
 assert_eq!(store.get("images/1/2/0.png").await, Some(vec![1, 2, 3]));
 }
}
