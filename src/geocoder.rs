// Geocoder (geocoding pass). Nominatim-compatible HTTP client,
// reqwest-based the same way `embeddings::OpenAIEmbeddingProvider` is,
// wrapped in a local per-process cache and a 1 req/s rate limiter (// "remote APIs: rate limits are enforced locally").

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::contracts::Geocoder;

const MIN_REQUEST_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct NominatimResult {
 lat: String,
 lon: String,
}

pub struct NominatimGeocoder {
 client: reqwest::Client,
 base_url: String,
 user_agent: String,
 cache: Mutex<HashMap<String, Option<(f64, f64)>>>,
 last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
 pub fn new(user_agent: impl Into<String>) -> Result<Self> {
 Ok(Self {
 client: reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?,
 base_url: "https://nominatim.openstreetmap.org/search".to_string(),
 user_agent: user_agent.into(),
 cache: Mutex::new(HashMap::new()),
 last_request: Mutex::new(None),
 })
 }

 pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
 self.base_url = base_url.into();
 self
 }

 async fn wait_for_rate_limit(&self) {
 let mut last = self.last_request.lock().await;
 if let Some(previous) = *last {
 let elapsed = previous.elapsed();
 if elapsed < MIN_REQUEST_SPACING {
 tokio::time::sleep(MIN_REQUEST_SPACING - elapsed).await;
 }
 }
 *last = Some(Instant::now());
 }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
 async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
 {
 let cache = self.cache.lock().await;
 if let Some(cached) = cache.get(query) {
 return Ok(*cached);
 }
 }

 self.wait_for_rate_limit().await;

 let response = self
.client
.get(&self.base_url)
.query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
.header("User-Agent", &self.user_agent)
.send()
.await?;

 if !response.status().is_success() {
 return Err(anyhow!("geocoder returned {}", response.status()));
 }

 let results: Vec<NominatimResult> = response.json().await?;
 let resolved = results
.into_iter()
.next()
.and_then(|r| Some((r.lon.parse().ok()?, r.lat.parse().ok()?)));

 self.cache.lock().await.insert(query.to_string(), resolved);
 Ok(resolved)
 }
}

/// Render a resolved coordinate pair as the PostGIS EWKT the store column
/// expects.
pub fn to_ewkt(lng: f64, lat: f64) -> String {
 format!("SRID=4326;POINT({lng} {lat})")
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn renders_ewkt_point() {
 assert_eq!(to_ewkt(-123.1, 49.2), "SRID=4326;POINT(-123.1 49.2)");
 }
}
