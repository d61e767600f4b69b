// Layered configuration: a TOML file overridden by environment variables,
// the `config` crate idiom, generalized from the teacher's (optional,
// feature-gated) MCP server config to be unconditional here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single municipality's `source_config` : archive root,
/// organization name, scraper kind, video-provider credentials, model
/// names. Stored verbatim as JSON on the `municipalities` row and loaded
/// fresh from disk/env at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MunicipalityConfig {
 pub slug: String,
 pub name: String,
 pub archive_root: String,
 #[serde(default = "default_scraper_kind")]
 pub scraper_kind: String,
 #[serde(default)]
 pub video_provider: Option<String>,
 #[serde(default = "default_llm_model")]
 pub llm_model: String,
 #[serde(default = "default_embedding_model")]
 pub embedding_model: String,
 #[serde(default = "default_embedding_dimension")]
 pub embedding_dimension: usize,
}

fn default_scraper_kind() -> String {
 "civicweb".to_string()
}

fn default_llm_model() -> String {
 "gemini-2.5-flash".to_string()
}

fn default_embedding_model() -> String {
 "text-embedding-004".to_string()
}

fn default_embedding_dimension() -> usize {
 768
}

/// Process-wide settings: store DSN, LLM key, archive-root override. Never
/// logged in full — `Debug` intentionally omits the secret fields, which
/// are accessed directly rather than printed.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
 pub database_url: String,
 pub llm_api_key: String,
 #[serde(default)]
 pub video_provider_token: Option<String>,
 #[serde(default)]
 pub local_llm_base_url: Option<String>,
 #[serde(default)]
 pub archive_root_override: Option<String>,
}

impl std::fmt::Debug for AppConfig {
 fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
 f.debug_struct("AppConfig")
.field("database_url", &"<redacted>")
.field("llm_api_key", &"<redacted>")
.field("video_provider_token", &self.video_provider_token.as_ref().map(|_| "<redacted>"))
.field("local_llm_base_url", &self.local_llm_base_url)
.field("archive_root_override", &self.archive_root_override)
.finish()
 }
}

impl AppConfig {
 /// Load layered config: defaults, then an optional TOML file, then
 /// environment variables (highest precedence), following the `config`
 /// crate's standard layering order.
 pub fn load(toml_path: Option<&Path>) -> Result<Self> {
 let mut builder = config::Config::builder();

 if let Some(path) = toml_path {
 if path.exists() {
 builder = builder.add_source(config::File::from(path));
 }
 }

 builder = builder.add_source(
 config::Environment::default()
.prefix("CIVIC")
.try_parsing(true)
.separator("__"),
 );

 // Map the plain environment variables names directly, since
 // the idiomatic `CIVIC__DATABASE_URL` form is unlikely to be what
 // an operator sets by hand.
 if let Ok(url) = std::env::var("DATABASE_URL") {
 builder = builder.set_override("database_url", url)?;
 }
 if let Ok(key) = std::env::var("GEMINI_API_KEY") {
 builder = builder.set_override("llm_api_key", key)?;
 }
 if let Ok(token) = std::env::var("VIDEO_PROVIDER_TOKEN") {
 builder = builder.set_override("video_provider_token", token)?;
 }
 if let Ok(base) = std::env::var("LOCAL_LLM_BASE_URL") {
 builder = builder.set_override("local_llm_base_url", base)?;
 }
 if let Ok(root) = std::env::var("ARCHIVE_ROOT") {
 builder = builder.set_override("archive_root_override", root)?;
 }

 builder
.build()
.context("failed to assemble configuration")?
.try_deserialize
.context("failed to deserialize AppConfig")
 }
}

impl MunicipalityConfig {
 pub fn from_toml_str(raw: &str) -> Result<Self> {
 toml::from_str(raw).context("failed to parse municipality config")
 }

 pub fn from_file(path: &Path) -> Result<Self> {
 let raw = std::fs::read_to_string(path)
.with_context(|| format!("failed to read municipality config at {path:?}"))?;
 Self::from_toml_str(&raw)
 }

 pub fn to_json(&self) -> Result<serde_json::Value> {
 Ok(serde_json::to_value(self)?)
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn parses_minimal_municipality_config() {
 let raw = r#"
 slug = "viewroyal"
 name = "Town of View Royal"
 archive_root = "/srv/archive/viewroyal"
 "#;
 let cfg = MunicipalityConfig::from_toml_str(raw).unwrap();
 assert_eq!(cfg.scraper_kind, "civicweb");
 assert_eq!(cfg.embedding_dimension, 768);
 }

 #[test]
 fn honors_overrides() {
 let raw = r#"
 slug = "viewroyal"
 name = "Town of View Royal"
 archive_root = "/srv/archive/viewroyal"
 scraper_kind = "legistar"
 llm_model = "gemini-2.0-pro"
 "#;
 let cfg = MunicipalityConfig::from_toml_str(raw).unwrap();
 assert_eq!(cfg.scraper_kind, "legistar");
 assert_eq!(cfg.llm_model, "gemini-2.0-pro");
 }
}
