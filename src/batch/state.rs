// Batch checkpoint (`batch_extraction_state.json`). Persisted to
// disk after every wave and every per-meeting DB insertion so a SIGINT
// mid-run resumes at the last commit (cancellation policy).
// Grounded on `supabase_repository::job_worker`'s job-state/event-log
// shape, generalized from a single DB row to a JSON file since this
// checkpoint has no store-side table of its own.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::BatchJobState;
use crate::extraction::boundary::BoundaryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
 BoundaryDetection,
 ContentExtraction,
 DbInsertion,
 Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveRecord {
 pub wave_index: usize,
 pub job_name: Option<String>,
 pub state: Option<BatchJobState>,
 pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCheckpoint {
 pub phase: BatchPhase,
 pub started_at: DateTime<Utc>,
 pub last_updated: DateTime<Utc>,
 /// archive_path -> whether this meeting has been processed in the
 /// current phase
 pub meetings: HashMap<String, bool>,
 pub boundary_job: Option<String>,
 pub boundary_results: HashMap<String, Vec<BoundaryEntry>>,
 pub boundary_uploaded_files: Vec<String>,
 pub content_waves: Vec<WaveRecord>,
 pub content_results: HashMap<String, String>,
 pub content_uploaded_files: Vec<String>,
 pub meetings_inserted: Vec<String>,
 pub errors: Vec<String>,
}

impl BatchCheckpoint {
 pub fn new(now: DateTime<Utc>) -> Self {
 Self {
 phase: BatchPhase::BoundaryDetection,
 started_at: now,
 last_updated: now,
 meetings: HashMap::new(),
 boundary_job: None,
 boundary_results: HashMap::new(),
 boundary_uploaded_files: Vec::new(),
 content_waves: Vec::new(),
 content_results: HashMap::new(),
 content_uploaded_files: Vec::new(),
 meetings_inserted: Vec::new(),
 errors: Vec::new(),
 }
 }

 pub async fn load_or_new(path: &Path, now: DateTime<Utc>) -> Result<Self> {
 if tokio::fs::try_exists(path).await.unwrap_or(false) {
 let raw = tokio::fs::read_to_string(path)
.await
.with_context(|| format!("failed to read checkpoint at {path:?}"))?;
 serde_json::from_str(&raw).context("checkpoint file is corrupt")
 } else {
 Ok(Self::new(now))
 }
 }

 pub async fn save(&mut self, path: &Path, now: DateTime<Utc>) -> Result<()> {
 self.last_updated = now;
 let json = serde_json::to_string_pretty(self)?;
 if let Some(parent) = path.parent() {
 tokio::fs::create_dir_all(parent).await.ok();
 }
 tokio::fs::write(path, json)
.await
.with_context(|| format!("failed to write checkpoint at {path:?}"))
 }

 pub fn record_error(&mut self, unit: &str, message: &str) {
 self.errors.push(format!("{unit}: {message}"));
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn new_checkpoint_starts_at_boundary_detection() {
 let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
 let checkpoint = BatchCheckpoint::new(now);
 assert_eq!(checkpoint.phase, BatchPhase::BoundaryDetection);
 assert!(checkpoint.meetings.is_empty());
 }
}
