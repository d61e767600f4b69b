// Embedder : per-table generator that fills the `embedding`
// column for rows a prior ingestion pass left null. Grounded on
// `embeddings::EmbeddingProvider`'s batch-call shape plus the teacher's
// buffered-flush idiom (`wrappers::buffered_storage`: accumulate writes,
// flush once a size threshold is crossed rather than one write per row),
// with `indicatif` progress reporting the way the teacher's CLI reports
// indexing progress.

use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::try_join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

use crate::contracts::Store;
use crate::embeddings::EmbeddingProvider;

/// Tables the embedder is allowed to touch, matching `store::PgStore`'s
/// allow-list exactly — an unknown table is rejected before it reaches a
/// query rather than relying on the store to reject it.
pub const EMBEDDABLE_TABLES: &[&str] = &[
 "agenda_items",
 "motions",
 "key_statements",
 "document_sections",
 "bylaw_chunks",
 "matters",
];

const SELECT_PAGE_SIZE: i64 = 500;
const MIN_WORDS: usize = 3;
const MAX_CHARS: usize = 8000;
const FLUSH_THRESHOLD: usize = 500;

/// Spec §5: "When writing 200+ rows to Postgres, up to 3 worker
/// goroutines/threads may upsert in parallel to sustain throughput."
const PARALLEL_FLUSH_MIN_ROWS: usize = 200;
const PARALLEL_FLUSH_WORKERS: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedSummary {
 pub embedded: usize,
 pub skipped_short: usize,
}

/// Run one table's embedding generation to completion: page through rows
/// needing an embedding, batch them through the provider respecting its
/// `max_batch_size`, and flush to the store once `FLUSH_THRESHOLD` pairs
/// accumulate (or at the end of the run).
#[instrument(skip(store, provider))]
pub async fn embed_table(
 store: &dyn Store,
 provider: &dyn EmbeddingProvider,
 table: &str,
 min_words: usize,
) -> Result<EmbedSummary> {
 if !EMBEDDABLE_TABLES.contains(&table) {
 anyhow::bail!("{table} is not an embeddable table");
 }

 let mut summary = EmbedSummary::default();
 let mut buffer: Vec<(i64, Vec<f32>)> = Vec::new();
 let started = Instant::now();
 let progress = progress_bar(table);

 loop {
 let rows = store.fetch_rows_needing_embedding(table, SELECT_PAGE_SIZE).await?;
 if rows.is_empty() {
 break;
 }

 let batch_size = provider.max_batch_size().min(128);
 for chunk in rows.chunks(batch_size) {
 let mut ids = Vec::with_capacity(chunk.len());
 let mut texts = Vec::with_capacity(chunk.len());
 for (id, text) in chunk {
 if text.split_whitespace().count() < min_words {
 summary.skipped_short += 1;
 continue;
 }
 ids.push(*id);
 texts.push(truncate(text, MAX_CHARS));
 }
 if texts.is_empty() {
 continue;
 }

 let result = provider.embed_texts(&texts).await?;
 if result.embeddings.len() != ids.len() {
 warn!(table, expected = ids.len(), got = result.embeddings.len(), "embedding provider returned mismatched batch size");
 continue;
 }

 for (id, embedding) in ids.into_iter().zip(result.embeddings) {
 buffer.push((id, embedding));
 }

 if buffer.len() >= FLUSH_THRESHOLD {
 flush(store, table, &mut buffer).await?;
 }
 progress.inc(chunk.len() as u64);
 report_eta(&progress, started, summary.embedded as u64);
 }

 summary.embedded += rows.len();
 }

 flush(store, table, &mut buffer).await?;
 progress.finish_with_message(format!("{table}: done"));
 info!(table, embedded = summary.embedded, skipped = summary.skipped_short, "embedding generation complete");
 Ok(summary)
}

/// Flush the buffer to the store. Below `PARALLEL_FLUSH_MIN_ROWS` this is a
/// single `bulk_write_embeddings` call; at or above it the buffer is split
/// into up to `PARALLEL_FLUSH_WORKERS` disjoint chunks and upserted
/// concurrently, each worker isolated to its own chunk with no
/// shared mutable state.
async fn flush(store: &dyn Store, table: &str, buffer: &mut Vec<(i64, Vec<f32>)>) -> Result<()> {
 if buffer.is_empty() {
 return Ok(());
 }
 let rows = std::mem::take(buffer);
 if rows.len() < PARALLEL_FLUSH_MIN_ROWS {
 return store.bulk_write_embeddings(table, rows).await;
 }

 let worker_count = PARALLEL_FLUSH_WORKERS.min(rows.len());
 let chunk_size = rows.len().div_ceil(worker_count);
 let writes = rows
.chunks(chunk_size)
.map(|chunk| store.bulk_write_embeddings(table, chunk.to_vec()));
 try_join_all(writes).await?;
 Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
 if text.chars().count() <= max_chars {
 return text.to_string();
 }
 text.chars().take(max_chars).collect()
}

fn progress_bar(table: &str) -> ProgressBar {
 let bar = ProgressBar::new_spinner;
 bar.set_style(
 ProgressStyle::with_template("{spinner} {msg} {pos} embedded ({elapsed})")
.unwrap_or_else(|_| ProgressStyle::default_spinner),
 );
 bar.set_message(table.to_string());
 bar
}

fn report_eta(progress: &ProgressBar, started: Instant, done: u64) {
 if done == 0 {
 return;
 }
 let elapsed = started.elapsed();
 let per_row = elapsed / (done.max(1) as u32);
 progress.set_message(format!("eta ~{:?}/row", per_row.min(Duration::from_secs(3600))));
}

#[cfg(test)]
mod tests {
 use super::*;
 use async_trait::async_trait;
 use std::sync::Mutex;

 struct FakeProvider {
 dim: usize,
 }

 #[async_trait]
 impl EmbeddingProvider for FakeProvider {
 async fn embed_texts(&self, texts: &[String]) -> Result<crate::embeddings::EmbeddingResult> {
 Ok(crate::embeddings::EmbeddingResult {
 embeddings: texts.iter().map(|_| vec![0.1; self.dim]).collect(),
 model_used: "fake".to_string(),
 tokens_used: None,
 })
 }
 fn dimension(&self) -> usize {
 self.dim
 }
 fn model_name(&self) -> &str {
 "fake"
 }
 fn max_batch_size(&self) -> usize {
 128
 }
 }

 struct FakeStore {
 pending: Mutex<Vec<(i64, String)>>,
 written: Mutex<Vec<(i64, Vec<f32>)>>,
 flush_calls: Mutex<usize>,
 }

 #[async_trait]
 impl Store for FakeStore {
 async fn upsert_municipality(&self, _: &str, _: &str, _: serde_json::Value) -> Result<crate::contracts::Municipality> { unimplemented!() }
 async fn get_municipality(&self, _: &str) -> Result<Option<crate::contracts::Municipality>> { unimplemented!() }
 async fn upsert_organization(&self, _: i64, _: &str, _: &str) -> Result<crate::contracts::Organization> { unimplemented!() }
 async fn find_meeting_by_archive_path(&self, _: i64, _: &str) -> Result<Option<crate::contracts::Meeting>> { unimplemented!() }
 async fn find_scheduled_meeting(&self, _: i64, _: chrono::NaiveDate, _: &str) -> Result<Option<crate::contracts::Meeting>> { unimplemented!() }
 async fn upsert_meeting(&self, _: crate::contracts::NewMeeting) -> Result<crate::contracts::Meeting> { unimplemented!() }
 async fn list_meetings(&self, _: i64) -> Result<Vec<crate::contracts::Meeting>> { unimplemented!() }
 async fn find_person_by_canonical_name(&self, _: &str) -> Result<Option<crate::contracts::Person>> { unimplemented!() }
 async fn find_people_by_surname(&self, _: &str) -> Result<Vec<crate::contracts::Person>> { unimplemented!() }
 async fn list_people(&self) -> Result<Vec<crate::contracts::Person>> { unimplemented!() }
 async fn create_person(&self, _: &str, _: bool, _: Option<String>) -> Result<crate::contracts::Person> { unimplemented!() }
 async fn active_memberships(&self, _: i64, _: chrono::NaiveDate) -> Result<Vec<crate::contracts::Membership>> { unimplemented!() }
 async fn replace_attendance(&self, _: i64, _: Vec<crate::contracts::Attendance>) -> Result<()> { unimplemented!() }
 async fn replace_speaker_aliases(&self, _: i64, _: Vec<crate::contracts::MeetingSpeakerAlias>) -> Result<()> { unimplemented!() }
 async fn replace_transcript(&self, _: i64, _: Vec<crate::contracts::TranscriptSegment>) -> Result<()> { unimplemented!() }
 async fn replace_agenda_items(&self, _: i64, _: Vec<crate::contracts::AgendaItem>) -> Result<Vec<crate::contracts::AgendaItem>> { unimplemented!() }
 async fn replace_motions(&self, _: i64, _: Vec<crate::contracts::Motion>) -> Result<Vec<crate::contracts::Motion>> { unimplemented!() }
 async fn replace_votes(&self, _: i64, _: Vec<crate::contracts::Vote>) -> Result<()> { unimplemented!() }
 async fn replace_key_statements(&self, _: i64, _: Vec<crate::contracts::KeyStatement>) -> Result<()> { unimplemented!() }
 async fn find_matter(&self, _: i64, _: &str) -> Result<Option<crate::contracts::Matter>> { unimplemented!() }
 async fn list_matters(&self, _: i64) -> Result<Vec<crate::contracts::Matter>> { unimplemented!() }
 async fn create_matter(&self, _: i64, _: &str, _: &str, _: Option<String>, _: chrono::NaiveDate) -> Result<crate::contracts::Matter> { unimplemented!() }
 async fn touch_matter_last_seen(&self, _: i64, _: chrono::NaiveDate) -> Result<()> { unimplemented!() }
 async fn set_agenda_item_geo(&self, _: i64, _: &str) -> Result<()> { unimplemented!() }
 async fn insert_document(&self, _: crate::contracts::Document) -> Result<crate::contracts::Document> { unimplemented!() }
 async fn delete_extracted_documents_for(&self, _: i64) -> Result<()> { unimplemented!() }
 async fn insert_extracted_document(&self, _: crate::contracts::ExtractedDocument) -> Result<crate::contracts::ExtractedDocument> { unimplemented!() }
 async fn insert_document_sections(&self, _: Vec<crate::contracts::DocumentSection>) -> Result<()> { unimplemented!() }
 async fn insert_document_images(&self, _: Vec<crate::contracts::DocumentImage>) -> Result<()> { unimplemented!() }
 async fn extracted_text_for_meeting(&self, _: i64, _: &str) -> Result<String> { unimplemented!() }

 async fn fetch_rows_needing_embedding(&self, _: &str, limit: i64) -> Result<Vec<(i64, String)>> {
 let mut guard = self.pending.lock().unwrap();
 let take = (limit as usize).min(guard.len());
 Ok(guard.drain(0..take).collect())
 }

 async fn bulk_write_embeddings(&self, _: &str, rows: Vec<(i64, Vec<f32>)>) -> Result<()> {
 *self.flush_calls.lock().unwrap() += 1;
 self.written.lock().unwrap().extend(rows);
 Ok(())
 }
 }

 #[tokio::test]
 async fn embeds_and_flushes_all_rows() {
 let store = FakeStore {
 pending: Mutex::new(vec![
 (1, "a real discussion about zoning matters".to_string()),
 (2, "ok".to_string()),
 (3, "another substantial agenda item summary".to_string()),
 ]),
 written: Mutex::new(Vec::new()),
 flush_calls: Mutex::new(0),
 };
 let provider = FakeProvider { dim: 4 };

 let summary = embed_table(&store, &provider, "agenda_items", MIN_WORDS).await.unwrap();
 assert_eq!(summary.embedded, 3);
 assert_eq!(summary.skipped_short, 1);
 assert_eq!(store.written.lock().unwrap().len(), 2);
 }

 #[tokio::test]
 async fn rejects_unknown_table() {
 let store = FakeStore {
 pending: Mutex::new(vec![]),
 written: Mutex::new(vec![]),
 flush_calls: Mutex::new(0),
 };
 let provider = FakeProvider { dim: 4 };
 let result = embed_table(&store, &provider, "not_a_table", MIN_WORDS).await;
 assert!(result.is_err());
 }

 #[tokio::test]
 async fn flushes_large_batches_in_parallel_chunks() {
 let rows: Vec<(i64, String)> = (0..210)
.map(|i| (i, format!("agenda item number {i} concerning zoning and roads")))
.collect();
 let store = FakeStore {
 pending: Mutex::new(rows),
 written: Mutex::new(Vec::new()),
 flush_calls: Mutex::new(0),
 };
 let provider = FakeProvider { dim: 4 };

 let summary = embed_table(&store, &provider, "agenda_items", MIN_WORDS).await.unwrap();
 assert_eq!(summary.embedded, 210);
 assert_eq!(store.written.lock().unwrap().len(), 210);

 let calls = *store.flush_calls.lock().unwrap();
 assert!(calls > 1, "expected the >=200-row flush to split across workers, got {calls} call(s)");
 assert!(calls <= PARALLEL_FLUSH_WORKERS, "expected at most {PARALLEL_FLUSH_WORKERS} workers, got {calls}");
 }

 #[test]
 fn truncates_long_text() {
 let long = "x".repeat(MAX_CHARS + 500);
 assert_eq!(truncate(&long, MAX_CHARS).chars().count(), MAX_CHARS);
 }
}
