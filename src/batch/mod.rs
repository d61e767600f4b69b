// Batch extractor wave scheduler. Drives the document
// extractor through a remote asynchronous batch API instead of per-request
// synchronous calls, with a resumable JSON checkpoint. Grounded on
// `supabase_repository::job_worker::SupabaseJobWorker::tick`'s
// poll-process-commit loop, generalized from "one job at a time" to
// "one wave at a time, each wave committed before the next starts."

pub mod state;
pub mod wave;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::contracts::{BatchJobState, Llm, Store};
use crate::extraction::boundary::BoundaryEntry;
use state::{BatchCheckpoint, BatchPhase, WaveRecord};
use wave::{pack_waves, WaveItem, DEFAULT_WAVE_BYTE_BUDGET};

const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One agenda PDF awaiting boundary detection: its archive path and bytes.
pub struct PendingAgenda {
 pub archive_path: String,
 pub pdf_bytes: Vec<u8>,
}

/// One boundary awaiting content extraction, already split to its own
/// page-range PDF by the caller ("For each boundary, extract the
/// page range to a temp PDF and record its size").
pub struct PendingBoundary {
 pub archive_path: String,
 pub boundary: BoundaryEntry,
 pub pdf_bytes: Vec<u8>,
}

/// Poll `llm.batch_get` until the job reaches a terminal state, sleeping
/// `POLL_INTERVAL` between checks. A failed/cancelled job aborts the whole
/// phase (error policy).
async fn poll_until_terminal(llm: &dyn Llm, job_name: &str) -> Result<()> {
 loop {
 match llm.batch_get(job_name).await? {
 BatchJobState::Succeeded => return Ok(()),
 BatchJobState::Failed => bail!("batch job {job_name} failed"),
 BatchJobState::Cancelled => bail!("batch job {job_name} was cancelled"),
 BatchJobState::Pending | BatchJobState::Running => {
 tokio::time::sleep(POLL_INTERVAL).await;
 }
 }
 }
}

/// Boundary phase: submit every pending agenda PDF as one batch job, poll,
/// merge results into the checkpoint.
pub async fn run_boundary_phase(
 checkpoint: &mut BatchCheckpoint,
 checkpoint_path: &Path,
 pending: Vec<PendingAgenda>,
 model: &str,
 llm: &dyn Llm,
 jsonl_uri_builder: impl Fn(&[PendingAgenda]) -> String,
) -> Result<()> {
 if checkpoint.phase != BatchPhase::BoundaryDetection {
 return Ok(());
 }

 let jsonl_uri = jsonl_uri_builder(&pending);
 let job_name = match &checkpoint.boundary_job {
 Some(existing) => existing.clone(),
 None => {
 let submitted = llm
.batch_submit(&jsonl_uri, model, "boundary-detection")
.await
.context("failed to submit boundary detection batch")?;
 checkpoint.boundary_job = Some(submitted.clone());
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 submitted
 }
 };

 poll_until_terminal(llm, &job_name).await?;

 let results = llm.batch_results(&job_name).await?;
 for pending_agenda in &pending {
 if let Some(raw) = results.get(&pending_agenda.archive_path) {
 match serde_json::from_str::<Vec<BoundaryEntry>>(raw) {
 Ok(entries) => {
 checkpoint
.boundary_results
.insert(pending_agenda.archive_path.clone(), entries);
 }
 Err(err) => {
 warn!(archive_path = %pending_agenda.archive_path, error = %err, "failed to parse boundary result");
 checkpoint.record_error(&pending_agenda.archive_path, &err.to_string());
 }
 }
 }
 }

 checkpoint.phase = BatchPhase::ContentExtraction;
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 info!(meetings = pending.len(), "boundary detection phase complete");
 Ok(())
}

/// Content phase: wave-pack pending boundaries by byte size, submit one
/// batch job per wave, poll, collect `content_results[key]=markdown`.
/// Each wave commits to the checkpoint before the next starts (:
/// "waves are strictly serial").
pub async fn run_content_phase(
 checkpoint: &mut BatchCheckpoint,
 checkpoint_path: &Path,
 pending: Vec<PendingBoundary>,
 model: &str,
 llm: &dyn Llm,
 jsonl_uri_builder: impl Fn(&[&PendingBoundary]) -> String,
) -> Result<()> {
 if checkpoint.phase != BatchPhase::ContentExtraction {
 return Ok(());
 }

 let already_done = checkpoint.content_waves.len();

 let items: Vec<WaveItem<PendingBoundary>> = pending
.into_iter()
.map(|p| WaveItem {
 key: format!("{}#{}", p.archive_path, p.boundary.title),
 byte_size: p.pdf_bytes.len() as u64,
 payload: p,
 })
.collect();
 let waves = pack_waves(items, DEFAULT_WAVE_BYTE_BUDGET);

 for (wave_index, wave_items) in waves.into_iter().enumerate() {
 if wave_index < already_done {
 continue;
 }

 let refs: Vec<&PendingBoundary> = wave_items.iter().map(|i| &i.payload).collect();
 let jsonl_uri = jsonl_uri_builder(&refs);

 let job_name = llm
.batch_submit(&jsonl_uri, model, &format!("content-wave-{wave_index}"))
.await
.with_context(|| format!("failed to submit content wave {wave_index}"))?;

 poll_until_terminal(llm, &job_name).await?;

 let results = llm.batch_results(&job_name).await?;
 for wave_item in &wave_items {
 if let Some(markdown) = results.get(&wave_item.key) {
 checkpoint
.content_results
.insert(wave_item.key.clone(), markdown.clone());
 } else {
 warn!(key = %wave_item.key, "content extraction wave returned no result for key");
 }
 }

 checkpoint.content_waves.push(WaveRecord {
 wave_index,
 job_name: Some(job_name),
 state: Some(BatchJobState::Succeeded),
 completed: true,
 });
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 info!(wave_index, items = wave_items.len(), "content wave complete");
 }

 checkpoint.phase = BatchPhase::DbInsertion;
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 Ok(())
}

/// DB insertion phase: for each meeting, delete prior extracted-document
/// rows tied to its document_id then re-insert (idempotency per spec
/// §4.6). Per-meeting errors are logged but the meeting is still marked
/// inserted, matching error policy exactly.
pub async fn run_db_insertion_phase<F, Fut>(
 checkpoint: &mut BatchCheckpoint,
 checkpoint_path: &Path,
 store: &dyn Store,
 document_ids: &[(String, i64)],
 insert_one: F,
) -> Result<()>
where
 F: Fn(i64, Vec<BoundaryEntry>) -> Fut,
 Fut: std::future::Future<Output = Result<()>>,
{
 if checkpoint.phase != BatchPhase::DbInsertion {
 return Ok(());
 }

 for (archive_path, document_id) in document_ids {
 if checkpoint.meetings_inserted.contains(archive_path) {
 continue;
 }
 let Some(entries) = checkpoint.boundary_results.get(archive_path).cloned() else {
 continue;
 };

 if let Err(err) = store.delete_extracted_documents_for(*document_id).await {
 checkpoint.record_error(archive_path, &err.to_string());
 warn!(archive_path, error = %err, "failed to clear prior extracted documents");
 }

 match insert_one(*document_id, entries).await {
 Ok => {}
 Err(err) => {
 warn!(archive_path, error = %err, "DB insertion failed for meeting, marking inserted anyway");
 checkpoint.record_error(archive_path, &err.to_string());
 }
 }
 checkpoint.meetings_inserted.push(archive_path.clone());
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 }

 checkpoint.phase = BatchPhase::Complete;
 checkpoint.save(checkpoint_path, Utc::now()).await?;
 Ok(())
}
