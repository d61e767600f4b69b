// Orchestrator. Drives phases in order, honors skip/force
// flags, and routes either bulk or targeted work. Grounded on
// `supabase_repository::job_worker::SupabaseJobWorker::tick`'s
// poll-process-commit loop: one unit of work picked up, processed, its
// outcome recorded, and the loop moves on regardless of success or
// failure — generalized here from "one job" to "one meeting folder."

use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{error, info, instrument, warn};

use crate::change_detector::{self, ArchiveEntry};
use crate::contracts::{Geocoder, Llm, SpeakerPipeline, SpeechToText, Store, VideoCatalog};
use crate::diarizer::{self, DiarizeRequest};
use crate::embedder::{self, EmbedSummary, EMBEDDABLE_TABLES};
use crate::embeddings::EmbeddingProvider;
use crate::ingester::{self, IngestInput, IngestSummary};
use crate::matter_matcher::MatterMatcher;
use crate::refiner::{self, schema::RefinementInputs};

/// Which phases to run this pass (five phases, each skippable).
#[derive(Debug, Clone, Copy)]
pub struct Phases {
 pub scrape: bool,
 pub acquire: bool,
 pub diarize: bool,
 pub ingest: bool,
 pub embed: bool,
}

impl Phases {
 pub fn all() -> Self {
 Self { scrape: true, acquire: true, diarize: true, ingest: true, embed: true }
 }

 /// Update mode: change detector already scoped the affected meetings,
 /// so scraping the whole tree again is redundant.
 pub fn for_update() -> Self {
 Self { scrape: false, acquire: true, diarize: true, ingest: true, embed: true }
 }

 /// Rediarize mode skips scrape and acquire, reusing whatever audio is
 /// already on disk.
 pub fn for_rediarize() -> Self {
 Self { scrape: false, acquire: false, diarize: true, ingest: true, embed: true }
 }
}

#[derive(Debug, Clone, Default)]
pub struct RunFlags {
 pub limit: Option<usize>,
 pub include_video: bool,
 pub download_audio: bool,
 pub rediarize: bool,
}

#[derive(Debug, Clone)]
pub struct MeetingOutcome {
 pub archive_path: String,
 pub summary: Option<IngestSummary>,
 pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
 pub outcomes: Vec<MeetingOutcome>,
 pub embed_summaries: Vec<(String, EmbedSummary)>,
}

/// Everything a run needs to reach the external world. Capabilities the
/// crate treats as opaque/out-of-scope (: scraper, video catalog,
/// speaker pipeline, speech-to-text) are optional — their phase is skipped
/// with a warning when absent, regardless of the requested flags.
pub struct OrchestratorDeps<'a> {
 pub store: &'a dyn Store,
 pub llm: &'a dyn Llm,
 pub embedding_provider: &'a dyn EmbeddingProvider,
 pub geocoder: &'a dyn Geocoder,
 pub matter_matcher: &'a MatterMatcher,
 pub scraper: Option<&'a dyn crate::contracts::Scraper>,
 pub video_catalog: Option<&'a dyn VideoCatalog>,
 pub speaker_pipeline: Option<&'a dyn SpeakerPipeline>,
 pub speech_to_text: Option<&'a dyn SpeechToText>,
 pub municipality_id: i64,
 pub organization_name: &'a str,
 pub municipality_context: &'a str,
 pub archive_root: &'a Path,
 pub root_marker: &'a str,
 pub active_council_names: &'a [String],
 pub is_local_llm_provider: bool,
}

/// Full bulk run: scan the whole archive tree and process every entry
/// (bulk mode), subject to `flags.limit`.
#[instrument(skip(deps))]
pub async fn run(deps: &OrchestratorDeps<'_>, phases: Phases, flags: &RunFlags) -> Result<RunReport> {
 if phases.scrape {
 run_scrape_phase(deps).await;
 }

 let mut entries = change_detector::scan_archive_tree(deps.archive_root, deps.root_marker)?;
 if let Some(limit) = flags.limit {
 entries.truncate(limit);
 }

 let mut report = RunReport::default();
 for entry in &entries {
 let outcome = process_meeting(deps, phases, flags, entry).await;
 report.outcomes.push(outcome);
 }

 if phases.embed {
 report.embed_summaries = run_embed_phase(deps).await;
 }

 Ok(report)
}

/// Update mode: diff disk against the store, then run phases 2-5 only for
/// the affected meetings.
#[instrument(skip(deps))]
pub async fn run_update(deps: &OrchestratorDeps<'_>, flags: &RunFlags) -> Result<RunReport> {
 let entries = change_detector::scan_archive_tree(deps.archive_root, deps.root_marker)?;
 let changes = change_detector::detect_changes(deps.store, deps.municipality_id, &entries, deps.video_catalog).await?;

 if changes.is_empty() {
 info!("update: no changes detected");
 return Ok(RunReport::default());
 }

 let mut affected_paths: Vec<&str> = Vec::new();
 for entry in changes.new_meetings.iter().chain(changes.meetings_with_new_docs.iter()).chain(changes.meetings_with_new_video.iter()) {
 if !affected_paths.contains(&entry.archive_path.as_str()) {
 affected_paths.push(&entry.archive_path);
 }
 }

 let phases = Phases::for_update();
 let mut report = RunReport::default();
 for archive_path in affected_paths {
 let Some(entry) = entries.iter().find(|e| e.archive_path.as_str() == archive_path) else {
 continue;
 };
 let outcome = process_meeting(deps, phases, flags, entry).await;
 report.outcomes.push(outcome);
 }

 if phases.embed {
 report.embed_summaries = run_embed_phase(deps).await;
 }

 Ok(report)
}

/// Targeted single-meeting run: `target` is a filesystem path or a store
/// meeting ID ("Target resolution").
#[instrument(skip(deps))]
pub async fn run_target(
 deps: &OrchestratorDeps<'_>,
 phases: Phases,
 flags: &RunFlags,
 target: &str,
) -> Result<RunReport> {
 let entries = change_detector::scan_archive_tree(deps.archive_root, deps.root_marker)?;
 let archive_path = resolve_target(deps.store, deps.municipality_id, target, deps.root_marker).await?;

 let mut report = RunReport::default();
 match entries.iter().find(|e| e.archive_path.as_str() == archive_path) {
 Some(entry) => {
 let outcome = process_meeting(deps, phases, flags, entry).await;
 report.outcomes.push(outcome);
 }
 None => {
 report.outcomes.push(MeetingOutcome {
 archive_path,
 summary: None,
 error: Some("no matching folder on disk".to_string()),
 });
 }
 }

 if phases.embed {
 report.embed_summaries = run_embed_phase(deps).await;
 }

 Ok(report)
}

/// Resolve a target to a normalized `archive_path`: numeric targets are
/// looked up against the store's meetings, anything else is treated as a
/// filesystem path and normalized the same way the change detector does.
async fn resolve_target(
 store: &dyn Store,
 municipality_id: i64,
 target: &str,
 root_marker: &str,
) -> Result<String> {
 if let Ok(meeting_id) = target.parse::<i64>() {
 let meetings = store.list_meetings(municipality_id).await?;
 let meeting = meetings
.into_iter()
.find(|m| m.id == meeting_id)
.ok_or_else(|| anyhow::anyhow!("no meeting with id {meeting_id}"))?;
 return Ok(meeting.archive_path);
 }
 let archive_path = crate::types::ArchivePath::relative_to_root(target, root_marker)?;
 Ok(archive_path.as_str().to_string())
}

async fn run_scrape_phase(deps: &OrchestratorDeps<'_>) {
 let Some(scraper) = deps.scraper else {
 warn!("scrape phase requested but no scraper configured; skipping");
 return;
 };
 if let Err(err) = scraper.scrape_recursive().await {
 error!(error = %err, "scrape phase failed; continuing with documents already on disk");
 }
}

async fn run_embed_phase(deps: &OrchestratorDeps<'_>) -> Vec<(String, EmbedSummary)> {
 let mut summaries = Vec::new();
 for table in EMBEDDABLE_TABLES {
 match embedder::embed_table(deps.store, deps.embedding_provider, table, 3).await {
 Ok(summary) => summaries.push((table.to_string(), summary)),
 Err(err) => error!(table, error = %err, "embed phase failed for table"),
 }
 }
 summaries
}

/// Run phases 2-4 (acquire, diarize, ingest) for one meeting folder,
/// isolating its failure from the rest of the run (failure
/// policy: "a raised exception is logged and the orchestrator continues").
async fn process_meeting(
 deps: &OrchestratorDeps<'_>,
 phases: Phases,
 flags: &RunFlags,
 entry: &ArchiveEntry,
) -> MeetingOutcome {
 match process_meeting_inner(deps, phases, flags, entry).await {
 Ok(summary) => MeetingOutcome {
 archive_path: entry.archive_path.as_str().to_string(),
 summary,
 error: None,
 },
 Err(err) => {
 error!(archive_path = %entry.archive_path, error = %err, "meeting processing failed; continuing with next meeting");
 MeetingOutcome {
 archive_path: entry.archive_path.as_str().to_string(),
 summary: None,
 error: Some(err.to_string()),
 }
 }
 }
}

async fn process_meeting_inner(
 deps: &OrchestratorDeps<'_>,
 phases: Phases,
 flags: &RunFlags,
 entry: &ArchiveEntry,
) -> Result<Option<IngestSummary>> {
 let folder_path = deps.archive_root.join(entry.archive_path.as_str());

 if phases.acquire {
 if let Some(catalog) = deps.video_catalog {
 match catalog.get_video_map(None).await {
 Ok(video_map) => {
 let folder_name = folder_path
.file_name()
.map(|n| n.to_string_lossy().to_string())
.unwrap_or_default();
 if let Err(err) = crate::acquirer::acquire_for_folder(
 catalog,
 &video_map,
 entry.meeting_date,
 &folder_name,
 &folder_path,
 flags.include_video,
 flags.download_audio,
 )
.await
 {
 warn!(archive_path = %entry.archive_path, error = %err, "acquisition failed; continuing without new media");
 }
 }
 Err(err) => warn!(error = %err, "video catalog lookup failed during acquire phase"),
 }
 }
 }

 let mut transcript = None;
 if phases.diarize {
 if let (Some(pipeline), Some(stt)) = (deps.speaker_pipeline, deps.speech_to_text) {
 let wav_path = folder_path.join("Audio").join("meeting.wav");
 if tokio::fs::try_exists(&wav_path).await.unwrap_or(false) {
 let raw_cache_path = folder_path.join("Audio").join("meeting_raw_transcript.json");
 let request = DiarizeRequest {
 wav_path: &wav_path,
 duration_cap: None,
 rediarize: flags.rediarize,
 raw_transcript_cache_path: &raw_cache_path,
 };
 let known_fingerprints = Vec::new();
 match diarizer::diarize(request, pipeline, stt, &known_fingerprints).await {
 Ok(cache) => transcript = Some(cache),
 Err(err) => warn!(archive_path = %entry.archive_path, error = %err, "diarization failed; ingesting without a transcript"),
 }
 }
 }
 }

 if !phases.ingest {
 return Ok(None);
 }

 // The batch extractor runs as a separate, asynchronous pass
 // over already-ingested meetings, so agenda/minutes text only exists
 // here once a prior `run`/`update` has created the meeting row and a
 // later `batch-extract` has populated its extracted documents. On a
 // meeting's first pass both are empty, which the refiner's agenda-only
 // mode already handles.
 let existing_meeting = deps
.store
.find_meeting_by_archive_path(deps.municipality_id, entry.archive_path.as_str())
.await?;
 let (agenda_text, minutes_text) = match &existing_meeting {
 Some(meeting) => {
 let agenda = deps.store.extracted_text_for_meeting(meeting.id, "agenda").await?;
 let minutes = deps.store.extracted_text_for_meeting(meeting.id, "minutes").await?;
 (agenda, minutes)
 }
 None => (String::new(), String::new()),
 };
 let transcript_text = transcript
.as_ref()
.map(|c: &crate::diarizer::types::TranscriptCache| {
            c.segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ")
 })
.unwrap_or_default();

 let refinement_inputs = RefinementInputs {
 agenda_text: &agenda_text,
 minutes_text: &minutes_text,
 transcript_text: &transcript_text,
 attendees_hint: &[],
 canonical_names_hint: deps.active_council_names,
 fingerprint_aliases: &[],
 active_council_members: deps.active_council_names,
 };
 let refinement = refiner::refine_meeting(deps.llm, refinement_inputs, deps.is_local_llm_provider).await?;

 let today = Utc::now().date_naive();
 let summary = ingester::ingest_meeting(
 deps.store,
 deps.matter_matcher,
 deps.geocoder,
 IngestInput {
 municipality_id: deps.municipality_id,
 organization_name: deps.organization_name,
 entry,
 refinement: &refinement,
 transcript: transcript.as_ref(),
 active_council_names: deps.active_council_names,
 municipality_context: deps.municipality_context,
 today,
 },
 )
.await?;

 Ok(Some(summary))
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn update_mode_skips_scrape() {
 let phases = Phases::for_update();
 assert!(!phases.scrape);
 assert!(phases.ingest);
 }

 #[test]
 fn rediarize_mode_skips_scrape_and_acquire() {
 let phases = Phases::for_rediarize();
 assert!(!phases.scrape);
 assert!(!phases.acquire);
 assert!(phases.diarize);
 }

 #[tokio::test]
 async fn resolves_numeric_target_to_archive_path() {
 struct OnlyListMeetings {
 meetings: Vec<crate::contracts::Meeting>,
 }
 #[async_trait::async_trait]
 impl Store for OnlyListMeetings {
 async fn upsert_municipality(&self, _: &str, _: &str, _: serde_json::Value) -> Result<crate::contracts::Municipality> { unimplemented!() }
 async fn get_municipality(&self, _: &str) -> Result<Option<crate::contracts::Municipality>> { unimplemented!() }
 async fn upsert_organization(&self, _: i64, _: &str, _: &str) -> Result<crate::contracts::Organization> { unimplemented!() }
 async fn find_meeting_by_archive_path(&self, _: i64, _: &str) -> Result<Option<crate::contracts::Meeting>> { unimplemented!() }
 async fn find_scheduled_meeting(&self, _: i64, _: NaiveDate, _: &str) -> Result<Option<crate::contracts::Meeting>> { unimplemented!() }
 async fn upsert_meeting(&self, _: crate::contracts::NewMeeting) -> Result<crate::contracts::Meeting> { unimplemented!() }
 async fn list_meetings(&self, _: i64) -> Result<Vec<crate::contracts::Meeting>> { Ok(self.meetings.clone()) }
 async fn find_person_by_canonical_name(&self, _: &str) -> Result<Option<crate::contracts::Person>> { unimplemented!() }
 async fn find_people_by_surname(&self, _: &str) -> Result<Vec<crate::contracts::Person>> { unimplemented!() }
 async fn list_people(&self) -> Result<Vec<crate::contracts::Person>> { unimplemented!() }
 async fn create_person(&self, _: &str, _: bool, _: Option<String>) -> Result<crate::contracts::Person> { unimplemented!() }
 async fn active_memberships(&self, _: i64, _: NaiveDate) -> Result<Vec<crate::contracts::Membership>> { unimplemented!() }
 async fn replace_attendance(&self, _: i64, _: Vec<crate::contracts::Attendance>) -> Result<()> { unimplemented!() }
 async fn replace_speaker_aliases(&self, _: i64, _: Vec<crate::contracts::MeetingSpeakerAlias>) -> Result<()> { unimplemented!() }
 async fn replace_transcript(&self, _: i64, _: Vec<crate::contracts::TranscriptSegment>) -> Result<()> { unimplemented!() }
 async fn replace_agenda_items(&self, _: i64, _: Vec<crate::contracts::AgendaItem>) -> Result<Vec<crate::contracts::AgendaItem>> { unimplemented!() }
 async fn replace_motions(&self, _: i64, _: Vec<crate::contracts::Motion>) -> Result<Vec<crate::contracts::Motion>> { unimplemented!() }
 async fn replace_votes(&self, _: i64, _: Vec<crate::contracts::Vote>) -> Result<()> { unimplemented!() }
 async fn replace_key_statements(&self, _: i64, _: Vec<crate::contracts::KeyStatement>) -> Result<()> { unimplemented!() }
 async fn find_matter(&self, _: i64, _: &str) -> Result<Option<crate::contracts::Matter>> { unimplemented!() }
 async fn list_matters(&self, _: i64) -> Result<Vec<crate::contracts::Matter>> { unimplemented!() }
 async fn create_matter(&self, _: i64, _: &str, _: &str, _: Option<String>, _: NaiveDate) -> Result<crate::contracts::Matter> { unimplemented!() }
 async fn touch_matter_last_seen(&self, _: i64, _: NaiveDate) -> Result<()> { unimplemented!() }
 async fn set_agenda_item_geo(&self, _: i64, _: &str) -> Result<()> { unimplemented!() }
 async fn insert_document(&self, _: crate::contracts::Document) -> Result<crate::contracts::Document> { unimplemented!() }
 async fn delete_extracted_documents_for(&self, _: i64) -> Result<()> { unimplemented!() }
 async fn insert_extracted_document(&self, _: crate::contracts::ExtractedDocument) -> Result<crate::contracts::ExtractedDocument> { unimplemented!() }
 async fn insert_document_sections(&self, _: Vec<crate::contracts::DocumentSection>) -> Result<()> { unimplemented!() }
 async fn insert_document_images(&self, _: Vec<crate::contracts::DocumentImage>) -> Result<()> { unimplemented!() }
 async fn extracted_text_for_meeting(&self, _: i64, _: &str) -> Result<String> { unimplemented!() }
 async fn fetch_rows_needing_embedding(&self, _: &str, _: i64) -> Result<Vec<(i64, String)>> { unimplemented!() }
 async fn bulk_write_embeddings(&self, _: &str, _: Vec<(i64, Vec<f32>)>) -> Result<()> { unimplemented!() }
 }

 let store = OnlyListMeetings {
 meetings: vec![crate::contracts::Meeting {
 id: 42,
 municipality_id: 1,
 organization_id: 1,
 meeting_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
 meeting_type: "Regular Council".to_string(),
 title: "Regular Council".to_string(),
 archive_path: "2026-01-05 Regular Council".to_string(),
 status: "Completed".to_string(),
 has_agenda: true,
 has_minutes: true,
 has_transcript: true,
 video_url: None,
 summary: None,
 meta: serde_json::json!({}),
 }],
 };

 let resolved = resolve_target(&store, 1, "42", "archive").await.unwrap();
 assert_eq!(resolved, "2026-01-05 Regular Council");
 }
}
