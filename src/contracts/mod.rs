// Contracts Module
// Data model entities and external capability traits.
// Every remote collaborator — scraper, video catalog, diarization models,
// LLM, store, blob store, notifier — is specified here as a trait only; the
// concrete implementation lives in the matching module (store::PgStore,
// llm::GeminiClient,...) or is out of scope entirely (Scraper,
// SpeakerPipeline, SpeechToText).

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{
 AttendanceMode, DocumentType, MeetingStatus, MotionDisposition, MotionResult,
 OrganizationClass, StatementType, VoteChoice,
};

// ---------------------------------------------------------------------------
// Data model 
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Municipality {
 pub id: i64,
 pub slug: String,
 pub name: String,
 pub source_config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Meeting {
 pub id: i64,
 pub municipality_id: i64,
 pub organization_id: i64,
 pub meeting_date: NaiveDate,
 #[sqlx(rename = "type")]
 pub meeting_type: String,
 pub title: String,
 pub archive_path: String,
 pub status: String,
 pub has_agenda: bool,
 pub has_minutes: bool,
 pub has_transcript: bool,
 pub video_url: Option<String>,
 pub summary: Option<String>,
 pub meta: Value,
}

impl Meeting {
 pub fn status_enum(&self) -> MeetingStatus {
 match self.status.as_str() {
 "Completed" => MeetingStatus::Completed,
 "Occurred" => MeetingStatus::Occurred,
 _ => MeetingStatus::Planned,
 }
 }
}

/// Fields the ingester resolves/derives before an upsert; the store assigns
/// `id` on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
 pub municipality_id: i64,
 pub organization_id: i64,
 pub meeting_date: NaiveDate,
 pub meeting_type: String,
 pub title: String,
 pub archive_path: String,
 pub status: MeetingStatus,
 pub has_agenda: bool,
 pub has_minutes: bool,
 pub has_transcript: bool,
 pub video_url: Option<String>,
 pub summary: Option<String>,
 pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
 pub id: i64,
 pub municipality_id: i64,
 pub name: String,
 pub classification: String,
}

impl Organization {
 pub fn class_enum(&self) -> Option<OrganizationClass> {
 Some(match self.classification.as_str() {
 "Council" => OrganizationClass::Council,
 "Board" => OrganizationClass::Board,
 "Committee" => OrganizationClass::Committee,
 "Advisory Committee" => OrganizationClass::AdvisoryCommittee,
 "Staff" => OrganizationClass::Staff,
 _ => return None,
 })
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
 pub id: i64,
 pub name: String,
 pub is_councillor: bool,
 pub pronouns: Option<String>,
 pub voice_fingerprint_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
 pub person_id: i64,
 pub organization_id: i64,
 pub role: String,
 pub start_date: NaiveDate,
 pub end_date: Option<NaiveDate>,
}

impl Membership {
 /// Active on date D iff `start_date <= D <= (end_date or infinity)`.
 pub fn active_on(&self, date: NaiveDate) -> bool {
 self.start_date <= date && self.end_date.map(|end| date <= end).unwrap_or(true)
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MeetingSpeakerAlias {
 pub meeting_id: i64,
 pub speaker_label: String,
 pub person_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
 pub meeting_id: i64,
 pub person_id: i64,
 pub mode: String,
}

impl Attendance {
 pub fn mode_enum(&self) -> AttendanceMode {
 match self.mode.as_str() {
 "Remote" => AttendanceMode::Remote,
 "Absent" => AttendanceMode::Absent,
 _ => AttendanceMode::InPerson,
 }
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgendaItem {
 pub id: i64,
 pub meeting_id: i64,
 pub matter_id: Option<i64>,
 pub item_order: String,
 pub title: String,
 pub description: Option<String>,
 pub category: Option<String>,
 pub plain_english_summary: Option<String>,
 pub related_address: Vec<String>,
 pub discussion_start_time: Option<f64>,
 pub discussion_end_time: Option<f64>,
 pub is_controversial: bool,
 pub financial_cost: Option<f64>,
 pub funding_source: Option<String>,
 pub keywords: Vec<String>,
 pub geo: Option<String>,
 /// Free-form bag; the aligner stashes `predicted_window` here.
 pub meta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Motion {
 pub id: i64,
 pub meeting_id: i64,
 pub agenda_item_id: i64,
 pub mover_id: Option<i64>,
 pub seconder_id: Option<i64>,
 pub text_content: String,
 pub plain_english_summary: Option<String>,
 pub disposition: String,
 pub result: String,
 pub time_offset_seconds: Option<f64>,
 pub financial_cost: Option<f64>,
 pub funding_source: Option<String>,
}

impl Motion {
 pub fn result_enum(&self) -> Option<MotionResult> {
 Some(match self.result.as_str() {
 "CARRIED" => MotionResult::Carried,
 "DEFEATED" => MotionResult::Defeated,
 "WITHDRAWN" => MotionResult::Withdrawn,
 _ => return None,
 })
 }

 pub fn disposition_enum(&self) -> Option<MotionDisposition> {
 Some(match self.disposition.as_str() {
 "Substantive" => MotionDisposition::Substantive,
 "Procedural" => MotionDisposition::Procedural,
 "Tabled" => MotionDisposition::Tabled,
 "Referred" => MotionDisposition::Referred,
 "Amended" => MotionDisposition::Amended,
 _ => return None,
 })
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
 pub motion_id: i64,
 pub person_id: i64,
 pub vote: String,
 pub recusal_reason: Option<String>,
}

impl Vote {
 pub fn choice_enum(&self) -> Option<VoteChoice> {
 Some(match self.vote.as_str() {
 "Yes" => VoteChoice::Yes,
 "No" => VoteChoice::No,
 "Abstain" => VoteChoice::Abstain,
 "Recused" => VoteChoice::Recused,
 _ => return None,
 })
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KeyStatement {
 pub id: i64,
 pub meeting_id: i64,
 pub agenda_item_id: Option<i64>,
 pub person_id: Option<i64>,
 pub speaker_name: String,
 pub statement_type: String,
 pub statement_text: String,
 pub context: Option<String>,
 pub start_time: Option<f64>,
}

impl KeyStatement {
 pub fn statement_type_enum(&self) -> StatementType {
 StatementType::parse_lenient(&self.statement_type)
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranscriptSegment {
 pub id: i64,
 pub meeting_id: i64,
 pub person_id: Option<i64>,
 pub speaker_name: String,
 pub start_time: f64,
 pub end_time: f64,
 pub text_content: String,
 pub attribution_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Matter {
 pub id: i64,
 pub municipality_id: i64,
 pub identifier: String,
 pub title: String,
 pub category: Option<String>,
 pub status: Option<String>,
 pub first_seen: NaiveDate,
 pub last_seen: NaiveDate,
 pub bylaw_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
 pub id: i64,
 pub meeting_id: i64,
 pub document_type: String,
 pub archive_path: String,
 pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExtractedDocument {
 pub id: i64,
 pub document_id: i64,
 pub meeting_id: i64,
 pub title: String,
 pub page_start: i32,
 pub page_end: i32,
 pub doc_type: String,
 pub agenda_item: Option<String>,
 pub summary: Option<String>,
 pub key_facts: Vec<String>,
}

impl ExtractedDocument {
 pub fn doc_type_enum(&self) -> Option<DocumentType> {
 Some(match self.doc_type.as_str() {
 "agenda" => DocumentType::Agenda,
 "minutes" => DocumentType::Minutes,
 "staff_report" => DocumentType::StaffReport,
 "delegation" => DocumentType::Delegation,
 "correspondence" => DocumentType::Correspondence,
 "appendix" => DocumentType::Appendix,
 "bylaw" => DocumentType::Bylaw,
 "presentation" => DocumentType::Presentation,
 "form" => DocumentType::Form,
 "other" => DocumentType::Other,
 _ => return None,
 })
 }

 /// Page ranges are inclusive; `a` contains `b` when `a` fully spans `b`.
 pub fn contains(&self, other: &Self) -> bool {
 self.page_start <= other.page_start && self.page_end >= other.page_end
 }

 pub fn overlaps(&self, other: &Self) -> bool {
 self.page_start <= other.page_end && other.page_start <= self.page_end
 }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentSection {
 pub id: i64,
 pub extracted_document_id: i64,
 pub agenda_item_id: Option<i64>,
 pub section_title: String,
 pub section_text: String,
 pub section_order: i32,
 pub page_start: i32,
 pub page_end: i32,
 pub token_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentImage {
 pub id: i64,
 pub extracted_document_id: i64,
 pub blob_key: String,
 pub seq: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bylaw {
 pub id: i64,
 pub municipality_id: i64,
 pub identifier: String,
 pub title: String,
 pub full_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BylawChunk {
 pub id: i64,
 pub bylaw_id: i64,
 pub chunk_order: i32,
 pub chunk_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoiceFingerprint {
 pub id: i64,
 pub person_id: i64,
 pub embedding: Vec<f32>,
 pub source_meeting_id: i64,
}

// ---------------------------------------------------------------------------
// Change detector output 
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeReport {
 pub new_meetings: Vec<ChangeEntry>,
 pub meetings_with_new_docs: Vec<ChangeEntry>,
 pub meetings_with_new_video: Vec<ChangeEntry>,
}

impl ChangeReport {
 pub fn is_empty(&self) -> bool {
 self.new_meetings.is_empty()
 && self.meetings_with_new_docs.is_empty()
 && self.meetings_with_new_video.is_empty()
 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
 pub archive_path: String,
 pub meeting_date: NaiveDate,
 pub meeting_type: String,
 pub details: Vec<String>,
 pub meta: Option<Value>,
}

// ---------------------------------------------------------------------------
// External capability traits 
// ---------------------------------------------------------------------------

/// Discovers meeting folders under the municipality's archive root and
/// writes PDFs/HTML and companion `.url` files. Out of scope ;
/// concrete scrapers (civicweb, legistar) live outside this crate.
#[async_trait]
pub trait Scraper: Send + Sync {
 async fn scrape_recursive(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCatalogEntry {
 pub url: String,
 pub title: String,
 pub uri: String,
 pub duration: f64,
}

/// Out of scope ; concrete video providers (Vimeo, YouTube) live
/// outside this crate.
#[async_trait]
pub trait VideoCatalog: Send + Sync {
 async fn get_video_map(
 &self,
 limit: Option<u32>,
 ) -> Result<HashMap<NaiveDate, Vec<VideoCatalogEntry>>>;

 async fn download(
 &self,
 entry: &VideoCatalogEntry,
 target_dir: &std::path::Path,
 include_video: bool,
 download_audio: bool,
 ) -> Result<Option<std::path::PathBuf>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
 pub start: f64,
 pub end: f64,
 pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizationOutput {
 pub segments: Vec<SpeakerSegment>,
 /// label -> 192-dim centroid
 pub speaker_centroids: HashMap<String, Vec<f32>>,
}

/// Segmentation + speaker-embedding model. Opaque; out of scope.
#[async_trait]
pub trait SpeakerPipeline: Send + Sync {
 async fn run(&self, wav_path: &std::path::Path) -> Result<DiarizationOutput>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttSegment {
 pub start: f64,
 pub end: f64,
 pub text: String,
}

/// Speech-to-text model. Opaque; out of scope.
#[async_trait]
pub trait SpeechToText: Send + Sync {
 async fn transcribe(&self, wav_path: &std::path::Path) -> Result<Vec<SttSegment>>;
}

/// A structured-output LLM capable of JSON-schema-constrained generation
/// and asynchronous batch jobs. Out of scope ; see
/// `crate::llm::GeminiClient` for the one concrete implementation this
/// crate carries.
#[async_trait]
pub trait Llm: Send + Sync {
 async fn generate_structured(
 &self,
 prompt: &str,
 schema: &Value,
 file: Option<&[u8]>,
 ) -> Result<Value>;

 async fn batch_submit(
 &self,
 jsonl_uri: &str,
 model: &str,
 display_name: &str,
 ) -> Result<String>;

 async fn batch_get(&self, job_name: &str) -> Result<BatchJobState>;

 async fn batch_results(&self, job_name: &str) -> Result<HashMap<String, String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchJobState {
 Pending,
 Running,
 Succeeded,
 Failed,
 Cancelled,
}

/// The relational + vector store. Generalizes
/// `supabase_repository::SupabaseRepositoryStore` from one table family to
/// the full civic schema; the concrete implementation is `store::PgStore`.
#[async_trait]
pub trait Store: Send + Sync {
 async fn upsert_municipality(
 &self,
 slug: &str,
 name: &str,
 source_config: Value,
 ) -> Result<Municipality>;
 async fn get_municipality(&self, slug: &str) -> Result<Option<Municipality>>;

 async fn upsert_organization(
 &self,
 municipality_id: i64,
 name: &str,
 classification: &str,
 ) -> Result<Organization>;

 async fn find_meeting_by_archive_path(
 &self,
 municipality_id: i64,
 archive_path: &str,
 ) -> Result<Option<Meeting>>;

 async fn find_scheduled_meeting(
 &self,
 municipality_id: i64,
 meeting_date: NaiveDate,
 meeting_type: &str,
 ) -> Result<Option<Meeting>>;

 async fn upsert_meeting(&self, meeting: NewMeeting) -> Result<Meeting>;

 async fn list_meetings(&self, municipality_id: i64) -> Result<Vec<Meeting>>;

 async fn find_person_by_canonical_name(&self, name: &str) -> Result<Option<Person>>;
 async fn find_people_by_surname(&self, surname: &str) -> Result<Vec<Person>>;
 async fn list_people(&self) -> Result<Vec<Person>>;
 async fn create_person(
 &self,
 name: &str,
 is_councillor: bool,
 pronouns: Option<String>,
 ) -> Result<Person>;

 async fn active_memberships(
 &self,
 organization_id: i64,
 date: NaiveDate,
 ) -> Result<Vec<Membership>>;

 async fn replace_attendance(&self, meeting_id: i64, rows: Vec<Attendance>) -> Result<()>;
 async fn replace_speaker_aliases(
 &self,
 meeting_id: i64,
 rows: Vec<MeetingSpeakerAlias>,
 ) -> Result<()>;
 async fn replace_transcript(
 &self,
 meeting_id: i64,
 rows: Vec<TranscriptSegment>,
 ) -> Result<()>;
 async fn replace_agenda_items(
 &self,
 meeting_id: i64,
 rows: Vec<AgendaItem>,
 ) -> Result<Vec<AgendaItem>>;
 async fn replace_motions(&self, meeting_id: i64, rows: Vec<Motion>) -> Result<Vec<Motion>>;
 async fn replace_votes(&self, motion_id: i64, rows: Vec<Vote>) -> Result<()>;
 async fn replace_key_statements(&self, meeting_id: i64, rows: Vec<KeyStatement>) -> Result<()>;

 async fn find_matter(&self, municipality_id: i64, identifier: &str) -> Result<Option<Matter>>;
 async fn list_matters(&self, municipality_id: i64) -> Result<Vec<Matter>>;
 async fn create_matter(
 &self,
 municipality_id: i64,
 identifier: &str,
 title: &str,
 category: Option<String>,
 seen: NaiveDate,
 ) -> Result<Matter>;
 async fn touch_matter_last_seen(&self, matter_id: i64, seen: NaiveDate) -> Result<()>;

 /// Write the geocoder's resolved `SRID=4326;POINT(lng lat)` EWKT onto
 /// one agenda item, once, after the item row already exists.
 async fn set_agenda_item_geo(&self, agenda_item_id: i64, geo: &str) -> Result<()>;

 async fn insert_document(&self, doc: Document) -> Result<Document>;
 async fn delete_extracted_documents_for(&self, document_id: i64) -> Result<()>;
 async fn insert_extracted_document(
 &self,
 doc: ExtractedDocument,
 ) -> Result<ExtractedDocument>;
 async fn insert_document_sections(&self, sections: Vec<DocumentSection>) -> Result<()>;
 async fn insert_document_images(&self, images: Vec<DocumentImage>) -> Result<()>;

 /// Concatenated `section_text` (in `section_order`) of every extracted
 /// document of `doc_type` ("agenda"/"minutes") attached to `meeting_id`,
 /// joined with blank lines. Empty string if the batch extractor hasn't
 /// produced anything for this meeting/type yet.
 async fn extracted_text_for_meeting(&self, meeting_id: i64, doc_type: &str) -> Result<String>;

 /// Rows of a table whose `embedding` column is null, up to `limit`.
 async fn fetch_rows_needing_embedding(
 &self,
 table: &str,
 limit: i64,
 ) -> Result<Vec<(i64, String)>>;

 /// Bulk vector write: temp-table COPY + `UPDATE... FROM... JOIN`.
 async fn bulk_write_embeddings(&self, table: &str, rows: Vec<(i64, Vec<f32>)>) -> Result<()>;
}

/// Object storage for extracted images. Keys are
/// `"images/{meeting_id}/{extracted_document_id}/{seq}.{ext}"`.
#[async_trait]
pub trait BlobStore: Send + Sync {
 async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Best-effort push notification; must never raise.
#[async_trait]
pub trait Notifier: Send + Sync {
 async fn push(&self, title: &str, message: &str);
}

/// Forward geocoding for the ingester's agenda-item address pass. Returns
/// `(longitude, latitude)` to match the `SRID=4326;POINT(lng lat)` storage
/// format, or `None` when the query has no match.
#[async_trait]
pub trait Geocoder: Send + Sync {
 async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>>;
}
