// Postgres implementation of the `Store` trait, generalizing
// `supabase_repository::SupabaseRepositoryStore`'s upsert-with-on_conflict
// pattern from one table family (repositories/indexing_jobs) to the full
// civic schema.
//
// Assumes a pre-provisioned schema (this crate carries no migrations,
// matching the teacher's assumption of an already-provisioned Supabase
// database) including a `meeting_status_rank(text) RETURNS int` SQL
// function ordering `Planned < Occurred < Completed`, used by
// `upsert_meeting` to enforce I5 (status never downgrades) at the
// conflict-resolution layer rather than only in application code.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::instrument;

use crate::contracts::{
 AgendaItem, Attendance, Document, DocumentImage, DocumentSection, ExtractedDocument,
 KeyStatement, Matter, Meeting, MeetingSpeakerAlias, Membership, Motion, Municipality,
 NewMeeting, Organization, Person, Store, TranscriptSegment, Vote,
};

/// Connects to the direct endpoint; on first connection failure, retries
/// once against the session-pooler endpoint derived from the same URL.
/// Spec §9 Open Question 3: treated as a configurable strategy rather than
/// hard-wired, so `pooler_url` is an explicit override a deployment can
/// set instead of relying on URL-rewriting heuristics.
pub struct PgStoreConfig {
 pub database_url: String,
 pub pooler_url: Option<String>,
 pub connect_timeout: Duration,
}

impl PgStoreConfig {
 pub fn from_url(database_url: impl Into<String>) -> Self {
 Self {
 database_url: database_url.into(),
 pooler_url: None,
 connect_timeout: Duration::from_secs(10),
 }
 }
}

#[derive(Clone)]
pub struct PgStore {
 pool: PgPool,
}

impl PgStore {
 pub async fn connect(config: PgStoreConfig) -> Result<Self> {
 let direct = PgPoolOptions::new()
.max_connections(10)
.acquire_timeout(config.connect_timeout)
.connect(&config.database_url)
.await;

 let pool = match direct {
 Ok(pool) => pool,
 Err(err) => {
 let Some(pooler_url) = config.pooler_url.as_deref() else {
 return Err(err).context("failed to connect to Postgres and no pooler fallback configured");
 };
 tracing::warn!(error = %err, "direct Postgres endpoint unreachable, falling back to session pooler");
 PgPoolOptions::new()
.max_connections(10)
.acquire_timeout(config.connect_timeout)
.connect(pooler_url)
.await
.context("failed to connect via session pooler fallback")?
 }
 };

 Ok(Self { pool })
 }

 pub fn pool(&self) -> PgPool {
 self.pool.clone()
 }
}

#[async_trait]
impl Store for PgStore {
 #[instrument(skip(self, source_config))]
 async fn upsert_municipality(
 &self,
 slug: &str,
 name: &str,
 source_config: JsonValue,
 ) -> Result<Municipality> {
 sqlx::query_as::<_, Municipality>(
 r#"
 INSERT INTO municipalities (slug, name, source_config)
 VALUES ($1, $2, $3)
 ON CONFLICT (slug)
 DO UPDATE SET name = EXCLUDED.name, source_config = EXCLUDED.source_config
 RETURNING id, slug, name, source_config
 "#,
 )
.bind(slug)
.bind(name)
.bind(Json(source_config))
.fetch_one(&self.pool)
.await
.context("failed to upsert municipality")
 }

 async fn get_municipality(&self, slug: &str) -> Result<Option<Municipality>> {
 sqlx::query_as::<_, Municipality>(
 "SELECT id, slug, name, source_config FROM municipalities WHERE slug = $1",
 )
.bind(slug)
.fetch_optional(&self.pool)
.await
.context("failed to fetch municipality")
 }

 #[instrument(skip(self))]
 async fn upsert_organization(
 &self,
 municipality_id: i64,
 name: &str,
 classification: &str,
 ) -> Result<Organization> {
 sqlx::query_as::<_, Organization>(
 r#"
 INSERT INTO organizations (municipality_id, name, classification)
 VALUES ($1, $2, $3)
 ON CONFLICT (municipality_id, name)
 DO UPDATE SET classification = EXCLUDED.classification
 RETURNING id, municipality_id, name, classification
 "#,
 )
.bind(municipality_id)
.bind(name)
.bind(classification)
.fetch_one(&self.pool)
.await
.context("failed to upsert organization")
 }

 async fn find_meeting_by_archive_path(
 &self,
 municipality_id: i64,
 archive_path: &str,
 ) -> Result<Option<Meeting>> {
 sqlx::query_as::<_, Meeting>(
 r#"
 SELECT id, municipality_id, organization_id, meeting_date, type, title,
 archive_path, status, has_agenda, has_minutes, has_transcript,
 video_url, summary, meta
 FROM meetings
 WHERE municipality_id = $1 AND archive_path = $2
 "#,
 )
.bind(municipality_id)
.bind(archive_path)
.fetch_optional(&self.pool)
.await
.context("failed to look up meeting by archive_path")
 }

 async fn find_scheduled_meeting(
 &self,
 municipality_id: i64,
 meeting_date: NaiveDate,
 meeting_type: &str,
 ) -> Result<Option<Meeting>> {
 sqlx::query_as::<_, Meeting>(
 r#"
 SELECT id, municipality_id, organization_id, meeting_date, type, title,
 archive_path, status, has_agenda, has_minutes, has_transcript,
 video_url, summary, meta
 FROM meetings
 WHERE municipality_id = $1 AND meeting_date = $2 AND type = $3
 AND archive_path IS NULL
 "#,
 )
.bind(municipality_id)
.bind(meeting_date)
.bind(meeting_type)
.fetch_optional(&self.pool)
.await
.context("failed to look up scheduled meeting placeholder")
 }

 #[instrument(skip(self, meeting))]
 async fn upsert_meeting(&self, meeting: NewMeeting) -> Result<Meeting> {
 // Status is monotonic (I5): the upgrade-only merge happens before
 // this call (see ingester::resolve_meeting), never here — the
 // store layer trusts its caller and just writes GREATEST by rank.
 sqlx::query_as::<_, Meeting>(
 r#"
 INSERT INTO meetings (
 municipality_id, organization_id, meeting_date, type, title,
 archive_path, status, has_agenda, has_minutes, has_transcript,
 video_url, summary, meta
 )
 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
 ON CONFLICT (municipality_id, archive_path)
 DO UPDATE SET
 organization_id = EXCLUDED.organization_id,
 title = EXCLUDED.title,
 status = CASE
 WHEN meeting_status_rank(meetings.status) >= meeting_status_rank(EXCLUDED.status)
 THEN meetings.status
 ELSE EXCLUDED.status
 END,
 has_agenda = EXCLUDED.has_agenda OR meetings.has_agenda,
 has_minutes = EXCLUDED.has_minutes OR meetings.has_minutes,
 has_transcript = EXCLUDED.has_transcript OR meetings.has_transcript,
 video_url = COALESCE(EXCLUDED.video_url, meetings.video_url),
 summary = COALESCE(EXCLUDED.summary, meetings.summary),
 meta = meetings.meta || EXCLUDED.meta
 RETURNING id, municipality_id, organization_id, meeting_date, type, title,
 archive_path, status, has_agenda, has_minutes, has_transcript,
 video_url, summary, meta
 "#,
 )
.bind(meeting.municipality_id)
.bind(meeting.organization_id)
.bind(meeting.meeting_date)
.bind(meeting.meeting_type)
.bind(meeting.title)
.bind(meeting.archive_path)
.bind(meeting.status.to_string())
.bind(meeting.has_agenda)
.bind(meeting.has_minutes)
.bind(meeting.has_transcript)
.bind(meeting.video_url)
.bind(meeting.summary)
.bind(Json(meeting.meta))
.fetch_one(&self.pool)
.await
.context("failed to upsert meeting")
 }

 async fn list_meetings(&self, municipality_id: i64) -> Result<Vec<Meeting>> {
 sqlx::query_as::<_, Meeting>(
 r#"
 SELECT id, municipality_id, organization_id, meeting_date, type, title,
 archive_path, status, has_agenda, has_minutes, has_transcript,
 video_url, summary, meta
 FROM meetings
 WHERE municipality_id = $1
 ORDER BY meeting_date
 "#,
 )
.bind(municipality_id)
.fetch_all(&self.pool)
.await
.context("failed to list meetings")
 }

 async fn find_person_by_canonical_name(&self, name: &str) -> Result<Option<Person>> {
 sqlx::query_as::<_, Person>(
 "SELECT id, name, is_councillor, pronouns, voice_fingerprint_id FROM people WHERE name = $1",
 )
.bind(name)
.fetch_optional(&self.pool)
.await
.context("failed to look up person by canonical name")
 }

 async fn find_people_by_surname(&self, surname: &str) -> Result<Vec<Person>> {
 sqlx::query_as::<_, Person>(
 "SELECT id, name, is_councillor, pronouns, voice_fingerprint_id FROM people WHERE name ILIKE '%' || $1",
 )
.bind(surname)
.fetch_all(&self.pool)
.await
.context("failed to look up people by surname")
 }

 async fn list_people(&self) -> Result<Vec<Person>> {
 sqlx::query_as::<_, Person>(
 "SELECT id, name, is_councillor, pronouns, voice_fingerprint_id FROM people",
 )
.fetch_all(&self.pool)
.await
.context("failed to list people")
 }

 #[instrument(skip(self))]
 async fn create_person(
 &self,
 name: &str,
 is_councillor: bool,
 pronouns: Option<String>,
 ) -> Result<Person> {
 sqlx::query_as::<_, Person>(
 r#"
 INSERT INTO people (name, is_councillor, pronouns)
 VALUES ($1, $2, $3)
 RETURNING id, name, is_councillor, pronouns, voice_fingerprint_id
 "#,
 )
.bind(name)
.bind(is_councillor)
.bind(pronouns)
.fetch_one(&self.pool)
.await
.context("failed to create person")
 }

 async fn active_memberships(
 &self,
 organization_id: i64,
 date: NaiveDate,
 ) -> Result<Vec<Membership>> {
 sqlx::query_as::<_, Membership>(
 r#"
 SELECT person_id, organization_id, role, start_date, end_date
 FROM memberships
 WHERE organization_id = $1 AND start_date <= $2
 AND (end_date IS NULL OR end_date >= $2)
 "#,
 )
.bind(organization_id)
.bind(date)
.fetch_all(&self.pool)
.await
.context("failed to list active memberships")
 }

 #[instrument(skip(self, rows))]
 async fn replace_attendance(&self, meeting_id: i64, rows: Vec<Attendance>) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM attendance WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior attendance")?;
 for row in rows {
 sqlx::query(
 "INSERT INTO attendance (meeting_id, person_id, mode) VALUES ($1, $2, $3)",
 )
.bind(row.meeting_id)
.bind(row.person_id)
.bind(row.mode)
.execute(&mut *tx)
.await
.context("failed to insert attendance row")?;
 }
 tx.commit().await.context("failed to commit attendance")
 }

 async fn replace_speaker_aliases(
 &self,
 meeting_id: i64,
 rows: Vec<MeetingSpeakerAlias>,
 ) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM meeting_speaker_aliases WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior speaker aliases")?;
 for row in rows {
 sqlx::query(
 r#"
 INSERT INTO meeting_speaker_aliases (meeting_id, speaker_label, person_id)
 VALUES ($1, $2, $3)
 ON CONFLICT (meeting_id, speaker_label) DO UPDATE SET person_id = EXCLUDED.person_id
 "#,
 )
.bind(row.meeting_id)
.bind(row.speaker_label)
.bind(row.person_id)
.execute(&mut *tx)
.await
.context("failed to insert speaker alias")?;
 }
 tx.commit().await.context("failed to commit speaker aliases")
 }

 async fn replace_transcript(
 &self,
 meeting_id: i64,
 rows: Vec<TranscriptSegment>,
 ) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM transcript_segments WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior transcript")?;
 for row in rows {
 sqlx::query(
 r#"
 INSERT INTO transcript_segments
 (meeting_id, person_id, speaker_name, start_time, end_time, text_content, attribution_source)
 VALUES ($1, $2, $3, $4, $5, $6, $7)
 "#,
 )
.bind(row.meeting_id)
.bind(row.person_id)
.bind(row.speaker_name)
.bind(row.start_time)
.bind(row.end_time)
.bind(row.text_content)
.bind(row.attribution_source)
.execute(&mut *tx)
.await
.context("failed to insert transcript segment")?;
 }
 tx.commit().await.context("failed to commit transcript")
 }

 async fn replace_agenda_items(
 &self,
 meeting_id: i64,
 rows: Vec<AgendaItem>,
 ) -> Result<Vec<AgendaItem>> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM agenda_items WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior agenda items")?;

 let mut inserted = Vec::with_capacity(rows.len());
 for row in rows {
 let item = sqlx::query_as::<_, AgendaItem>(
 r#"
 INSERT INTO agenda_items (
 meeting_id, matter_id, item_order, title, description, category,
 plain_english_summary, related_address, discussion_start_time,
 discussion_end_time, is_controversial, financial_cost, funding_source,
 keywords, geo, meta
 )
 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
 RETURNING id, meeting_id, matter_id, item_order, title, description, category,
 plain_english_summary, related_address, discussion_start_time,
 discussion_end_time, is_controversial, financial_cost, funding_source,
 keywords, geo, meta
 "#,
 )
.bind(row.meeting_id)
.bind(row.matter_id)
.bind(row.item_order)
.bind(row.title)
.bind(row.description)
.bind(row.category)
.bind(row.plain_english_summary)
.bind(row.related_address)
.bind(row.discussion_start_time)
.bind(row.discussion_end_time)
.bind(row.is_controversial)
.bind(row.financial_cost)
.bind(row.funding_source)
.bind(row.keywords)
.bind(row.geo)
.bind(Json(row.meta))
.fetch_one(&mut *tx)
.await
.context("failed to insert agenda item")?;
 inserted.push(item);
 }
 tx.commit().await.context("failed to commit agenda items")?;
 Ok(inserted)
 }

 async fn replace_motions(&self, meeting_id: i64, rows: Vec<Motion>) -> Result<Vec<Motion>> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM motions WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior motions")?;

 let mut inserted = Vec::with_capacity(rows.len());
 for row in rows {
 let motion = sqlx::query_as::<_, Motion>(
 r#"
 INSERT INTO motions (
 meeting_id, agenda_item_id, mover_id, seconder_id, text_content,
 plain_english_summary, disposition, result, time_offset_seconds,
 financial_cost, funding_source
 )
 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
 RETURNING id, meeting_id, agenda_item_id, mover_id, seconder_id, text_content,
 plain_english_summary, disposition, result, time_offset_seconds,
 financial_cost, funding_source
 "#,
 )
.bind(row.meeting_id)
.bind(row.agenda_item_id)
.bind(row.mover_id)
.bind(row.seconder_id)
.bind(row.text_content)
.bind(row.plain_english_summary)
.bind(row.disposition)
.bind(row.result)
.bind(row.time_offset_seconds)
.bind(row.financial_cost)
.bind(row.funding_source)
.fetch_one(&mut *tx)
.await
.context("failed to insert motion")?;
 inserted.push(motion);
 }
 tx.commit().await.context("failed to commit motions")?;
 Ok(inserted)
 }

 async fn replace_votes(&self, motion_id: i64, rows: Vec<Vote>) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM votes WHERE motion_id = $1")
.bind(motion_id)
.execute(&mut *tx)
.await
.context("failed to clear prior votes")?;
 for row in rows {
 sqlx::query(
 "INSERT INTO votes (motion_id, person_id, vote, recusal_reason) VALUES ($1, $2, $3, $4)",
 )
.bind(row.motion_id)
.bind(row.person_id)
.bind(row.vote)
.bind(row.recusal_reason)
.execute(&mut *tx)
.await
.context("failed to insert vote")?;
 }
 tx.commit().await.context("failed to commit votes")
 }

 async fn replace_key_statements(
 &self,
 meeting_id: i64,
 rows: Vec<KeyStatement>,
 ) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query("DELETE FROM key_statements WHERE meeting_id = $1")
.bind(meeting_id)
.execute(&mut *tx)
.await
.context("failed to clear prior key statements")?;
 for row in rows {
 sqlx::query(
 r#"
 INSERT INTO key_statements
 (meeting_id, agenda_item_id, person_id, speaker_name, statement_type,
 statement_text, context, start_time)
 VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
 "#,
 )
.bind(row.meeting_id)
.bind(row.agenda_item_id)
.bind(row.person_id)
.bind(row.speaker_name)
.bind(row.statement_type)
.bind(row.statement_text)
.bind(row.context)
.bind(row.start_time)
.execute(&mut *tx)
.await
.context("failed to insert key statement")?;
 }
 tx.commit().await.context("failed to commit key statements")
 }

 async fn find_matter(&self, municipality_id: i64, identifier: &str) -> Result<Option<Matter>> {
 sqlx::query_as::<_, Matter>(
 r#"
 SELECT id, municipality_id, identifier, title, category, status, first_seen, last_seen, bylaw_id
 FROM matters
 WHERE municipality_id = $1 AND identifier = $2
 "#,
 )
.bind(municipality_id)
.bind(identifier)
.fetch_optional(&self.pool)
.await
.context("failed to look up matter by identifier")
 }

 async fn list_matters(&self, municipality_id: i64) -> Result<Vec<Matter>> {
 sqlx::query_as::<_, Matter>(
 r#"
 SELECT id, municipality_id, identifier, title, category, status, first_seen, last_seen, bylaw_id
 FROM matters
 WHERE municipality_id = $1
 "#,
 )
.bind(municipality_id)
.fetch_all(&self.pool)
.await
.context("failed to list matters")
 }

 #[instrument(skip(self))]
 async fn create_matter(
 &self,
 municipality_id: i64,
 identifier: &str,
 title: &str,
 category: Option<String>,
 seen: NaiveDate,
 ) -> Result<Matter> {
 sqlx::query_as::<_, Matter>(
 r#"
 INSERT INTO matters (municipality_id, identifier, title, category, first_seen, last_seen)
 VALUES ($1, $2, $3, $4, $5, $5)
 RETURNING id, municipality_id, identifier, title, category, status, first_seen, last_seen, bylaw_id
 "#,
 )
.bind(municipality_id)
.bind(identifier)
.bind(title)
.bind(category)
.bind(seen)
.fetch_one(&self.pool)
.await
.context("failed to create matter")
 }

 async fn touch_matter_last_seen(&self, matter_id: i64, seen: NaiveDate) -> Result<()> {
 sqlx::query("UPDATE matters SET last_seen = GREATEST(last_seen, $2) WHERE id = $1")
.bind(matter_id)
.bind(seen)
.execute(&self.pool)
.await
.context("failed to touch matter last_seen")?;
 Ok(())
 }

 async fn set_agenda_item_geo(&self, agenda_item_id: i64, geo: &str) -> Result<()> {
 sqlx::query("UPDATE agenda_items SET geo = $2 WHERE id = $1")
.bind(agenda_item_id)
.bind(geo)
.execute(&self.pool)
.await
.context("failed to set agenda_item geo")?;
 Ok(())
 }

 async fn insert_document(&self, doc: Document) -> Result<Document> {
 sqlx::query_as::<_, Document>(
 r#"
 INSERT INTO documents (meeting_id, document_type, archive_path, title)
 VALUES ($1, $2, $3, $4)
 ON CONFLICT (meeting_id, archive_path)
 DO UPDATE SET document_type = EXCLUDED.document_type, title = EXCLUDED.title
 RETURNING id, meeting_id, document_type, archive_path, title
 "#,
 )
.bind(doc.meeting_id)
.bind(doc.document_type)
.bind(doc.archive_path)
.bind(doc.title)
.fetch_one(&self.pool)
.await
.context("failed to upsert document")
 }

 /// Idempotent re-extraction (DB-insertion phase): prior rows
 /// tied to this `document_id` are deleted before re-insert.
 async fn delete_extracted_documents_for(&self, document_id: i64) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 sqlx::query(
 r#"
 DELETE FROM document_images
 WHERE extracted_document_id IN (SELECT id FROM extracted_documents WHERE document_id = $1)
 "#,
 )
.bind(document_id)
.execute(&mut *tx)
.await
.context("failed to clear prior document images")?;
 sqlx::query(
 r#"
 DELETE FROM document_sections
 WHERE extracted_document_id IN (SELECT id FROM extracted_documents WHERE document_id = $1)
 "#,
 )
.bind(document_id)
.execute(&mut *tx)
.await
.context("failed to clear prior document sections")?;
 sqlx::query("DELETE FROM extracted_documents WHERE document_id = $1")
.bind(document_id)
.execute(&mut *tx)
.await
.context("failed to clear prior extracted documents")?;
 tx.commit().await.context("failed to commit extracted-document cleanup")
 }

 async fn insert_extracted_document(
 &self,
 doc: ExtractedDocument,
 ) -> Result<ExtractedDocument> {
 sqlx::query_as::<_, ExtractedDocument>(
 r#"
 INSERT INTO extracted_documents
 (document_id, meeting_id, title, page_start, page_end, doc_type, agenda_item, summary, key_facts)
 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
 RETURNING id, document_id, meeting_id, title, page_start, page_end, doc_type, agenda_item, summary, key_facts
 "#,
 )
.bind(doc.document_id)
.bind(doc.meeting_id)
.bind(doc.title)
.bind(doc.page_start)
.bind(doc.page_end)
.bind(doc.doc_type)
.bind(doc.agenda_item)
.bind(doc.summary)
.bind(doc.key_facts)
.fetch_one(&self.pool)
.await
.context("failed to insert extracted document")
 }

 async fn insert_document_sections(&self, sections: Vec<DocumentSection>) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 for section in sections {
 sqlx::query(
 r#"
 INSERT INTO document_sections
 (extracted_document_id, agenda_item_id, section_title, section_text,
 section_order, page_start, page_end, token_count)
 VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
 "#,
 )
.bind(section.extracted_document_id)
.bind(section.agenda_item_id)
.bind(section.section_title)
.bind(section.section_text)
.bind(section.section_order)
.bind(section.page_start)
.bind(section.page_end)
.bind(section.token_count)
.execute(&mut *tx)
.await
.context("failed to insert document section")?;
 }
 tx.commit().await.context("failed to commit document sections")
 }

 async fn insert_document_images(&self, images: Vec<DocumentImage>) -> Result<()> {
 let mut tx = self.pool.begin().await?;
 for image in images {
 sqlx::query(
 "INSERT INTO document_images (extracted_document_id, blob_key, seq) VALUES ($1, $2, $3)",
 )
.bind(image.extracted_document_id)
.bind(image.blob_key)
.bind(image.seq)
.execute(&mut *tx)
.await
.context("failed to insert document image")?;
 }
 tx.commit().await.context("failed to commit document images")
 }

 async fn extracted_text_for_meeting(&self, meeting_id: i64, doc_type: &str) -> Result<String> {
 let sections: Vec<(String,)> = sqlx::query_as(
 r#"
 SELECT ds.section_text
 FROM document_sections ds
 JOIN extracted_documents ed ON ed.id = ds.extracted_document_id
 WHERE ed.meeting_id = $1 AND ed.doc_type = $2
 ORDER BY ed.page_start, ds.section_order
 "#,
 )
.bind(meeting_id)
.bind(doc_type)
.fetch_all(&self.pool)
.await
.context("failed to fetch extracted text for meeting")?;

 Ok(sections.into_iter().map(|(text,)| text).collect()::<Vec<_>>.join("\n\n"))
 }

 /// Paginated SELECT rather than a DB cursor, per SPEC_FULL's
 /// "Generators -> batches" note: a bounded `LIMIT` stands in for the
 /// teacher's absent streaming-cursor idiom.
 async fn fetch_rows_needing_embedding(
 &self,
 table: &str,
 limit: i64,
 ) -> Result<Vec<(i64, String)>> {
 let (text_expr, allowed) = embedding_text_expr(table)?;
 let query = format!(
 "SELECT id, {text_expr} AS text FROM {allowed} WHERE embedding IS NULL ORDER BY id LIMIT $1"
 );
 let rows: Vec<(i64, String)> = sqlx::query_as(&query)
.bind(limit)
.fetch_all(&self.pool)
.await
.context("failed to fetch rows needing embedding")?;
 Ok(rows)
 }

 /// Temp-table COPY + `UPDATE... FROM... JOIN`, step 4.
 #[instrument(skip(self, rows))]
 async fn bulk_write_embeddings(&self, table: &str, rows: Vec<(i64, Vec<f32>)>) -> Result<()> {
 let (_, allowed) = embedding_text_expr(table)?;
 if rows.is_empty() {
 return Ok(());
 }

 let mut tx = self.pool.begin().await?;
 sqlx::query("CREATE TEMP TABLE embedding_staging (id BIGINT, embedding VECTOR) ON COMMIT DROP")
.execute(&mut *tx)
.await
.context("failed to create embedding staging table")?;

 for (id, embedding) in &rows {
 let vector_literal = format!(
 "[{}]",
 embedding
.iter()
.map(|v| v.to_string())
.collect()::<Vec<_>>
.join(",")
 );
 sqlx::query("INSERT INTO embedding_staging (id, embedding) VALUES ($1, $2::vector)")
.bind(id)
.bind(vector_literal)
.execute(&mut *tx)
.await
.context("failed to stage embedding row")?;
 }

 let update = format!(
 "UPDATE {allowed} SET embedding = s.embedding FROM embedding_staging s WHERE {allowed}.id = s.id"
 );
 sqlx::query(&update)
.execute(&mut *tx)
.await
.context("failed to flush embeddings from staging table")?;

 tx.commit().await.context("failed to commit embedding flush")
 }
}

/// Allow-list of embeddable tables and their text-construction expression,
/// "Tables declare: select columns; a text-construction
/// function". Table names are never interpolated from untrusted input —
/// they always originate from `crate::embedder`'s static table registry —
/// but this still guards against a typo reaching raw SQL.
fn embedding_text_expr(table: &str) -> Result<(&'static str, &'static str)> {
 match table {
 "agenda_items" => Ok(("COALESCE(title || ' ' || COALESCE(plain_english_summary, ''), title)", "agenda_items")),
 "motions" => Ok(("COALESCE(text_content || ' ' || COALESCE(plain_english_summary, ''), text_content)", "motions")),
 "key_statements" => Ok(("statement_text", "key_statements")),
 "document_sections" => Ok(("section_text", "document_sections")),
 "bylaw_chunks" => Ok(("chunk_text", "bylaw_chunks")),
 "matters" => Ok(("title", "matters")),
 other => anyhow::bail!("unknown embeddable table: {other}"),
 }
}
