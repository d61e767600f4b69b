// Ingester. The central write path: resolves one meeting
// folder's metadata, people, and extracted records into store rows in the
// strict order mandates (organization → meeting → attendance →
// aliases → transcript → items → motions → votes → key statements →
// geocoding). Grounded on `store::PgStore`'s upsert shapes, which in turn
// generalize `supabase_repository`'s on-conflict-upsert idiom.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use strsim::jaro_winkler;
use tracing::{info, instrument, warn};

use crate::aligner;
use crate::change_detector::ArchiveEntry;
use crate::contracts::{
 AgendaItem, Attendance, Geocoder, KeyStatement, MeetingSpeakerAlias, Motion, NewMeeting,
 Person, Store, TranscriptSegment, Vote,
};
use crate::diarizer::types::TranscriptCache;
use crate::geocoder::to_ewkt;
use crate::matter_matcher::{MatterCandidate, MatterMatcher};
use crate::refiner::schema::MeetingRefinement;
use crate::types::MeetingStatus;
use crate::validation::{address, identifier, person as person_validation};

const PERSON_DUP_SIMILARITY: f64 = 0.90;
const MOTION_TIMESTAMP_SANITY_SECONDS: f64 = 100.0;
const COUNCIL_TITLES: &[&str] = &["mayor", "councillor", "councilor", "alderman", "director"];

/// Everything the ingester needs for one meeting folder, gathered upstream
/// by the orchestrator (disk scan, refiner output, diarization cache).
pub struct IngestInput<'a> {
 pub municipality_id: i64,
 pub organization_name: &'a str,
 pub entry: &'a ArchiveEntry,
 pub refinement: &'a MeetingRefinement,
 pub transcript: Option<&'a TranscriptCache>,
 pub active_council_names: &'a [String],
 pub municipality_context: &'a str,
 pub today: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
 pub meeting_id: i64,
 pub status: MeetingStatus,
 pub attendees_resolved: usize,
 pub items_inserted: usize,
 pub motions_inserted: usize,
 pub votes_inserted: usize,
 pub geocoded: usize,
}

/// Derive a meeting's lifecycle status from its date and available content
/// (status rule, I4's Planned safeguard).
pub fn derive_status(
 meeting_date: NaiveDate,
 has_agenda: bool,
 has_minutes: bool,
 has_transcript: bool,
 today: NaiveDate,
) -> MeetingStatus {
 let has_any_content = has_agenda || has_minutes || has_transcript;
 if meeting_date > today || !has_any_content {
 return MeetingStatus::Planned;
 }
 if has_agenda && has_minutes && has_transcript {
 return MeetingStatus::Completed;
 }
 MeetingStatus::Occurred
}

/// Ingest one meeting end to end. `store`/`matter_matcher`/`geocoder` are
/// shared across a whole run; `input` is this meeting's slice.
#[instrument(skip(store, matter_matcher, geocoder, input), fields(archive_path = %input.entry.archive_path))]
pub async fn ingest_meeting(
 store: &dyn Store,
 matter_matcher: &MatterMatcher,
 geocoder: &dyn Geocoder,
 input: IngestInput<'_>,
) -> Result<IngestSummary> {
 let organization = store
.upsert_organization(input.municipality_id, input.organization_name, "Council")
.await?;

 let has_agenda = input.entry.has_agenda_file;
 let has_minutes = input.entry.has_minutes_file;
 let has_transcript = input.entry.has_transcript_file;
 let derived_status = derive_status(
 input.entry.meeting_date,
 has_agenda,
 has_minutes,
 has_transcript,
 input.today,
 );

 let existing = store
.find_meeting_by_archive_path(input.municipality_id, input.entry.archive_path.as_str())
.await?
.or(store
.find_scheduled_meeting(
 input.municipality_id,
 input.entry.meeting_date,
 &input.entry.meeting_type,
 )
.await?);

 let status = match &existing {
 Some(m) => MeetingStatus::merge_upgrade_only(m.status_enum(), derived_status),
 None => derived_status,
 };

 // Planned-meeting safeguard (I4): force empty downstream records rather
 // than trusting whatever the refiner emitted for a future meeting.
 let is_planned = status == MeetingStatus::Planned;

 let title = if input.refinement.summary.trim().is_empty() {
 format!("{} {}", input.entry.meeting_type, input.entry.meeting_date)
 } else {
 input.refinement.summary.clone()
 };

 let meeting = store
.upsert_meeting(NewMeeting {
 municipality_id: input.municipality_id,
 organization_id: organization.id,
 meeting_date: input.entry.meeting_date,
 meeting_type: input.entry.meeting_type.clone(),
 title,
 archive_path: input.entry.archive_path.as_str().to_string(),
 status,
 has_agenda,
 has_minutes,
 has_transcript,
 video_url: None,
 summary: Some(input.refinement.summary.clone()).filter(|s| !s.is_empty()),
 meta: serde_json::json!({}),
 })
.await?;

 let mut summary = IngestSummary {
 meeting_id: meeting.id,
 status,
..Default::default()
 };

 if is_planned {
 store.replace_attendance(meeting.id, Vec::new()).await?;
 store.replace_speaker_aliases(meeting.id, Vec::new()).await?;
 store.replace_transcript(meeting.id, Vec::new()).await?;
 store.replace_agenda_items(meeting.id, Vec::new()).await?;
 store.replace_motions(meeting.id, Vec::new()).await?;
 store.replace_key_statements(meeting.id, Vec::new()).await?;
 info!(meeting_id = meeting.id, "planned meeting; downstream records forced empty");
 return Ok(summary);
 }

 let active_council_members: Vec<String> = {
 let mut names = input.active_council_names.to_vec();
 names.retain(|n| !n.trim().is_empty());
 names
 };

 let mut resolved_people: HashMap<String, Person> = HashMap::new();
 let mut canonical_names: Vec<String> = Vec::new();

 for raw_name in &input.refinement.attendees {
 match get_or_create_person(store, raw_name, &active_council_members).await? {
 Some(person) => {
 canonical_names.push(person.name.clone());
 resolved_people.insert(person_validation::canonicalize_name(raw_name), person);
 }
 None => warn!(name = raw_name, "attendee rejected by get_or_create_person"),
 }
 }
 summary.attendees_resolved = resolved_people.len();

 let attendance: Vec<Attendance> = resolved_people
.values()
.map(|p| Attendance {
 meeting_id: meeting.id,
 person_id: p.id,
 mode: "InPerson".to_string(),
 })
.collect();
 store.replace_attendance(meeting.id, attendance).await?;

 let mut speaker_aliases = Vec::new();
 for alias in &input.refinement.speaker_aliases {
 let canonical = person_validation::canonicalize_name(&alias.name);
 if let Some(person) = resolved_people.get(&canonical) {
 speaker_aliases.push(MeetingSpeakerAlias {
 meeting_id: meeting.id,
 speaker_label: alias.label.clone(),
 person_id: person.id,
 });
 }
 }
 store.replace_speaker_aliases(meeting.id, speaker_aliases.clone()).await?;

 let label_to_person: HashMap<&str, i64> = speaker_aliases
.iter()
.map(|a| (a.speaker_label.as_str(), a.person_id))
.collect();

 if let Some(cache) = input.transcript {
 let corrected = apply_transcript_corrections(cache, input.refinement);
 let consolidated = consolidate_consecutive_speakers(&corrected);
 let rows: Vec<TranscriptSegment> = consolidated
.into_iter()
.enumerate()
.map(|(i, seg)| TranscriptSegment {
 id: i as i64,
 meeting_id: meeting.id,
 person_id: label_to_person.get(seg.speaker.as_str()).copied(),
 speaker_name: seg.speaker.clone(),
 start_time: seg.start,
 end_time: seg.end,
 text_content: seg.text.clone(),
 attribution_source: if label_to_person.contains_key(seg.speaker.as_str()) {
 "alias".to_string()
 } else {
 "verbatim".to_string()
 },
 })
.collect();
 store.replace_transcript(meeting.id, rows).await?;
 }

 let segments: &[crate::diarizer::types::TranscriptSegmentRecord] =
 input.transcript.map(|c| c.segments.as_slice()).unwrap_or(&[]);
 let as_transcript_segments: Vec<TranscriptSegment> = segments
.iter()
.enumerate()
.map(|(i, s)| TranscriptSegment {
 id: i as i64,
 meeting_id: meeting.id,
 person_id: None,
 speaker_name: s.speaker.clone(),
 start_time: s.start,
 end_time: s.end,
 text_content: s.text.clone(),
 attribution_source: "diarizer".to_string(),
 })
.collect();

 let mut agenda_items = Vec::new();
 for item in &input.refinement.items {
 let candidate = MatterCandidate {
 identifier: item
.matter_identifier
.clone()
.or_else(|| identifier::extract_identifier_from_text(&item.title)),
 title: item.matter_title.clone().unwrap_or_else(|| item.title.clone()),
 addresses: item.related_address.clone(),
 };
 let matter = matter_matcher
.find_or_create(store, input.municipality_id, &candidate, input.entry.meeting_date)
.await?;

 agenda_items.push(AgendaItem {
 id: 0,
 meeting_id: meeting.id,
 matter_id: Some(matter.matter_id),
 item_order: item.item_order.clone(),
 title: item.title.clone(),
 description: item.description.clone(),
 category: Some(item.category.clone()).filter(|c| !c.is_empty()),
 plain_english_summary: item.plain_english_summary.clone(),
 related_address: item.related_address.clone(),
 discussion_start_time: item.discussion_start_time,
 discussion_end_time: item.discussion_end_time,
 is_controversial: item.is_controversial,
 financial_cost: item.financial_cost,
 funding_source: item.funding_source.clone(),
 keywords: item.tags.clone(),
 geo: None,
 meta: serde_json::json!({}),
 });
 }

 if !segments.is_empty() {
 let windows = aligner::align_items(&agenda_items, &as_transcript_segments);
 for (item, (start, end)) in agenda_items.iter_mut().zip(windows) {
 item.discussion_start_time = Some(start);
 item.discussion_end_time = Some(end);
 }
 }

 let inserted_items = store.replace_agenda_items(meeting.id, agenda_items).await?;
 summary.items_inserted = inserted_items.len();

 let mut motions = Vec::new();
 let mut pending_votes: Vec<(usize, &crate::refiner::schema::MotionRecord)> = Vec::new();
 for (item, item_record) in inserted_items.iter().zip(input.refinement.items.iter()) {
 for motion_record in &item_record.motions {
 let window = (
 item.discussion_start_time.unwrap_or(0.0),
 item.discussion_end_time.unwrap_or(item.discussion_start_time.unwrap_or(0.0) + 60.0),
 );
 let mut timestamp = motion_record.timestamp.or_else(|| {
 if segments.is_empty() {
 None
 } else {
 aligner::align_motion(motion_record.mover.as_deref(), window, &as_transcript_segments)
 }
 });

 // Motion timestamp sanity (I3): a >100s-in item with a
 // near-zero motion timestamp is almost certainly a mis-anchor.
 if let (Some(item_start), Some(motion_ts)) = (item.discussion_start_time, timestamp) {
 if item_start > MOTION_TIMESTAMP_SANITY_SECONDS
 && motion_ts < MOTION_TIMESTAMP_SANITY_SECONDS
 {
 timestamp = None;
 }
 }

 let mover_id = motion_record
.mover
.as_deref()
.and_then(|n| resolved_people.get(&person_validation::canonicalize_name(n)))
.map(|p| p.id);
 let seconder_id = motion_record
.seconder
.as_deref()
.and_then(|n| resolved_people.get(&person_validation::canonicalize_name(n)))
.map(|p| p.id);

 motions.push(Motion {
 id: 0,
 meeting_id: meeting.id,
 agenda_item_id: item.id,
 mover_id,
 seconder_id,
 text_content: motion_record.motion_text.clone(),
 plain_english_summary: motion_record.plain_english_summary.clone(),
 disposition: motion_record.disposition.clone().unwrap_or_default(),
 result: motion_record.result.clone(),
 time_offset_seconds: timestamp,
 financial_cost: motion_record.financial_cost,
 funding_source: motion_record.funding_source.clone(),
 });
 pending_votes.push((motions.len() - 1, motion_record));
 }
 }

 let inserted_motions = store.replace_motions(meeting.id, motions).await?;
 summary.motions_inserted = inserted_motions.len();

 for (index, motion_record) in pending_votes {
 let Some(motion) = inserted_motions.get(index) else {
 continue;
 };

 let mut votes: Vec<Vote> = Vec::new();
 let mut voted_person_ids = std::collections::HashSet::new();
 for vote_record in &motion_record.votes {
 let canonical = person_validation::canonicalize_name(&vote_record.person_name);
 if !canonical_names.iter().any(|n| n == &canonical) {
 warn!(person = %vote_record.person_name, "dropping vote for non-canonical attendee");
 continue;
 }
 let Some(person) = resolved_people.get(&canonical) else {
 continue;
 };
 voted_person_ids.insert(person.id);
 votes.push(Vote {
 motion_id: motion.id,
 person_id: person.id,
 vote: vote_record.vote.clone(),
 recusal_reason: vote_record.reason.clone(),
 });
 }

 // Implicit Yes-vote injection: a motion that CARRIED is assumed to
 // have had every attending council member vote Yes unless recorded
 // otherwise.
 if motion_record.result.eq_ignore_ascii_case("CARRIED") {
 for person in resolved_people.values() {
 if active_council_members.iter().any(|n| n == &person.name)
 && !voted_person_ids.contains(&person.id)
 {
 votes.push(Vote {
 motion_id: motion.id,
 person_id: person.id,
 vote: "Yes".to_string(),
 recusal_reason: None,
 });
 }
 }
 }

 summary.votes_inserted += votes.len();
 store.replace_votes(motion.id, votes).await?;
 }

 let mut key_statements = Vec::new();
 for (item, item_record) in inserted_items.iter().zip(input.refinement.items.iter()) {
 for statement in &item_record.key_statements {
 let person_id = statement
.speaker
.as_deref()
.and_then(|n| resolved_people.get(&person_validation::canonicalize_name(n)))
.map(|p| p.id);
 key_statements.push(KeyStatement {
 id: 0,
 meeting_id: meeting.id,
 agenda_item_id: Some(item.id),
 person_id,
 speaker_name: statement.speaker.clone().unwrap_or_default(),
 statement_type: statement.statement_type.clone(),
 statement_text: statement.statement_text.clone(),
 context: statement.context.clone(),
 start_time: statement.timestamp,
 });
 }
 }
 store.replace_key_statements(meeting.id, key_statements).await?;

 summary.geocoded = geocode_agenda_items(geocoder, store, &inserted_items, input.municipality_context).await?;

 Ok(summary)
}

/// Resolve an attendee/speaker-alias name to a `Person` row, per spec
/// §4.10 step 5: filter junk, extract+strip roles, canonicalize, reject
/// invalid names, then resolve by exact canonical match, surname
/// uniqueness, or a Ratcliff/Obershelp-style duplicate check, gating
/// Council-titled names on the election-seeded roster.
async fn get_or_create_person(
 store: &dyn Store,
 raw_name: &str,
 active_council_members: &[String],
) -> Result<Option<Person>> {
 if person_validation::is_junk_name(raw_name) {
 return Ok(None);
 }
 let (without_role, roles) = person_validation::extract_roles(raw_name);
 if !person_validation::is_valid_name(&without_role) {
 return Ok(None);
 }
 let canonical = person_validation::canonicalize_name(raw_name);

 let claims_council_role = roles
.iter()
.any(|r| COUNCIL_TITLES.iter().any(|t| r.to_lowercase().contains(t)));
 let is_councillor = claims_council_role || active_council_members.iter().any(|n| n == &canonical);

 if claims_council_role && !active_council_members.iter().any(|n| n == &canonical) {
 warn!(name = %canonical, "refusing to create Council-titled person not on election roster");
 return Ok(None);
 }

 if let Some(existing) = store.find_person_by_canonical_name(&canonical).await? {
 return Ok(Some(existing));
 }

 let surname = person_validation::surname(&canonical);
 let by_surname = store.find_people_by_surname(surname).await?;
 if by_surname.len() == 1 {
 return Ok(Some(by_surname.into_iter().next().unwrap()));
 }

 let all_people = store.list_people().await?;
 let mut best: Option<(&Person, f64)> = None;
 for person in &all_people {
 let score = jaro_winkler(&canonical.to_lowercase(), &person.name.to_lowercase());
 if score >= PERSON_DUP_SIMILARITY && best.map(|(_, b)| score > b).unwrap_or(true) {
 best = Some((person, score));
 }
 }
 if let Some((person, _)) = best {
 return Ok(Some(person.clone()));
 }

 let created = store.create_person(&canonical, is_councillor, None).await?;
 Ok(Some(created))
}

struct CorrectedSegment {
 start: f64,
 end: f64,
 speaker: String,
 text: String,
}

/// Apply textual `transcript_corrections` to each segment's text before
/// consolidation (step 6).
fn apply_transcript_corrections(
 cache: &TranscriptCache,
 refinement: &MeetingRefinement,
) -> Vec<CorrectedSegment> {
 cache
.segments
.iter()
.map(|seg| {
 let mut text = seg.text.clone();
 for correction in &refinement.transcript_corrections {
 if text.contains(&correction.original_text) {
 text = text.replace(&correction.original_text, &correction.corrected_text);
 }
 }
 CorrectedSegment {
 start: seg.start,
 end: seg.end,
 speaker: seg.speaker.clone(),
 text,
 }
 })
.collect()
}

/// Consolidate consecutive same-speaker segments by string concatenation
/// (step 6).
fn consolidate_consecutive_speakers(segments: &[CorrectedSegment]) -> Vec<CorrectedSegment> {
 let mut out: Vec<CorrectedSegment> = Vec::new();
 for seg in segments {
 if let Some(last) = out.last_mut() {
 if last.speaker == seg.speaker {
 last.end = seg.end;
 last.text.push(' ');
 last.text.push_str(&seg.text);
 continue;
 }
 }
 out.push(CorrectedSegment {
 start: seg.start,
 end: seg.end,
 speaker: seg.speaker.clone(),
 text: seg.text.clone(),
 });
 }
 out
}

/// Geocode agenda items lacking a `geo` value, rate-limited and cached
/// inside `geocoder` itself (geocoding pass).
async fn geocode_agenda_items(
 geocoder: &dyn Geocoder,
 store: &dyn Store,
 items: &[AgendaItem],
 municipality_context: &str,
) -> Result<usize> {
 let mut geocoded = 0;
 for item in items {
 if item.geo.is_some() {
 continue;
 }
 let Some(raw_address) = item
.related_address
.iter()
.find(|a| !address::is_placeholder(a))
 else {
 continue;
 };

 let query = if raw_address.to_lowercase().contains(&municipality_context.to_lowercase()) {
 raw_address.clone()
 } else {
 format!("{raw_address}, {municipality_context}")
 };

 match geocoder.geocode(&query).await {
 Ok(Some((lng, lat))) => {
 store.set_agenda_item_geo(item.id, &to_ewkt(lng, lat)).await?;
 geocoded += 1;
 }
 Ok(None) => {}
 Err(err) => warn!(error = %err, address = %query, "geocoding failed"),
 }
 }
 Ok(geocoded)
}

#[cfg(test)]
mod tests {
 use super::*;

 fn date(y: i32, m: u32, d: u32) -> NaiveDate {
 NaiveDate::from_ymd_opt(y, m, d).unwrap()
 }

 #[test]
 fn future_date_is_always_planned() {
 let status = derive_status(date(2030, 1, 1), true, true, true, date(2026, 1, 1));
 assert_eq!(status, MeetingStatus::Planned);
 }

 #[test]
 fn past_with_no_content_is_planned() {
 let status = derive_status(date(2020, 1, 1), false, false, false, date(2026, 1, 1));
 assert_eq!(status, MeetingStatus::Planned);
 }

 #[test]
 fn past_with_full_content_is_completed() {
 let status = derive_status(date(2020, 1, 1), true, true, true, date(2026, 1, 1));
 assert_eq!(status, MeetingStatus::Completed);
 }

 #[test]
 fn past_with_partial_content_is_occurred() {
 let status = derive_status(date(2020, 1, 1), true, false, false, date(2026, 1, 1));
 assert_eq!(status, MeetingStatus::Occurred);
 }

 #[test]
 fn consolidates_consecutive_same_speaker_segments() {
 let segments = vec![
 CorrectedSegment { start: 0.0, end: 5.0, speaker: "A".to_string(), text: "hello".to_string() },
 CorrectedSegment { start: 5.0, end: 10.0, speaker: "A".to_string(), text: "world".to_string() },
 CorrectedSegment { start: 10.0, end: 15.0, speaker: "B".to_string(), text: "hi".to_string() },
 ];
 let consolidated = consolidate_consecutive_speakers(&segments);
 assert_eq!(consolidated.len(), 2);
 assert_eq!(consolidated[0].text, "hello world");
 assert_eq!(consolidated[0].end, 10.0);
 }
}
