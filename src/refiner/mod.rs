// Meeting refiner driver. Wires one or more structured-output
// LLM calls through the repair layer to produce a `MeetingRefinement`.
// Grounded on `contracts::Llm::generate_structured`'s schema-constrained
// generation shape; retried through `error::with_retry` the way // requires for `TransientRemote`/`LlmStructuralError`.

pub mod repair;
pub mod schema;

use anyhow::Result;
use tracing::instrument;

use crate::contracts::Llm;
use crate::error::PipelineError;
use schema::{MeetingRefinement, RefinementInputs};

const MAP_REDUCE_TRANSCRIPT_THRESHOLD: usize = 20_000;
const CHUNK_SIZE: usize = 15_000;
const CHUNK_OVERLAP: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMode {
 AgendaOnly,
 Standard,
 MapReduce,
}

/// Pick the refinement mode for one meeting ("Modes:"). Map-reduce
/// only applies to a local provider facing an oversized transcript; a
/// hosted provider with the same transcript just runs standard mode in one
/// call.
pub fn select_mode(inputs: &RefinementInputs<'_>, is_local_provider: bool) -> RefineMode {
 if inputs.minutes_text.trim().is_empty() && inputs.transcript_text.trim().is_empty() {
 return RefineMode::AgendaOnly;
 }
 if is_local_provider && inputs.transcript_text.len() > MAP_REDUCE_TRANSCRIPT_THRESHOLD {
 return RefineMode::MapReduce;
 }
 RefineMode::Standard
}

#[instrument(skip(llm, inputs))]
pub async fn refine_meeting(
 llm: &dyn Llm,
 inputs: RefinementInputs<'_>,
 is_local_provider: bool,
) -> Result<MeetingRefinement> {
 match select_mode(&inputs, is_local_provider) {
 RefineMode::AgendaOnly => refine_agenda_only(llm, &inputs).await,
 RefineMode::Standard => refine_standard(llm, &inputs).await,
 RefineMode::MapReduce => refine_map_reduce(llm, &inputs).await,
 }
}

/// No minutes, no transcript: ask only about the agenda, then force
/// `status="Planned"` and strip any timestamps/motions the model still
/// produced ("require empty timestamps/motions").
async fn refine_agenda_only(llm: &dyn Llm, inputs: &RefinementInputs<'_>) -> Result<MeetingRefinement> {
 let agenda_only = RefinementInputs {
 agenda_text: inputs.agenda_text,
 minutes_text: "",
 transcript_text: "",
 attendees_hint: inputs.attendees_hint,
 canonical_names_hint: inputs.canonical_names_hint,
 fingerprint_aliases: inputs.fingerprint_aliases,
 active_council_members: inputs.active_council_members,
 };
 let mut refinement = refine_standard(llm, &agenda_only).await?;
 refinement.status = "Planned".to_string();
 for item in &mut refinement.items {
 item.discussion_start_time = None;
 item.discussion_end_time = None;
 item.motions.clear;
 }
 Ok(refinement)
}

async fn refine_standard(llm: &dyn Llm, inputs: &RefinementInputs<'_>) -> Result<MeetingRefinement> {
 let prompt = build_prompt(inputs);
 let value = generate_with_retry(llm, &prompt).await?;
 let mut refinement = repair::repair_and_parse(value)?;
 refinement.attendees = repair::filter_non_canonical(refinement.attendees, inputs.canonical_names_hint);
 Ok(refinement)
}

/// Chunk the transcript by `CHUNK_SIZE` with `CHUNK_OVERLAP`, refine each
/// chunk independently against the shared agenda/minutes context, then
/// merge ("Map-reduce").
async fn refine_map_reduce(llm: &dyn Llm, inputs: &RefinementInputs<'_>) -> Result<MeetingRefinement> {
 let chunks = chunk_text(inputs.transcript_text, CHUNK_SIZE, CHUNK_OVERLAP);
 let mut results = Vec::with_capacity(chunks.len());
 for chunk in &chunks {
 let chunk_inputs = RefinementInputs {
 agenda_text: inputs.agenda_text,
 minutes_text: inputs.minutes_text,
 transcript_text: chunk,
 attendees_hint: inputs.attendees_hint,
 canonical_names_hint: inputs.canonical_names_hint,
 fingerprint_aliases: inputs.fingerprint_aliases,
 active_council_members: inputs.active_council_members,
 };
 results.push(refine_standard(llm, &chunk_inputs).await?);
 }
 Ok(merge_chunk_refinements(results))
}

/// Split `text` into overlapping windows of at most `chunk_size` chars,
/// each starting `chunk_size - overlap` chars after the previous one.
fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
 let chars: Vec<char> = text.chars().collect();
 if chars.len() <= chunk_size {
 return vec![text.to_string()];
 }
 let stride = chunk_size.saturating_sub(overlap).max(1);
 let mut chunks = Vec::new();
 let mut start = 0;
 while start < chars.len() {
 let end = (start + chunk_size).min(chars.len());
 chunks.push(chars[start..end].iter().collect());
 if end == chars.len() {
 break;
 }
 start += stride;
 }
 chunks
}

fn merge_chunk_refinements(chunks: Vec<MeetingRefinement>) -> MeetingRefinement {
 let mut merged = MeetingRefinement::default();
 let mut attendees_seen = std::collections::HashSet::new();
 let mut alias_seen = std::collections::HashSet::new();
 let mut correction_seen = std::collections::HashSet::new();
 let mut item_index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

 for (i, chunk) in chunks.into_iter().enumerate() {
 if i == 0 {
 merged.summary = chunk.summary.clone();
 merged.meeting_type = chunk.meeting_type.clone();
 merged.status = chunk.status.clone();
 merged.chair_person_name = chunk.chair_person_name.clone();
 }
 for attendee in chunk.attendees {
 if attendees_seen.insert(attendee.clone()) {
 merged.attendees.push(attendee);
 }
 }
 for alias in chunk.speaker_aliases {
 if alias_seen.insert(alias.label.clone()) {
 merged.speaker_aliases.push(alias);
 }
 }
 for correction in chunk.transcript_corrections {
 if correction_seen.insert(correction.original_text.clone()) {
 merged.transcript_corrections.push(correction);
 }
 }
 for item in chunk.items {
 match item_index.get(&item.title) {
 Some(&index) => merge_item_into(&mut merged.items[index], item),
 None => {
 item_index.insert(item.title.clone(), merged.items.len());
 merged.items.push(item);
 }
 }
 }
 }
 merged
}

fn merge_item_into(existing: &mut schema::AgendaItemRecord, incoming: schema::AgendaItemRecord) {
 existing.debate_summary = match (existing.debate_summary.take(), incoming.debate_summary) {
 (Some(a), Some(b)) => Some(format!("{a} {b}")),
 (Some(a), None) => Some(a),
 (None, Some(b)) => Some(b),
 (None, None) => None,
 };
 existing.key_quotes.extend(incoming.key_quotes);
 existing.motions.extend(incoming.motions);
 existing.discussion_start_time = min_option(existing.discussion_start_time, incoming.discussion_start_time);
 existing.discussion_end_time = max_option(existing.discussion_end_time, incoming.discussion_end_time);
}

fn min_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
 match (a, b) {
 (Some(a), Some(b)) => Some(a.min(b)),
 (Some(a), None) => Some(a),
 (None, Some(b)) => Some(b),
 (None, None) => None,
 }
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
 match (a, b) {
 (Some(a), Some(b)) => Some(a.max(b)),
 (Some(a), None) => Some(a),
 (None, Some(b)) => Some(b),
 (None, None) => None,
 }
}

fn build_prompt(inputs: &RefinementInputs<'_>) -> String {
 format!(
 "{}\n\nAGENDA:\n{}\n\nMINUTES:\n{}\n\nTRANSCRIPT:\n{}\n\nATTENDEES HINT: {}\nCANONICAL NAMES: {}\nFINGERPRINT ALIASES: {}\nACTIVE COUNCIL MEMBERS: {}",
 schema::REFINEMENT_PROMPT,
 inputs.agenda_text,
 inputs.minutes_text,
 inputs.transcript_text,
 inputs.attendees_hint.join(", "),
 inputs.canonical_names_hint.join(", "),
 inputs.fingerprint_aliases.join(", "),
 inputs.active_council_members.join(", "),
 )
}

async fn generate_with_retry(llm: &dyn Llm, prompt: &str) -> Result<serde_json::Value> {
 let schema = schema::refinement_schema;
 crate::error::with_retry("refiner", || call_llm(llm, prompt, &schema))
.await
.map_err(|e| anyhow::anyhow!(e))
}

async fn call_llm(llm: &dyn Llm, prompt: &str, schema: &serde_json::Value) -> Result<serde_json::Value, PipelineError> {
 llm.generate_structured(prompt, schema, None)
.await
.map_err(|err| match err.downcast::<PipelineError> {
 Ok(pipeline_error) => pipeline_error,
 Err(other) => PipelineError::fatal("llm", other.to_string()),
 })
}

#[cfg(test)]
mod tests {
 use super::*;

 fn inputs<'a>(agenda: &'a str, minutes: &'a str, transcript: &'a str) -> RefinementInputs<'a> {
 RefinementInputs {
 agenda_text: agenda,
 minutes_text: minutes,
 transcript_text: transcript,
 attendees_hint: &[],
 canonical_names_hint: &[],
 fingerprint_aliases: &[],
 active_council_members: &[],
 }
 }

 #[test]
 fn agenda_only_when_no_minutes_or_transcript() {
 let inputs = inputs("agenda text", "", "");
 assert_eq!(select_mode(&inputs, false), RefineMode::AgendaOnly);
 }

 #[test]
 fn standard_when_hosted_provider_regardless_of_size() {
 let big_transcript = "x".repeat(30_000);
 let inputs = inputs("agenda", "minutes", &big_transcript);
 assert_eq!(select_mode(&inputs, false), RefineMode::Standard);
 }

 #[test]
 fn map_reduce_when_local_provider_and_oversized_transcript() {
 let big_transcript = "x".repeat(30_000);
 let inputs = inputs("agenda", "minutes", &big_transcript);
 assert_eq!(select_mode(&inputs, true), RefineMode::MapReduce);
 }

 #[test]
 fn chunk_text_overlaps_windows() {
 let text = "a".repeat(20_000);
 let chunks = chunk_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
 assert!(chunks.len() >= 2);
 assert!(chunks[0].len() <= CHUNK_SIZE);
 }

 #[test]
 fn merges_items_by_title_across_chunks() {
 let mut a = schema::MeetingRefinement::default();
 a.items.push(schema::AgendaItemRecord {
 item_order: "1.1".to_string(),
 title: "Zoning Bylaw".to_string(),
 debate_summary: Some("Part one.".to_string()),
 discussion_start_time: Some(10.0),
 discussion_end_time: Some(50.0),
..Default::default()
 });
 let mut b = schema::MeetingRefinement::default();
 b.items.push(schema::AgendaItemRecord {
 item_order: "1.1".to_string(),
 title: "Zoning Bylaw".to_string(),
 debate_summary: Some("Part two.".to_string()),
 discussion_start_time: Some(40.0),
 discussion_end_time: Some(90.0),
..Default::default()
 });

 let merged = merge_chunk_refinements(vec![a, b]);
 assert_eq!(merged.items.len(), 1);
 assert_eq!(merged.items[0].debate_summary.as_deref(), Some("Part one. Part two."));
 assert_eq!(merged.items[0].discussion_start_time, Some(10.0));
 assert_eq!(merged.items[0].discussion_end_time, Some(90.0));
 }
}
