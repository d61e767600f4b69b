// Meeting Refinement wire schema. Grounded on
// `contracts::Llm::generate_structured`'s schema-constrained generation;
// the raw/typed split mirrors design note "prefer typed records with
// `Option<T>` fields over any maps; the repair stage produces the typed
// record."

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingRefinement {
 #[serde(default)]
 pub scratchpad_speaker_map: String,
 #[serde(default)]
 pub scratchpad_timeline: String,
 #[serde(default)]
 pub summary: String,
 #[serde(default)]
 pub meeting_type: String,
 #[serde(default)]
 pub status: String,
 #[serde(default)]
 pub chair_person_name: Option<String>,
 #[serde(default)]
 pub attendees: Vec<String>,
 #[serde(default)]
 pub speaker_aliases: Vec<SpeakerAlias>,
 #[serde(default)]
 pub transcript_corrections: Vec<TranscriptCorrection>,
 #[serde(default)]
 pub items: Vec<AgendaItemRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerAlias {
 pub label: String,
 pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptCorrection {
 pub original_text: String,
 pub corrected_text: String,
 #[serde(default)]
 pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaItemRecord {
 pub item_order: String,
 pub title: String,
 #[serde(default)]
 pub matter_identifier: Option<String>,
 #[serde(default)]
 pub matter_title: Option<String>,
 #[serde(default)]
 pub plain_english_summary: Option<String>,
 #[serde(default)]
 pub related_address: Vec<String>,
 #[serde(default)]
 pub description: Option<String>,
 #[serde(default)]
 pub category: String,
 #[serde(default)]
 pub tags: Vec<String>,
 #[serde(default)]
 pub financial_cost: Option<f64>,
 #[serde(default)]
 pub funding_source: Option<String>,
 #[serde(default)]
 pub is_controversial: bool,
 #[serde(default)]
 pub debate_summary: Option<String>,
 #[serde(default)]
 pub key_quotes: Vec<KeyQuote>,
 #[serde(default)]
 pub key_statements: Vec<KeyStatementRecord>,
 #[serde(default)]
 pub discussion_start_time: Option<f64>,
 #[serde(default)]
 pub discussion_end_time: Option<f64>,
 #[serde(default)]
 pub motions: Vec<MotionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyQuote {
 pub text: String,
 #[serde(default)]
 pub speaker: Option<String>,
 #[serde(default)]
 pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStatementRecord {
 pub statement_text: String,
 #[serde(default)]
 pub speaker: Option<String>,
 #[serde(default)]
 pub statement_type: String,
 #[serde(default)]
 pub context: Option<String>,
 #[serde(default)]
 pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionRecord {
 pub motion_text: String,
 #[serde(default)]
 pub plain_english_summary: Option<String>,
 #[serde(default)]
 pub disposition: Option<String>,
 #[serde(default)]
 pub mover: Option<String>,
 #[serde(default)]
 pub seconder: Option<String>,
 #[serde(default)]
 pub result: String,
 #[serde(default)]
 pub timestamp: Option<f64>,
 #[serde(default)]
 pub end_timestamp: Option<f64>,
 #[serde(default)]
 pub votes: Vec<VoteRecord>,
 #[serde(default)]
 pub financial_cost: Option<f64>,
 #[serde(default)]
 pub funding_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
 pub person_name: String,
 pub vote: String,
 #[serde(default)]
 pub reason: Option<String>,
}

/// Inputs passed to one refinement call ("Inputs:").
pub struct RefinementInputs<'a> {
 pub agenda_text: &'a str,
 pub minutes_text: &'a str,
 pub transcript_text: &'a str,
 pub attendees_hint: &'a [String],
 pub canonical_names_hint: &'a [String],
 pub fingerprint_aliases: &'a [String],
 pub active_council_members: &'a [String],
}

pub fn refinement_schema() -> Value {
 json!({
 "type": "object",
 "properties": {
 "scratchpad_speaker_map": {"type": "string"},
 "scratchpad_timeline": {"type": "string"},
 "summary": {"type": "string"},
 "meeting_type": {"type": "string"},
 "status": {"type": "string"},
 "chair_person_name": {"type": "string"},
 "attendees": {"type": "array", "items": {"type": "string"}},
 "speaker_aliases": {
 "type": "array",
 "items": {"type": "object", "properties": {"label": {"type": "string"}, "name": {"type": "string"}}}
 },
 "transcript_corrections": {"type": "array"},
 "items": {"type": "array"}
 },
 "required": ["summary", "meeting_type", "status", "items"]
 })
}

pub const REFINEMENT_PROMPT: &str = "You are refining a civic meeting record. Given the agenda, minutes, and transcript, produce a MeetingRefinement object per the schema: summary, meeting_type, status, chair_person_name, attendees, speaker_aliases, transcript_corrections, and items (each with motions and votes).";
