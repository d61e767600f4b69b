// Repair layer for lenient LLM providers ("Repair layer",
// design note "Dynamic JSON from lenient LLMs"): rename common-miss keys,
// coerce timestamp strings, normalize vote strings, drop non-canonical
// attendees/voters, default missing top-level keys, and recover
// scratchpad fallbacks. Grounded on `validation::person`'s
// regex-normalization style, generalized from name strings to whole JSON
// values.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::schema::{MeetingRefinement, SpeakerAlias};
use crate::validation::person::canonicalize_name;

/// Common-miss key renames observed across lenient providers.
const KEY_RENAMES: &[(&str, &str)] = &[
 ("aliases", "speaker_aliases"),
 ("original", "original_text"),
 ("corrected", "corrected_text"),
 ("councillor", "person_name"),
 ("councilor", "person_name"),
 ("speaker_label", "label"),
 ("alias", "label"),
 ("speaker_id", "label"),
];

const VOTE_YES: &[&str] = &["yes", "aye", "in favor", "in favour", "for"];
const VOTE_NO: &[&str] = &["no", "nay", "opposed", "against"];
const VOTE_ABSTAIN: &[&str] = &["abstain", "abstained", "abstention"];
const VOTE_RECUSED: &[&str] = &["recused", "recusal", "conflict"];

static HMS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})$").unwrap());
static MS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+):(\d{2})$").unwrap());

/// Recursively rename known-miss keys and coerce timestamp-like string
/// values to numbers, in place.
pub fn rename_and_coerce(value: &mut Value) {
 match value {
 Value::Object(map) => {
 let renamed = rename_keys(map);
 *map = renamed;
 for (key, child) in map.iter_mut() {
 if key.ends_with("timestamp") || key.ends_with("_time") {
 if let Some(coerced) = coerce_timestamp(child) {
 *child = coerced;
 }
 }
 if key == "vote" {
 if let Some(s) = child.as_str() {
 *child = Value::String(normalize_vote(s));
 }
 }
 rename_and_coerce(child);
 }
 }
 Value::Array(items) => {
 for item in items {
 rename_and_coerce(item);
 }
 }
 _ => {}
 }
}

fn rename_keys(map: &Map<String, Value>) -> Map<String, Value> {
 let mut out = Map::with_capacity(map.len());
 for (key, value) in map {
 let renamed = KEY_RENAMES
.iter()
.find(|(from, _)| *from == key)
.map(|(_, to)| (*to).to_string())
.unwrap_or_else(|| key.clone());
 out.insert(renamed, value.clone());
 }
 out
}

/// Coerce `"HH:MM:SS"`/`"MM:SS"` strings to a float seconds value.
fn coerce_timestamp(value: &Value) -> Option<Value> {
 let s = value.as_str()?;
 if let Some(caps) = HMS.captures(s) {
 let h: f64 = caps[1].parse().ok()?;
 let m: f64 = caps[2].parse().ok()?;
 let sec: f64 = caps[3].parse().ok()?;
 return Some(Value::from(h * 3600.0 + m * 60.0 + sec));
 }
 if let Some(caps) = MS.captures(s) {
 let m: f64 = caps[1].parse().ok()?;
 let sec: f64 = caps[2].parse().ok()?;
 return Some(Value::from(m * 60.0 + sec));
 }
 None
}

pub fn normalize_vote(raw: &str) -> String {
 let lower = raw.trim().to_lowercase();
 if VOTE_YES.contains(&lower.as_str()) {
 "Yes".to_string()
 } else if VOTE_NO.contains(&lower.as_str()) {
 "No".to_string()
 } else if VOTE_ABSTAIN.contains(&lower.as_str()) {
 "Abstain".to_string()
 } else if VOTE_RECUSED.contains(&lower.as_str()) {
 "Recused".to_string()
 } else {
 raw.to_string()
 }
}

/// Drop attendees/voters that claim a Council title but don't appear in
/// `canonical_names` ("drop attendees/voters claiming Council
/// titles who are not in CANONICAL_NAMES").
pub fn filter_non_canonical(names: Vec<String>, canonical_names: &[String]) -> Vec<String> {
 const COUNCIL_TITLES: &[&str] = &["mayor", "councillor", "councilor", "alderman", "director"];
 names
.into_iter()
.filter(|name| {
 let lower = name.to_lowercase();
 let claims_title = COUNCIL_TITLES.iter().any(|t| lower.contains(t));
 if !claims_title {
 return true;
 }
 let canonical = canonicalize_name(name);
 canonical_names.iter().any(|c| canonicalize_name(c) == canonical)
 })
.collect()
}

static SPEAKER_MAP_LINE: LazyLock<Regex> =
 LazyLock::new(|| Regex::new(r"(?i)(Speaker_[A-Za-z0-9]+)\s*(?:[:=]|is|->)\s*([^\n,;]+)").unwrap());

/// Parse `Speaker_NN: Name` patterns from the scratchpad monologue when
/// the model failed to populate `speaker_aliases` directly (/// "Scratchpad fallbacks").
pub fn parse_speaker_map_scratchpad(scratchpad: &str) -> Vec<SpeakerAlias> {
 SPEAKER_MAP_LINE
.captures_iter(scratchpad)
.map(|caps| SpeakerAlias {
 label: caps[1].to_string(),
 name: strip_role_titles(caps[2].trim()),
 })
.collect()
}

fn strip_role_titles(name: &str) -> String {
 crate::validation::person::canonicalize_name(name)
}

static TIMELINE_LINE: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)([\d.]+)\s*\.?\s*[^(\n]*\((\d{1,2}):(\d{2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2}):(\d{2})\)").unwrap()
});

/// Parse `X.Y... (HH:MM:SS-HH:MM:SS)` patterns from the timeline
/// scratchpad, keyed by item order string, when per-item timestamps are
/// absent.
pub fn parse_timeline_scratchpad(scratchpad: &str) -> HashMap<String, (f64, f64)> {
 let mut out = HashMap::new();
 for caps in TIMELINE_LINE.captures_iter(scratchpad) {
 let item_order = caps[1].to_string();
 let start = hms_to_seconds(&caps[2], &caps[3], &caps[4]);
 let end = hms_to_seconds(&caps[5], &caps[6], &caps[7]);
 out.insert(item_order, (start, end));
 }
 out
}

fn hms_to_seconds(h: &str, m: &str, s: &str) -> f64 {
 let h: f64 = h.parse().unwrap_or(0.0);
 let m: f64 = m.parse().unwrap_or(0.0);
 let s: f64 = s.parse().unwrap_or(0.0);
 h * 3600.0 + m * 60.0 + s
}

/// Apply the repair pass to a raw JSON value and attempt to decode it as
/// a `MeetingRefinement`, filling in scratchpad fallbacks where the
/// primary fields are empty.
pub fn repair_and_parse(mut raw: Value) -> anyhow::Result<MeetingRefinement> {
 if raw.get("items").is_none() {
 if let Value::Object(map) = &mut raw {
 map.insert("items".to_string(), Value::Array(Vec::new()));
 }
 }
 rename_and_coerce(&mut raw);

 let mut refinement: MeetingRefinement = serde_json::from_value(raw)
.map_err(|e| anyhow::anyhow!("meeting refinement did not match schema after repair: {e}"))?;

 if refinement.speaker_aliases.is_empty() && !refinement.scratchpad_speaker_map.is_empty() {
 refinement.speaker_aliases = parse_speaker_map_scratchpad(&refinement.scratchpad_speaker_map);
 }

 if !refinement.scratchpad_timeline.is_empty() {
 let timeline = parse_timeline_scratchpad(&refinement.scratchpad_timeline);
 for item in &mut refinement.items {
 if item.discussion_start_time.is_none() {
 if let Some((start, end)) = timeline.get(&item.item_order) {
 item.discussion_start_time = Some(*start);
 item.discussion_end_time = Some(*end);
 }
 }
 }
 }

 for item in &mut refinement.items {
 for statement in &mut item.key_statements {
 statement.statement_type =
 crate::types::StatementType::parse_lenient(&statement.statement_type)
.as_str()
.to_string();
 }
 }

 Ok(refinement)
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn normalizes_vote_synonyms() {
 assert_eq!(normalize_vote("AYE"), "Yes");
 assert_eq!(normalize_vote("NAY"), "No");
 assert_eq!(normalize_vote("IN FAVOR"), "Yes");
 assert_eq!(normalize_vote("OPPOSED"), "No");
 }

 #[test]
 fn renames_known_miss_keys() {
 let mut value = serde_json::json!({"aliases": [{"speaker_id": "Speaker_00", "alias": "X"}]});
 rename_and_coerce(&mut value);
 assert!(value.get("speaker_aliases").is_some());
 }

 #[test]
 fn coerces_hms_timestamp_strings() {
 let mut value = serde_json::json!({"timestamp": "01:02:03"});
 rename_and_coerce(&mut value);
 assert_eq!(value["timestamp"].as_f64(), Some(3723.0));
 }

 #[test]
 fn parses_speaker_map_scratchpad_with_various_separators() {
 let scratchpad = "Speaker_00 is Mayor Smith, Speaker_01: Jane Doe, Speaker_02 -> Bob Lee";
 let aliases = parse_speaker_map_scratchpad(scratchpad);
 assert_eq!(aliases.len(), 3);
 assert_eq!(aliases[0].label, "Speaker_00");
 }

 #[test]
 fn parses_timeline_scratchpad() {
 let scratchpad = "1.1 Opening remarks (00:00:12-00:05:30)";
 let timeline = parse_timeline_scratchpad(scratchpad);
 let (start, end) = timeline.get("1.1").unwrap();
 assert_eq!(*start, 12.0);
 assert_eq!(*end, 330.0);
 }

 #[test]
 fn filters_non_canonical_council_claims() {
 let canonical = vec!["David Screech".to_string()];
 let names = vec!["Mayor David Screech".to_string(), "Councillor Fake Person".to_string(), "Jane Public".to_string()];
 let filtered = filter_non_canonical(names, &canonical);
 assert!(filtered.iter().any(|n| n.contains("Screech")));
 assert!(!filtered.iter().any(|n| n.contains("Fake Person")));
 assert!(filtered.iter().any(|n| n == "Jane Public"));
 }
}
