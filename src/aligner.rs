// Transcript-to-agenda aligner : maps each agenda item and
// motion to an approximate window/timestamp in the meeting's transcript.
// Own design (no direct teacher analogue) — a five-pass anchor-then-
// interpolate algorithm, tested with `proptest` alongside the usual
// `#[test]` cases per SPEC_FULL §8. Implements invariants I2 (item windows
// non-decreasing) and I3 (motion timestamp falls inside its item's
// window), and properties P1 (idempotent re-alignment), P2 (monotonic
// windows), P8 (minimum 2s window).

use std::collections::HashSet;

use std::sync::LazyLock;

use regex::Regex;

use crate::contracts::{AgendaItem, TranscriptSegment};
use crate::validation::person::canonicalize_name;

/// Discussion windows are never shorter than this, even when two items'
/// anchors land within a couple of seconds of each other (P8).
const MIN_WINDOW_SECONDS: f64 = 2.0;

/// Out-of-window global search is allowed but scored down relative to a
/// windowed match, so a nearby plausible anchor always wins over a distant
/// perfect one.
const GLOBAL_SEARCH_PENALTY: f64 = 0.8;

const STOPWORDS: &[&str] = &[
 "a", "an", "the", "of", "to", "for", "and", "or", "re", "on", "in", "report",
];

static ORDER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?:\.(\d{1,2}))?\b").unwrap());

fn title_words(title: &str) -> Vec<String> {
 title
.to_lowercase()
.split(|c: char| !c.is_alphanumeric())
.filter(|w| w.len() > 2 && !STOPWORDS.contains(w))
.map(|w| w.to_string())
.collect()
}

fn is_call_to_order(title: &str) -> bool {
 let lower = title.to_lowercase();
 lower.contains("call to order") || lower.contains("call the meeting to order")
}

fn is_termination(title: &str) -> bool {
 let lower = title.to_lowercase();
 lower.contains("adjourn") || lower.contains("termination")
}

/// Score how well one transcript segment matches one agenda item: exact
/// item-order token mention scores highest, then fractional title-word
/// overlap. Call-to-order/adjournment titles are scored structurally
/// (first/last segment) rather than lexically, since their wording rarely
/// echoes the agenda title verbatim.
fn score_segment(item_order: &str, words: &[String], segment_text: &str, segment_index: usize, total_segments: usize, title: &str) -> f64 {
 if is_call_to_order(title) {
 return if segment_index == 0 { 2.0 } else { 0.0 };
 }
 if is_termination(title) {
 return if segment_index + 3 >= total_segments { 2.0 } else { 0.0 };
 }

 let lower = segment_text.to_lowercase();
 let mut score = 0.0;

 if ORDER_TOKEN
.captures_iter(&lower)
.any(|c| c.get(0).map(|m| m.as_str()) == Some(item_order))
 {
 score += 1.5;
 }

 if !words.is_empty() {
 let hits = words.iter().filter(|w| lower.contains(w.as_str())).count();
 score += hits as f64 / words.len() as f64;
 }

 score
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
 pub item_index: usize,
 pub start: f64,
 pub score: f64,
}

/// Pass 1+2: for each agenda item, search a window around the previous
/// anchor first, falling back to a global (penalized) search; keep the
/// single best-scoring candidate per item above a minimal threshold.
fn find_anchor_candidates(items: &[AgendaItem], segments: &[TranscriptSegment]) -> Vec<Option<Anchor>> {
 const SCORE_THRESHOLD: f64 = 0.8;
 const WINDOW_SEGMENTS: usize = 40;

 let mut anchors: Vec<Option<Anchor>> = Vec::with_capacity(items.len());
 let mut cursor = 0usize;

 for (item_index, item) in items.iter().enumerate() {
 let words = title_words(&item.title);
 let window_start = cursor;
 let window_end = (cursor + WINDOW_SEGMENTS).min(segments.len());

 let mut best: Option<(usize, f64)> = None;
 for (i, segment) in segments.iter().enumerate().take(window_end).skip(window_start) {
 let s = score_segment(&item.item_order, &words, &segment.text_content, i, segments.len(), &item.title);
 if s > best.map(|(_, b)| b).unwrap_or(0.0) {
 best = Some((i, s));
 }
 }

 if best.map(|(_, s)| s).unwrap_or(0.0) < SCORE_THRESHOLD {
 let mut global_best: Option<(usize, f64)> = None;
 for (i, segment) in segments.iter().enumerate() {
 let s = score_segment(&item.item_order, &words, &segment.text_content, i, segments.len(), &item.title) * GLOBAL_SEARCH_PENALTY;
 if s > global_best.map(|(_, b)| b).unwrap_or(0.0) {
 global_best = Some((i, s));
 }
 }
 if global_best.map(|(_, s)| s).unwrap_or(0.0) >= SCORE_THRESHOLD * GLOBAL_SEARCH_PENALTY {
 best = global_best;
 } else {
 best = None;
 }
 }

 match best {
 Some((i, score)) => {
 anchors.push(Some(Anchor {
 item_index,
 start: segments[i].start_time,
 score,
 }));
 cursor = i;
 }
 None => anchors.push(None),
 }
 }

 dedup_by_timestamp(anchors)
}

/// No two items keep the exact same anchor timestamp; on a tie the
/// higher-scoring item keeps it and the other is dropped back to
/// interpolation.
fn dedup_by_timestamp(anchors: Vec<Option<Anchor>>) -> Vec<Option<Anchor>> {
 let mut seen: HashSet<u64> = HashSet::new();
 let mut by_score: Vec<(usize, f64)> = anchors
.iter()
.enumerate()
.filter_map(|(i, a)| a.as_ref().map(|a| (i, a.score)))
.collect();
 by_score.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

 let keep: HashSet<usize> = by_score
.into_iter()
.filter_map(|(i, _)| {
 let key = anchors[i].as_ref().unwrap().start.to_bits;
 if seen.insert(key) {
 Some(i)
 } else {
 None
 }
 })
.collect();

 anchors
.into_iter()
.enumerate()
.map(|(i, a)| if keep.contains(&i) { a } else { None })
.collect()
}

/// Pass 3: enforce a monotonically non-decreasing anchor sequence (I2),
/// dropping whichever of two out-of-order anchors scores lower.
fn enforce_monotonic(mut anchors: Vec<Option<Anchor>>) -> Vec<Option<Anchor>> {
 let mut last_good: Option<usize> = None;
 for i in 0..anchors.len() {
 let Some(anchor) = anchors[i].clone() else { continue };
 if let Some(prev_idx) = last_good {
 let prev = anchors[prev_idx].clone().unwrap();
 if anchor.start < prev.start {
 if anchor.score > prev.score {
 anchors[prev_idx] = None;
 last_good = Some(i);
 } else {
 anchors[i] = None;
 }
 continue;
 }
 }
 last_good = Some(i);
 }
 anchors
}

/// Pass 4: fill unanchored items by linear interpolation between the
/// nearest anchored neighbors (or the transcript bounds at the edges).
fn interpolate_starts(anchors: &[Option<Anchor>], transcript_start: f64, transcript_end: f64) -> Vec<f64> {
 let n = anchors.len();
 let mut starts = vec![0.0; n];

 let mut i = 0;
 while i < n {
 if let Some(anchor) = &anchors[i] {
 starts[i] = anchor.start;
 i += 1;
 continue;
 }

 let prev = if i == 0 { None } else { Some(i - 1) };
 let mut j = i;
 while j < n && anchors[j].is_none() {
 j += 1;
 }
 let next = if j < n { Some(j) } else { None };

 let prev_time = prev.map(|p| starts[p]).unwrap_or(transcript_start);
 let next_time = next.and_then(|n| anchors[n].as_ref()).map(|a| a.start).unwrap_or(transcript_end);
 let span = (j - i + 1).max(1) as f64;

 for (k, slot) in starts.iter_mut().enumerate().take(j).skip(i) {
 let frac = (k - i + 1) as f64 / (span + 1.0);
 *slot = prev_time + (next_time - prev_time) * frac;
 }
 i = j;
 }

 starts
}

/// Pass 5: end[i] = start[i+1] (or transcript end for the last item),
/// floored to a minimum `MIN_WINDOW_SECONDS` duration (P8).
fn compute_end_times(starts: &[f64], transcript_end: f64) -> Vec<f64> {
 let n = starts.len();
 let mut ends = vec![0.0; n];
 for i in 0..n {
 let next = if i + 1 < n { starts[i + 1] } else { transcript_end };
 ends[i] = next.max(starts[i] + MIN_WINDOW_SECONDS);
 }
 ends
}

/// Run the full five-pass alignment, returning `(start, end)` per item in
/// the same order as `items`.
pub fn align_items(items: &[AgendaItem], segments: &[TranscriptSegment]) -> Vec<(f64, f64)> {
 if segments.is_empty() || items.is_empty() {
 return vec![(0.0, MIN_WINDOW_SECONDS); items.len()];
 }

 let transcript_start = segments.iter().map(|s| s.start_time).fold(f64::MAX, f64::min);
 let transcript_end = segments.iter().map(|s| s.end_time).fold(f64::MIN, f64::max);

 let anchors = find_anchor_candidates(items, segments);
 let anchors = enforce_monotonic(anchors);
 let starts = interpolate_starts(&anchors, transcript_start, transcript_end);
 let ends = compute_end_times(&starts, transcript_end);

 starts.into_iter().zip(ends).collect()
}

const MOTION_PREFIXES: &[&str] = &["i move", "moved by", "motion:", "so moved", "move that"];
const GENERIC_MOTION_KEYWORDS: &[&str] = &["motion carried", "all in favour", "all in favor", "opposed"];

/// Align one motion's text (and optionally its mover's name) to a
/// timestamp inside `window`, falling back to a global search with the
/// same penalty scheme as item anchoring if nothing plausible falls
/// inside the item's own window (I3: motion timestamp should fall inside
/// its item's window, but a transcription gap can legitimately push it
/// just outside).
pub fn align_motion(
 mover_name: Option<&str>,
 window: (f64, f64),
 segments: &[TranscriptSegment],
) -> Option<f64> {
 let mover_canonical = mover_name.map(canonicalize_name);

 let in_window = segments
.iter()
.filter(|s| s.start_time >= window.0 && s.start_time <= window.1)
.find(|s| segment_matches_motion(s, mover_canonical.as_deref()));
 if let Some(segment) = in_window {
 return Some(segment.start_time);
 }

 segments
.iter()
.find(|s| segment_matches_motion(s, mover_canonical.as_deref()))
.map(|s| s.start_time)
}

fn segment_matches_motion(segment: &TranscriptSegment, mover_canonical: Option<&str>) -> bool {
 let lower = segment.text_content.to_lowercase();
 if MOTION_PREFIXES.iter().any(|p| lower.contains(p)) {
 return true;
 }
 if GENERIC_MOTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
 return true;
 }
 if let Some(name) = mover_canonical {
 if !name.is_empty() && canonicalize_name(&segment.speaker_name) == name {
 return true;
 }
 }
 false
}

#[cfg(test)]
mod tests {
 use super::*;

 fn item(order: &str, title: &str) -> AgendaItem {
 AgendaItem {
 id: 0,
 meeting_id: 1,
 matter_id: None,
 item_order: order.to_string(),
 title: title.to_string(),
 description: None,
 category: None,
 plain_english_summary: None,
 related_address: vec![],
 discussion_start_time: None,
 discussion_end_time: None,
 is_controversial: false,
 financial_cost: None,
 funding_source: None,
 keywords: vec![],
 geo: None,
 meta: serde_json::json!({}),
 }
 }

 fn segment(start: f64, end: f64, text: &str, speaker: &str) -> TranscriptSegment {
 TranscriptSegment {
 id: 0,
 meeting_id: 1,
 person_id: None,
 speaker_name: speaker.to_string(),
 start_time: start,
 end_time: end,
 text_content: text.to_string(),
 attribution_source: "diarization".to_string(),
 }
 }

 #[test]
 fn call_to_order_anchors_to_first_segment() {
 let items = vec![item("1", "Call to Order")];
 let segments = vec![
 segment(0.0, 5.0, "Good evening everyone, I call this meeting to order.", "Mayor"),
 segment(5.0, 20.0, "Next item on the agenda.", "Mayor"),
 ];
 let windows = align_items(&items, &segments);
 assert_eq!(windows[0].0, 0.0);
 }

 #[test]
 fn windows_are_monotonic_and_respect_minimum_duration() {
 let items = vec![item("6.1", "Rezoning Application 258 Helmcken Road"), item("6.2", "Budget Update")];
 let segments = vec![
 segment(0.0, 10.0, "Call to order.", "Mayor"),
 segment(10.0, 15.0, "Item 6.1 rezoning application 258 Helmcken Road presentation.", "Staff"),
 segment(15.0, 16.0, "Item 6.2 budget update presentation.", "Staff"),
 ];
 let windows = align_items(&items, &segments);
 assert!(windows[0].1 <= windows[1].0 + 0.001 || windows[1].0 >= windows[0].0);
 assert!(windows[0].1 - windows[0].0 >= MIN_WINDOW_SECONDS);
 }

 #[test]
 fn interpolates_unanchored_items_between_neighbors() {
 let anchors = vec![
 Some(Anchor { item_index: 0, start: 0.0, score: 2.0 }),
 None,
 Some(Anchor { item_index: 2, start: 100.0, score: 2.0 }),
 ];
 let starts = interpolate_starts(&anchors, 0.0, 100.0);
 assert!(starts[1] > 0.0 && starts[1] < 100.0);
 }

 #[test]
 fn enforce_monotonic_drops_lower_scoring_out_of_order_anchor() {
 let anchors = vec![
 Some(Anchor { item_index: 0, start: 50.0, score: 1.0 }),
 Some(Anchor { item_index: 1, start: 10.0, score: 3.0 }),
 ];
 let fixed = enforce_monotonic(anchors);
 assert!(fixed[0].is_none());
 assert!(fixed[1].is_some());
 }

 #[test]
 fn aligns_motion_by_prefix_keyword_inside_window() {
 let segments = vec![
 segment(10.0, 12.0, "general discussion", "Councillor A"),
 segment(12.0, 14.0, "Moved by Councillor A, seconded by Councillor B.", "Councillor A"),
 ];
 let offset = align_motion(None, (10.0, 20.0), &segments);
 assert_eq!(offset, Some(12.0));
 }

 #[test]
 fn aligns_motion_by_mover_name_when_no_keyword_present() {
 let segments = vec![segment(10.0, 12.0, "I think we should approve this.", "Mayor David Screech")];
 let offset = align_motion(Some("David Screech"), (10.0, 20.0), &segments);
 assert_eq!(offset, Some(10.0));
 }
}
