// The on-disk transcript JSON format ("Transcript JSON (final
// form)"), plus the raw STT cache and the diarizer's own persisted cache
// file. These are plain serde structs, not validated newtypes — they are
// the wire format this crate reads/writes to a cache file, not rows that
// flow through the store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegmentRecord {
 pub start: f64,
 pub end: f64,
 pub text: String,
 pub speaker: String,
 pub speaker_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSample {
 pub start: f64,
 pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintMatchRecord {
 pub person_id: i64,
 pub person_name: String,
 pub similarity: f32,
 pub fingerprint_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerAliasRecord {
 pub label: String,
 pub name: String,
 pub person_id: Option<i64>,
 pub confidence: f32,
 pub source: String,
}

/// The full persisted diarization cache. The new-format header
/// (`speaker_centroids` present) is what `rediarize` checks for before
/// trusting a cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptCache {
 pub segments: Vec<TranscriptSegmentRecord>,
 pub speaker_centroids: HashMap<String, Vec<f32>>,
 pub speaker_samples: HashMap<String, SpeakerSample>,
 pub speaker_mapping: HashMap<String, String>,
 pub speaker_aliases: Vec<SpeakerAliasRecord>,
 pub fingerprint_matches: HashMap<String, FingerprintMatchRecord>,
}

impl TranscriptCache {
 /// New-format cache detection: old caches never carried
 /// `speaker_centroids`.
 pub fn is_new_format(raw: &serde_json::Value) -> bool {
 raw.get("speaker_centroids").is_some()
 }
}

/// Raw STT cache: `[{start,end,text}]` alongside the audio file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSttSegment {
 pub start: f64,
 pub end: f64,
 pub text: String,
}
