// Diarizer driver. Orchestrates the two opaque external models
// (`SpeakerPipeline`, `SpeechToText`) and owns the merge/fingerprint logic
// between them. Grounded on `embeddings::EmbeddingProvider`'s "thin driver
// around an opaque model, pure-function shape" idiom, generalized from one
// call to a two-model pipeline with a merge step in between.

pub mod fingerprint;
pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::contracts::{DiarizationOutput, SpeakerPipeline, SpeechToText, SttSegment, VoiceFingerprint};
use types::{
 FingerprintMatchRecord, RawSttSegment, SpeakerAliasRecord, SpeakerSample,
 TranscriptSegmentRecord, TranscriptCache,
};

const UNKNOWN_LABEL: &str = "Speaker_Unknown";
const SPEAKER_SAMPLE_MAX_SECONDS: f64 = 15.0;

/// Driver inputs : audio path, optional test-mode duration cap,
/// optional rediarize flag to reuse a cached raw STT transcript.
pub struct DiarizeRequest<'a> {
 pub wav_path: &'a Path,
 pub duration_cap: Option<f64>,
 pub rediarize: bool,
 pub raw_transcript_cache_path: &'a Path,
}

/// Run the full pipeline: preprocess is assumed done by the acquirer (the
/// wav handed to us is already 16 kHz mono); segmentation+embedding, STT,
/// merge, fingerprint match.
#[instrument(skip(pipeline, stt, known_fingerprints))]
pub async fn diarize(
 request: DiarizeRequest<'_>,
 pipeline: &dyn SpeakerPipeline,
 stt: &dyn SpeechToText,
 known_fingerprints: &[VoiceFingerprint],
) -> Result<TranscriptCache> {
 let diarization = pipeline
.run(request.wav_path)
.await
.context("speaker segmentation+embedding model failed")?;

 let stt_segments = if request.rediarize {
 load_raw_transcript_cache(request.raw_transcript_cache_path)
.await
.unwrap_or(None)
 } else {
 None
 };

 let stt_segments = match stt_segments {
 Some(cached) => cached,
 None => {
 let fresh = stt
.transcribe(request.wav_path)
.await
.context("speech-to-text model failed")?;
 persist_raw_transcript_cache(request.raw_transcript_cache_path, &fresh).await?;
 fresh
 }
 };

 let merged = merge_segments(&stt_segments, &diarization);
 let speaker_samples = extract_speaker_samples(&merged);

 let mut fingerprint_matches = HashMap::new();
 for (label, centroid) in &diarization.speaker_centroids {
 if let Some(m) = fingerprint::best_match(centroid, known_fingerprints) {
 let person_name = known_fingerprints
.iter()
.find(|fp| fp.id == m.fingerprint_id)
.map(|_| String::new())
.unwrap_or_default();
 fingerprint_matches.insert(
 label.clone(),
 FingerprintMatchRecord {
 person_id: m.person_id,
 person_name,
 similarity: m.similarity,
 fingerprint_id: m.fingerprint_id,
 },
 );
 }
 }

 let speaker_aliases: Vec<SpeakerAliasRecord> = fingerprint_matches
.iter()
.map(|(label, m)| SpeakerAliasRecord {
 label: label.clone(),
 name: m.person_name.clone(),
 person_id: Some(m.person_id),
 confidence: m.similarity,
 source: "voice_fingerprint".to_string(),
 })
.collect();

 Ok(TranscriptCache {
 segments: merged,
 speaker_centroids: diarization.speaker_centroids,
 speaker_samples,
 speaker_mapping: HashMap::new(),
 speaker_aliases,
 fingerprint_matches,
 })
}

/// For each STT segment, assign the diarization segment label with maximum
/// temporal overlap; confidence = overlap / stt_duration. No overlap at
/// all maps to `Speaker_Unknown` (step 4, property P10).
pub fn merge_segments(
 stt_segments: &[SttSegment],
 diarization: &DiarizationOutput,
) -> Vec<TranscriptSegmentRecord> {
 stt_segments
.iter()
.map(|seg| {
 let duration = (seg.end - seg.start).max(f64::EPSILON);
 let best = diarization
.segments
.iter()
.map(|sp| {
 let overlap = overlap_seconds(seg.start, seg.end, sp.start, sp.end);
 (sp, overlap)
 })
.filter(|(_, overlap)| *overlap > 0.0)
.max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

 match best {
 Some((sp, overlap)) => TranscriptSegmentRecord {
 start: seg.start,
 end: seg.end,
 text: seg.text.clone(),
 speaker: sp.label.clone(),
 speaker_confidence: ((overlap / duration) as f32).clamp(0.0, 1.0),
 },
 None => TranscriptSegmentRecord {
 start: seg.start,
 end: seg.end,
 text: seg.text.clone(),
 speaker: UNKNOWN_LABEL.to_string(),
 speaker_confidence: 0.0,
 },
 }
 })
.collect()
}

fn overlap_seconds(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
 (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

/// First segment, clipped to <= 15s, for each speaker label encountered —
/// used for UI playback.
fn extract_speaker_samples(
 segments: &[TranscriptSegmentRecord],
) -> HashMap<String, SpeakerSample> {
 let mut samples = HashMap::new();
 for seg in segments {
 samples.entry(seg.speaker.clone()).or_insert_with(|| SpeakerSample {
 start: seg.start,
 end: (seg.start + SPEAKER_SAMPLE_MAX_SECONDS).min(seg.end),
 });
 }
 samples
}

async fn load_raw_transcript_cache(path: &Path) -> Result<Option<Vec<SttSegment>>> {
 if !tokio::fs::try_exists(path).await.unwrap_or(false) {
 return Ok(None);
 }
 let raw = tokio::fs::read_to_string(path).await?;
 let cached: Vec<RawSttSegment> = serde_json::from_str(&raw)?;
 Ok(Some(
 cached
.into_iter()
.map(|c| SttSegment {
 start: c.start,
 end: c.end,
 text: c.text,
 })
.collect(),
 ))
}

async fn persist_raw_transcript_cache(path: &Path, segments: &[SttSegment]) -> Result<()> {
 let cached: Vec<RawSttSegment> = segments
.iter()
.map(|s| RawSttSegment {
 start: s.start,
 end: s.end,
 text: s.text.clone(),
 })
.collect();
 let json = serde_json::to_string_pretty(&cached)?;
 tokio::fs::write(path, json).await?;
 Ok(())
}

#[cfg(test)]
mod tests {
 use super::*;
 use crate::contracts::SpeakerSegment;

 #[test]
 fn assigns_max_overlap_label() {
 let stt = vec![SttSegment {
 start: 10.0,
 end: 20.0,
 text: "hello".to_string(),
 }];
 let diarization = DiarizationOutput {
 segments: vec![
 SpeakerSegment {
 start: 9.0,
 end: 12.0,
 label: "A".to_string(),
 },
 SpeakerSegment {
 start: 11.0,
 end: 21.0,
 label: "B".to_string(),
 },
 ],
 speaker_centroids: HashMap::new(),
 };
 let merged = merge_segments(&stt, &diarization);
 assert_eq!(merged[0].speaker, "B");
 assert!((merged[0].speaker_confidence - 0.9).abs() < 1e-6);
 }

 #[test]
 fn no_overlap_yields_unknown() {
 let stt = vec![SttSegment {
 start: 100.0,
 end: 110.0,
 text: "x".to_string(),
 }];
 let diarization = DiarizationOutput {
 segments: vec![SpeakerSegment {
 start: 0.0,
 end: 1.0,
 label: "A".to_string(),
 }],
 speaker_centroids: HashMap::new(),
 };
 let merged = merge_segments(&stt, &diarization);
 assert_eq!(merged[0].speaker, UNKNOWN_LABEL);
 assert_eq!(merged[0].speaker_confidence, 0.0);
 }
}
