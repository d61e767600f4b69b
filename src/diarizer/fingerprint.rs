// Voice-fingerprint matching: cosine similarity between a speaker centroid
// produced by diarization and the known `VoiceFingerprint` rows loaded for
// a municipality. Grounded on the `EmbeddingProvider` vector-comparison
// idiom in `embeddings.rs`, generalized from text embeddings to 192-dim
// speaker embeddings.

use crate::contracts::VoiceFingerprint;

pub const MATCH_THRESHOLD: f32 = 0.75;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
 if a.len() != b.len() || a.is_empty() {
 return 0.0;
 }
 let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
 let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
 let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
 if norm_a == 0.0 || norm_b == 0.0 {
 return 0.0;
 }
 dot / (norm_a * norm_b)
}

#[derive(Debug, Clone)]
pub struct FingerprintMatch {
 pub person_id: i64,
 pub fingerprint_id: i64,
 pub similarity: f32,
}

/// Find the best fingerprint match for a centroid, if it clears
/// `MATCH_THRESHOLD` (step 5).
pub fn best_match(centroid: &[f32], known: &[VoiceFingerprint]) -> Option<FingerprintMatch> {
 known
.iter()
.map(|fp| FingerprintMatch {
 person_id: fp.person_id,
 fingerprint_id: fp.id,
 similarity: cosine_similarity(centroid, &fp.embedding),
 })
.filter(|m| m.similarity >= MATCH_THRESHOLD)
.max_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap())
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn identical_vectors_score_one() {
 let v = vec![1.0, 2.0, 3.0];
 assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
 }

 #[test]
 fn orthogonal_vectors_score_zero() {
 assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
 }

 #[test]
 fn best_match_respects_threshold() {
 let known = vec![VoiceFingerprint {
 id: 1,
 person_id: 42,
 embedding: vec![1.0, 0.0],
 source_meeting_id: 1,
 }];
 assert!(best_match(&[0.0, 1.0], &known).is_none());
 assert!(best_match(&[1.0, 0.0], &known).is_some());
 }
}
