// Audio/video acquirer. Matches date-keyed video catalog
// entries to on-disk meeting folders and downloads them. No direct teacher
// analogue; grounded on the `VideoCatalog` capability trait's shape
// (contracts::VideoCatalog) and the acquire-then-handoff flow the
// orchestrator drives between phases 2 and 3.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::contracts::{VideoCatalog, VideoCatalogEntry};

/// Keywords used to disambiguate multiple video entries on the same date,
/// in preference order.
const COUNCIL_KEYWORDS: &[&str] = &["council"];
const COMMITTEE_KEYWORDS: &[&str] = &["committee of the whole", "cow"];
const PUBLIC_HEARING_KEYWORDS: &[&str] = &["public hearing"];

fn title_matches_any(title: &str, keywords: &[&str]) -> bool {
 let lower = title.to_lowercase();
 keywords.iter().any(|k| lower.contains(k))
}

/// Pick the best video entry for a meeting folder whose name suggests a
/// kind (folder_name is matched the same way `guess_meeting_type` in
/// `change_detector` does). Prefers non-public-hearing council entries when
/// the folder itself isn't clearly a public hearing.
pub fn select_video_entry<'a>(
 folder_name: &str,
 candidates: &'a [VideoCatalogEntry],
) -> Option<&'a VideoCatalogEntry> {
 if candidates.len() == 1 {
 return candidates.first();
 }
 if candidates.is_empty() {
 return None;
 }

 let folder_is_hearing = title_matches_any(folder_name, PUBLIC_HEARING_KEYWORDS);

 if !folder_is_hearing {
 if let Some(found) = candidates.iter().find(|c| {
 title_matches_any(&c.title, COUNCIL_KEYWORDS)
 && !title_matches_any(&c.title, PUBLIC_HEARING_KEYWORDS)
 }) {
 return Some(found);
 }
 }
 if let Some(found) = candidates
.iter()
.find(|c| title_matches_any(&c.title, COMMITTEE_KEYWORDS))
 {
 return Some(found);
 }
 if folder_is_hearing {
 if let Some(found) = candidates
.iter()
.find(|c| title_matches_any(&c.title, PUBLIC_HEARING_KEYWORDS))
 {
 return Some(found);
 }
 }
 candidates.first()
}

/// For every meeting folder whose parsed date is present in the catalog's
/// video map, download the best-matching entry into `Audio/` or `Video/`,
/// skipping if the target extension already exists.
pub async fn acquire_for_folder(
 catalog: &dyn VideoCatalog,
 video_map: &HashMap<NaiveDate, Vec<VideoCatalogEntry>>,
 meeting_date: NaiveDate,
 folder_name: &str,
 folder_path: &Path,
 include_video: bool,
 download_audio: bool,
) -> Result<Option<PathBuf>> {
 let Some(candidates) = video_map.get(&meeting_date) else {
 return Ok(None);
 };
 let Some(entry) = select_video_entry(folder_name, candidates) else {
 return Ok(None);
 };

 let target_dir = if include_video {
 folder_path.join("Video")
 } else {
 folder_path.join("Audio")
 };

 let existing_ext = if include_video { "mp4" } else { "wav" };
 if target_dir.join(format!("meeting.{existing_ext}")).exists() {
 info!(folder = folder_name, "acquisition target already present, skipping");
 return Ok(None);
 }

 tokio::fs::create_dir_all(&target_dir)
.await
.with_context(|| format!("failed to create {target_dir:?}"))?;

 match catalog
.download(entry, &target_dir, include_video, download_audio)
.await
 {
 Ok(path) => Ok(path),
 Err(err) => {
 warn!(folder = folder_name, error = %err, "video download failed");
 Err(err)
 }
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 fn entry(title: &str) -> VideoCatalogEntry {
 VideoCatalogEntry {
 url: "https://example.com".to_string(),
 title: title.to_string(),
 uri: "vimeo:123".to_string(),
 duration: 3600.0,
 }
 }

 #[test]
 fn single_candidate_always_wins() {
 let candidates = vec![entry("Anything")];
 assert_eq!(
 select_video_entry("2026-01-05 Regular Council", &candidates)
.unwrap()
.title,
 "Anything"
 );
 }

 #[test]
 fn prefers_non_public_hearing_council() {
 let candidates = vec![entry("Council - Public Hearing"), entry("Regular Council Meeting")];
 let chosen = select_video_entry("2026-01-05 Regular Council", &candidates).unwrap();
 assert_eq!(chosen.title, "Regular Council Meeting");
 }

 #[test]
 fn picks_public_hearing_when_folder_says_so() {
 let candidates = vec![entry("Regular Council Meeting"), entry("Council Public Hearing")];
 let chosen = select_video_entry("2026-01-05 Public Hearing", &candidates).unwrap();
 assert_eq!(chosen.title, "Council Public Hearing");
 }
}
