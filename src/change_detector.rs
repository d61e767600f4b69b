// Change detector. Read-only: walks the archive tree and diffs
// it against the store to produce a `ChangeReport`. Path normalization is
// grounded on `path_utils::PathNormalizer` generalized from "relative to a
// git repo root" to "relative to a municipality's archive root marker" —
// `ArchivePath::relative_to_root` now does the stripping `types.rs` owns.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{instrument, warn};

use crate::contracts::{ChangeEntry, ChangeReport, Store, VideoCatalog};
use crate::types::ArchivePath;

static FOLDER_DATE: LazyLock<Regex> =
 LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Parse a meeting folder's leading date out of its name, /// folder-name date regex.
pub fn parse_folder_date(folder_name: &str) -> Option<NaiveDate> {
 let caps = FOLDER_DATE.captures(folder_name)?;
 let year: i32 = caps[1].parse().ok()?;
 let month: u32 = caps[2].parse().ok()?;
 let day: u32 = caps[3].parse().ok()?;
 NaiveDate::from_ymd_opt(year, month, day)
}

pub fn guess_meeting_type(folder_name: &str) -> String {
 let lower = folder_name.to_lowercase();
 if lower.contains("public hearing") {
 "Public Hearing".to_string()
 } else if lower.contains("committee of the whole") || lower.contains("cow") {
 "Committee of the Whole".to_string()
 } else if lower.contains("special") {
 "Special Council".to_string()
 } else {
 "Regular Council".to_string()
 }
}

/// A single meeting folder discovered on disk.
pub struct ArchiveEntry {
 pub archive_path: ArchivePath,
 pub meeting_date: NaiveDate,
 pub meeting_type: String,
 pub has_agenda_dir: bool,
 pub has_audio_dir: bool,
 pub has_agenda_file: bool,
 pub has_minutes_file: bool,
 pub has_transcript_file: bool,
}

/// Walk a municipality's archive root and collect every folder whose name
/// parses to a date and contains `Agenda/` or `Audio/` ("new
/// meeting" predicate starts here; "new documents" reuses the same scan).
pub fn scan_archive_tree(root: &Path, root_marker: &str) -> Result<Vec<ArchiveEntry>> {
 let mut entries = Vec::new();
 walk(root, root_marker, &mut entries)?;
 Ok(entries)
}

fn walk(dir: &Path, root_marker: &str, out: &mut Vec<ArchiveEntry>) -> Result<()> {
 if !dir.is_dir() {
 return Ok(());
 }
 for child in std::fs::read_dir(dir)? {
 let child = child?;
 let path = child.path();
 if !path.is_dir() {
 continue;
 }
 let name = child.file_name().to_string_lossy().to_string();
 if let Some(meeting_date) = parse_folder_date(&name) {
 let agenda_dir = path.join("Agenda");
 let audio_dir = path.join("Audio");
 let has_agenda_dir = agenda_dir.is_dir();
 let has_audio_dir = audio_dir.is_dir();
 if has_agenda_dir || has_audio_dir {
 let archive_path = ArchivePath::relative_to_root(
 &path.to_string_lossy(),
 root_marker,
 )?;
 out.push(ArchiveEntry {
 archive_path,
 meeting_date,
 meeting_type: guess_meeting_type(&name),
 has_agenda_dir,
 has_audio_dir,
 has_agenda_file: dir_has_pdf_or_html(&agenda_dir),
 has_minutes_file: dir_has_pdf_or_html(&path.join("Minutes")),
 has_transcript_file: path.join("Audio").join("transcript.json").exists()
 || path.join("Video").join("transcript.json").exists(),
 });
 continue;
 }
 }
 walk(&path, root_marker, out)?;
 }
 Ok(())
}

fn dir_has_pdf_or_html(dir: &Path) -> bool {
 let Ok(read) = std::fs::read_dir(dir) else {
 return false;
 };
 read.filter_map(|e| e.ok()).any(|e| {
 let ext = e
.path()
.extension()
.and_then(|e| e.to_str())
.unwrap_or("")
.to_lowercase();
 ext == "pdf" || ext == "html" || ext == "htm"
 })
}

/// Compare the disk scan against the store and emit a `ChangeReport`.
#[instrument(skip(store, video_catalog, entries))]
pub async fn detect_changes(
 store: &dyn Store,
 municipality_id: i64,
 entries: &[ArchiveEntry],
 video_catalog: Option<&dyn VideoCatalog>,
) -> Result<ChangeReport> {
 let existing = store.list_meetings(municipality_id).await?;
 let by_path: HashMap<&str, &crate::contracts::Meeting> =
 existing.iter().map(|m| (m.archive_path.as_str(), m)).collect();

 let mut report = ChangeReport::default();

 for entry in entries {
 match by_path.get(entry.archive_path.as_str()) {
 None => {
 report.new_meetings.push(ChangeEntry {
 archive_path: entry.archive_path.as_str().to_string(),
 meeting_date: entry.meeting_date,
 meeting_type: entry.meeting_type.clone(),
 details: vec!["no matching store row".to_string()],
 meta: None,
 });
 }
 Some(existing_meeting) => {
 let mut details = Vec::new();
 if !existing_meeting.has_agenda && entry.has_agenda_file {
 details.push("agenda file present on disk".to_string());
 }
 if !existing_meeting.has_minutes && entry.has_minutes_file {
 details.push("minutes file present on disk".to_string());
 }
 if !existing_meeting.has_transcript && entry.has_transcript_file {
 details.push("transcript file present on disk".to_string());
 }
 if !details.is_empty() {
 report.meetings_with_new_docs.push(ChangeEntry {
 archive_path: entry.archive_path.as_str().to_string(),
 meeting_date: entry.meeting_date,
 meeting_type: entry.meeting_type.clone(),
 details,
 meta: None,
 });
 }
 }
 }
 }

 if let Some(catalog) = video_catalog {
 match catalog.get_video_map(None).await {
 Ok(video_map) => {
 for (date, videos) in video_map {
 if videos.is_empty() {
 continue;
 }
 let matching = entries.iter().find(|e| e.meeting_date == date);
 let Some(entry) = matching else { continue };
 if !entry.has_audio_dir && !entry.has_transcript_file {
 report.meetings_with_new_video.push(ChangeEntry {
 archive_path: entry.archive_path.as_str().to_string(),
 meeting_date: date,
 meeting_type: entry.meeting_type.clone(),
 details: vec![format!("{} video entries available", videos.len())],
 meta: None,
 });
 }
 }
 }
 Err(err) => warn!(error = %err, "video catalog lookup failed; skipping new-video detection"),
 }
 }

 Ok(report)
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn parses_leading_folder_date() {
 assert_eq!(
 parse_folder_date("2026-01-05 Regular Council"),
 NaiveDate::from_ymd_opt(2026, 1, 5)
 );
 }

 #[test]
 fn rejects_folder_without_date() {
 assert_eq!(parse_folder_date("Agenda"), None);
 }

 #[test]
 fn guesses_public_hearing_type() {
 assert_eq!(
 guess_meeting_type("2026-01-05 Public Hearing"),
 "Public Hearing"
 );
 }
}
