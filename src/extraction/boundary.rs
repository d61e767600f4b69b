// Pass-1 boundary detection output and its post-processing (
// properties P5/P6 scenario 6). No direct teacher analogue; grounded on the
// `ExtractedDocument::contains`/`overlaps` helpers already on the data
// model (contracts::ExtractedDocument), generalized here to operate on the
// pre-insert `BoundaryEntry` the LLM actually emits.

use serde::{Deserialize, Serialize};

use crate::types::DocumentType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundaryEntry {
 pub title: String,
 pub page_start: i32,
 pub page_end: i32,
 pub doc_type: String,
 pub agenda_item: Option<String>,
 pub summary: Option<String>,
 pub key_facts: Vec<String>,
}

impl BoundaryEntry {
 pub fn doc_type_enum(&self) -> DocumentType {
 match self.doc_type.as_str() {
 "agenda" => DocumentType::Agenda,
 "minutes" => DocumentType::Minutes,
 "staff_report" => DocumentType::StaffReport,
 "delegation" => DocumentType::Delegation,
 "correspondence" => DocumentType::Correspondence,
 "appendix" => DocumentType::Appendix,
 "bylaw" => DocumentType::Bylaw,
 "presentation" => DocumentType::Presentation,
 "form" => DocumentType::Form,
 _ => DocumentType::Other,
 }
 }

 fn contains(&self, other: &Self) -> bool {
 self.page_start <= other.page_start && self.page_end >= other.page_end
 }
}

/// (C1) Remove *parent* entries that fully contain >= 1 sibling, keeping
/// the finer-grained children. Page ranges among survivors never overlap.
pub fn dedup_containing_parents(mut entries: Vec<BoundaryEntry>) -> Vec<BoundaryEntry> {
 entries.sort_by_key(|e| (e.page_start, -(e.page_end - e.page_start)));
 let is_parent: Vec<bool> = entries
.iter()
.enumerate()
.map(|(i, e)| {
 entries
.iter()
.enumerate()
.any(|(j, other)| i != j && e.contains(other) && e != other)
 })
.collect();
 entries
.into_iter()
.zip(is_parent)
.filter(|(_, is_parent)| !*is_parent)
.map(|(e, _)| e)
.collect()
}

/// A single oversized-PDF chunk's result, carrying the page offset it was
/// produced at (C2).
pub struct ChunkBoundaries {
 pub page_offset: i32,
 pub entries: Vec<BoundaryEntry>,
}

/// Merge boundary lists from adaptively-split chunks: drop entries whose
/// `page_start <= overlap_pages` for chunks with `page_offset > 0` (those
/// are the re-included TOC pages), shift the rest by
/// `page_offset - overlap_pages`, then dedup by `(title, page_start)`
/// (scenario 6: two chunks both detecting the same "Agenda" pages 1-4).
pub fn merge_chunk_boundaries(chunks: Vec<ChunkBoundaries>, overlap_pages: i32) -> Vec<BoundaryEntry> {
 let mut merged = Vec::new();
 let mut seen = std::collections::HashSet::new();

 for chunk in chunks {
 for mut entry in chunk.entries {
 if chunk.page_offset > 0 && entry.page_start <= overlap_pages {
 continue;
 }
 let shift = chunk.page_offset - overlap_pages;
 entry.page_start += shift;
 entry.page_end += shift;

 let key = (entry.title.trim().to_lowercase(), entry.page_start);
 if seen.insert(key) {
 merged.push(entry);
 }
 }
 }

 dedup_containing_parents(merged)
}

/// How many leading pages to re-include as TOC context at the head of
/// every chunk: `min(4, total)`.
pub fn overlap_page_count(total_pages: i32) -> i32 {
 total_pages.min(4)
}

#[cfg(test)]
mod tests {
 use super::*;

 fn entry(title: &str, start: i32, end: i32) -> BoundaryEntry {
 BoundaryEntry {
 title: title.to_string(),
 page_start: start,
 page_end: end,
 doc_type: "other".to_string(),
 agenda_item: None,
 summary: None,
 key_facts: Vec::new(),
 }
 }

 #[test]
 fn drops_parent_that_contains_sibling() {
 let entries = vec![entry("Staff Report Package", 5, 20), entry("Appendix A", 10, 15)];
 let deduped = dedup_containing_parents(entries);
 assert_eq!(deduped.len(), 1);
 assert_eq!(deduped[0].title, "Appendix A");
 }

 #[test]
 fn merge_dedups_by_title_and_shifted_page_start() {
 let chunk_a = ChunkBoundaries {
 page_offset: 0,
 entries: vec![entry("Agenda", 1, 4)],
 };
 let chunk_b = ChunkBoundaries {
 page_offset: 14,
 entries: vec![entry("Agenda", 1, 4), entry("Staff Report", 5, 10)],
 };
 let merged = merge_chunk_boundaries(vec![chunk_a, chunk_b], 4);
 let agenda_count = merged.iter().filter(|e| e.title == "Agenda").count();
 assert_eq!(agenda_count, 1);
 assert!(merged.iter().any(|e| e.title == "Staff Report" && e.page_start == 11));
 }
}
