// Document extractor : two-pass LLM boundary detection +
// content extraction, with a heuristic fallback. Grounded on
// `embeddings::OpenAIEmbeddingProvider`'s "provider call + typed
// deserialize" shape for the LLM calls; the size-cap chunking (C2) and
// dedup (C1) logic is new, built on `boundary::merge_chunk_boundaries`.

pub mod boundary;
pub mod chunker;
pub mod content;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::contracts::Llm;
use boundary::{dedup_containing_parents, merge_chunk_boundaries, overlap_page_count, BoundaryEntry, ChunkBoundaries};
use content::{split_into_sections, ExtractedSection};

/// PDF page-count/page-range extraction is an opaque capability, the same
/// way `SpeakerPipeline`/`SpeechToText` are : this crate drives
/// the workflow around it, not the PDF internals themselves.
#[async_trait]
pub trait PdfSplitter: Send + Sync {
 async fn page_count(&self, bytes: &[u8]) -> Result<i32>;
 /// Extract an inclusive page range, renumbered so the result starts at
 /// page 1.
 async fn extract_range(&self, bytes: &[u8], start: i32, end: i32) -> Result<Vec<u8>>;
 async fn byte_size_at(&self, bytes: &[u8], page_count: i32) -> Result<u64>;
}

const BOUNDARY_PROMPT: &str = "Return a JSON array of document entries found in this agenda package: {title, page_start, page_end, type, agenda_item, summary, key_facts}.";
const CONTENT_PROMPT: &str = "Extract this document's content as clean markdown. Split into sections at level-2 headings. No commentary. Use markdown tables for tabular data.";

fn boundary_schema() -> serde_json::Value {
 json!({
 "type": "array",
 "items": {
 "type": "object",
 "properties": {
 "title": {"type": "string"},
 "page_start": {"type": "integer"},
 "page_end": {"type": "integer"},
 "type": {"type": "string"},
 "agenda_item": {"type": "string"},
 "summary": {"type": "string"},
 "key_facts": {"type": "array", "items": {"type": "string"}}
 },
 "required": ["title", "page_start", "page_end", "type"]
 }
 })
}

fn content_schema() -> serde_json::Value {
 json!({"type": "object", "properties": {"markdown": {"type": "string"}}, "required": ["markdown"]})
}

/// Run pass 1 (boundary detection) over a full PDF, splitting it per C2 if
/// it exceeds `max_upload_bytes`, and merging/deduping the result.
pub async fn detect_boundaries(
 pdf_bytes: &[u8],
 max_upload_bytes: u64,
 splitter: &dyn PdfSplitter,
 llm: &dyn Llm,
) -> Result<Vec<BoundaryEntry>> {
 let total_pages = splitter.page_count(pdf_bytes).await?;
 let size = splitter.byte_size_at(pdf_bytes, total_pages).await.unwrap_or(pdf_bytes.len() as u64);

 if size <= max_upload_bytes {
 let entries = run_boundary_prompt(pdf_bytes, llm).await?;
 return Ok(dedup_containing_parents(entries));
 }

 let overlap_pages = overlap_page_count(total_pages);
 let mut chunk_page_count = total_pages;
 let mut chunks;
 loop {
 chunk_page_count = (chunk_page_count / 2).max(1);
 chunks = build_chunks(total_pages, chunk_page_count, overlap_pages);
 let worst_case_bytes = splitter
.byte_size_at(pdf_bytes, chunk_page_count + overlap_pages)
.await
.unwrap_or(size);
 if worst_case_bytes <= max_upload_bytes || chunk_page_count <= 1 {
 break;
 }
 }

 let mut chunk_results = Vec::new();
 for (offset, start, end) in chunks {
 let bytes = splitter.extract_range(pdf_bytes, start, end).await?;
 match run_boundary_prompt(&bytes, llm).await {
 Ok(entries) => chunk_results.push(ChunkBoundaries { page_offset: offset, entries }),
 Err(err) => warn!(offset, error = %err, "boundary detection failed for chunk, skipping"),
 }
 }

 Ok(merge_chunk_boundaries(chunk_results, overlap_pages))
}

/// Build `(page_offset, start_page, end_page)` windows covering the whole
/// document, each including `overlap_pages` of TOC context at its head.
fn build_chunks(total_pages: i32, chunk_size: i32, overlap_pages: i32) -> Vec<(i32, i32, i32)> {
 let mut chunks = Vec::new();
 let mut page = 1;
 while page <= total_pages {
 let end = (page + chunk_size - 1).min(total_pages);
 let offset = page - 1;
 let start = if offset > 0 { 1 } else { page };
 let window_end = if offset > 0 { end } else { end };
 chunks.push((offset, start, window_end.min(total_pages)));
 page = end + 1;
 }
 chunks
}

async fn run_boundary_prompt(pdf_bytes: &[u8], llm: &dyn Llm) -> Result<Vec<BoundaryEntry>> {
 let value = llm
.generate_structured(BOUNDARY_PROMPT, &boundary_schema, Some(pdf_bytes))
.await
.context("boundary detection LLM call failed")?;
 serde_json::from_value(value).context("boundary detection response did not match schema")
}

/// Pass 2: extract one boundary's page range to its own renumbered PDF and
/// ask the LLM for clean markdown, then split into sections.
pub async fn extract_content(
 pdf_bytes: &[u8],
 boundary: &BoundaryEntry,
 splitter: &dyn PdfSplitter,
 llm: &dyn Llm,
) -> Result<Vec<ExtractedSection>> {
 let sub_pdf = splitter
.extract_range(pdf_bytes, boundary.page_start, boundary.page_end)
.await?;

 let value = llm
.generate_structured(CONTENT_PROMPT, &content_schema, Some(&sub_pdf))
.await
.context("content extraction LLM call failed")?;

 let markdown = value
.get("markdown")
.and_then(|v| v.as_str())
.ok_or_else(|| anyhow::anyhow!("content extraction response missing markdown field"))?;

 if markdown.trim().is_empty() {
 bail!("content extraction returned empty markdown");
 }

 Ok(split_into_sections(markdown, boundary.page_start, boundary.page_end))
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn overlap_page_count_caps_at_four() {
 assert_eq!(overlap_page_count(2), 2);
 assert_eq!(overlap_page_count(50), 4);
 }

 #[test]
 fn builds_chunks_covering_whole_document() {
 let chunks = build_chunks(20, 7, 4);
 assert_eq!(chunks.last().unwrap().2, 20);
 assert_eq!(chunks[0].0, 0);
 }
}
