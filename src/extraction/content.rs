// Pass-2 content extraction: markdown-to-sections splitting and agenda-item
// resolution. Grounded on the natural-order comparison already
// built for `ItemOrder` in `types.rs` — the "normalized item order" match
// here strips the same punctuation `ItemOrder`'s segment parser tokenizes
// on, just without needing full ordering, only equality/containment.

use serde::{Deserialize, Serialize};

use crate::contracts::AgendaItem;

const MAX_SECTION_CHARS: usize = 8000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSection {
 pub section_title: String,
 pub section_text: String,
 pub section_order: i32,
 pub page_start: i32,
 pub page_end: i32,
 pub token_count: i32,
}

fn estimate_tokens(text: &str) -> i32 {
 let words = text.split_whitespace().count();
 ((words as f64) * 1.3).round() as i32
}

/// Split markdown at `##` headings; `###` subheadings are folded into the
/// parent section's text rather than starting a new one.
pub fn split_into_sections(markdown: &str, page_start: i32, page_end: i32) -> Vec<ExtractedSection> {
 let mut sections: Vec<(String, String)> = Vec::new();

 for line in markdown.lines() {
 let trimmed = line.trim_start();
 if let Some(title) = trimmed.strip_prefix("## ") {
 sections.push((title.trim().to_string(), String::new()));
 continue;
 }
 match sections.last_mut() {
 Some((_, body)) => {
 body.push_str(line);
 body.push('\n');
 }
 None => {
 sections.push(("Untitled".to_string(), format!("{line}\n")));
 }
 }
 }

 if sections.is_empty() {
 sections.push(("Untitled".to_string(), markdown.to_string()));
 }

 let mut out = Vec::new();
 let mut order = 0;
 for (title, body) in sections {
 for piece in split_oversized(&body) {
 let final_title = if piece.1 > 1 {
 format!("{title} - Part {} of {}", piece.0, piece.1)
 } else {
 title.clone()
 };
 out.push(ExtractedSection {
 section_title: final_title,
 token_count: estimate_tokens(&piece.2),
 section_text: piece.2,
 section_order: order,
 page_start,
 page_end,
 });
 order += 1;
 }
 }
 out
}

/// Split a section body exceeding `MAX_SECTION_CHARS` at paragraph
/// boundaries, returning `(part_index, total_parts, text)` tuples (index 1
/// for a section that didn't need splitting keeps `total_parts == 1`).
fn split_oversized(body: &str) -> Vec<(usize, usize, String)> {
 if body.len() <= MAX_SECTION_CHARS {
 return vec![(1, 1, body.to_string())];
 }

 let paragraphs: Vec<&str> = body.split("\n\n").collect();
 let mut parts = Vec::new();
 let mut current = String::new();
 for para in paragraphs {
 if !current.is_empty() && current.len() + para.len() + 2 > MAX_SECTION_CHARS {
 parts.push(std::mem::take(&mut current));
 }
 if !current.is_empty() {
 current.push_str("\n\n");
 }
 current.push_str(para);
 }
 if !current.is_empty() {
 parts.push(current);
 }

 let total = parts.len();
 parts
.into_iter()
.enumerate()
.map(|(i, text)| (i + 1, total, text))
.collect()
}

fn normalize_item_order(raw: &str) -> String {
 raw.trim()
.trim_end_matches(['.', ')'])
.to_lowercase()
.replace(char::is_whitespace, "")
}

/// Resolve the LLM's `agenda_item` hint (e.g. `"6.1a)"`) against a
/// meeting's agenda items: (a) exact match on normalized item order; (b)
/// containment; (c) unresolved.
pub fn resolve_agenda_item<'a>(hint: &str, items: &'a [AgendaItem]) -> Option<&'a AgendaItem> {
 let normalized_hint = normalize_item_order(hint);
 if normalized_hint.is_empty() {
 return None;
 }

 if let Some(exact) = items
.iter()
.find(|i| normalize_item_order(&i.item_order) == normalized_hint)
 {
 return Some(exact);
 }

 items.iter().find(|i| {
 let item_norm = normalize_item_order(&i.item_order);
 normalized_hint.contains(&item_norm) || item_norm.contains(&normalized_hint)
 })
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn splits_at_h2_headings_and_folds_h3() {
 let md = "## First\nbody one\n### sub\nmore\n## Second\nbody two\n";
 let sections = split_into_sections(md, 1, 5);
 assert_eq!(sections.len(), 2);
 assert_eq!(sections[0].section_title, "First");
 assert!(sections[0].section_text.contains("### sub"));
 }

 #[test]
 fn splits_oversized_section_with_part_suffix() {
 let para = "x".repeat(5000);
 let md = format!("## Big\n{para}\n\n{para}\n\n{para}\n");
 let sections = split_into_sections(&md, 1, 1);
 assert!(sections.len() > 1);
 assert!(sections[0].section_title.starts_with("Big - Part 1 of"));
 }

 #[test]
 fn resolves_agenda_item_by_normalized_match() {
 let items = vec![AgendaItem {
 id: 1,
 meeting_id: 1,
 matter_id: None,
 item_order: "6.1a".to_string(),
 title: "x".to_string(),
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
 }];
 assert_eq!(resolve_agenda_item("6.1a)", &items).unwrap().id, 1);
 assert!(resolve_agenda_item("9.9", &items).is_none());
 }
}
