// Heuristic fallback chunker, invoked when LLM boundary detection fails
//. Operates on a page's text spans with font metadata — PDF
// rasterization/layout extraction itself is out of scope (an opaque
// capability, the same way `SpeakerPipeline`/`SpeechToText` are), so this
// module only consumes the `TextSpan` records such a component would
// produce.

use super::content::ExtractedSection;

#[derive(Debug, Clone)]
pub struct TextSpan {
 pub text: String,
 pub font_size: f32,
 pub bold: bool,
 pub page: i32,
}

const NOISE_HEADINGS: &[&str] = &["carried", "defeated", "or"];

fn is_page_number_like(text: &str) -> bool {
 let trimmed = text.trim();
 !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit() || c == '/' || c.is_whitespace())
}

fn is_noise_heading(text: &str) -> bool {
 let lower = text.trim().to_lowercase();
 NOISE_HEADINGS.contains(&lower.as_str()) || is_page_number_like(text)
}

fn is_heading_span(span: &TextSpan, body_size: f32) -> bool {
 let all_caps = span.text.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
 && span.text.chars().any(|c| c.is_alphabetic());
 (span.font_size > body_size * 1.2 || (span.bold && all_caps)) && !is_noise_heading(&span.text)
}

/// The most common font size across all spans, used as the "body text"
/// baseline a heading span must exceed by 1.2x.
fn modal_font_size(spans: &[TextSpan]) -> f32 {
 use std::collections::HashMap;
 let mut counts: HashMap<u32, usize> = HashMap::new();
 for span in spans {
 *counts.entry((span.font_size * 10.0).round() as u32).or_insert(0) += 1;
 }
 counts
.into_iter()
.max_by_key(|(_, count)| *count)
.map(|(size, _)| size as f32 / 10.0)
.unwrap_or(10.0)
}

/// Heading text occurring >= 5 times is a repeating page header/footer
/// (e.g. a multi-page table's column header); merge every occurrence into
/// a single concatenated section instead of one per page.
fn repeating_headings(spans: &[TextSpan], body_size: f32) -> std::collections::HashSet<String> {
 use std::collections::HashMap;
 let mut counts: HashMap<String, usize> = HashMap::new();
 for span in spans.iter().filter(|s| is_heading_span(s, body_size)) {
 *counts.entry(span.text.trim().to_string()).or_insert(0) += 1;
 }
 counts
.into_iter()
.filter(|(_, count)| *count >= 5)
.map(|(text, _)| text)
.collect()
}

/// Detect headings by font-size/boldness frequency analysis and group the
/// spans that follow each heading into a section, merging repeating
/// headers into one section.
pub fn chunk_by_font_heuristic(spans: &[TextSpan]) -> Vec<ExtractedSection> {
 if spans.is_empty() {
 return Vec::new();
 }
 let body_size = modal_font_size(spans);
 let repeating = repeating_headings(spans, body_size);

 let mut sections: Vec<(String, String, i32, i32)> = Vec::new();
 let mut repeating_bodies: std::collections::HashMap<String, String> = std::collections::HashMap::new();

 for span in spans {
 let treat_as_heading = is_heading_span(span, body_size);
 if treat_as_heading && repeating.contains(span.text.trim()) {
 repeating_bodies
.entry(span.text.trim().to_string())
.or_default();
 continue;
 }
 if treat_as_heading {
 sections.push((span.text.trim().to_string(), String::new(), span.page, span.page));
 continue;
 }
 match sections.last_mut() {
 Some((_, body, _, page_end)) => {
 body.push_str(&span.text);
 body.push('\n');
 *page_end = span.page;
 }
 None => sections.push(("Untitled".to_string(), format!("{}\n", span.text), span.page, span.page)),
 }
 }

 let mut order = 0;
 let mut out: Vec<ExtractedSection> = sections
.into_iter()
.map(|(title, text, page_start, page_end)| {
 let section = ExtractedSection {
 token_count: ((text.split_whitespace().count() as f64) * 1.3).round() as i32,
 section_title: title,
 section_text: text,
 section_order: order,
 page_start,
 page_end,
 };
 order += 1;
 section
 })
.collect();

 for title in repeating {
 out.push(ExtractedSection {
 section_title: title,
 section_text: String::new(),
 section_order: order,
 page_start: 1,
 page_end: spans.last().map(|s| s.page).unwrap_or(1),
 token_count: 0,
 });
 order += 1;
 }

 out
}

#[cfg(test)]
mod tests {
 use super::*;

 fn span(text: &str, font_size: f32, bold: bool, page: i32) -> TextSpan {
 TextSpan {
 text: text.to_string(),
 font_size,
 bold,
 page,
 }
 }

 #[test]
 fn large_font_span_starts_new_section() {
 let spans = vec![
 span("Background", 20.0, false, 1),
 span("some body text", 10.0, false, 1),
 span("Recommendation", 20.0, false, 2),
 span("more body text", 10.0, false, 2),
 ];
 let sections = chunk_by_font_heuristic(&spans);
 assert_eq!(sections.len(), 2);
 assert_eq!(sections[0].section_title, "Background");
 assert_eq!(sections[1].section_title, "Recommendation");
 }

 #[test]
 fn noise_heading_does_not_split() {
 let spans = vec![
 span("Background", 20.0, false, 1),
 span("CARRIED", 20.0, false, 1),
 span("body", 10.0, false, 1),
 ];
 let sections = chunk_by_font_heuristic(&spans);
 assert_eq!(sections.len(), 1);
 assert!(sections[0].section_text.contains("CARRIED"));
 }
}
