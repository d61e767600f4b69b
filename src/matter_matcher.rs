// Matter matcher : resolves an agenda item's free-text
// identifier/title/addresses to a `Matter` row, creating one only when no
// existing row plausibly refers to the same planning/bylaw matter. Own
// design (no direct teacher analogue); string similarity is scored with
// `strsim::jaro_winkler` as a stand-in for Ratcliff/Obershelp-style ratio
// matching, the same "small, pure, deterministic, unit-testable function"
// convention the teacher's `pure` module follows. Write-through in-memory
// index avoids creating duplicate matters for the same identifier/title
// within a single ingestion run, ahead of whatever the store's own
// uniqueness constraints enforce.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::contracts::{Matter, Store};
use crate::validation::{address, identifier};

/// What the ingester knows about an agenda item when it asks for a match.
#[derive(Debug, Clone, Default)]
pub struct MatterCandidate {
 pub identifier: Option<String>,
 pub title: String,
 pub addresses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
 pub matter_id: i64,
 pub reason: &'static str,
 pub confidence: f64,
 pub created: bool,
}

const TITLE_SIMILARITY_HIGH: f64 = 0.90;
const TITLE_SIMILARITY_LOW: f64 = 0.60;

/// Keyword -> category, checked in this order (first match wins) so
/// "rezoning" doesn't get miscategorized as a bare "bylaw" when a title
/// happens to mention both ("Rezoning Bylaw No. 1160").
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
 ("rezoning", "rezoning"),
 ("rezone", "rezoning"),
 ("temporary use permit", "tup"),
 ("development variance permit", "dvp"),
 ("development permit", "dp"),
 ("subdivision", "subdivision"),
 ("official community plan", "oc_plan"),
 ("bylaw", "bylaw"),
];

/// Derive a matter's category from its title, keyword
/// table. Returns `None` when nothing matches rather than guessing.
pub fn derive_category(title: &str) -> Option<String> {
 let lower = title.to_lowercase();
 CATEGORY_KEYWORDS
.iter()
.find(|(keyword, _)| lower.contains(keyword))
.map(|(_, category)| category.to_string())
}

#[derive(Default)]
struct MunicipalityIndex {
 by_identifier: HashMap<String, i64>,
 by_address: HashMap<String, Vec<i64>>,
 titles: HashMap<i64, String>,
 categories: HashMap<i64, Option<String>>,
}

impl MunicipalityIndex {
 fn record(&mut self, matter: &Matter) {
 self.by_identifier
.insert(matter.identifier.clone(), matter.id);
 if let Some(addr) = address::extract_normalized(&matter.title) {
 self.by_address.entry(addr).or_default().push(matter.id);
 }
 self.titles.insert(matter.id, matter.title.clone());
 self.categories.insert(matter.id, matter.category.clone());
 }
}

/// Resolves agenda-item identifiers/titles/addresses to matter rows,
/// deterministically (property P6: the same candidate always resolves to
/// the same matter within a run).
pub struct MatterMatcher {
 indices: Mutex<HashMap<i64, MunicipalityIndex>>,
}

impl Default for MatterMatcher {
 fn default() -> Self {
 Self::new()
 }
}

impl MatterMatcher {
 pub fn new() -> Self {
 Self {
 indices: Mutex::new(HashMap::new()),
 }
 }

 async fn load_index(&self, store: &dyn Store, municipality_id: i64) -> Result<()> {
 let mut guard = self.indices.lock().await;
 if guard.contains_key(&municipality_id) {
 return Ok(());
 }
 let mut index = MunicipalityIndex::default();
 for matter in store.list_matters(municipality_id).await? {
 index.record(&matter);
 }
 guard.insert(municipality_id, index);
 Ok(())
 }

 /// Resolve a candidate to a matter row, creating one if no existing row
 /// plausibly refers to the same matter. `seen` becomes `first_seen` on
 /// creation or advances `last_seen` on an existing row.
 pub async fn find_or_create(
 &self,
 store: &dyn Store,
 municipality_id: i64,
 candidate: &MatterCandidate,
 seen: NaiveDate,
 ) -> Result<MatchResult> {
 self.load_index(store, municipality_id).await?;

 let normalized_identifier = candidate.identifier.as_deref().map(identifier::normalize_identifier);
 let normalized_addresses: Vec<String> = candidate
.addresses
.iter()
.filter(|a| !address::is_placeholder(a))
.filter_map(|a| address::extract_normalized(a))
.collect();
 let category = derive_category(&candidate.title);

 let found = {
 let guard = self.indices.lock().await;
 let index = guard.get(&municipality_id).expect("loaded above");
 self.resolve_against_index(index, normalized_identifier.as_deref(), &candidate.title, &normalized_addresses, category.as_deref())
 };

 if let Some((matter_id, reason, confidence)) = found {
 store.touch_matter_last_seen(matter_id, seen).await?;
 return Ok(MatchResult {
 matter_id,
 reason,
 confidence,
 created: false,
 });
 }

 let identifier_to_store = normalized_identifier
.clone()
.unwrap_or_else(|| identifier::normalize_identifier(&candidate.title));
 let matter = store
.create_matter(
 municipality_id,
 &identifier_to_store,
 &candidate.title,
 category,
 seen,
 )
.await?;

 let mut guard = self.indices.lock().await;
 guard.entry(municipality_id).or_default().record(&matter);

 Ok(MatchResult {
 matter_id: matter.id,
 reason: "created",
 confidence: 1.0,
 created: true,
 })
 }

 /// Pure lookup against the in-memory index; no I/O, so it can be tested
 /// without a store (property P6).
 fn resolve_against_index(
 &self,
 index: &MunicipalityIndex,
 normalized_identifier: Option<&str>,
 title: &str,
 normalized_addresses: &[String],
 category: Option<&str>,
 ) -> Option<(i64, &'static str, f64)> {
 // Tier 1: exact identifier match.
 if let Some(ident) = normalized_identifier {
 if let Some(&matter_id) = index.by_identifier.get(ident) {
 return Some((matter_id, "identifier_exact", 1.0));
 }

 // Tier 2: sub-part overlap — a compound identifier on either
 // side contains the other's normalized form as one part.
 for (existing_ident, &matter_id) in &index.by_identifier {
 if identifiers_overlap(ident, existing_ident) {
 return Some((matter_id, "identifier_subpart", 0.98));
 }
 }
 }

 // Tier 3: shared normalized address plus same derived category.
 for addr in normalized_addresses {
 if let Some(candidates) = index.by_address.get(addr) {
 for &matter_id in candidates {
 if index.categories.get(&matter_id).cloned().flatten().as_deref() == category
 && category.is_some()
 {
 return Some((matter_id, "address_and_category", 0.95));
 }
 }
 if let Some(&matter_id) = candidates.first() {
 return Some((matter_id, "address_match", 0.85));
 }
 }
 }

 // Tier 4: high title similarity within the same category.
 let mut best: Option<(i64, f64)> = None;
 for (&matter_id, existing_title) in &index.titles {
 if category.is_some() && index.categories.get(&matter_id).cloned().flatten().as_deref() != category {
 continue;
 }
 let score = strsim::jaro_winkler(&title.to_lowercase(), &existing_title.to_lowercase());
 if score >= TITLE_SIMILARITY_HIGH && best.map(|(_, b)| score > b).unwrap_or(true) {
 best = Some((matter_id, score));
 }
 }
 if let Some((matter_id, _)) = best {
 return Some((matter_id, "title_similarity_high", 0.90));
 }

 // Tier 5: weak title-only fallback, confidence floored at 0.60 and
 // scaled by how close the match actually was.
 if normalized_identifier.is_none() && normalized_addresses.is_empty() {
 let mut weak: Option<(i64, f64)> = None;
 for (&matter_id, existing_title) in &index.titles {
 let score = strsim::jaro_winkler(&title.to_lowercase(), &existing_title.to_lowercase());
 if score >= TITLE_SIMILARITY_LOW && weak.map(|(_, b)| score > b).unwrap_or(true) {
 weak = Some((matter_id, score));
 }
 }
 if let Some((matter_id, score)) = weak {
 return Some((matter_id, "title_similarity_weak", score.max(TITLE_SIMILARITY_LOW)));
 }
 }

 None
 }
}

/// Two normalized identifiers overlap when one is a compound identifier
/// (`"Bylaw 1160; REZ 2025-01"`-style strings already split by
/// `validation::identifier::parse_compound_identifier`) containing the
/// other as one of its parts.
fn identifiers_overlap(a: &str, b: &str) -> bool {
 if a == b {
 return true;
 }
 let parts_a = identifier::parse_compound_identifier(a);
 let parts_b = identifier::parse_compound_identifier(b);
 parts_a.iter().any(|p| p == b || parts_b.contains(p))
}

#[cfg(test)]
mod tests {
 use super::*;

 fn matter(id: i64, identifier: &str, title: &str, category: Option<&str>) -> Matter {
 Matter {
 id,
 municipality_id: 1,
 identifier: identifier.to_string(),
 title: title.to_string(),
 category: category.map(|c| c.to_string()),
 status: None,
 first_seen: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
 last_seen: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
 bylaw_id: None,
 }
 }

 #[test]
 fn derives_category_from_title_keywords() {
 assert_eq!(derive_category("Rezoning Application 2025-01").as_deref(), Some("rezoning"));
 assert_eq!(derive_category("Zoning Amendment Bylaw No. 1160").as_deref(), Some("bylaw"));
 assert_eq!(derive_category("Subdivision Application").as_deref(), Some("subdivision"));
 assert_eq!(derive_category("Budget update"), None);
 }

 #[test]
 fn resolves_exact_identifier_match() {
 let matcher = MatterMatcher::new();
 let mut index = MunicipalityIndex::default();
 index.record(&matter(1, "Bylaw 1160", "Zoning Amendment Bylaw No. 1160", Some("bylaw")));

 let result = matcher.resolve_against_index(&index, Some("Bylaw 1160"), "Zoning Amendment Bylaw No. 1160", &[], Some("bylaw"));
 assert_eq!(result, Some((1, "identifier_exact", 1.0)));
 }

 #[test]
 fn resolves_subpart_overlap() {
 let matcher = MatterMatcher::new();
 let mut index = MunicipalityIndex::default();
 index.record(&matter(1, "Bylaw 1160; REZ 2025-01", "Combined bylaw", Some("bylaw")));

 let result = matcher.resolve_against_index(&index, Some("REZ 2025-01"), "Combined bylaw", &[], Some("bylaw"));
 assert_eq!(result, Some((1, "identifier_subpart", 0.98)));
 }

 #[test]
 fn resolves_by_shared_address_and_category() {
 let matcher = MatterMatcher::new();
 let mut index = MunicipalityIndex::default();
 index.record(&matter(1, "REZ 2025-01", "Rezoning for 258 Helmcken Road", Some("rezoning")));

 let result = matcher.resolve_against_index(
 &index,
 None,
 "Rezoning application for 258 Helmcken Rd",
 &["258 helmcken road".to_string()],
 Some("rezoning"),
 );
 assert_eq!(result, Some((1, "address_and_category", 0.95)));
 }

 #[test]
 fn no_match_returns_none_when_nothing_plausible() {
 let matcher = MatterMatcher::new();
 let index = MunicipalityIndex::default();
 let result = matcher.resolve_against_index(&index, Some("Bylaw 999"), "Something new", &[], None);
 assert_eq!(result, None);
 }
}
