// Validation Layer
// Runtime validation of contracts (preconditions/postconditions), plus the
// normalization helpers the ingester and matter matcher both need: person
// name canonicalization and identifier normalization. Kept in one module
// because both are "make an LLM-emitted string safe to key a store row on"
// concerns, the same job `validate_file_path` does for paths in the
// teacher.

use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Validation errors with detailed context.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
 #[error("Precondition failed: {condition}")]
 PreconditionFailed { condition: String, context: String },

 #[error("Postcondition failed: {condition}")]
 PostconditionFailed { condition: String, context: String },

 #[error("Invariant violated: {invariant}")]
 InvariantViolated { invariant: String, state: String },

 #[error("Invalid input: {field} - {reason}")]
 InvalidInput { field: String, reason: String },
}

/// Validation context for better error messages.
#[derive(Clone)]
pub struct ValidationContext {
 operation: String,
 attributes: HashMap<String, String>,
}

impl ValidationContext {
 pub fn new(operation: impl Into<String>) -> Self {
 Self {
 operation: operation.into(),
 attributes: HashMap::new(),
 }
 }

 pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
 self.attributes.insert(key.into(), value.into());
 self
 }

 pub fn validate(self, condition: bool, message: &str) -> Result<()> {
 if !condition {
 let context = format!(
 "Operation: {}, Attributes: {:?}",
 self.operation, self.attributes
 );
 bail!(ValidationError::PreconditionFailed {
 condition: message.to_string(),
 context,
 });
 }
 Ok(())
 }
}

/// Person-name canonicalization and role extraction.
pub mod person {
 use super::*;

 /// Manual overrides for names the automatic canonicalization gets
 /// wrong (nicknames, unusual capitalization).
 pub static NAME_VARIANTS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
 HashMap::from([
 ("dave screech", "David Screech"),
 ("liz c", "Liz Cornwell"),
 ])
 });

 static ROLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)^(mayor|deputy mayor|chair|vice.?chair|councillor|coun\.|director of [a-z ]+|manager of [a-z ]+)\s+").unwrap()
 });

 static SPACED_LETTERS: LazyLock<Regex> =
 LazyLock::new(|| Regex::new(r"\b(?:[A-Za-z]\s){2,}[A-Za-z]\b").unwrap());

 const JUNK_PREFIXES: &[&str] = &["speaker_", "unknown"];
 const BLOCKLIST: &[&str] = &["unidentified speaker", "inaudible", "crosstalk", "n/a"];

 /// Strip a leading role title ("Mayor David Screech" -> ("David
 /// Screech", ["Mayor"])). Only one role prefix is stripped; a second
 /// match would indicate a malformed name, not a double role.
 pub fn extract_roles(raw: &str) -> (String, Vec<String>) {
 let trimmed = raw.trim();
 if let Some(m) = ROLE_PREFIX.find(trimmed) {
 let role = trimmed[m.start..m.end].trim().trim_end_matches('.');
 let rest = trimmed[m.end..].trim();
 (rest.to_string(), vec![role.to_string()])
 } else {
 (trimmed.to_string(), Vec::new())
 }
 }

 /// Collapse spaced-out letters ("J O H N S M I T H" -> "JOHN SMITH").
 fn collapse_spaced_letters(name: &str) -> String {
 if SPACED_LETTERS.is_match(name) {
 name.split_whitespace()
.collect()::<Vec<_>>
.join("")
.chars()
.fold(String::new(), |mut acc, c| {
 acc.push(c);
 acc
 })
 } else {
 name.to_string()
 }
 }

 /// Canonicalize a name: strip role titles, collapse spaced-out
 /// letters, apply the manual alias map, collapse internal whitespace.
 pub fn canonicalize_name(raw: &str) -> String {
 let (without_role, _roles) = extract_roles(raw);
 let collapsed = collapse_spaced_letters(&without_role);
 let normalized_ws = collapsed.split_whitespace().collect()::<Vec<_>>.join(" ");

 if let Some(&canonical) = NAME_VARIANTS.get(normalized_ws.to_lowercase().as_str()) {
 return canonical.to_string();
 }
 normalized_ws
 }

 /// Names the diarizer/refiner may emit that do not denote a real
 /// person: `Speaker_01`, `Unknown`, and the manual blocklist.
 pub fn is_junk_name(name: &str) -> bool {
 let lower = name.trim().to_lowercase();
 if lower.is_empty() {
 return true;
 }
 JUNK_PREFIXES.iter().any(|p| lower.starts_with(p)) || BLOCKLIST.contains(&lower.as_str())
 }

 /// Rejects names too short, purely numeric, or junk — /// "reject names that aren't valid."
 pub fn is_valid_name(name: &str) -> bool {
 let trimmed = name.trim();
 if trimmed.len() < 3 || is_junk_name(trimmed) {
 return false;
 }
 !trimmed.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
 }

 /// The last whitespace-delimited token, used for the "surname
 /// uniqueness" resolution step in the ingester.
 pub fn surname(name: &str) -> &str {
 name.trim().rsplit(' ').next().unwrap_or(name)
 }

 #[cfg(test)]
 mod tests {
 use super::*;

 #[test]
 fn strips_role_prefix() {
 let (name, roles) = extract_roles("Mayor David Screech");
 assert_eq!(name, "David Screech");
 assert_eq!(roles, vec!["Mayor"]);
 }

 #[test]
 fn canonicalizes_known_variant() {
 assert_eq!(canonicalize_name("Mayor David Screech"), "David Screech");
 }

 #[test]
 fn rejects_junk() {
 assert!(!is_valid_name("Speaker_01"));
 assert!(!is_valid_name("Unknown"));
 assert!(!is_valid_name("12"));
 }
 }
}

/// Matter/bylaw identifier normalization. Ratcliff/Obershelp-style
/// similarity scoring lives in `crate::matter_matcher`, not here — this
/// module only normalizes raw strings to a comparable canonical form.
pub mod identifier {
 use super::*;

 static BYLAW_NO: LazyLock<Regex> =
 LazyLock::new(|| Regex::new(r"(?i)\bbylaw\s*(?:no\.?)?\s*#?\s*(\d+)\b").unwrap());

 static AMENDMENT_BYLAW: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)\bamendment\s+bylaw\s*(?:no\.?)?\s*#?\s*(\d+)\b").unwrap()
 });

 static REZONING: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)\brezoning\s+application\s*(?:no\.?)?\s*#?\s*([0-9]{4})[/\-]([0-9]+)\b")
.unwrap()
 });

 static REZ_SHORT: LazyLock<Regex> =
 LazyLock::new(|| Regex::new(r"(?i)\brez\s*([0-9]{4})[/\-]([0-9]+)\b").unwrap());

 static TUP: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)\b(?:temporary\s+use\s+permit|tup)\s*(?:no\.?)?\s*#?\s*([0-9]{4})[/\-]([0-9]+)\b").unwrap()
 });

 static DVP: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)\b(?:development\s+variance\s+permit|dvp)\s*(?:no\.?)?\s*#?\s*([0-9]{4})[/\-]([0-9]+)\b").unwrap()
 });

 static DP: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(
 r"(?i)\b(?:development\s+permit|dp)\s*(?:no\.?)?\s*#?\s*([0-9]{4})[/\-]([0-9]+)\b",
 )
.unwrap()
 });

 /// Normalize one identifier fragment to a canonical comparable form:
 /// `"Bylaw No. 1160"` -> `"Bylaw 1160"`, `"Rezoning Application No.
 /// 2025/01"` -> `"REZ 2025-01"`, likewise TUP/DVP/DP. Amendment bylaws
 /// take precedence over the base bylaw name they amend.
 ///
 /// `normalize_identifier` is idempotent (P7): re-normalizing an
 /// already-normalized string returns it unchanged.
 pub fn normalize_identifier(raw: &str) -> String {
 let trimmed = raw.trim();

 if let Some(caps) = AMENDMENT_BYLAW.captures(trimmed) {
 return format!("Bylaw {}", &caps[1]);
 }
 if let Some(caps) = REZONING.captures(trimmed) {
 return format!("REZ {}-{}", &caps[1], &caps[2]);
 }
 if let Some(caps) = REZ_SHORT.captures(trimmed) {
 return format!("REZ {}-{}", &caps[1], &caps[2]);
 }
 if let Some(caps) = TUP.captures(trimmed) {
 return format!("TUP {}-{}", &caps[1], &caps[2]);
 }
 if let Some(caps) = DVP.captures(trimmed) {
 return format!("DVP {}-{}", &caps[1], &caps[2]);
 }
 if let Some(caps) = DP.captures(trimmed) {
 return format!("DP {}-{}", &caps[1], &caps[2]);
 }
 if let Some(caps) = BYLAW_NO.captures(trimmed) {
 return format!("Bylaw {}", &caps[1]);
 }

 trimmed.to_string()
 }

 /// Split a compound identifier (`"Bylaw No. 1160; REZ 2025-01"`) on
 /// `;` and normalize each part.
 pub fn parse_compound_identifier(raw: &str) -> Vec<String> {
 raw.split(';')
.map(|part| part.trim())
.filter(|part| !part.is_empty())
.map(normalize_identifier)
.collect()
 }

 /// Extract the single dominant identifier from free text, honoring
 /// amendment precedence: `"Amendment Bylaw No. 1101 to Zoning Bylaw
 /// No. 900"` resolves to `"Bylaw 1101"`, not the base bylaw it amends.
 pub fn extract_identifier_from_text(text: &str) -> Option<String> {
 if let Some(caps) = AMENDMENT_BYLAW.captures(text) {
 return Some(format!("Bylaw {}", &caps[1]));
 }
 for re in [&*REZONING, &*REZ_SHORT] {
 if let Some(caps) = re.captures(text) {
 return Some(format!("REZ {}-{}", &caps[1], &caps[2]));
 }
 }
 if let Some(caps) = TUP.captures(text) {
 return Some(format!("TUP {}-{}", &caps[1], &caps[2]));
 }
 if let Some(caps) = DVP.captures(text) {
 return Some(format!("DVP {}-{}", &caps[1], &caps[2]));
 }
 if let Some(caps) = DP.captures(text) {
 return Some(format!("DP {}-{}", &caps[1], &caps[2]));
 }
 if let Some(caps) = BYLAW_NO.captures(text) {
 return Some(format!("Bylaw {}", &caps[1]));
 }
 None
 }

 #[cfg(test)]
 mod tests {
 use super::*;

 #[test]
 fn normalizes_bylaw_no() {
 assert_eq!(normalize_identifier("Bylaw No. 1160"), "Bylaw 1160");
 }

 #[test]
 fn normalizes_rezoning() {
 assert_eq!(
 normalize_identifier("Rezoning Application No. 2025/01"),
 "REZ 2025-01"
 );
 }

 #[test]
 fn normalization_is_idempotent() {
 let once = normalize_identifier("Bylaw No. 1160");
 let twice = normalize_identifier(&once);
 assert_eq!(once, twice);
 }

 #[test]
 fn amendment_precedence() {
 assert_eq!(
 extract_identifier_from_text(
 "Amendment Bylaw No. 1101 to Zoning Bylaw No. 900"
 ),
 Some("Bylaw 1101".to_string())
 );
 }

 #[test]
 fn parses_compound() {
 let parts = parse_compound_identifier("Bylaw No. 1160; REZ 2025-01");
 assert_eq!(parts, vec!["Bylaw 1160", "REZ 2025-01"]);
 }
 }
}

/// Street-address normalization for the matter matcher's address index.
pub mod address {
 use super::*;

 static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
 Regex::new(r"(?i)\b(\d+[a-z]?)\s+([A-Za-z][A-Za-z'\.]*(?:\s+[A-Za-z][A-Za-z'\.]*)*)\s+(street|st|avenue|ave|road|rd|drive|dr|boulevard|blvd|way|lane|ln|place|pl|court|ct|crescent|cres)\b\.?").unwrap()
 });

 const NON_ADDRESS_PREFIXES: &[&str] = &["various", "n/a", "tbd", "multiple"];

 fn normalize_street_type(raw: &str) -> &'static str {
 match raw.to_lowercase().as_str() {
 "st" | "street" => "street",
 "ave" | "avenue" => "avenue",
 "rd" | "road" => "road",
 "dr" | "drive" => "drive",
 "blvd" | "boulevard" => "boulevard",
 "way" => "way",
 "ln" | "lane" => "lane",
 "pl" | "place" => "place",
 "ct" | "court" => "court",
 "cres" | "crescent" => "crescent",
 _ => "street",
 }
 }

 /// Whether a raw related-address string is a placeholder rather than
 /// a real address ("various", "n/a", "tbd",...).
 pub fn is_placeholder(raw: &str) -> bool {
 let lower = raw.trim().to_lowercase();
 NON_ADDRESS_PREFIXES
.iter()
.any(|p| lower.starts_with(p))
 }

 /// Extract and normalize `<number> <CapName+> <StreetType>` from free
 /// text, lowercased, street-type abbreviations expanded.
 pub fn extract_normalized(raw: &str) -> Option<String> {
 let caps = ADDRESS_RE.captures(raw)?;
 let number = caps.get(1)?.as_str().to_lowercase();
 let name = caps.get(2)?.as_str().to_lowercase();
 let street_type = normalize_street_type(caps.get(3)?.as_str());
 Some(format!("{number} {name} {street_type}"))
 }

 #[cfg(test)]
 mod tests {
 use super::*;

 #[test]
 fn normalizes_abbreviated_street_type() {
 assert_eq!(
 extract_normalized("258 Helmcken Rd"),
 Some("258 helmcken road".to_string())
 );
 }

 #[test]
 fn detects_placeholders() {
 assert!(is_placeholder("Various"));
 assert!(is_placeholder("TBD"));
 assert!(!is_placeholder("258 Helmcken Road"));
 }
 }
}
