// Validated Types
// Strongly-typed wrappers that enforce invariants at construction time, so
// malformed identifiers/paths/orders can't silently flow through the pipeline.

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A meeting's canonical relative archive path, validated against directory
/// traversal and platform path-length limits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchivePath {
 inner: String,
}

impl ArchivePath {
 const MAX_LENGTH: usize = 4096;

 pub fn new(path: impl AsRef<str>) -> Result<Self> {
 let raw = path.as_ref().trim();
 ensure!(!raw.is_empty(), "archive path cannot be empty");
 ensure!(
 raw.len() < Self::MAX_LENGTH,
 "archive path exceeds {} bytes",
 Self::MAX_LENGTH
 );
 ensure!(!raw.contains('\0'), "archive path contains null bytes");

 let normalized = raw.replace('\\', "/");
 let normalized = normalized.trim_matches('/');
 for component in Path::new(normalized).components() {
 if matches!(component, Component::ParentDir) {
 bail!("archive path contains a parent-directory reference: {raw}");
 }
 }

 Ok(Self {
 inner: normalized.to_string(),
 })
 }

 pub fn as_str(&self) -> &str {
 &self.inner
 }

 /// Strip everything up to and including a municipality's archive-root
 /// marker. Idempotent: calling this again on an already-relative path
 /// is a no-op.
 pub fn relative_to_root(full_path: &str, root_marker: &str) -> Result<Self> {
 let full_path = full_path.replace('\\', "/");
 let relative = match full_path.find(root_marker) {
 Some(idx) => &full_path[idx + root_marker.len()..],
 None => &full_path,
 };
 Self::new(relative)
 }
}

impl fmt::Display for ArchivePath {
 fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
 write!(f, "{}", self.inner)
 }
}

/// An agenda item order string (e.g. `"8.1"`, `"8.1.a"`), comparable by
/// natural order: numeric segments compare numerically, not lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemOrder {
 inner: String,
}

impl ItemOrder {
 pub fn new(raw: impl Into<String>) -> Result<Self> {
 let raw = raw.into();
 let trimmed = raw.trim();
 ensure!(!trimmed.is_empty(), "item order cannot be empty");
 Ok(Self {
 inner: trimmed.to_string(),
 })
 }

 pub fn as_str(&self) -> &str {
 &self.inner
 }

 fn segments(&self) -> Vec<Segment> {
 natural_segments(&self.inner)
 }
}

impl fmt::Display for ItemOrder {
 fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
 write!(f, "{}", self.inner)
 }
}

impl PartialOrd for ItemOrder {
 fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
 Some(self.cmp(other))
 }
}

impl Ord for ItemOrder {
 fn cmp(&self, other: &Self) -> Ordering {
 compare_segments(&self.segments, &other.segments)
 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
 Num(u64),
 Text(String),
}

fn natural_segments(s: &str) -> Vec<Segment> {
 let mut segments = Vec::new();
 let mut chars = s.chars().peekable();
 while let Some(&c) = chars.peek {
 if c.is_ascii_digit() {
 let mut num = String::new();
 while let Some(&d) = chars.peek {
 if d.is_ascii_digit() {
 num.push(d);
 chars.next();
 } else {
 break;
 }
 }
 segments.push(Segment::Num(num.parse().unwrap_or(0)));
 } else if c == '.' || c == '-' || c.is_whitespace() {
 chars.next();
 } else {
 let mut text = String::new();
 while let Some(&d) = chars.peek {
 if d.is_ascii_digit() || d == '.' || d == '-' || d.is_whitespace() {
 break;
 }
 text.push(d.to_ascii_lowercase());
 chars.next();
 }
 segments.push(Segment::Text(text));
 }
 }
 segments
}

fn compare_segments(a: &[Segment], b: &[Segment]) -> Ordering {
 for (sa, sb) in a.iter().zip(b.iter()) {
 let ord = match (sa, sb) {
 (Segment::Num(na), Segment::Num(nb)) => na.cmp(nb),
 (Segment::Text(ta), Segment::Text(tb)) => ta.cmp(tb),
 (Segment::Num(_), Segment::Text(_)) => Ordering::Less,
 (Segment::Text(_), Segment::Num(_)) => Ordering::Greater,
 };
 if ord != Ordering::Equal {
 return ord;
 }
 }
 a.len().cmp(&b.len())
}

/// A meeting's lifecycle state. Monotonic under re-ingest (I5): an
/// `Occurred`/`Completed` meeting can never be downgraded to `Planned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeetingStatus {
 Planned,
 Occurred,
 Completed,
}

impl MeetingStatus {
 pub fn merge_upgrade_only(current: Self, proposed: Self) -> Self {
 current.max(proposed)
 }
}

impl fmt::Display for MeetingStatus {
 fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
 let s = match self {
 MeetingStatus::Planned => "Planned",
 MeetingStatus::Occurred => "Occurred",
 MeetingStatus::Completed => "Completed",
 };
 write!(f, "{s}")
 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationClass {
 Council,
 Board,
 Committee,
 AdvisoryCommittee,
 Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceMode {
 InPerson,
 Remote,
 Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
 Yes,
 No,
 Abstain,
 Recused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionResult {
 Carried,
 Defeated,
 Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionDisposition {
 Substantive,
 Procedural,
 Tabled,
 Referred,
 Amended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementType {
 Claim,
 Proposal,
 Objection,
 Recommendation,
 Financial,
 PublicInput,
}

impl StatementType {
 /// Repair-layer default: unrecognized values fall back to `Claim`
 /// rather than failing the whole refinement.
 pub fn parse_lenient(raw: &str) -> Self {
 match raw.trim().to_ascii_lowercase().as_str() {
 "proposal" => StatementType::Proposal,
 "objection" => StatementType::Objection,
 "recommendation" => StatementType::Recommendation,
 "financial" => StatementType::Financial,
 "public_input" | "public input" => StatementType::PublicInput,
 _ => StatementType::Claim,
 }
 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
 Agenda,
 Minutes,
 StaffReport,
 Delegation,
 Correspondence,
 Appendix,
 Bylaw,
 Presentation,
 Form,
 Other,
}

/// A bounded-length, non-empty title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedTitle {
 inner: String,
}

impl ValidatedTitle {
 const MAX_LENGTH: usize = 2048;

 pub fn new(title: impl Into<String>) -> Result<Self> {
 let title = title.into();
 let trimmed = title.trim();
 ensure!(!trimmed.is_empty(), "title cannot be empty");
 ensure!(
 trimmed.len() <= Self::MAX_LENGTH,
 "title exceeds {} characters",
 Self::MAX_LENGTH
 );
 Ok(Self {
 inner: trimmed.to_string(),
 })
 }

 pub fn as_str(&self) -> &str {
 &self.inner
 }
}

impl fmt::Display for ValidatedTitle {
 fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
 write!(f, "{}", self.inner)
 }
}

/// A media timestamp in seconds-from-media-start. Non-negative and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaTimestamp(f64);

impl MediaTimestamp {
 pub fn new(seconds: f64) -> Result<Self> {
 ensure!(seconds.is_finite(), "timestamp must be finite");
 ensure!(seconds >= 0.0, "timestamp must be non-negative: {seconds}");
 Ok(Self(seconds))
 }

 pub fn seconds(&self) -> f64 {
 self.0
 }
}

impl fmt::Display for MediaTimestamp {
 fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
 write!(f, "{:.2}s", self.0)
 }
}

/// A relative filesystem path under a municipality's archive root, used by
/// the acquirer/scraper boundary. Distinct from `ArchivePath`: this one may
/// point at a file inside a meeting folder (e.g. `Audio/meeting.wav`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeFilePath {
 inner: PathBuf,
}

impl RelativeFilePath {
 pub fn new(path: impl AsRef<Path>) -> Result<Self> {
 let path = path.as_ref();
 ensure!(path.is_relative(), "expected a relative path: {path:?}");
 for component in path.components() {
 if matches!(component, Component::ParentDir) {
 bail!("path contains a parent-directory reference: {path:?}");
 }
 }
 Ok(Self {
 inner: path.to_path_buf(),
 })
 }

 pub fn as_path(&self) -> &Path {
 &self.inner
 }
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn item_order_natural_sort() {
 let mut orders: Vec<ItemOrder> = ["8.10", "8.2", "8.1.a", "8.1", "9"]
.iter()
.map(|s| ItemOrder::new(*s).unwrap())
.collect();
 orders.sort();
 let rendered: Vec<&str> = orders.iter().map(|o| o.as_str()).collect();
 assert_eq!(rendered, vec!["8.1", "8.1.a", "8.2", "8.10", "9"]);
 }

 #[test]
 fn archive_path_rejects_traversal() {
 assert!(ArchivePath::new("Council/2026/01/../secrets").is_err());
 }

 #[test]
 fn archive_path_relative_to_root_idempotent() {
 let root = "/srv/archive/";
 let full = "/srv/archive/Council/2026/01/2026-01-05 Regular/Agenda/a.pdf";
 let once = ArchivePath::relative_to_root(full, root).unwrap();
 let twice = ArchivePath::relative_to_root(once.as_str(), root).unwrap();
 assert_eq!(once, twice);
 assert_eq!(
 once.as_str(),
 "Council/2026/01/2026-01-05 Regular/Agenda/a.pdf"
 );
 }

 #[test]
 fn status_merge_never_downgrades() {
 let upgraded =
 MeetingStatus::merge_upgrade_only(MeetingStatus::Completed, MeetingStatus::Planned);
 assert_eq!(upgraded, MeetingStatus::Completed);
 }

 #[test]
 fn statement_type_lenient_default() {
 assert_eq!(StatementType::parse_lenient("garbage"), StatementType::Claim);
 assert_eq!(
 StatementType::parse_lenient("Public Input"),
 StatementType::PublicInput
 );
 }
}
