// civic-pipeline - civic-records ingestion pipeline engine
//
// Orchestrates discovery, acquisition, diarization, LLM-driven extraction
// and refinement, entity resolution, and vector embedding of municipal
// meeting records. See SPEC_FULL.md for the full module map and DESIGN.md
// for the grounding ledger against the teacher codebase this crate was
// transformed from.

pub mod acquirer;
pub mod aligner;
pub mod batch;
pub mod blob;
pub mod change_detector;
pub mod config;
pub mod contracts;
pub mod diarizer;
pub mod embedder;
pub mod embeddings;
pub mod error;
pub mod extraction;
pub mod geocoder;
pub mod ingester;
pub mod llm;
pub mod matter_matcher;
pub mod observability;
pub mod orchestrator;
pub mod refiner;
pub mod store;
pub mod types;
pub mod validation;

// Re-export observability primitives (stderr convention plus
// `tracing` initialization).
pub use observability::{
 debug_line, info_line, init_logging, init_logging_with_level, record_metric, success_line,
 warn_line, MetricType, Operation,
};

// Re-export the data model and external capability contracts ( §6).
pub use contracts::{
 AgendaItem, Attendance, BatchJobState, Bylaw, BylawChunk, ChangeEntry, ChangeReport, Document,
 DocumentImage, DocumentSection, ExtractedDocument, KeyStatement, Matter, Meeting,
 MeetingSpeakerAlias, Membership, Motion, Municipality, NewMeeting, Organization, Person,
 TranscriptSegment, Vote, VoiceFingerprint,
};
pub use contracts::{
 BlobStore, Geocoder, Llm, Notifier, Scraper, SpeakerPipeline, SpeechToText, Store,
 VideoCatalog,
};

// Re-export validated types (invariants enforced at construction).
pub use types::{
 ArchivePath, AttendanceMode, DocumentType, ItemOrder, MediaTimestamp, MeetingStatus,
 MotionDisposition, MotionResult, OrganizationClass, RelativeFilePath, StatementType,
 ValidatedTitle, VoteChoice,
};

// Re-export configuration.
pub use config::{AppConfig, MunicipalityConfig};

// Re-export error handling.
pub use error::{with_retry, PipelineError, TRANSIENT_RETRY_DELAY};

// Re-export the orchestrator's public entry points.
pub use orchestrator::{
 run, run_target, run_update, MeetingOutcome, OrchestratorDeps, Phases, RunFlags, RunReport,
};

// Re-export concrete external-collaborator implementations this crate
// carries : the Postgres store, the Gemini LLM client, the
// OpenAI-compatible embedding provider, the geocoder, and blob stores.
pub use blob::{InMemoryBlobStore, S3BlobStore};
pub use embeddings::{EmbeddingConfig, EmbeddingProvider, EmbeddingResult, OpenAIEmbeddingProvider};
pub use geocoder::NominatimGeocoder;
pub use llm::GeminiClient;
pub use store::{PgStore, PgStoreConfig};

// Re-export the matter matcher and embedder constants (§4.11).
pub use embedder::EMBEDDABLE_TABLES;
pub use matter_matcher::MatterMatcher;
