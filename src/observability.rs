// Observability
// Structured logging/tracing initialization, plus the pipeline's
// operation-kind enum for spans. The `[!]`/`[+]`/`[i]` stderr prefixes are
// layered on top of `tracing`, not a replacement for it: `tracing` drives
// structured fields and filtering, the prefixes are a cheap human-readable
// summary of the same event emitted alongside it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize logging with the default (non-verbose, non-quiet) level.
pub fn init_logging() -> Result<()> {
 init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity, mirroring the CLI's
/// `--verbose`/`--quiet` flags.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("civic_pipeline=debug,info")
    } else {
        EnvFilter::new("civic_pipeline=info,warn")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(false)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("[i] civic-pipeline observability initialized");
            }
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// Print a user-visible status line stderr convention.
/// `tracing` carries the structured event alongside it; these macros are
/// the plain-text surface operators actually watch during a run.
pub fn warn_line(message: impl std::fmt::Display) {
 eprintln!("[!] {message}");
 ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
}

pub fn success_line(message: impl std::fmt::Display) {
 eprintln!("[+] {message}");
 OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
}

pub fn info_line(message: impl std::fmt::Display) {
 eprintln!("[i] {message}");
}

/// Alignment traces: off by default in production, shown only under
/// `--verbose`.
pub fn debug_line(verbose: bool, message: impl std::fmt::Display) {
 if verbose {
 eprintln!("DEBUG: {message}");
 }
}

/// Pipeline phases and sub-steps, used as `tracing::instrument` span names
/// and as the unit of per-meeting failure isolation ("a raised
/// exception is logged and the orchestrator continues with the next
/// meeting").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
 Scrape {
 municipality_slug: String,
 },
 Acquire {
 archive_path: String,
 },
 Diarize {
 archive_path: String,
 },
 ExtractDocuments {
 archive_path: String,
 },
 Refine {
 archive_path: String,
 },
 Align {
 archive_path: String,
 },
 Ingest {
 archive_path: String,
 },
 Embed {
 table: String,
 batch_size: usize,
 },
 BatchWave {
 phase: String,
 wave_index: usize,
 },
}

impl Operation {
 pub fn label(&self) -> String {
 match self {
 Operation::Scrape { municipality_slug } => format!("scrape:{municipality_slug}"),
 Operation::Acquire { archive_path } => format!("acquire:{archive_path}"),
 Operation::Diarize { archive_path } => format!("diarize:{archive_path}"),
 Operation::ExtractDocuments { archive_path } => {
 format!("extract_documents:{archive_path}")
 }
 Operation::Refine { archive_path } => format!("refine:{archive_path}"),
 Operation::Align { archive_path } => format!("align:{archive_path}"),
 Operation::Ingest { archive_path } => format!("ingest:{archive_path}"),
 Operation::Embed { table, batch_size } => format!("embed:{table}[{batch_size}]"),
 Operation::BatchWave { phase, wave_index } => {
 format!("batch:{phase}#{wave_index}")
 }
 }
 }
}

/// Metric kinds the embedder/batch extractor report progress with.
#[derive(Debug, Clone)]
pub enum MetricType {
 Counter { name: &'static str, value: u64 },
 Gauge { name: &'static str, value: f64 },
 Timer { name: &'static str, duration: Duration },
}

pub fn record_metric(metric: MetricType) {
 match metric {
 MetricType::Counter { name, value } => tracing::debug!("metric.counter {name} = {value}"),
 MetricType::Gauge { name, value } => tracing::debug!("metric.gauge {name} = {value}"),
 MetricType::Timer { name, duration } => {
 tracing::debug!("metric.timer {name} = {duration:?}")
 }
 }
}

pub fn operation_counts() -> (u64, u64) {
 (
 OPERATION_COUNTER.load(Ordering::Relaxed),
 ERROR_COUNTER.load(Ordering::Relaxed),
 )
}

#[cfg(test)]
mod tests {
 use super::*;

 #[test]
 fn default_filter_parses() {
 assert!(EnvFilter::try_new("civic_pipeline=info,warn").is_ok());
 }

 #[test]
 fn verbose_filter_parses() {
 assert!(EnvFilter::try_new("civic_pipeline=debug,info").is_ok());
 }

 #[test]
 fn operation_label_includes_path() {
 let op = Operation::Ingest {
 archive_path: "Council/2026/01/2026-01-05 Regular".to_string(),
 };
 assert_eq!(op.label(), "ingest:Council/2026/01/2026-01-05 Regular");
 }
}
