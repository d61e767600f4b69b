// Pipeline error kinds. Mirrors validation::ValidationError's
// shape: a closed, named enum with `#[error(...)]` messages rather than
// stringly-typed anyhow contexts, because call sites need to match on kind
// to decide retry/skip/abort.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
 /// HTTP 429/500/503, "overloaded", connection reset. One retry after
 /// 5s, then fail the single unit; never aborts the run.
 #[error("transient remote error calling {source}: {detail}")]
 TransientRemote { source: String, detail: String },

 /// 4xx other than rate-limit, or schema-invalid response after retry.
 #[error("fatal remote error calling {source}: {detail}")]
 FatalRemote { source: String, detail: String },

 /// Response is not parseable JSON, missing required fields, or an enum
 /// value outside the closed set.
 #[error("LLM structural error: {detail}")]
 LlmStructuralError { detail: String },

 /// File missing, PDF unreadable, transcript malformed.
 #[error("corruption in {unit}: {detail}")]
 Corruption { unit: String, detail: String },

 /// Unique-constraint violation on an upsert whose `on_conflict` target
 /// did not match the actual conflict.
 #[error("unexpected store conflict on {table}: {detail}")]
 StoreConflict { table: String, detail: String },

 /// Vote attributed to a non-council person; council member creation
 /// blocked because not in the election roster; implausible motion
 /// timestamp. The offending field is dropped, not the whole unit.
 #[error("validation rejection: {reason}")]
 ValidationRejection { reason: String },
}

impl PipelineError {
 pub fn transient(source: impl Into<String>, detail: impl Into<String>) -> Self {
 PipelineError::TransientRemote {
 source: source.into(),
 detail: detail.into(),
 }
 }

 pub fn fatal(source: impl Into<String>, detail: impl Into<String>) -> Self {
 PipelineError::FatalRemote {
 source: source.into(),
 detail: detail.into(),
 }
 }

 /// Whether this error kind is worth a single cooperative retry per
 /// ("one retry after 5s" / "one retry with an identical
 /// prompt").
 pub fn is_retryable(&self) -> bool {
 matches!(
 self,
 PipelineError::TransientRemote {.. } | PipelineError::LlmStructuralError {.. }
 )
 }
}

/// The retry delay for `TransientRemote`. `LlmStructuralError` retries
/// immediately with an identical prompt, so it isn't covered
/// here.
pub const TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Runs `op` once; on a retryable error, sleeps `TRANSIENT_RETRY_DELAY` and
/// tries exactly once more. A second failure is returned to the caller,
/// which must log it against the unit (meeting, batch request,
/// row) and move on rather than abort the run.
///
/// Grounded on `supabase_repository::job_worker::JobHeartbeat`'s "one
/// cooperative loop, no more" retry shape.
pub async fn with_retry<T, F, Fut>(unit: &str, mut op: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, PipelineError>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            warn!(unit, error = %err, "retrying after transient failure");
            // A little jitter on top of the fixed delay, same as the
            // teacher's retry wrappers, so a burst of failing units doesn't
            // all wake up and hammer the remote at once.
            let jitter = Duration::from_millis(rand::random::<u64>() % 100);
            tokio::time::sleep(TRANSIENT_RETRY_DELAY + jitter).await;
            op().await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_transient_errors_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), PipelineError> = with_retry("test-unit", move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(PipelineError::transient("llm", "503"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_fatal_errors() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<(), PipelineError> = with_retry("test-unit", move || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::fatal("llm", "400"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
