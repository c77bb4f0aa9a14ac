//! Retry policy for gateway calls
//!
//! Timeouts are retried exactly once with the same payload. Every other
//! failure is returned to the caller untouched.

use std::future::Future;

use crate::errors::Result;

/// Run `op`, and run it a second time if the first attempt timed out
pub async fn retry_once_on_timeout<T, F, Fut>(operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e) if e.is_timeout() => {
            tracing::warn!(
                operation = operation,
                error = %e,
                "Gateway call timed out, retrying once"
            );
            crate::metrics::record_retry(operation);
            op().await
        }
        other => other,
    }
}
