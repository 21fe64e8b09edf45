//! Best-effort wall-clock bound for one engine invocation
//!
//! The bound is a cancellation contract, not a signal: the wrapped future is
//! raced against the runtime timer and dropped when the deadline fires. Work
//! the engine has offloaded to the blocking pool is abandoned at its current
//! point of execution (partial artifacts may remain on disk), but the caller
//! always regains control within bounded latency, the timer is dropped on
//! every exit path, and at most one timeout is attributed per invocation.

use std::future::Future;
use std::time::Duration;

use crate::error::FakesmithError;

/// Run `operation` under a wall-clock deadline of `seconds`.
///
/// `seconds == 0` means unbounded.
pub async fn with_time_limit<F, T>(seconds: u64, operation: F) -> Result<T, FakesmithError>
where
    F: Future<Output = T>,
{
    if seconds == 0 {
        return Ok(operation.await);
    }
    tokio::time::timeout(Duration::from_secs(seconds), operation)
        .await
        .map_err(|_elapsed| FakesmithError::Timeout { seconds })
}
