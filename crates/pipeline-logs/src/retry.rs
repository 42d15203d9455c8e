//! Wait primitives.
//!
//! Two disciplines coexist: [`retry_until`] waits a bounded time for
//! something to be *created* (a pipeline, a stage pod), [`poll_until`] waits
//! without a deadline for something already assigned to *start*, and can only
//! be stopped through its cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{LogsError, Result};

/// Interval between catalog reloads and stage pod lookups.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between pod reads while waiting for a container to start.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A bounded retry ran out of time
#[derive(Debug)]
pub struct Expired<E> {
    pub elapsed: Duration,
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or `timeout` has elapsed.
///
/// The first attempt happens immediately. Every failed attempt counts
/// against the timeout, whatever the failure was. On expiry the error of the
/// last attempt is returned together with the elapsed time.
pub async fn retry_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut op: F,
) -> std::result::Result<T, Expired<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Err(Expired {
                        elapsed,
                        attempts,
                        last_error: e,
                    });
                }
                debug!(attempt = attempts, error = %e, "Retrying in {:?}", interval);
                sleep(interval.min(timeout - elapsed)).await;
            }
        }
    }
}

/// Poll `op` every `interval` until it yields a value.
///
/// There is no deadline. `op` returning an error stops the poll with that
/// error; cancelling `cancel` stops it with [`LogsError::Cancelled`].
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    loop {
        tokio::select! {
            () = cancel.cancelled() => return Err(LogsError::Cancelled(what.to_string())),
            () = sleep(interval) => {}
        }
        if let Some(value) = op().await? {
            return Ok(value);
        }
    }
}
