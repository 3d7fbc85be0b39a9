//! Bounded Waits
//!
//! Polls a condition at a fixed interval until it holds, the deadline
//! passes, or the wait is cancelled.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Poll interval and deadline of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Wait until `check` returns true.
///
/// The condition is polled immediately and then every `poll_interval`. A
/// poll at or past the deadline that still fails yields `Error::Timeout`.
/// Returns the time waited on success. Errors from `check` abort the wait.
pub async fn wait_until<F, Fut>(
    what: &str,
    policy: WaitPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if check().await? {
            let waited = started.elapsed();
            tracing::debug!("{} satisfied after {:?}", what, waited);
            return Ok(waited);
        }

        let waited = started.elapsed();
        if waited >= policy.deadline {
            tracing::warn!("Gave up waiting for {} after {:?}", what, waited);
            return Err(Error::Timeout {
                what: what.to_string(),
                waited,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.poll_interval) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        }
    }
}
