//! Polling waiter for long-running cloud operations
//!
//! A getter is polled until it reports [`Poll::Ready`], the deadline passes,
//! the context is cancelled, or it fails with a non-retryable error. Polls are
//! strictly sequential, spaced by a fixed retry interval, and the loop only
//! suspends inside the getter and the interval sleep.

use crate::classify::Classify;
use crate::context::Context;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Retry interval for fast-settling resources (load balancers, IAM)
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Retry interval for slow resources (clusters, node pools, certificates)
pub const SLOW_RETRY_INTERVAL: Duration = Duration::from_secs(30);

static RETRY_INTERVAL_OVERRIDE_MS: AtomicU64 = AtomicU64::new(0);

/// Force every waiter in the process onto `interval`; `None` restores the
/// per-resource defaults. Used to replay recorded sessions quickly.
pub fn set_retry_interval_override(interval: Option<Duration>) {
    let ms = interval.map(|d| d.as_millis().max(1) as u64).unwrap_or(0);
    RETRY_INTERVAL_OVERRIDE_MS.store(ms, Ordering::Relaxed);
}

pub fn effective_retry_interval(default: Duration) -> Duration {
    match RETRY_INTERVAL_OVERRIDE_MS.load(Ordering::Relaxed) {
        0 => default,
        ms => Duration::from_millis(ms),
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum Poll<T> {
    /// Not terminal yet; carries the observed status for logs
    Pending(String),
    Ready(T),
}

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl WaitOptions {
    /// Options with the process-wide interval override applied
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout,
            retry_interval: effective_retry_interval(retry_interval),
        }
    }
}

#[derive(Error, Debug)]
pub enum WaitError<E> {
    #[error("timeout while waiting for {what} (last status: {last_status})")]
    Timeout { what: String, last_status: String },

    #[error("cancelled while waiting for {0}")]
    Cancelled(String),

    #[error(transparent)]
    Failed(E),
}

/// Poll `get` until ready
///
/// The deadline is the earlier of `opts.timeout` from now and the context
/// deadline. Once it has passed no further poll is issued. Rate-limit and
/// forbidden errors are retried; any other error ends the wait.
pub async fn wait_for<T, E, F, Fut>(
    ctx: &Context,
    what: &str,
    opts: WaitOptions,
    mut get: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, E>>,
    E: Classify + fmt::Display,
{
    let mut deadline = Instant::now() + opts.timeout;
    if let Some(ctx_deadline) = ctx.deadline() {
        deadline = deadline.min(ctx_deadline);
    }
    let timeout = |last_status: &str| WaitError::Timeout {
        what: what.to_string(),
        last_status: if last_status.is_empty() {
            "unknown".to_string()
        } else {
            last_status.to_string()
        },
    };

    let mut last_status = String::new();
    let mut attempt: u32 = 0;
    loop {
        if ctx.is_cancelled() {
            return Err(WaitError::Cancelled(what.to_string()));
        }
        if Instant::now() >= deadline {
            return Err(timeout(&last_status));
        }

        attempt += 1;
        let polled = tokio::select! {
            biased;
            _ = ctx.token().cancelled() => return Err(WaitError::Cancelled(what.to_string())),
            _ = tokio::time::sleep_until(deadline) => return Err(timeout(&last_status)),
            r = get() => r,
        };

        match polled {
            Ok(Poll::Ready(value)) => {
                tracing::debug!(what, attempt, "wait finished");
                return Ok(value);
            }
            Ok(Poll::Pending(status)) => {
                tracing::debug!(what, attempt, status = %status, "still waiting");
                last_status = status;
            }
            Err(e) if e.kind().is_retryable_while_waiting() => {
                tracing::warn!(what, attempt, error = %e, "retryable error while waiting");
            }
            Err(e) => return Err(WaitError::Failed(e)),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timeout(&last_status));
        }
        if ctx.sleep(opts.retry_interval.min(remaining)).await.is_err() {
            return Err(WaitError::Cancelled(what.to_string()));
        }
    }
}
