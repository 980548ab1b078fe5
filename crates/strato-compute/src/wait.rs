//! Readiness polling with exponential backoff and cancellation.

use crate::error::ApiError;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backoff and budget for one wait.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay before the second check.
    pub initial_delay: Duration,
    /// Cap for the exponential growth.
    pub max_delay: Duration,
    /// Total time budget for the wait.
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Race a remote round trip against the caller's cancellation signal.
pub async fn cancellable<T>(
    operation: &'static str,
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ApiError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ApiError::cancelled(operation)),
        out = fut => Ok(out),
    }
}

/// Poll `check` until it reports ready, the time budget runs out, or the
/// caller cancels.
///
/// `Ok(false)` from `check` schedules another attempt after the next backoff
/// delay (exponential with jitter); any error from `check` ends the wait
/// immediately.
pub async fn wait_until<F, Fut>(
    config: WaitConfig,
    cancel: &CancellationToken,
    check: F,
    operation: &'static str,
) -> Result<(), ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, ApiError>>,
{
    let start = tokio::time::Instant::now();
    let mut attempts = 0u32;
    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        if cancel.is_cancelled() {
            return Err(ApiError::cancelled(operation));
        }
        if start.elapsed() >= config.timeout {
            return Err(ApiError::timeout(operation, config.timeout, attempts));
        }

        match check().await {
            Ok(true) => {
                debug!(operation, attempts, "condition reached");
                return Ok(());
            }
            Ok(false) => {
                let delay = delays.next().unwrap_or(config.max_delay);
                debug!(
                    operation,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "not ready, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(ApiError::cancelled(operation)),
                }
            }
            Err(e) => return Err(e),
        }
    }
}
