//! Bounded "retry until a predicate holds" primitive shared by every resolver.
//!
//! The loop checks the cancellation token and the wall-clock deadline before
//! each attempt and never starts an attempt at or past the deadline. Sleeps are
//! clamped to the time remaining so a never-matching predicate fails at the
//! deadline rather than up to one interval later.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors raised when poll settings are unusable.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum PollSettingsError {
    /// Raised when the interval between attempts is zero.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    /// Raised when the overall window is zero.
    #[error("poll timeout must be greater than zero")]
    ZeroTimeout,
}

/// Interval and deadline for one polling operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSettings {
    interval: Duration,
    timeout: Duration,
}

impl PollSettings {
    /// Creates settings, rejecting zero durations.
    ///
    /// # Errors
    ///
    /// Returns [`PollSettingsError`] when either duration is zero.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, PollSettingsError> {
        if interval.is_zero() {
            return Err(PollSettingsError::ZeroInterval);
        }
        if timeout.is_zero() {
            return Err(PollSettingsError::ZeroTimeout);
        }
        Ok(Self { interval, timeout })
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall window measured from the first attempt.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Outcome of a poll that did not produce a value.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PollError<E> {
    /// The predicate never held within the window.
    #[error("no result after {attempts} attempts over {waited:?}")]
    TimedOut {
        /// Attempts made before the deadline.
        attempts: u32,
        /// Time elapsed since the first attempt.
        waited: Duration,
    },
    /// The cancellation token fired.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
    /// An attempt failed; attempts are not retried on error.
    #[error("attempt failed: {0}")]
    Failed(E),
}

/// Runs `attempt` until it yields `Some`, fails, is cancelled or times out.
///
/// `attempt` receives the one-based attempt number. `Ok(None)` means "not yet"
/// and is retried after the interval; `Err` aborts immediately.
///
/// # Errors
///
/// Returns [`PollError::TimedOut`] when the window closes without a value,
/// [`PollError::Cancelled`] when `cancel` fires and [`PollError::Failed`]
/// with the first attempt error.
pub async fn poll_until<T, E, F, Fut>(
    settings: PollSettings,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts });
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::TimedOut {
                attempts,
                waited: now.duration_since(started),
            });
        }

        attempts = attempts.saturating_add(1);
        debug!(attempt = attempts, "polling");
        if let Some(value) = attempt(attempts).await.map_err(PollError::Failed)? {
            return Ok(value);
        }

        let pause = settings
            .interval
            .min(deadline.saturating_duration_since(Instant::now()));
        tokio::select! {
            () = cancel.cancelled() => return Err(PollError::Cancelled { attempts }),
            () = sleep(pause) => {}
        }
    }
}
