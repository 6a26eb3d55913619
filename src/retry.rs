//! Bounded retry for saves.
//!
//! Saving can fail while the destination is held open or locked by another
//! process. Those failures clear up on their own, so the save is attempted
//! again after a short sleep, doubling the wait each time up to a cap.
//! Anything [`Transient::is_transient`] does not recognise is returned
//! straight away.
//!
//! The in-memory buffer is never touched by a failed attempt, so the
//! degradation applied by earlier steps is never lost to a retry.

use crate::codec::CodecError;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
    #[error(transparent)]
    Fatal(E),
}

/// Errors that may succeed when simply tried again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// I/O kinds that mean "busy or locked right now", not "broken".
pub fn is_transient_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ResourceBusy
    )
}

impl Transient for io::Error {
    fn is_transient(&self) -> bool {
        is_transient_kind(self.kind())
    }
}

impl Transient for CodecError {
    fn is_transient(&self) -> bool {
        CodecError::is_transient(self)
    }
}

/// How many times to attempt a save and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Never less than one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Retry without sleeping in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Wait before attempt `attempt + 1`, given `attempt` failures so far.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(50), Duration::from_secs(2))
    }
}

/// Run `op` until it succeeds, fails for good, or runs out of attempts.
///
/// `on_retry` is called with the failed attempt number, its error and the
/// wait before the next attempt.
pub fn retry_transient<T, E>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, E>,
    mut on_retry: impl FnMut(u32, &E, Duration),
) -> Result<T, RetryError<E>>
where
    E: Transient + std::error::Error + 'static,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Fatal(e)),
            Err(e) if attempt >= policy.max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                let wait = policy.backoff(attempt);
                tracing::warn!(attempt, ?wait, error = %e, "attempt failed, retrying");
                on_retry(attempt, &e, wait);
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
        }
    }
}
