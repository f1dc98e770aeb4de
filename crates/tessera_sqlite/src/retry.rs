//! Bounded retry of busy statements.
//!
//! Every engine result is classified into an [`Attempt`]: done, busy, or a fatal
//! [`DatabaseError`]. A [`RetryPolicy`] reruns busy attempts a bounded number of times,
//! sleeping between tries as its [`Backoff`] dictates, and reports
//! [`DatabaseError::Busy`] once the budget is spent.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tessera_core::{DatabaseError, DbResult};
use tracing::{trace, warn};

/// Outcome of a single try.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation completed.
    Done(T),
    /// The engine reported lock contention; trying again may succeed.
    Busy,
    /// The operation failed for a reason retrying would not fix.
    Fatal(DatabaseError),
}

impl<T> Attempt<T> {
    /// Converts into a result, mapping `Busy` to [`DatabaseError::Busy`].
    pub fn into_result(self, context: &str) -> DbResult<T> {
        match self {
            Self::Done(value) => Ok(value),
            Self::Busy => Err(DatabaseError::busy(context)),
            Self::Fatal(err) => Err(err),
        }
    }
}

/// Returns true if the engine error reports lock contention.
#[must_use]
pub fn is_busy_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy
    )
}

/// Maps an engine error onto the failure taxonomy.
pub fn engine_error(context: &str, err: rusqlite::Error) -> DatabaseError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy => {
            DatabaseError::busy(context)
        }
        rusqlite::Error::SqliteFailure(e, message) => DatabaseError::engine(
            context,
            e.extended_code,
            message.unwrap_or_else(|| e.to_string()),
        ),
        other => DatabaseError::engine(context, -1, other.to_string()),
    }
}

/// Classifies an engine result.
pub fn classify<T>(context: &str, result: rusqlite::Result<T>) -> Attempt<T> {
    match result {
        Ok(value) => Attempt::Done(value),
        Err(err) if is_busy_error(&err) => Attempt::Busy,
        Err(err) => Attempt::Fatal(engine_error(context, err)),
    }
}

/// Delay strategy between busy retries.
pub trait Backoff: Send + Sync + fmt::Debug {
    /// Returns how long to wait before retry number `attempt` (starting at 1).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Same pause before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff(pub Duration);

impl Default for FixedBackoff {
    fn default() -> Self {
        Self(Duration::from_millis(10))
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Pause doubling with every retry, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Pause before the first retry.
    pub initial: Duration,
    /// Upper bound for any single pause.
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(250),
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << shift)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Bounded retry of busy attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the first try.
    pub max_retries: u32,
    /// Delay strategy.
    pub backoff: Arc<dyn Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 100,
            backoff: Arc::new(FixedBackoff::default()),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(max_retries: u32, backoff: impl Backoff + 'static) -> Self {
        Self {
            max_retries,
            backoff: Arc::new(backoff),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0, FixedBackoff(Duration::ZERO))
    }

    /// Runs `op` until it is done, fails, or the retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the fatal error of the last try, or `Busy` once all retries came back busy.
    pub fn run<T>(&self, context: &str, op: impl FnMut() -> Attempt<T>) -> DbResult<T> {
        self.run_observed(context, op, |_| {})
    }

    /// Like [`RetryPolicy::run`], calling `on_busy(retry)` before each retry and
    /// `on_busy(0)` when giving up.
    pub(crate) fn run_observed<T>(
        &self,
        context: &str,
        mut op: impl FnMut() -> Attempt<T>,
        mut on_busy: impl FnMut(u32),
    ) -> DbResult<T> {
        let mut retry = 0;
        loop {
            match op() {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Busy if retry < self.max_retries => {
                    retry += 1;
                    on_busy(retry);
                    trace!(context, retry, "database busy, retrying");
                    thread::sleep(self.backoff.delay(retry));
                }
                Attempt::Busy => {
                    on_busy(0);
                    warn!(context, retries = retry, "database still busy, giving up");
                    return Err(DatabaseError::busy(context));
                }
            }
        }
    }
}
