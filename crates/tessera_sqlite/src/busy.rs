//! Busy handler callbacks.
//!
//! The engine calls the busy handler synchronously whenever a statement runs into a
//! lock held by another connection. The argument is the number of times the handler
//! was already invoked for the same lock; returning `true` asks the engine to try
//! again, returning `false` makes the statement fail as busy.

use std::thread;
use std::time::Duration;

/// Busy handler signature.
pub type BusyHandler = fn(i32) -> bool;

/// Pause taken by [`default_busy_handler`] before each retry.
pub const DEFAULT_BUSY_SLEEP: Duration = Duration::from_millis(10);

/// Sleeps for [`DEFAULT_BUSY_SLEEP`] and always asks for another try.
pub fn default_busy_handler(_retries: i32) -> bool {
    thread::sleep(DEFAULT_BUSY_SLEEP);
    true
}

/// Gives up immediately; contention surfaces straight away as busy.
pub fn fail_fast_busy_handler(_retries: i32) -> bool {
    false
}
