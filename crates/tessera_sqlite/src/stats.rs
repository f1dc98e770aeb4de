//! Backend statistics.
//!
//! Counters are atomic and can be read while statements are running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Backend counters.
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Statements executed successfully.
    statements: AtomicU64,
    /// Transactions committed.
    transactions_committed: AtomicU64,
    /// Transactions rolled back.
    transactions_rolled_back: AtomicU64,
    /// Retries caused by a busy engine.
    busy_retries: AtomicU64,
    /// Operations abandoned after the retry budget ran out.
    busy_failures: AtomicU64,
    /// WAL checkpoints performed.
    checkpoints: AtomicU64,
    /// Failed operations of any kind.
    errors: AtomicU64,
}

impl BackendStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_busy_retry(&self) {
        self.busy_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_busy_failure(&self) {
        self.busy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checkpoint(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of statements executed.
    pub fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    /// Returns the number of committed transactions.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back transactions.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of busy retries.
    ///
    /// A steadily growing value means another connection holds locks for long.
    pub fn busy_retries(&self) -> u64 {
        self.busy_retries.load(Ordering::Relaxed)
    }

    /// Returns the number of operations that stayed busy until the budget ran out.
    pub fn busy_failures(&self) -> u64 {
        self.busy_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of checkpoints.
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            statements: self.statements(),
            transactions_committed: self.transactions_committed(),
            transactions_rolled_back: self.transactions_rolled_back(),
            busy_retries: self.busy_retries(),
            busy_failures: self.busy_failures(),
            checkpoints: self.checkpoints(),
            errors: self.errors(),
        }
    }
}

/// Point-in-time copy of [`BackendStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Statements executed.
    pub statements: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
    /// Busy retries.
    pub busy_retries: u64,
    /// Operations abandoned as busy.
    pub busy_failures: u64,
    /// Checkpoints.
    pub checkpoints: u64,
    /// Failed operations.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = BackendStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = BackendStats::new();
        stats.record_statement();
        stats.record_statement();
        stats.record_commit();
        stats.record_rollback();
        stats.record_busy_retry();
        stats.record_busy_failure();
        stats.record_checkpoint();
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.statements, 2);
        assert_eq!(snap.transactions_committed, 1);
        assert_eq!(snap.transactions_rolled_back, 1);
        assert_eq!(snap.busy_retries, 1);
        assert_eq!(snap.busy_failures, 1);
        assert_eq!(snap.checkpoints, 1);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(BackendStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_busy_retry();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.busy_retries(), 800);
    }
}
