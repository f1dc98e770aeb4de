//! Test fixtures and backend helpers.
//!
//! Provides convenience functions for setting up test backends, provoking lock
//! contention, and building common interval stores.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tessera_sqlite::{Backend, BackendConfig, RetryPolicy};

/// File name of the database inside a fixture's temporary directory.
pub const TEST_DB_NAME: &str = "test.db";

/// A test backend with automatic cleanup.
pub struct TestBackend {
    /// The backend instance.
    pub backend: Backend,
    path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestBackend {
    /// Creates a new in-memory test backend.
    pub fn memory() -> Self {
        Self {
            backend: Backend::open_in_memory().expect("Failed to open in-memory backend"),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test backend with default settings.
    pub fn file() -> Self {
        Self::file_with_config(BackendConfig::new())
    }

    /// Creates a new file-based test backend with the given settings.
    pub fn file_with_config(config: BackendConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(TEST_DB_NAME);
        let backend =
            Backend::open_with_config(&path, config).expect("Failed to open file backend");

        Self {
            backend,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Opens a second connection to the same file.
    ///
    /// # Panics
    ///
    /// If the fixture is in-memory.
    pub fn second_connection(&self, config: BackendConfig) -> Backend {
        let path = self
            .path()
            .expect("Only file backends can be opened twice");
        Backend::open_with_config(path, config).expect("Failed to open second connection")
    }
}

impl std::ops::Deref for TestBackend {
    type Target = Backend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl std::ops::DerefMut for TestBackend {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.backend
    }
}

/// Runs a test with a temporary in-memory backend.
///
/// # Example
///
/// ```rust,ignore
/// use tessera_testkit::with_temp_backend;
///
/// #[test]
/// fn my_test() {
///     with_temp_backend(|backend| {
///         backend.execute("CREATE TABLE t(x)").unwrap();
///     });
/// }
/// ```
pub fn with_temp_backend<F, R>(f: F) -> R
where
    F: FnOnce(&Backend) -> R,
{
    let test_backend = TestBackend::memory();
    f(&test_backend.backend)
}

/// Runs a test with a temporary file-based backend.
pub fn with_file_backend<F, R>(f: F) -> R
where
    F: FnOnce(&Backend, &Path) -> R,
{
    let test_backend = TestBackend::file();
    let path = test_backend
        .path()
        .expect("File backend should have a path")
        .to_path_buf();
    f(&test_backend.backend, &path)
}

/// An exclusive lock on a database file, held by a separate connection.
///
/// The lock is released when this value is dropped.
pub struct ExclusiveLock {
    holder: Backend,
}

impl ExclusiveLock {
    /// Releases the lock early.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        let _ = self.holder.execute("ROLLBACK");
    }
}

/// Opens a separate connection to `path` and takes an exclusive lock on it.
///
/// Other connections writing to (or, outside WAL mode, reading from) the file come
/// back busy until the returned guard is dropped.
pub fn hold_exclusive_lock(path: &Path) -> ExclusiveLock {
    let holder = Backend::open_with_config(path, BackendConfig::new().retry(RetryPolicy::no_retry()))
        .expect("Failed to open lock holder");
    holder
        .execute("BEGIN EXCLUSIVE")
        .expect("Failed to take exclusive lock");
    ExclusiveLock { holder }
}

/// Test scenario helpers.
pub mod scenarios {
    use std::sync::Arc;
    use tessera_timeline::{Aggregator, Interval, IntervalStore, ModelId};

    /// A store holding `(0,10,1)`, `(2,3,2)`, `(5,1,3)` with nesting computed.
    pub fn nested_store() -> IntervalStore {
        store_from(&[
            Interval::new(0, 10, 1),
            Interval::new(2, 3, 2),
            Interval::new(5, 1, 3),
        ])
    }

    /// A store holding `intervals`, inserted in the given order, with nesting computed.
    pub fn store_from(intervals: &[Interval]) -> IntervalStore {
        let mut store = IntervalStore::new(ModelId::new(0));
        for interval in intervals {
            store.insert(interval.start, interval.duration, interval.selection_id);
        }
        store.compute_nesting();
        store
    }

    /// A store built from `intervals` with nesting computed. Entries flagged `true`
    /// go through `insert_start` and `insert_end`, the rest through `insert`.
    pub fn two_phase_store(intervals: &[(Interval, bool)]) -> IntervalStore {
        let mut store = IntervalStore::new(ModelId::new(0));
        for &(interval, two_phase) in intervals {
            if two_phase {
                let index = store.insert_start(interval.start, interval.selection_id);
                store.insert_end(index, interval.duration);
            } else {
                store.insert(interval.start, interval.duration, interval.selection_id);
            }
        }
        store.compute_nesting();
        store
    }

    /// An aggregator with one store per entry of `starts`, each interval one tick long.
    pub fn aggregator_with(starts: &[&[i64]]) -> Aggregator {
        let mut aggregator = Aggregator::new();
        for (i, store_starts) in starts.iter().enumerate() {
            let store = aggregator.new_store(format!("store {i}"));
            {
                let mut guard = store.write();
                for &start in *store_starts {
                    guard.insert(start, 1, 0);
                }
                guard.compute_nesting();
            }
            aggregator.add_store(Arc::clone(&store));
        }
        aggregator
    }
}
