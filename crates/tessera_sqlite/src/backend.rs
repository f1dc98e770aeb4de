//! Database backend.

use crate::busy::{default_busy_handler, BusyHandler};
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::config::{BackendConfig, JournalMode, LockingMode, OpenMode};
use crate::native;
use crate::retry::{classify, engine_error, is_busy_error, RetryPolicy};
use crate::stats::BackendStats;
use rusqlite::hooks::Action;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OptionalExtension, Params, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{DatabaseError, DbResult};
use tracing::{debug, warn};

/// Transaction locking behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionKind {
    /// Locks are taken when first needed.
    #[default]
    Deferred,
    /// A write lock is taken at `BEGIN`.
    Immediate,
    /// An exclusive lock is taken at `BEGIN`.
    Exclusive,
}

impl TransactionKind {
    fn behavior(self) -> TransactionBehavior {
        match self {
            Self::Deferred => TransactionBehavior::Deferred,
            Self::Immediate => TransactionBehavior::Immediate,
            Self::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

/// Result of a WAL checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalCheckpoint {
    /// Frames in the log, `-1` when the database is not in WAL mode.
    pub log_frames: i64,
    /// Frames moved back into the database file, `-1` when not in WAL mode.
    pub checkpointed_frames: i64,
}

/// Owner of a single embedded database connection.
///
/// A `Backend` holds at most one open connection. Every accessor that needs the
/// connection fails with [`DatabaseError::NotOpen`] while none is held, and `open`
/// refuses to run twice. Statements that hit lock contention are retried according
/// to the backend's [`RetryPolicy`]; once it gives up they fail with
/// [`DatabaseError::Busy`].
///
/// One backend is meant to be used from one thread at a time. Contention the retry
/// loop absorbs comes from other connections, usually other processes.
///
/// # Example
///
/// ```rust,ignore
/// use tessera_sqlite::{Backend, BackendConfig, JournalMode};
///
/// let config = BackendConfig::new().journal_mode(JournalMode::Wal);
/// let backend = Backend::open_with_config("cache.db", config)?;
///
/// backend.execute("CREATE TABLE IF NOT EXISTS t(x)")?;
/// assert_eq!(backend.journal_mode()?, JournalMode::Wal);
/// ```
pub struct Backend {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    open_mode: OpenMode,
    busy_handler: BusyHandler,
    retry: RetryPolicy,
    stats: Arc<BackendStats>,
    feed: Arc<ChangeFeed>,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    /// Creates a closed backend with the default busy handler and retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conn: None,
            path: None,
            open_mode: OpenMode::ReadWrite,
            busy_handler: default_busy_handler,
            retry: RetryPolicy::default(),
            stats: Arc::new(BackendStats::new()),
            feed: Arc::new(ChangeFeed::new()),
        }
    }

    /// Creates a closed backend carrying the busy handler and retry policy of `config`.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            conn: None,
            path: None,
            open_mode: config.open_mode,
            busy_handler: config.busy_handler,
            retry: config.retry.clone(),
            stats: Arc::new(BackendStats::new()),
            feed: Arc::new(ChangeFeed::new()),
        }
    }

    /// Opens `path` and applies every setting of `config`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of [`Backend::open`] or of applying a setting. The
    /// connection is closed again before a settings failure is returned.
    pub fn open_with_config(path: impl AsRef<Path>, config: BackendConfig) -> DbResult<Self> {
        let mut backend = Self::from_config(&config);
        backend.open(path, config.open_mode)?;

        if let Err(err) = backend.apply(&config) {
            backend.close_without_error();
            return Err(err);
        }
        Ok(backend)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate the database.
    pub fn open_in_memory() -> DbResult<Self> {
        let mut backend = Self::new();
        backend.open(":memory:", OpenMode::ReadWrite)?;
        Ok(backend)
    }

    fn apply(&self, config: &BackendConfig) -> DbResult<()> {
        if let Some(timeout) = config.busy_timeout {
            self.set_busy_timeout(timeout)?;
        }
        if let Some(mode) = config.journal_mode {
            self.set_journal_mode(mode)?;
        }
        self.set_locking_mode(config.locking_mode)?;
        if let Some(bytes) = config.mmap_size {
            self.set_mmap_size(bytes)?;
        }
        Ok(())
    }

    /// Opens the database file at `path`.
    ///
    /// The `rarray` table-valued function is registered on the new connection
    /// and the busy handler is installed.
    ///
    /// # Errors
    ///
    /// - `PathEmpty` if `path` is empty
    /// - `PathInvalid` if the directory containing `path` does not exist
    /// - `AlreadyOpen` if a connection is already held
    /// - `Engine` if the engine cannot open or initialize the connection; the backend
    ///   stays closed
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> DbResult<()> {
        let path = path.as_ref();
        check_can_open(path)?;
        if self.conn.is_some() {
            return Err(DatabaseError::AlreadyOpen);
        }

        let conn = Connection::open_with_flags(path, mode.flags())
            .map_err(|e| engine_error("database cannot be opened", e))?;

        // A failure below drops `conn`, which closes it.
        rusqlite::vtab::array::load_module(&conn)
            .map_err(|e| engine_error("array extension cannot be initialized", e))?;
        conn.busy_handler(Some(self.busy_handler))
            .map_err(|e| engine_error("busy handler cannot be set", e))?;

        debug!(path = %path.display(), ?mode, "database opened");
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());
        self.open_mode = mode;
        Ok(())
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// - `AlreadyClosed` if no connection is held
    /// - `Busy` if the engine refuses because statements are still pending; the
    ///   connection stays open and the call may be repeated
    /// - `Engine` for any other engine failure, also leaving the connection open
    pub fn close(&mut self) -> DbResult<()> {
        let conn = self.conn.take().ok_or(DatabaseError::AlreadyClosed)?;
        match conn.close() {
            Ok(()) => {
                debug!(path = ?self.path, "database closed");
                Ok(())
            }
            Err((conn, err)) => {
                self.conn = Some(conn);
                Err(close_error(err))
            }
        }
    }

    /// Releases the connection without reporting failures.
    ///
    /// Used on drop. A failed close is logged and the native handle is leaked, so
    /// the file stays open until the process exits. The backend reports closed
    /// either way. Close only fails while statements are still alive.
    pub fn close_without_error(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, err)) = conn.close() {
                warn!(path = ?self.path, error = %err, "unexpected error while closing the database");
                // Dropping a connection that fails to close panics.
                std::mem::forget(conn);
            }
        }
    }

    /// Returns true while a connection is held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns the path of the last opened database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the mode of the last open.
    #[must_use]
    pub fn open_mode(&self) -> OpenMode {
        self.open_mode
    }

    /// Returns the counters of this backend.
    #[must_use]
    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Replaces the retry policy.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry = policy;
    }

    /// Returns the open connection.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` while no connection is held.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.handle("connection")
    }

    fn handle(&self, context: &str) -> DbResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DatabaseError::not_open(context))
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    /// Runs `f` against the connection, retrying while the engine reports busy.
    ///
    /// `f` may run several times and must not keep state between runs that a
    /// failed run would leave inconsistent.
    ///
    /// # Errors
    ///
    /// `NotOpen`, `Busy` after the retry budget is spent, or the mapped engine error.
    pub fn with_retry<T>(
        &self,
        context: &str,
        mut f: impl FnMut(&Connection) -> rusqlite::Result<T>,
    ) -> DbResult<T> {
        let conn = self.handle(context)?;
        let result = self.retry.run_observed(
            context,
            || classify(context, f(conn)),
            |retry| {
                if retry == 0 {
                    self.stats.record_busy_failure();
                } else {
                    self.stats.record_busy_retry();
                }
            },
        );

        match &result {
            Ok(_) => self.stats.record_statement(),
            Err(_) => self.stats.record_error(),
        }
        result
    }

    /// Executes a single statement, stepping through any rows it produces.
    ///
    /// Only the one statement is rerun when it comes back busy. Trailing SQL after the
    /// first statement is rejected before anything runs; use
    /// [`Backend::execute_batch`] for several statements.
    ///
    /// # Errors
    ///
    /// See [`Backend::with_retry`]; more than one statement is an `Engine` error.
    pub fn execute(&self, sql: &str) -> DbResult<()> {
        self.with_retry("execute", |conn| {
            let mut batch = Batch::new(conn, sql);
            let Some(mut stmt) = batch.next()? else {
                return Ok(());
            };
            if batch.next()?.is_some() {
                return Err(rusqlite::Error::MultipleStatement);
            }
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
            Ok(())
        })
    }

    /// Executes statements separated by semicolons inside one immediate transaction.
    ///
    /// A busy failure rolls the whole batch back before it is retried, so no
    /// statement takes effect twice. The batch must not open or close transactions
    /// itself.
    ///
    /// # Errors
    ///
    /// See [`Backend::transaction`].
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.transaction(TransactionKind::Immediate, |tx| tx.execute_batch(sql))
    }

    /// Executes a single statement with bound parameters, returning the changed row count.
    ///
    /// # Errors
    ///
    /// See [`Backend::with_retry`].
    pub fn execute_with<P>(&self, sql: &str, params: P) -> DbResult<usize>
    where
        P: Params + Clone,
    {
        self.with_retry("execute", |conn| conn.execute(sql, params.clone()))
    }

    /// Returns the first column of the first row of a query.
    ///
    /// # Errors
    ///
    /// See [`Backend::with_retry`]; a query returning no rows is an `Engine` error.
    pub fn query_value<T, P>(&self, sql: &str, params: P) -> DbResult<T>
    where
        T: rusqlite::types::FromSql,
        P: Params + Clone,
    {
        self.with_retry("query", |conn| {
            conn.query_row(sql, params.clone(), |row| row.get(0))
        })
    }

    /// Runs `f` inside a transaction of the given kind.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back otherwise. A busy
    /// failure anywhere, including the commit, rolls back and reruns the whole
    /// transaction.
    ///
    /// # Errors
    ///
    /// See [`Backend::with_retry`].
    pub fn transaction<T>(
        &self,
        kind: TransactionKind,
        mut f: impl FnMut(&Transaction<'_>) -> rusqlite::Result<T>,
    ) -> DbResult<T> {
        self.with_retry("transaction", |conn| {
            let tx = Transaction::new_unchecked(conn, kind.behavior())?;
            match f(&tx) {
                Ok(value) => {
                    tx.commit()?;
                    self.stats.record_commit();
                    Ok(value)
                }
                Err(err) => {
                    drop(tx);
                    self.stats.record_rollback();
                    Err(err)
                }
            }
        })
    }

    // ========================================================================
    // Pragmas
    // ========================================================================

    /// Writes a pragma and verifies it by reading it back.
    ///
    /// # Errors
    ///
    /// - `InvalidPragmaKey` if `key` is not a plain or schema-qualified identifier
    /// - `PragmaValueRejected` if the database reports a different value afterwards
    pub fn set_pragma_value(&self, key: &str, value: &str) -> DbResult<()> {
        check_pragma_key(key)?;
        let sql = format!("PRAGMA {key}={}", pragma_literal(value));
        self.with_retry("set pragma", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
            Ok(())
        })?;

        let actual = self.pragma_value(key)?;
        if !actual.eq_ignore_ascii_case(value) {
            return Err(DatabaseError::PragmaValueRejected {
                key: key.to_string(),
                requested: value.to_string(),
                actual,
            });
        }
        debug!(key, value, "pragma set");
        Ok(())
    }

    /// Reads a pragma as text. Pragmas producing no row read as the empty string.
    ///
    /// # Errors
    ///
    /// `InvalidPragmaKey`, `NotOpen`, or the mapped engine error.
    pub fn pragma_value(&self, key: &str) -> DbResult<String> {
        check_pragma_key(key)?;
        let sql = format!("PRAGMA {key}");
        let value = self.with_retry("read pragma", |conn| {
            conn.query_row(&sql, [], |row| Ok(value_to_string(row.get_ref(0)?)))
                .optional()
        })?;
        Ok(value.unwrap_or_default())
    }

    /// Switches the journal mode.
    ///
    /// # Errors
    ///
    /// `PragmaValueRejected` if the engine keeps another mode, as it does for
    /// `wal` on in-memory databases.
    pub fn set_journal_mode(&self, mode: JournalMode) -> DbResult<()> {
        self.set_pragma_value("journal_mode", mode.as_pragma())
    }

    /// Returns the journal mode.
    ///
    /// # Errors
    ///
    /// `UnrecognizedPragmaValue` if the engine reports a mode outside the table.
    pub fn journal_mode(&self) -> DbResult<JournalMode> {
        JournalMode::from_pragma(&self.pragma_value("journal_mode")?)
    }

    /// Switches the locking mode. [`LockingMode::Default`] issues nothing.
    ///
    /// # Errors
    ///
    /// `PragmaValueRejected` if the engine keeps another mode.
    pub fn set_locking_mode(&self, mode: LockingMode) -> DbResult<()> {
        if mode == LockingMode::Default {
            return Ok(());
        }
        self.set_pragma_value("main.locking_mode", mode.as_pragma())
    }

    /// Returns the locking mode of the main database.
    ///
    /// # Errors
    ///
    /// `NotOpen` or the mapped engine error.
    pub fn locking_mode(&self) -> DbResult<LockingMode> {
        Ok(LockingMode::from_pragma(
            &self.pragma_value("main.locking_mode")?,
        ))
    }

    /// Sets the memory-mapped I/O ceiling in bytes.
    ///
    /// # Errors
    ///
    /// `PragmaValueRejected` if the engine caps the value below `bytes`.
    pub fn set_mmap_size(&self, bytes: i64) -> DbResult<()> {
        self.set_pragma_value("mmap_size", &bytes.to_string())
    }

    /// Returns the memory-mapped I/O ceiling in bytes.
    ///
    /// # Errors
    ///
    /// `NotOpen` or the mapped engine error.
    pub fn mmap_size(&self) -> DbResult<i64> {
        let value = self.pragma_value("mmap_size")?;
        value
            .parse()
            .map_err(|_| DatabaseError::UnrecognizedPragmaValue {
                key: "mmap_size".into(),
                value,
            })
    }

    // ========================================================================
    // Busy handling
    // ========================================================================

    /// Sets the engine busy timeout.
    ///
    /// The engine keeps either a timeout or a busy handler, so this replaces the
    /// handler until [`Backend::register_busy_handler`] installs it again.
    ///
    /// # Errors
    ///
    /// `NotOpen` or the mapped engine error.
    pub fn set_busy_timeout(&self, timeout: Duration) -> DbResult<()> {
        self.handle("set busy timeout")?
            .busy_timeout(timeout)
            .map_err(|e| engine_error("busy timeout cannot be set", e))
    }

    /// Installs the backend's busy handler on the connection.
    ///
    /// # Errors
    ///
    /// `NotOpen` or the mapped engine error.
    pub fn register_busy_handler(&self) -> DbResult<()> {
        self.handle("register busy handler")?
            .busy_handler(Some(self.busy_handler))
            .map_err(|e| engine_error("busy handler cannot be set", e))
    }

    /// Replaces the busy handler and installs it.
    ///
    /// # Errors
    ///
    /// `NotOpen` or the mapped engine error. The handler is kept for the next open
    /// either way.
    pub fn set_busy_handler(&mut self, handler: BusyHandler) -> DbResult<()> {
        self.busy_handler = handler;
        self.register_busy_handler()
    }

    /// Returns the busy handler.
    #[must_use]
    pub fn busy_handler(&self) -> BusyHandler {
        self.busy_handler
    }

    // ========================================================================
    // Checkpoints
    // ========================================================================

    /// Runs a FULL checkpoint: waits for writers, then copies the whole log back.
    ///
    /// # Errors
    ///
    /// `Busy` if the checkpoint could not complete because of other connections.
    pub fn checkpoint_full_wal_log(&self) -> DbResult<WalCheckpoint> {
        self.checkpoint("FULL", "checkpoint full WAL log")
    }

    /// Runs a TRUNCATE checkpoint, which also resets the log file to zero bytes.
    ///
    /// # Errors
    ///
    /// `Busy` if the checkpoint could not complete because of other connections.
    pub fn wal_checkpoint_full(&self) -> DbResult<WalCheckpoint> {
        self.checkpoint("TRUNCATE", "WAL checkpoint")
    }

    fn checkpoint(&self, mode: &str, context: &str) -> DbResult<WalCheckpoint> {
        let conn = self.handle(context)?;
        let (busy, log_frames, checkpointed_frames): (i64, i64, i64) = conn
            .query_row(&format!("PRAGMA wal_checkpoint({mode})"), [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| {
                self.stats.record_error();
                engine_error(context, e)
            })?;

        if busy != 0 {
            self.stats.record_busy_failure();
            return Err(DatabaseError::busy(context));
        }
        self.stats.record_checkpoint();
        debug!(mode, log_frames, checkpointed_frames, "WAL checkpointed");
        Ok(WalCheckpoint {
            log_frames,
            checkpointed_frames,
        })
    }

    // ========================================================================
    // Session counters
    // ========================================================================

    /// Rows changed by the most recent statement.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn changes_count(&self) -> DbResult<i64> {
        self.session_counter("SELECT changes()", "changes count")
    }

    /// Rows changed since the connection was opened.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn total_changes_count(&self) -> DbResult<i64> {
        self.session_counter("SELECT total_changes()", "total changes count")
    }

    fn session_counter(&self, sql: &str, context: &str) -> DbResult<i64> {
        self.handle(context)?
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| engine_error(context, e))
    }

    /// Row id of the most recent successful insert.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn last_inserted_row_id(&self) -> DbResult<i64> {
        Ok(self.handle("last inserted row id")?.last_insert_rowid())
    }

    /// Overwrites the value [`Backend::last_inserted_row_id`] reports.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn set_last_inserted_row_id(&self, row_id: i64) -> DbResult<()> {
        native::set_last_insert_rowid(self.handle("set last inserted row id")?, row_id);
        Ok(())
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    /// Installs `hook` to be called for every row insert, update, and delete.
    ///
    /// Replaces any earlier hook, including the one behind [`Backend::change_feed`].
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn set_update_hook<F>(&self, mut hook: F) -> DbResult<()>
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        self.handle("set update hook")?.update_hook(Some(
            move |action: Action, database: &str, table: &str, row_id: i64| {
                if let Some(kind) = ChangeKind::from_action(action) {
                    hook(ChangeEvent::new(kind, database, table, row_id));
                }
            },
        ));
        Ok(())
    }

    /// Removes the update hook.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn reset_update_hook(&self) -> DbResult<()> {
        self.handle("reset update hook")?
            .update_hook(None::<fn(Action, &str, &str, i64)>);
        Ok(())
    }

    /// Routes row changes into the backend's change feed and subscribes to it.
    ///
    /// # Errors
    ///
    /// `NotOpen` while closed.
    pub fn change_feed(&self) -> DbResult<Receiver<ChangeEvent>> {
        let feed = Arc::clone(&self.feed);
        self.set_update_hook(move |event| feed.emit(event))?;
        Ok(self.feed.subscribe())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("open_mode", &self.open_mode)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.close_without_error();
    }
}

fn check_can_open(path: &Path) -> DbResult<()> {
    if path.as_os_str().is_empty() {
        return Err(DatabaseError::PathEmpty);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(DatabaseError::path_invalid(path));
    }
    Ok(())
}

fn close_error(err: rusqlite::Error) -> DatabaseError {
    if is_busy_error(&err) {
        DatabaseError::busy("close: unfinalized statements keep the database open")
    } else {
        engine_error("close", err)
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits, and underscores.
fn check_pragma_key(key: &str) -> DbResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let mut parts = key.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, _) => valid_part(name),
        (Some(schema), Some(name), None) => valid_part(schema) && valid_part(name),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidPragmaKey {
            key: key.to_string(),
        })
    }
}

/// Integers go in bare, everything else as a quoted string literal.
fn pragma_literal(value: &str) -> String {
    if value.parse::<i64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
