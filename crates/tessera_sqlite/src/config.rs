//! Backend configuration.

use crate::busy::{default_busy_handler, BusyHandler};
use crate::retry::RetryPolicy;
use std::fmt;
use std::time::Duration;
use tessera_core::{DatabaseError, DbResult};

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Read only; the file must already exist.
    ReadOnly,
    /// Read and write; the file is created if missing.
    #[default]
    ReadWrite,
}

impl OpenMode {
    /// Returns the engine open flags for this mode.
    #[must_use]
    pub fn flags(self) -> rusqlite::OpenFlags {
        use rusqlite::OpenFlags;

        let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            Self::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
            Self::ReadWrite => {
                base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        }
    }
}

/// Value of the `journal_mode` pragma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JournalMode {
    /// Rollback journal deleted at the end of each transaction.
    #[default]
    Delete,
    /// Rollback journal truncated to zero length.
    Truncate,
    /// Rollback journal header zeroed and kept.
    Persist,
    /// Rollback journal held in memory.
    Memory,
    /// Write-ahead log.
    Wal,
}

const JOURNAL_MODES: [(JournalMode, &str); 5] = [
    (JournalMode::Delete, "delete"),
    (JournalMode::Truncate, "truncate"),
    (JournalMode::Persist, "persist"),
    (JournalMode::Memory, "memory"),
    (JournalMode::Wal, "wal"),
];

impl JournalMode {
    /// All journal modes, in pragma table order.
    pub const ALL: [JournalMode; 5] = [
        Self::Delete,
        Self::Truncate,
        Self::Persist,
        Self::Memory,
        Self::Wal,
    ];

    /// Returns the pragma spelling.
    #[must_use]
    pub fn as_pragma(self) -> &'static str {
        JOURNAL_MODES
            .iter()
            .find(|(mode, _)| *mode == self)
            .map_or("delete", |(_, text)| *text)
    }

    /// Parses a pragma value read from the database.
    ///
    /// # Errors
    ///
    /// Returns `UnrecognizedPragmaValue` for anything outside the table.
    pub fn from_pragma(value: &str) -> DbResult<Self> {
        JOURNAL_MODES
            .iter()
            .find(|(_, text)| text.eq_ignore_ascii_case(value))
            .map(|(mode, _)| *mode)
            .ok_or_else(|| DatabaseError::UnrecognizedPragmaValue {
                key: "journal_mode".into(),
                value: value.into(),
            })
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pragma())
    }
}

impl std::str::FromStr for JournalMode {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_pragma(s)
    }
}

/// Value of the `main.locking_mode` pragma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockingMode {
    /// Leave whatever the engine uses; no pragma is issued.
    #[default]
    Default,
    /// Locks are released at the end of each transaction.
    Normal,
    /// Locks are held until the connection closes.
    Exclusive,
}

impl LockingMode {
    /// Returns the pragma spelling; empty for [`LockingMode::Default`].
    #[must_use]
    pub const fn as_pragma(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Normal => "normal",
            Self::Exclusive => "exclusive",
        }
    }

    /// Parses a pragma value read from the database.
    ///
    /// Unknown spellings map to [`LockingMode::Default`].
    #[must_use]
    pub fn from_pragma(value: &str) -> Self {
        if value.eq_ignore_ascii_case("normal") {
            Self::Normal
        } else if value.eq_ignore_ascii_case("exclusive") {
            Self::Exclusive
        } else {
            Self::Default
        }
    }
}

impl fmt::Display for LockingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            other => f.write_str(other.as_pragma()),
        }
    }
}

/// Configuration applied when a backend opens its database.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Open mode.
    pub open_mode: OpenMode,

    /// Journal mode to switch to after opening. `None` keeps the file's mode.
    pub journal_mode: Option<JournalMode>,

    /// Locking mode to switch to after opening.
    pub locking_mode: LockingMode,

    /// Engine busy timeout. When set it replaces the busy handler.
    pub busy_timeout: Option<Duration>,

    /// Callback the engine consults on lock contention.
    pub busy_handler: BusyHandler,

    /// Memory-mapped I/O ceiling in bytes. `None` keeps the engine default.
    pub mmap_size: Option<i64>,

    /// Retry policy for statements that come back busy.
    pub retry: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::ReadWrite,
            journal_mode: None,
            locking_mode: LockingMode::Default,
            busy_timeout: None,
            busy_handler: default_busy_handler,
            mmap_size: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl BackendConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the open mode.
    #[must_use]
    pub fn open_mode(mut self, mode: OpenMode) -> Self {
        self.open_mode = mode;
        self
    }

    /// Sets the journal mode applied after opening.
    #[must_use]
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }

    /// Sets the locking mode applied after opening.
    #[must_use]
    pub fn locking_mode(mut self, mode: LockingMode) -> Self {
        self.locking_mode = mode;
        self
    }

    /// Uses an engine busy timeout instead of the busy handler.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Sets the busy handler.
    #[must_use]
    pub fn busy_handler(mut self, handler: BusyHandler) -> Self {
        self.busy_handler = handler;
        self
    }

    /// Sets the memory-mapped I/O ceiling.
    #[must_use]
    pub fn mmap_size(mut self, bytes: i64) -> Self {
        self.mmap_size = Some(bytes);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_mode_table_round_trips() {
        for mode in JournalMode::ALL {
            assert_eq!(JournalMode::from_pragma(mode.as_pragma()).unwrap(), mode);
        }
        assert_eq!("WAL".parse::<JournalMode>().unwrap(), JournalMode::Wal);
    }

    #[test]
    fn unknown_journal_mode_is_rejected() {
        let err = JournalMode::from_pragma("off").unwrap_err();
        assert!(matches!(err, DatabaseError::UnrecognizedPragmaValue { .. }));
    }

    #[test]
    fn locking_mode_default_has_no_spelling() {
        assert_eq!(LockingMode::Default.as_pragma(), "");
        assert_eq!(LockingMode::from_pragma("exclusive"), LockingMode::Exclusive);
        assert_eq!(LockingMode::from_pragma("normal"), LockingMode::Normal);
        assert_eq!(LockingMode::from_pragma("something"), LockingMode::Default);
    }

    #[test]
    fn read_write_creates_read_only_does_not() {
        use rusqlite::OpenFlags;

        assert!(OpenMode::ReadWrite
            .flags()
            .contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert!(!OpenMode::ReadOnly
            .flags()
            .contains(OpenFlags::SQLITE_OPEN_CREATE));
        assert!(OpenMode::ReadOnly
            .flags()
            .contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
    }

    #[test]
    fn builder_pattern() {
        let config = BackendConfig::new()
            .journal_mode(JournalMode::Wal)
            .locking_mode(LockingMode::Exclusive)
            .busy_timeout(Duration::from_millis(250))
            .mmap_size(1 << 20);

        assert_eq!(config.journal_mode, Some(JournalMode::Wal));
        assert_eq!(config.locking_mode, LockingMode::Exclusive);
        assert_eq!(config.busy_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.mmap_size, Some(1 << 20));
        assert_eq!(config.open_mode, OpenMode::ReadWrite);
    }
}
