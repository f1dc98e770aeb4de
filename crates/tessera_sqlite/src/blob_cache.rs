//! Name-keyed blob cache stored in a backend.
//!
//! Two tables hold the cached data:
//! - `images(id, name, mtime, image, smallImage)` for rendered previews in two sizes
//! - `icons(id, name, mtime, icon)` for icons
//!
//! `name` is unique in both. Lookups take a minimum timestamp and only return entries
//! at least that recent, so a caller passing the source file's modification time
//! never sees an outdated render. A stored entry whose blob is NULL reads back as an
//! empty blob, which tells "rendered, but nothing to show" apart from "not cached".

use crate::backend::{Backend, TransactionKind, WalCheckpoint};
use crate::config::{BackendConfig, JournalMode};
use crate::retry::Attempt;
use rusqlite::OptionalExtension;
use std::path::Path;
use tessera_core::DbResult;
use tracing::debug;

const CREATE_TABLES: &str = "\
    CREATE TABLE IF NOT EXISTS images(\
        id INTEGER PRIMARY KEY, \
        name TEXT NOT NULL UNIQUE, \
        mtime INTEGER, \
        image BLOB, \
        smallImage BLOB); \
    CREATE TABLE IF NOT EXISTS icons(\
        id INTEGER PRIMARY KEY, \
        name TEXT NOT NULL UNIQUE, \
        mtime INTEGER, \
        icon BLOB);";

const UPSERT_IMAGE: &str = "INSERT INTO images(name, mtime, image, smallImage) \
    VALUES (?1, ?2, ?3, ?4) ON CONFLICT(name) DO UPDATE SET mtime=excluded.mtime, \
    image=excluded.image, smallImage=excluded.smallImage";

const UPSERT_ICON: &str = "INSERT INTO icons(name, mtime, icon) VALUES (?1, ?2, ?3) \
    ON CONFLICT(name) DO UPDATE SET mtime=excluded.mtime, icon=excluded.icon";

/// Blob cache over a backend.
#[derive(Debug)]
pub struct BlobCache {
    backend: Backend,
}

impl BlobCache {
    /// Opens or creates a cache file in WAL mode.
    ///
    /// # Errors
    ///
    /// Any failure of opening the backend or creating the tables.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let config = BackendConfig::new().journal_mode(JournalMode::Wal);
        Self::new(Backend::open_with_config(path, config)?)
    }

    /// Wraps an open backend, creating the tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// `NotOpen` if the backend is closed, or any failure creating the tables.
    pub fn new(backend: Backend) -> DbResult<Self> {
        backend.transaction(TransactionKind::Exclusive, |tx| tx.execute_batch(CREATE_TABLES))?;
        let cache = Self { backend };
        cache.wal_checkpoint_full()?;
        debug!(path = ?cache.backend.path(), "blob cache initialized");
        Ok(cache)
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Unwraps the backend.
    pub fn into_backend(self) -> Backend {
        self.backend
    }

    /// Returns the large image stored under `name` if it is at least `min_mtime` recent.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn fetch_image(&self, name: &str, min_mtime: i64) -> DbResult<Option<Vec<u8>>> {
        self.fetch_blob(
            "SELECT image FROM images WHERE name=?1 AND mtime >= ?2",
            name,
            min_mtime,
        )
    }

    /// Returns the small image stored under `name` if it is at least `min_mtime` recent.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn fetch_small_image(&self, name: &str, min_mtime: i64) -> DbResult<Option<Vec<u8>>> {
        self.fetch_blob(
            "SELECT smallImage FROM images WHERE name=?1 AND mtime >= ?2",
            name,
            min_mtime,
        )
    }

    /// Returns the icon stored under `name` if it is at least `min_mtime` recent.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn fetch_icon(&self, name: &str, min_mtime: i64) -> DbResult<Option<Vec<u8>>> {
        self.fetch_blob(
            "SELECT icon FROM icons WHERE name=?1 AND mtime >= ?2",
            name,
            min_mtime,
        )
    }

    fn fetch_blob(&self, sql: &str, name: &str, min_mtime: i64) -> DbResult<Option<Vec<u8>>> {
        let blob = self.backend.transaction(TransactionKind::Deferred, |tx| {
            tx.query_row(sql, (name, min_mtime), |row| row.get::<_, Option<Vec<u8>>>(0))
                .optional()
        })?;
        Ok(blob.map(Option::unwrap_or_default))
    }

    /// Stores both image sizes under `name`, replacing any earlier entry.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn store_image(
        &self,
        name: &str,
        mtime: i64,
        image: Option<&[u8]>,
        small_image: Option<&[u8]>,
    ) -> DbResult<()> {
        self.backend.transaction(TransactionKind::Immediate, |tx| {
            tx.execute(UPSERT_IMAGE, (name, mtime, image, small_image))
                .map(drop)
        })
    }

    /// Stores an icon under `name`, replacing any earlier entry.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn store_icon(&self, name: &str, mtime: i64, icon: Option<&[u8]>) -> DbResult<()> {
        self.backend.transaction(TransactionKind::Immediate, |tx| {
            tx.execute(UPSERT_ICON, (name, mtime, icon)).map(drop)
        })
    }

    /// Returns the modification time stored with the image entry for `name`.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn fetch_modified_image_time(&self, name: &str) -> DbResult<Option<i64>> {
        let mtime = self.backend.transaction(TransactionKind::Deferred, |tx| {
            tx.query_row("SELECT mtime FROM images WHERE name=?1", [name], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()
        })?;
        Ok(mtime.flatten())
    }

    /// Returns true if an entry for `name` holds a non-NULL large image.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn fetch_has_image(&self, name: &str) -> DbResult<bool> {
        let has = self.backend.transaction(TransactionKind::Deferred, |tx| {
            tx.query_row(
                "SELECT image IS NOT NULL FROM images WHERE name=?1",
                [name],
                |row| row.get::<_, bool>(0),
            )
            .optional()
        })?;
        Ok(has.unwrap_or(false))
    }

    /// Folds the write-ahead log back into the cache file, retrying while busy.
    ///
    /// # Errors
    ///
    /// `Busy` once retries are spent, or the mapped engine error.
    pub fn wal_checkpoint_full(&self) -> DbResult<WalCheckpoint> {
        self.backend
            .retry_policy()
            .run("blob cache checkpoint", || {
                match self.backend.wal_checkpoint_full() {
                    Ok(result) => Attempt::Done(result),
                    Err(err) if err.is_busy() => Attempt::Busy,
                    Err(err) => Attempt::Fatal(err),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeKind;
    use tempfile::TempDir;
    use tessera_core::DatabaseError;

    fn memory_cache() -> BlobCache {
        BlobCache::new(Backend::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn missing_entry_is_none() {
        let cache = memory_cache();
        assert_eq!(cache.fetch_image("a.qml", 0).unwrap(), None);
        assert_eq!(cache.fetch_icon("a.qml", 0).unwrap(), None);
        assert_eq!(cache.fetch_modified_image_time("a.qml").unwrap(), None);
        assert!(!cache.fetch_has_image("a.qml").unwrap());
    }

    #[test]
    fn store_and_fetch_image() {
        let cache = memory_cache();
        cache
            .store_image("a.qml", 100, Some(b"large"), Some(b"small"))
            .unwrap();

        assert_eq!(cache.fetch_image("a.qml", 100).unwrap(), Some(b"large".to_vec()));
        assert_eq!(
            cache.fetch_small_image("a.qml", 50).unwrap(),
            Some(b"small".to_vec())
        );
        assert_eq!(cache.fetch_modified_image_time("a.qml").unwrap(), Some(100));
        assert!(cache.fetch_has_image("a.qml").unwrap());
    }

    #[test]
    fn outdated_entry_is_not_returned() {
        let cache = memory_cache();
        cache.store_image("a.qml", 100, Some(b"old"), None).unwrap();
        assert_eq!(cache.fetch_image("a.qml", 101).unwrap(), None);
    }

    #[test]
    fn store_replaces_entry() {
        let cache = memory_cache();
        cache.store_image("a.qml", 100, Some(b"old"), None).unwrap();
        cache.store_image("a.qml", 200, Some(b"new"), None).unwrap();

        assert_eq!(cache.fetch_image("a.qml", 150).unwrap(), Some(b"new".to_vec()));
        assert_eq!(cache.fetch_modified_image_time("a.qml").unwrap(), Some(200));
        let rows: i64 = cache
            .backend()
            .query_value("SELECT count(*) FROM images", [])
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn null_blob_reads_back_empty() {
        let cache = memory_cache();
        cache.store_image("a.qml", 1, None, None).unwrap();
        assert_eq!(cache.fetch_image("a.qml", 0).unwrap(), Some(Vec::new()));
        assert!(!cache.fetch_has_image("a.qml").unwrap());
    }

    #[test]
    fn icons_are_separate() {
        let cache = memory_cache();
        cache.store_icon("b.qml", 5, Some(b"icon")).unwrap();
        assert_eq!(cache.fetch_icon("b.qml", 5).unwrap(), Some(b"icon".to_vec()));
        assert_eq!(cache.fetch_image("b.qml", 0).unwrap(), None);
    }

    #[test]
    fn file_cache_in_wal_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        {
            let cache = BlobCache::open(&path).unwrap();
            assert_eq!(cache.backend().journal_mode().unwrap(), JournalMode::Wal);
            cache.store_image("a.qml", 1, Some(b"x"), None).unwrap();
            cache.wal_checkpoint_full().unwrap();
        }

        let cache = BlobCache::open(&path).unwrap();
        assert_eq!(cache.fetch_image("a.qml", 0).unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn stores_are_visible_on_the_change_feed() {
        let cache = memory_cache();
        let changes = cache.backend().change_feed().unwrap();

        cache.store_icon("c.qml", 1, Some(b"i")).unwrap();
        let event = changes.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table.name(), "icons");
    }

    #[test]
    fn closed_backend_is_rejected() {
        let err = BlobCache::new(Backend::new()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotOpen { .. }));
    }
}
