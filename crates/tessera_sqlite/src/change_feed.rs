//! Row change notifications.
//!
//! The engine reports every row insert, update, and delete on a connection through
//! its update hook. [`ChangeFeed`] fans those reports out to any number of
//! subscribers, which is what cache layers use to drop stale entries.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_sqlite::Backend;
//!
//! let backend = Backend::open_in_memory()?;
//! let changes = backend.change_feed()?;
//!
//! backend.execute("CREATE TABLE t(x)")?;
//! backend.execute("INSERT INTO t VALUES (1)")?;
//!
//! let event = changes.recv()?;
//! assert_eq!(event.table.name(), "t");
//! ```

use parking_lot::RwLock;
use rusqlite::hooks::Action;
use std::sync::mpsc::{self, Receiver, Sender};
use tessera_core::Id;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

impl ChangeKind {
    /// Maps the engine's hook action. Actions outside the three row changes give `None`.
    #[must_use]
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::SQLITE_INSERT => Some(Self::Insert),
            Action::SQLITE_UPDATE => Some(Self::Update),
            Action::SQLITE_DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A single row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// Schema name (`main`, `temp`, or an attached database).
    pub database: Id,
    /// Table name.
    pub table: Id,
    /// Row id of the affected row.
    pub row_id: i64,
}

impl ChangeEvent {
    /// Creates an event, interning the names.
    pub fn new(kind: ChangeKind, database: &str, table: &str, row_id: i64) -> Self {
        Self {
            kind,
            database: Id::new(database),
            table: Id::new(table),
            row_id,
        }
    }
}

/// Distributes change events to subscribers.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    /// Creates a feed without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for all future events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber and forgets disconnected ones.
    pub fn emit(&self, event: ChangeEvent) {
        self.subscribers.write().retain(|tx| tx.send(event).is_ok());
    }

    /// Returns the number of subscribers still registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let event = ChangeEvent::new(ChangeKind::Insert, "main", "images", 7);
        feed.emit(event);

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, event);
        assert_eq!(received.table.name(), "images");
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        let event = ChangeEvent::new(ChangeKind::Delete, "main", "icons", 1);
        feed.emit(event);

        assert_eq!(rx1.recv().unwrap(), event);
        assert_eq!(rx2.recv().unwrap(), event);
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(ChangeEvent::new(ChangeKind::Update, "main", "t", 1));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn hook_actions_map_to_kinds() {
        assert_eq!(
            ChangeKind::from_action(Action::SQLITE_INSERT),
            Some(ChangeKind::Insert)
        );
        assert_eq!(
            ChangeKind::from_action(Action::SQLITE_UPDATE),
            Some(ChangeKind::Update)
        );
        assert_eq!(
            ChangeKind::from_action(Action::SQLITE_DELETE),
            Some(ChangeKind::Delete)
        );
    }
}
