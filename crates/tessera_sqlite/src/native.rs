//! Engine calls the safe wrapper does not expose.

use rusqlite::{ffi, Connection};

/// Overwrites the connection's last inserted row id.
#[allow(unsafe_code)]
pub(crate) fn set_last_insert_rowid(conn: &Connection, row_id: i64) {
    // SAFETY: the handle belongs to a live `Connection` borrowed for the whole call,
    // and the engine call only stores an integer on it.
    unsafe {
        ffi::sqlite3_set_last_insert_rowid(conn.handle(), row_id);
    }
}
