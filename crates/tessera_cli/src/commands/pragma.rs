//! Pragma command implementation.

use super::{print, CommandError, CommandResult, OutputFormat};
use serde::Serialize;
use std::path::Path;
use tessera_core::IoError;
use tessera_sqlite::{Backend, BackendConfig, OpenMode};

/// Database settings overview.
#[derive(Debug, Serialize)]
pub struct PragmaSummary {
    /// Database path.
    pub path: String,
    /// Journal mode as reported by the database.
    pub journal_mode: String,
    /// Locking mode of the main schema.
    pub locking_mode: String,
    /// Memory-mapped I/O limit in bytes.
    pub mmap_size: i64,
    /// User tables, sorted by name.
    pub tables: Vec<String>,
}

/// A single pragma value.
#[derive(Debug, Serialize)]
pub struct PragmaValue {
    /// Pragma name.
    pub key: String,
    /// Value read from the database.
    pub value: String,
    /// True if the value was written by this command.
    pub written: bool,
}

/// Runs the pragma command.
pub fn run(
    path: &Path,
    key: Option<&str>,
    value: Option<&str>,
    format: OutputFormat,
) -> CommandResult {
    match (key, value) {
        (None, None) => {
            let summary = summarize(path)?;
            print(&summary, format, print_summary)
        }
        (Some(key), value) => {
            let result = pragma(path, key, value)?;
            print(&result, format, |result| {
                println!("{} = {}", result.key, result.value);
            })
        }
        (None, Some(_)) => Err(CommandError::Usage("a value needs a pragma name".into())),
    }
}

fn open(path: &Path, mode: OpenMode) -> CommandResult<Backend> {
    if mode == OpenMode::ReadOnly && !path.exists() {
        return Err(IoError::not_found(path).into());
    }
    Ok(Backend::open_with_config(
        path,
        BackendConfig::new().open_mode(mode),
    )?)
}

/// Collects the settings overview of the database at `path`.
pub fn summarize(path: &Path) -> CommandResult<PragmaSummary> {
    let backend = open(path, OpenMode::ReadOnly)?;
    let tables = backend.with_retry("list tables", |conn| {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect()
    })?;

    Ok(PragmaSummary {
        path: path.display().to_string(),
        journal_mode: backend.pragma_value("journal_mode")?,
        locking_mode: backend.pragma_value("main.locking_mode")?,
        mmap_size: backend.mmap_size()?,
        tables,
    })
}

/// Reads `key`, writing `value` first if given.
pub fn pragma(path: &Path, key: &str, value: Option<&str>) -> CommandResult<PragmaValue> {
    let mode = if value.is_some() {
        OpenMode::ReadWrite
    } else {
        OpenMode::ReadOnly
    };
    let backend = open(path, mode)?;
    if let Some(value) = value {
        backend.set_pragma_value(key, value)?;
    }
    Ok(PragmaValue {
        key: key.to_string(),
        value: backend.pragma_value(key)?,
        written: value.is_some(),
    })
}

fn print_summary(summary: &PragmaSummary) {
    println!("Database: {}", summary.path);
    println!("  Journal mode: {}", summary.journal_mode);
    println!("  Locking mode: {}", summary.locking_mode);
    println!("  Mmap size:    {} bytes", summary.mmap_size);
    if summary.tables.is_empty() {
        println!("  Tables:       (none)");
    } else {
        println!("  Tables:       {}", summary.tables.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tessera_core::DatabaseError;

    #[test]
    fn summary_lists_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        {
            let backend = Backend::open_with_config(&path, BackendConfig::new()).unwrap();
            backend.execute_batch("CREATE TABLE b(x); CREATE TABLE a(y);").unwrap();
        }

        let summary = summarize(&path).unwrap();
        assert_eq!(summary.tables, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(summary.journal_mode, "delete");
    }

    #[test]
    fn write_then_read_pragma() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");

        let written = pragma(&path, "user_version", Some("7")).unwrap();
        assert!(written.written);
        assert_eq!(written.value, "7");

        let read = pragma(&path, "user_version", None).unwrap();
        assert!(!read.written);
        assert_eq!(read.value, "7");
    }

    #[test]
    fn missing_database_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = summarize(&dir.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, CommandError::Io(IoError::FileNotFound { .. })));
    }

    #[test]
    fn bad_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.db");
        let err = pragma(&path, "journal_mode; DROP TABLE t", Some("wal")).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Database(DatabaseError::InvalidPragmaKey { .. })
        ));
    }
}
