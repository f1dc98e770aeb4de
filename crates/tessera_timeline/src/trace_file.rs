//! Plain-text trace files.
//!
//! ```text
//! tessera-trace 1
//! # start duration selection
//! 0 10 1
//! 2 3 2
//! ```
//!
//! The first significant line is the header naming the format version. Every other
//! significant line holds one interval. Blank lines and lines starting with `#` are
//! ignored.

use crate::store::IntervalStore;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tessera_core::{IoError, IoResult};
use tracing::debug;

/// First word of the header line.
pub const TRACE_MAGIC: &str = "tessera-trace";

/// Format version written by this build and the only one it reads.
pub const TRACE_VERSION: u32 = 1;

/// Loads the intervals of a trace file into `store` and computes their nesting.
///
/// Returns the number of intervals read.
///
/// # Errors
///
/// `FileNotFound` if `path` does not exist, `FileRead` if reading fails,
/// `MalformedFile` for content that does not parse, and `UnsupportedFileVersion`
/// for any version other than [`TRACE_VERSION`].
pub fn read_trace(path: impl AsRef<Path>, store: &mut IntervalStore) -> IoResult<usize> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => IoError::not_found(path),
        _ => IoError::failure(format!("{}: {err}", path.display())),
    })?;
    parse_trace(BufReader::new(file), path, store)
}

/// Parses trace content from `reader`. `path` only labels errors.
///
/// # Errors
///
/// As [`read_trace`], except `FileNotFound`.
pub fn parse_trace<R: BufRead>(
    reader: R,
    path: &Path,
    store: &mut IntervalStore,
) -> IoResult<usize> {
    let mut header_seen = false;
    let mut inserted = 0;
    let mut last_line = 0;

    for (number, line) in reader.lines().enumerate() {
        let number = number + 1;
        last_line = number;
        let line = line.map_err(|_| IoError::FileRead {
            path: path.to_path_buf(),
            line: number,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if header_seen {
            let (start, duration, selection) = parse_interval(line, path, number)?;
            store.insert(start, duration, selection);
            inserted += 1;
        } else {
            check_header(line, path, number)?;
            header_seen = true;
        }
    }

    if !header_seen {
        return Err(IoError::malformed(
            path,
            last_line + 1,
            format!("missing `{TRACE_MAGIC}` header"),
        ));
    }

    store.compute_nesting();
    debug!(path = %path.display(), intervals = inserted, "trace loaded");
    Ok(inserted)
}

fn check_header(line: &str, path: &Path, number: usize) -> IoResult<()> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some(TRACE_MAGIC) {
        return Err(IoError::malformed(
            path,
            number,
            format!("expected `{TRACE_MAGIC}` header"),
        ));
    }
    let version = match (fields.next(), fields.next()) {
        (Some(version), None) => version
            .parse::<u32>()
            .map_err(|_| IoError::malformed(path, number, format!("bad version `{version}`")))?,
        _ => return Err(IoError::malformed(path, number, "header takes one version")),
    };
    if version != TRACE_VERSION {
        return Err(IoError::UnsupportedFileVersion {
            version,
            path: path.to_path_buf(),
            line: number,
        });
    }
    Ok(())
}

fn parse_interval(line: &str, path: &Path, number: usize) -> IoResult<(i64, i64, i32)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [start, duration, selection] = fields[..] else {
        return Err(IoError::malformed(
            path,
            number,
            format!("expected `start duration selection`, found {} fields", fields.len()),
        ));
    };

    let bad = |what: &str, value: &str| IoError::malformed(path, number, format!("bad {what} `{value}`"));
    let start: i64 = start.parse().map_err(|_| bad("start", start))?;
    let duration_value: i64 = duration.parse().map_err(|_| bad("duration", duration))?;
    let selection: i32 = selection.parse().map_err(|_| bad("selection", selection))?;
    if duration_value < 0 {
        return Err(bad("duration", duration));
    }
    if start.checked_add(duration_value).is_none() {
        return Err(IoError::malformed(path, number, "interval end overflows"));
    }
    Ok((start, duration_value, selection))
}

/// Writes the complete intervals of `store` to a trace file, in start order.
///
/// Intervals still waiting for their end are skipped. Returns the number written.
///
/// # Errors
///
/// `FileCreation` if the file cannot be created, `FileWrite` if writing fails.
pub fn write_trace(path: impl AsRef<Path>, store: &IntervalStore) -> IoResult<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|_| IoError::FileCreation {
        path: path.to_path_buf(),
    })?;
    let written = format_trace(BufWriter::new(file), path, store)?;
    debug!(path = %path.display(), intervals = written, "trace written");
    Ok(written)
}

/// Writes trace content to `writer`. `path` only labels errors.
///
/// # Errors
///
/// `FileWrite` with the line that could not be written.
pub fn format_trace<W: Write>(mut writer: W, path: &Path, store: &IntervalStore) -> IoResult<usize> {
    let write_failed = |line: usize| IoError::FileWrite {
        path: path.to_path_buf(),
        line,
    };

    writeln!(writer, "{TRACE_MAGIC} {TRACE_VERSION}").map_err(|_| write_failed(1))?;
    writeln!(writer, "# start duration selection").map_err(|_| write_failed(2))?;

    let mut line = 2;
    let mut written = 0;
    for index in (0..store.count()).filter(|&index| !store.is_pending(index)) {
        let interval = store.interval(index);
        line += 1;
        writeln!(
            writer,
            "{} {} {}",
            interval.start, interval.duration, interval.selection_id
        )
        .map_err(|_| write_failed(line))?;
        written += 1;
    }
    writer.flush().map_err(|_| write_failed(line))?;
    Ok(written)
}
