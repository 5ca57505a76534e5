//! Overwrite merge engine: substitutes individual cell values into an
//! otherwise-normal scan, driven by a sorted stream of `(row, col,
//! value)` entries from a CSV or SQLite side-table.

use alloc::string::String;
use alloc::vec::Vec;

use crate::cell::{Cell, CellFlags};
use crate::error::{Error, Warning};
use crate::row::RowCursor;
use crate::sink::{RowControl, Sink};

/// One substitution: row and column are 0-based and relative to the
/// first data row (the header, if any, is row-indexed separately by
/// the scanner and is never itself overwritten).
#[derive(Debug, Clone)]
pub struct OverwriteEntry {
    pub row: u64,
    pub col: usize,
    pub value: Vec<u8>,
}

/// A source of overwrite entries, yielded in ascending `(row, col)`
/// order.
pub trait OverwriteSource {
    fn next(&mut self) -> Result<Option<OverwriteEntry>, Error>;
}

/// An in-memory, pre-sorted overwrite source — what
/// [`CsvOverwriteSource`] and the `sqlite` feature's source both reduce
/// to once they've finished reading their backing store.
pub struct VecOverwriteSource {
    entries: Vec<OverwriteEntry>,
    cursor: usize,
}

impl VecOverwriteSource {
    pub fn new(mut entries: Vec<OverwriteEntry>) -> Self {
        entries.sort_by_key(|e| (e.row, e.col));
        VecOverwriteSource { entries, cursor: 0 }
    }
}

impl OverwriteSource for VecOverwriteSource {
    fn next(&mut self) -> Result<Option<OverwriteEntry>, Error> {
        let entry = self.entries.get(self.cursor).cloned();
        if entry.is_some() {
            self.cursor += 1;
        }
        Ok(entry)
    }
}

/// A [`Sink`] decorator that substitutes cell values as it forwards
/// cells and rows to an inner sink.
///
/// Column indices are assigned by counting cells within a row, so the
/// wrapper must see every cell of a row (it cannot be installed after
/// another decorator that drops cells, such as the header pipeline's
/// blank-row skip, without accounting for the rows that skip removed).
pub struct OverwriteMerge<'s, S: ?Sized, O> {
    inner: &'s mut S,
    source: O,
    pending: Option<OverwriteEntry>,
    row: u64,
    col: usize,
}

impl<'s, S: Sink + ?Sized, O: OverwriteSource> OverwriteMerge<'s, S, O> {
    pub fn new(inner: &'s mut S, mut source: O) -> Result<Self, Error> {
        let pending = source.next()?;
        Ok(OverwriteMerge { inner, source, pending, row: 0, col: 0 })
    }

    fn advance_pending(&mut self) -> Result<(), Error> {
        self.pending = self.source.next()?;
        Ok(())
    }
}

impl<'s, S: Sink + ?Sized, O: OverwriteSource> Sink for OverwriteMerge<'s, S, O> {
    fn cell(&mut self, cell: Cell<'_>) {
        let substitute = match &self.pending {
            Some(entry) if entry.row == self.row && entry.col == self.col => true,
            _ => false,
        };
        if substitute {
            let value = self.pending.take().expect("checked Some above");
            self.inner.cell(Cell { buf: &value.value, flags: CellFlags::empty() });
            let _ = self.advance_pending();
        } else {
            self.inner.cell(cell);
        }
        self.col += 1;
    }

    fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
        let ctrl = self.inner.row(row);
        self.row += 1;
        self.col = 0;
        ctrl
    }

    fn overflow(&mut self, cell: Cell<'_>) {
        self.inner.overflow(cell);
    }

    fn warning(&mut self, warning: Warning) {
        self.inner.warning(warning);
    }
}

#[cfg(feature = "std")]
mod std_sources {
    use super::*;
    use crate::config::ScannerOptions;
    use crate::row::RowCursor as Row;
    use crate::sink::Sink as SinkTrait;
    use crate::Scanner;
    use std::io::Read;

    struct CsvCollector {
        header: Vec<String>,
        header_seen: bool,
        current: Vec<alloc::vec::Vec<u8>>,
        rows: Vec<Vec<alloc::vec::Vec<u8>>>,
    }

    impl SinkTrait for CsvCollector {
        fn cell(&mut self, cell: Cell<'_>) {
            self.current.push(cell.buf.to_vec());
        }

        fn row(&mut self, _row: &Row<'_>) -> RowControl {
            let row = core::mem::take(&mut self.current);
            if !self.header_seen {
                self.header_seen = true;
                self.header = row
                    .iter()
                    .map(|b| String::from_utf8_lossy(b).to_ascii_lowercase())
                    .collect();
            } else {
                self.rows.push(row);
            }
            RowControl::Continue
        }
    }

    /// Reads `row,col,value[,author,timestamp,old_value]` overwrite
    /// entries from a CSV source (parsed with this crate's own
    /// scanner), using the header row to locate the required columns
    /// by name, falling back to the first three columns if no header
    /// names match.
    pub struct CsvOverwriteSource {
        inner: VecOverwriteSource,
    }

    impl CsvOverwriteSource {
        pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, Error> {
            log::debug!("loading overwrite entries from a CSV source");
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|_| Error::OverwriteSourceInvalid("failed to read overwrite CSV".into()))?;

            let mut collector = CsvCollector { header: Vec::new(), header_seen: false, current: Vec::new(), rows: Vec::new() };
            let mut scanner = Scanner::new(ScannerOptions::default())?;
            scanner.feed(&bytes, &mut collector)?;
            scanner.finish(&mut collector)?;

            let find = |name: &str, default: usize| {
                collector.header.iter().position(|h| h == name).unwrap_or(default)
            };
            let row_idx = find("row", 0);
            let col_idx = find("column", 1);
            let val_idx = find("value", 2);

            let mut entries = Vec::with_capacity(collector.rows.len());
            for row in &collector.rows {
                let row_num = row
                    .get(row_idx)
                    .and_then(|b| core::str::from_utf8(b).ok())
                    .and_then(|s| s.parse::<u64>().ok());
                let col_num = row
                    .get(col_idx)
                    .and_then(|b| core::str::from_utf8(b).ok())
                    .and_then(|s| s.parse::<usize>().ok());
                if let (Some(row_num), Some(col_num)) = (row_num, col_num) {
                    let value = row.get(val_idx).cloned().unwrap_or_default();
                    entries.push(OverwriteEntry { row: row_num, col: col_num, value });
                }
            }
            Ok(CsvOverwriteSource { inner: VecOverwriteSource::new(entries) })
        }
    }

    impl OverwriteSource for CsvOverwriteSource {
        fn next(&mut self) -> Result<Option<OverwriteEntry>, Error> {
            self.inner.next()
        }
    }

    /// Maps `/path/to/data.csv` to its conventional overwrite store at
    /// `/path/to/.zsv/data/data.csv/overwrites.sqlite3`.
    ///
    /// A pure function over paths so it can be unit tested without
    /// touching the filesystem.
    pub fn overwrite_auto_path(csv_path: &std::path::Path) -> std::path::PathBuf {
        let file_name = csv_path.file_name().unwrap_or_default();
        let parent = csv_path.parent().unwrap_or_else(|| std::path::Path::new("."));
        parent.join(".zsv").join("data").join(file_name).join("overwrites.sqlite3")
    }
}

#[cfg(feature = "std")]
pub use std_sources::{overwrite_auto_path, CsvOverwriteSource};

/// Checks that a user-supplied overwrite query is a single read-only
/// `SELECT` that names every required column, rejecting anything else
/// in favor of a safe default query.
pub(crate) fn sanitize_sql_query(query: &str, required: &[&str], default_query: &str) -> (String, bool) {
    let trimmed = query.trim().trim_end_matches(';');
    let lower = trimmed.to_ascii_lowercase();
    let forbidden = ["insert", "update", "delete", "drop", "alter", "attach", "pragma", "--", "/*", ";"];
    let safe = lower.starts_with("select")
        && !forbidden.iter().any(|f| lower.contains(f))
        && required.iter().all(|col| lower.contains(col));
    if safe {
        (trimmed.into(), true)
    } else {
        log::warn!("rejected overwrite query, falling back to the default");
        (default_query.into(), false)
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_source {
    use super::*;

    const DEFAULT_QUERY: &str = "select row, column, value from overwrites order by row, column";
    const REQUIRED_COLUMNS: [&str; 3] = ["row", "column", "value"];

    /// Reads overwrite entries from a SQLite database via `rusqlite`.
    ///
    /// `src` follows `sqlite3://<filename>[?sql=<query>]`, or a bare
    /// path to a `.sqlite3` file (using [`DEFAULT_QUERY`]). A supplied
    /// query is validated by [`sanitize_sql_query`]; if it fails
    /// validation the default query is used instead and a
    /// [`Warning::OverwriteQueryRejected`] should be raised by the
    /// caller (surfaced via the return value's `query_rejected` flag).
    pub struct SqliteOverwriteSource {
        inner: VecOverwriteSource,
        pub query_rejected: bool,
    }

    impl SqliteOverwriteSource {
        pub fn open(src: &str) -> Result<Self, Error> {
            let (path, query_param) = parse_src(src)?;
            log::debug!("opening sqlite overwrite source at {path}");
            let conn = rusqlite::Connection::open(&path)
                .map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;

            let (query, accepted) = match query_param {
                Some(q) => sanitize_sql_query(&q, &REQUIRED_COLUMNS, DEFAULT_QUERY),
                None => (DEFAULT_QUERY.into(), true),
            };

            let mut stmt = conn
                .prepare(&query)
                .map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;

            let mut entries = Vec::new();
            while let Some(row) = rows.next().map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))? {
                let row_num: i64 = row.get(0).map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;
                let col_num: i64 = row.get(1).map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;
                let value: Vec<u8> = row.get(2).map_err(|e| Error::OverwriteSourceInvalid(alloc::format!("{e}")))?;
                entries.push(OverwriteEntry { row: row_num as u64, col: col_num as usize, value });
            }

            Ok(SqliteOverwriteSource { inner: VecOverwriteSource::new(entries), query_rejected: !accepted })
        }
    }

    impl OverwriteSource for SqliteOverwriteSource {
        fn next(&mut self) -> Result<Option<OverwriteEntry>, Error> {
            self.inner.next()
        }
    }

    fn parse_src(src: &str) -> Result<(String, Option<String>), Error> {
        if let Some(rest) = src.strip_prefix("sqlite3://") {
            match rest.split_once("?sql=") {
                Some((path, query)) => Ok((path.into(), Some(query.into()))),
                None => Ok((rest.into(), None)),
            }
        } else {
            Ok((src.into(), None))
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_source::SqliteOverwriteSource;
