//! A pull-mode adaptor over [`Scanner`], for callers that want to loop
//! `while let Some(row) = pull.next_row()?` instead of implementing
//! [`Sink`].
//!
//! The original C scanner manages this by suspending its callback
//! stack mid-row and resuming it later — not something safe Rust can
//! express, since the row's cells only live as long as the `Sink`
//! callback that received them. Instead, [`PullScanner`] installs an
//! internal [`Sink`] that deep-copies one completed row out of the
//! scanner's buffer and immediately returns
//! [`RowControl::Suspend`](crate::RowControl::Suspend), handing the
//! owned copy back to the caller through [`PullScanner::next_row`].

use alloc::vec::Vec;
use std::io::Read;

use crate::cell::{Cell, CellFlags};
use crate::config::ScannerOptions;
use crate::error::{Error, Status, Warning};
use crate::row::RowCursor;
use crate::scanner::Scanner;
use crate::sink::{RowControl, Sink};

/// One row pulled out of a [`PullScanner`], detached from the
/// scanner's buffer so it can outlive the call that produced it.
pub struct PulledRow {
    buf: Vec<u8>,
    cells: Vec<(usize, usize, CellFlags)>,
}

impl PulledRow {
    pub fn column_count(&self) -> usize {
        self.cells.len()
    }

    pub fn get_cell(&self, index: usize) -> Option<Cell<'_>> {
        self.cells.get(index).map(|&(start, end, flags)| Cell { buf: &self.buf[start..end], flags })
    }

    pub fn cells(&self) -> impl ExactSizeIterator<Item = Cell<'_>> {
        self.cells.iter().map(|&(start, end, flags)| Cell { buf: &self.buf[start..end], flags })
    }

    /// True if every cell in the row is zero-length.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|&(start, end, _)| start == end)
    }
}

struct PullSink {
    row: Option<PulledRow>,
    warnings: Vec<Warning>,
}

impl Sink for PullSink {
    fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
        let mut buf = Vec::new();
        let mut cells = Vec::with_capacity(row.column_count());
        for cell in row.cells() {
            let start = buf.len();
            buf.extend_from_slice(cell.buf);
            let end = buf.len();
            cells.push((start, end, cell.flags));
        }
        self.row = Some(PulledRow { buf, cells });
        RowControl::Suspend
    }

    fn warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

/// Drives a [`Scanner`] from a [`std::io::Read`] source, one row at a
/// time, reading only as much as is needed to produce the next row.
pub struct PullScanner<R> {
    reader: R,
    scanner: Scanner,
    sink: PullSink,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R: Read> PullScanner<R> {
    pub fn new(reader: R, opts: ScannerOptions) -> Result<Self, Error> {
        Self::with_chunk_size(reader, opts, 64 * 1024)
    }

    pub fn with_chunk_size(reader: R, opts: ScannerOptions, chunk_size: usize) -> Result<Self, Error> {
        Ok(PullScanner {
            reader,
            scanner: Scanner::new(opts)?,
            sink: PullSink { row: None, warnings: Vec::new() },
            chunk: alloc::vec![0u8; chunk_size.max(1)],
            eof: false,
        })
    }

    /// Drains and returns every [`Warning`] raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        core::mem::take(&mut self.sink.warnings)
    }

    /// Returns the next row, or `None` once the source is exhausted.
    pub fn next_row(&mut self) -> Result<Option<PulledRow>, Error> {
        loop {
            if let Some(row) = self.sink.row.take() {
                return Ok(Some(row));
            }
            if self.eof {
                return Ok(None);
            }

            let status = self.scanner.resume(&mut self.sink)?;
            if self.sink.row.is_some() {
                continue;
            }
            match status {
                Status::Ok => {}
                #[cfg(feature = "extras")]
                Status::MaxRowsRead => {
                    self.eof = true;
                    continue;
                }
                Status::Cancelled | Status::NoMoreInput => {
                    self.eof = true;
                    continue;
                }
            }

            let n = self.reader.read(&mut self.chunk)?;
            if n == 0 {
                self.scanner.finish(&mut self.sink)?;
                self.eof = true;
            } else {
                self.scanner.feed(&self.chunk[..n], &mut self.sink)?;
            }
        }
    }

    /// Aborts the underlying scanner; subsequent calls to
    /// [`PullScanner::next_row`] return `None`.
    pub fn abort(&mut self) {
        self.scanner.abort();
        self.eof = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn row_strings(row: &PulledRow) -> Vec<alloc::string::String> {
        row.cells().map(|c| c.try_as_str().unwrap().to_owned()).collect()
    }

    #[test]
    fn yields_one_row_per_call_in_order() {
        let reader = Cursor::new(b"a,b,c\n1,2,3\n4,5,6\n".to_vec());
        let mut pull = PullScanner::new(reader, ScannerOptions::default()).unwrap();

        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["a", "b", "c"]);
        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["1", "2", "3"]);
        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["4", "5", "6"]);
        assert!(pull.next_row().unwrap().is_none());
        // Exhausted sources keep returning None rather than erroring.
        assert!(pull.next_row().unwrap().is_none());
    }

    #[test]
    fn works_across_small_reader_chunks() {
        let reader = Cursor::new(b"a,b\nc,d\n".to_vec());
        let mut pull = PullScanner::with_chunk_size(reader, ScannerOptions::default(), 3).unwrap();
        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["a", "b"]);
        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["c", "d"]);
        assert!(pull.next_row().unwrap().is_none());
    }

    #[test]
    fn abort_stops_further_rows() {
        let reader = Cursor::new(b"a,b\nc,d\n".to_vec());
        let mut pull = PullScanner::new(reader, ScannerOptions::default()).unwrap();
        assert_eq!(row_strings(&pull.next_row().unwrap().unwrap()), vec!["a", "b"]);
        pull.abort();
        assert!(pull.next_row().unwrap().is_none());
    }
}
