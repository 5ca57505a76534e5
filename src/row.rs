//! Row views over a scanner's internal buffer.

use crate::cell::{Cell, CellFlags};

/// A cell's location within the scanner's buffer, stored as plain
/// offsets rather than a borrowed slice.
///
/// The scanner mutates its buffer in place (collapsing quotes) while
/// a row is being assembled, so cells belonging to the row being built
/// cannot be held as `&[u8]` without fighting the borrow checker at
/// every step. Keeping them as `(start, end, flags)` defers borrowing
/// until the moment a [`Cell`] is actually constructed for a callback,
/// which is exactly when the buffer is guaranteed not to be mutated
/// again until the callback returns.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RawCell {
    pub start: usize,
    pub end: usize,
    pub flags: CellFlags,
}

/// A read-only view of one fully-scanned row.
///
/// Borrowed from the scanner for the duration of a single
/// [`crate::sink::Sink::row`] callback (or, for the pull adaptor, until
/// the next row is requested); it cannot be stored past that point.
pub struct RowCursor<'a> {
    buf: &'a [u8],
    cells: &'a [RawCell],
}

impl<'a> RowCursor<'a> {
    pub(crate) fn new(buf: &'a [u8], cells: &'a [RawCell]) -> Self {
        RowCursor { buf, cells }
    }

    pub fn column_count(&self) -> usize {
        self.cells.len()
    }

    pub fn get_cell(&self, index: usize) -> Option<Cell<'a>> {
        self.cells.get(index).map(|c| Cell {
            buf: &self.buf[c.start..c.end],
            flags: c.flags,
        })
    }

    pub fn cells(&self) -> impl ExactSizeIterator<Item = Cell<'a>> + 'a {
        let buf = self.buf;
        self.cells.iter().map(move |c| Cell {
            buf: &buf[c.start..c.end],
            flags: c.flags,
        })
    }

    /// True if every cell in the row is zero-length.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.end == c.start)
    }
}
