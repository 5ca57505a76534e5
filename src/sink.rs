//! The push interface a caller implements to receive scanned data.

use crate::cell::Cell;
use crate::error::Warning;
use crate::row::RowCursor;

/// What the scanner should do after a [`Sink::row`] callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowControl {
    /// Keep scanning.
    Continue,
    /// Stop scanning immediately; the current `feed`/`finish` call
    /// returns [`crate::error::Status::Cancelled`].
    Cancel,
    /// Stop scanning immediately after this row, but keep all internal
    /// state so scanning can pick back up, mid-buffer, on the next
    /// call to [`crate::Scanner::resume`]. Used by the pull adaptor;
    /// a push-mode [`Sink`] will rarely need it, but nothing prevents
    /// a caller from pausing a feed loop the same way.
    Suspend,
}

/// Receives cells and rows as the scanner advances through its input.
///
/// Every [`Cell`] and [`RowCursor`] handed to these methods borrows
/// directly from the scanner's internal buffer and is valid only for
/// the duration of the call — a `Sink` that needs a cell's bytes after
/// its callback returns must copy them.
pub trait Sink {
    /// Called once per cell, in column order, before the enclosing
    /// row's [`Sink::row`] call.
    #[allow(unused_variables)]
    fn cell(&mut self, cell: Cell<'_>) {}

    /// Called once a row has been fully scanned.
    #[allow(unused_variables)]
    fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
        RowControl::Continue
    }

    /// Called for each cell beyond `max_columns` in an over-wide row,
    /// instead of [`Sink::cell`].
    #[allow(unused_variables)]
    fn overflow(&mut self, cell: Cell<'_>) {}

    /// Called for recoverable, non-fatal conditions.
    #[allow(unused_variables)]
    fn warning(&mut self, warning: Warning) {}
}

pub(crate) enum ControlFlow {
    Continue,
    Cancel,
    Suspend,
}

impl From<RowControl> for ControlFlow {
    fn from(rc: RowControl) -> Self {
        match rc {
            RowControl::Continue => ControlFlow::Continue,
            RowControl::Cancel => ControlFlow::Cancel,
            RowControl::Suspend => ControlFlow::Suspend,
        }
    }
}

/// A [`Sink`] that discards everything. Useful as a placeholder, and
/// as the inner sink the pull adaptor wraps.
#[derive(Default)]
pub struct NullSink;

impl Sink for NullSink {}
