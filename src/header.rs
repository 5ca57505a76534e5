//! Header-row policies: discarding ignored rows, skipping leading
//! blank rows, and collating a multi-row header span — applied, in
//! that order, to every row before it reaches the caller's sink.

use alloc::vec::Vec;

use crate::cell::{Cell, CellFlags};
use crate::config::ScannerOptions;
use crate::error::Warning;
use crate::row::{RawCell, RowCursor};
use crate::scanner::Scanner;
use crate::sink::{ControlFlow, Sink};

pub(crate) struct HeaderState {
    rows_to_ignore: usize,
    keep_empty_header_rows: bool,
    blank_skip_done: bool,
    blank_skip_count: usize,
    span_total: usize,
    span_collected: usize,
    span_pieces: Vec<Vec<Vec<u8>>>,
    collated_buf: Vec<u8>,
    collated_cells: Vec<RawCell>,
}

impl HeaderState {
    pub(crate) fn new(opts: &ScannerOptions) -> Self {
        HeaderState {
            rows_to_ignore: opts.rows_to_ignore,
            keep_empty_header_rows: opts.keep_empty_header_rows,
            blank_skip_done: opts.keep_empty_header_rows,
            blank_skip_count: 0,
            span_total: opts.header_span,
            span_collected: 0,
            span_pieces: Vec::new(),
            collated_buf: Vec::new(),
            collated_cells: Vec::new(),
        }
    }
}

impl Scanner {
    /// Applies the header policy chain to the just-scanned row (in
    /// `self.row_cells`), then forwards it — or a collated
    /// replacement — to `sink.row`. Always clears `self.row_cells`
    /// before returning.
    pub(crate) fn dispatch_row(&mut self, sink: &mut dyn Sink) -> ControlFlow {
        let overflow = self.take_overflow_count();
        if overflow > 0 {
            sink.warning(Warning::ColumnOverflow { max_columns: self.opts.max_columns, overflow });
        }
        if self.take_truncated_warning() {
            sink.warning(Warning::RowTruncated);
        }

        if self.header.rows_to_ignore > 0 {
            self.header.rows_to_ignore -= 1;
            self.row_cells.clear();
            return ControlFlow::Continue;
        }

        if !self.header.blank_skip_done {
            if self.row_cursor().is_blank() {
                self.header.blank_skip_count += 1;
                self.row_cells.clear();
                return ControlFlow::Continue;
            }
            self.header.blank_skip_done = true;
            if self.header.blank_skip_count > 0 {
                sink.warning(Warning::BlankHeaderRowsSkipped { count: self.header.blank_skip_count });
            }
        }

        if self.header.span_total > 1 && self.header.span_collected < self.header.span_total {
            self.collect_span_row();
            self.row_cells.clear();
            self.header.span_collected += 1;
            if self.header.span_collected < self.header.span_total {
                return ControlFlow::Continue;
            }
            return self.emit_collated_header(sink);
        }

        let cursor = self.row_cursor();
        let ctrl = sink.row(&cursor);
        self.row_cells.clear();
        self.record_row_index();
        self.after_emit(ctrl.into())
    }

    fn collect_span_row(&mut self) {
        let cursor = self.row_cursor();
        while self.header.span_pieces.len() < cursor.column_count() {
            self.header.span_pieces.push(Vec::new());
        }
        for (col, cell) in cursor.cells().enumerate() {
            self.header.span_pieces[col].push(cell.buf.to_vec());
        }
    }

    fn emit_collated_header(&mut self, sink: &mut dyn Sink) -> ControlFlow {
        self.header.collated_buf.clear();
        self.header.collated_cells.clear();
        let columns = core::mem::take(&mut self.header.span_pieces);
        for pieces in &columns {
            let start = self.header.collated_buf.len();
            for (i, piece) in pieces.iter().enumerate() {
                if i > 0 {
                    self.header.collated_buf.push(b' ');
                }
                self.header.collated_buf.extend_from_slice(piece);
            }
            let end = self.header.collated_buf.len();
            self.header.collated_cells.push(RawCell {
                start,
                end,
                flags: CellFlags::from_bits(crate::cell::flags::QUOTE_CLOSED),
            });
        }
        self.header.span_pieces = columns;
        self.header.span_pieces.iter_mut().for_each(|p| p.clear());
        self.header.span_collected = 0;

        for raw in &self.header.collated_cells {
            sink.cell(Cell { buf: &self.header.collated_buf[raw.start..raw.end], flags: raw.flags });
        }
        let cursor = RowCursor::new(&self.header.collated_buf, &self.header.collated_cells);
        let ctrl = sink.row(&cursor);
        self.record_row_index();
        self.after_emit(ctrl.into())
    }
}
