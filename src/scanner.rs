//! The delimited-format scanner: buffer protocol, quote state machine,
//! and cell/row emission.

use alloc::vec;
use alloc::vec::Vec;

use crate::cell::{flags, Cell, CellFlags};
use crate::config::{ScannerOptions, Utf8Policy};
use crate::error::{Error, Status, Warning};
use crate::header::HeaderState;
use crate::index::RowIndex;
use crate::row::{RawCell, RowCursor};
use crate::simd::find_structural;
use crate::sink::{ControlFlow, Sink};

/// A streaming scanner over delimited (CSV/TSV/RFC-4180-ish) or
/// fixed-width byte input.
///
/// Input is supplied in arbitrary-sized chunks via [`Scanner::feed`];
/// cells and rows are pushed to a caller-supplied [`Sink`] as they are
/// recognized. A row (or even a cell) may straddle a chunk boundary —
/// the scanner carries the unterminated tail of its buffer forward to
/// the next `feed` call rather than requiring a caller to pre-split
/// input on row boundaries.
pub struct Scanner {
    pub(crate) opts: ScannerOptions,
    pub(crate) buf: Vec<u8>,
    pub(crate) bytes_read: usize,
    cursor: usize,
    checked_bom: bool,
    last: u8,
    quoted: u8,
    quote_close_position: usize,
    cell_start: usize,
    pub(crate) row_start: usize,
    cum_scanned_length: u64,
    buffer_exceeded: bool,
    skip_next_delim: bool,
    data_row_count: u64,
    pub(crate) row_cells: Vec<RawCell>,
    overflow_count: usize,
    truncated_pending: bool,
    finished: bool,
    aborted: bool,
    pending_insert: Option<Vec<u8>>,
    pub(crate) header: HeaderState,
    fixed_offsets: Option<Vec<usize>>,
    drive_began_at: usize,
    pub(crate) pending_row_end_offset: u64,
    row_index: RowIndex,
    index_header_recorded: bool,
    pub(crate) emitted_row_count: u64,
    #[cfg(feature = "extras")]
    pub(crate) max_rows_hit: bool,
    #[cfg(all(feature = "extras", feature = "std"))]
    last_progress_time: Option<std::time::Instant>,
}

impl Scanner {
    pub fn new(opts: ScannerOptions) -> Result<Self, Error> {
        opts.validate()?;
        let cap = opts.resolved_buffsize();
        let pending_insert = opts.insert_header_row.as_ref().map(|h| {
            let mut v = Vec::with_capacity(h.len() + 1);
            v.extend_from_slice(h.as_bytes());
            v.push(b'\n');
            v
        });
        let header = HeaderState::new(&opts);
        Ok(Scanner {
            buf: vec![0u8; cap],
            bytes_read: 0,
            cursor: 0,
            checked_bom: false,
            last: 0,
            quoted: 0,
            quote_close_position: 0,
            cell_start: 0,
            row_start: 0,
            cum_scanned_length: 0,
            buffer_exceeded: false,
            skip_next_delim: false,
            data_row_count: 0,
            row_cells: Vec::new(),
            overflow_count: 0,
            truncated_pending: false,
            finished: false,
            aborted: false,
            pending_insert,
            header,
            fixed_offsets: None,
            drive_began_at: 0,
            pending_row_end_offset: 0,
            row_index: RowIndex::new(),
            index_header_recorded: false,
            emitted_row_count: 0,
            #[cfg(feature = "extras")]
            max_rows_hit: false,
            #[cfg(all(feature = "extras", feature = "std"))]
            last_progress_time: None,
            opts,
        })
    }

    /// Locks the scanner into fixed-width mode, splitting every row at
    /// the given (exclusive) byte offsets. Fails if parsing has
    /// already begun or if `offsets` is not strictly increasing.
    pub fn set_fixed_offsets(&mut self, offsets: &[usize]) -> Result<(), Error> {
        if self.cum_scanned_length != 0 || self.data_row_count != 0 {
            return Err(Error::ModeLocked);
        }
        if offsets.is_empty() {
            return Err(Error::InvalidFixedOffsets("at least one offset is required"));
        }
        let mut prev = 0;
        for &o in offsets {
            if o <= prev {
                return Err(Error::InvalidFixedOffsets("offsets must be strictly increasing"));
            }
            prev = o;
        }
        self.fixed_offsets = Some(offsets.to_vec());
        Ok(())
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn cum_scanned_length(&self) -> u64 {
        self.cum_scanned_length
    }

    pub fn data_row_count(&self) -> u64 {
        self.data_row_count
    }

    /// The sparse row index accumulated so far. Empty unless
    /// [`crate::config::ScannerOptions::build_row_index`] was set.
    pub fn row_index(&self) -> &RowIndex {
        &self.row_index
    }

    pub fn scanned_length(&self) -> usize {
        self.cursor
    }

    pub fn remaining_buffer(&self) -> &[u8] {
        &self.buf[self.cursor..self.bytes_read]
    }

    /// Feeds the next chunk of input to the scanner, driving it until
    /// the chunk is exhausted, a row requests suspension, or the sink
    /// cancels.
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn Sink) -> Result<Status, Error> {
        if self.aborted || self.finished {
            return Ok(Status::Cancelled);
        }
        if let Some(header_bytes) = self.pending_insert.take() {
            // The synthetic header never carries a real stream BOM; suppress
            // the BOM check for it and restore it for the real chunk that
            // follows, so a BOM on the *actual* input is still recognized.
            self.checked_bom = true;
            let status = self.feed_bytes(&header_bytes, sink)?;
            self.checked_bom = false;
            if status != Status::Ok {
                return Ok(status);
            }
        }
        self.feed_bytes(chunk, sink)
    }

    fn feed_bytes(&mut self, chunk: &[u8], sink: &mut dyn Sink) -> Result<Status, Error> {
        self.refill(chunk);
        if !self.checked_bom {
            self.checked_bom = true;
            if self.buf.get(..3) == Some(&[0xEF, 0xBB, 0xBF][..]) {
                log::debug!("UTF-8 BOM detected at start of input, stripping");
                self.cursor += 3;
                self.cell_start += 3;
                self.row_start += 3;
                self.cum_scanned_length += 3;
            }
        }
        let status = if self.fixed_offsets.is_some() {
            self.drive_fixed(sink)?
        } else {
            self.drive(sink)?
        };
        Ok(self.maybe_max_rows_status(status))
    }

    /// Resumes scanning already-buffered input without supplying a new
    /// chunk. Used after a [`crate::sink::RowControl::Suspend`] to
    /// continue from exactly where scanning left off.
    pub fn resume(&mut self, sink: &mut dyn Sink) -> Result<Status, Error> {
        if self.aborted || self.finished {
            return Ok(Status::Cancelled);
        }
        let status = if self.fixed_offsets.is_some() {
            self.drive_fixed(sink)?
        } else {
            self.drive(sink)?
        };
        Ok(self.maybe_max_rows_status(status))
    }

    /// Substitutes [`Status::MaxRowsRead`] for [`Status::Cancelled`]
    /// when the scan stopped because the configured row cap (not a
    /// user cancellation) was hit.
    #[cfg(feature = "extras")]
    fn maybe_max_rows_status(&mut self, status: Status) -> Status {
        if status == Status::Cancelled && core::mem::take(&mut self.max_rows_hit) {
            Status::MaxRowsRead
        } else {
            status
        }
    }

    #[cfg(not(feature = "extras"))]
    fn maybe_max_rows_status(&mut self, status: Status) -> Status {
        status
    }

    /// Signals end of input: force-closes any still-open quote,
    /// flushes a final partial row if one exists, and marks the
    /// scanner finished.
    pub fn finish(&mut self, sink: &mut dyn Sink) -> Result<Status, Error> {
        if self.finished {
            return Ok(Status::NoMoreInput);
        }
        self.finished = true;

        let offset = self.cum_scanned_length + (self.bytes_read - self.cursor) as u64;
        self.pending_row_end_offset = offset;

        if self.fixed_offsets.is_some() {
            if self.bytes_read > self.row_start {
                let ctrl = self.emit_fixed_row(self.row_start, self.bytes_read, sink);
                self.data_row_count += 1;
                if matches!(ctrl, ControlFlow::Cancel) {
                    return Ok(self.maybe_max_rows_status(Status::Cancelled));
                }
            }
            return Ok(Status::NoMoreInput);
        }

        if self.quoted & flags::QUOTE_PENDING_LF != 0 {
            self.quoted &= !flags::QUOTE_PENDING_LF;
            self.quoted |= flags::QUOTE_NEEDED;
        }
        if self.quoted & flags::QUOTE_UNCLOSED != 0 {
            self.quoted |= flags::QUOTE_CLOSED;
            self.quoted &= !flags::QUOTE_UNCLOSED;
            if self.quote_close_position == 0 {
                self.quote_close_position = if self.last == b'"' {
                    self.bytes_read.saturating_sub(self.cell_start).saturating_sub(1)
                } else {
                    self.bytes_read.saturating_sub(self.cell_start)
                };
            }
        }

        let have_partial_row =
            self.bytes_read > self.row_start || !self.row_cells.is_empty() || self.cell_start > self.row_start;
        if have_partial_row {
            self.emit_cell(self.bytes_read, sink);
            let ctrl = self.dispatch_row(sink);
            self.data_row_count += 1;
            if matches!(ctrl, ControlFlow::Cancel) {
                return Ok(self.maybe_max_rows_status(Status::Cancelled));
            }
        }
        Ok(Status::NoMoreInput)
    }

    /// Moves the unterminated tail of the current row to the front of
    /// the buffer, rebases all offsets relative to it, then appends
    /// `chunk`.
    fn refill(&mut self, chunk: &[u8]) {
        let rebase = self.row_start;
        let tail_len = self.bytes_read.saturating_sub(rebase);
        if rebase > 0 && tail_len > 0 {
            self.buf.copy_within(rebase..self.bytes_read, 0);
        }
        self.cell_start = self.cell_start.saturating_sub(rebase);
        if rebase > 0 {
            for cell in &mut self.row_cells {
                cell.start -= rebase;
                cell.end -= rebase;
            }
        }
        self.row_start = 0;
        self.cursor = tail_len;

        let needed = tail_len + chunk.len();
        if self.buf.len() < needed {
            log::trace!("growing scan buffer from {} to {needed} bytes", self.buf.len());
            self.buf.resize(needed, 0);
        }
        self.buf[tail_len..needed].copy_from_slice(chunk);
        self.bytes_read = needed;
    }

    fn drive(&mut self, sink: &mut dyn Sink) -> Result<Status, Error> {
        let bytes_read = self.bytes_read;
        let began_at = self.cursor;
        self.drive_began_at = began_at;
        let mut i = self.cursor;

        if self.quoted & flags::QUOTE_PENDING != 0 {
            self.quoted &= !flags::QUOTE_PENDING;
            if i < bytes_read {
                if self.buf[i] != b'"' {
                    self.quoted |= flags::QUOTE_CLOSED;
                    self.quoted &= !flags::QUOTE_UNCLOSED;
                    if self.quote_close_position == 0 {
                        self.quote_close_position = i.saturating_sub(self.cell_start).saturating_sub(1);
                    }
                } else {
                    self.quoted |= flags::QUOTE_NEEDED | flags::QUOTE_EMBEDDED;
                    i += 1;
                }
            } else {
                self.quoted |= flags::QUOTE_PENDING;
            }
        }

        loop {
            if i >= bytes_read {
                if bytes_read - self.row_start > self.opts.max_row_size {
                    if let ControlFlow::Cancel = self.force_truncate_row(bytes_read, sink) {
                        self.cursor = bytes_read;
                        return Ok(Status::Cancelled);
                    }
                }
                break;
            }
            if i - self.row_start > self.opts.max_row_size {
                match self.force_truncate_row(i, sink) {
                    ControlFlow::Continue => continue,
                    ControlFlow::Cancel => {
                        self.cursor = i;
                        return Ok(Status::Cancelled);
                    }
                    ControlFlow::Suspend => {
                        self.cursor = i;
                        return Ok(Status::Ok);
                    }
                }
            }

            let quotes_enabled = !self.opts.no_quotes;
            match find_structural(&self.buf[i..bytes_read], self.opts.delimiter, quotes_enabled) {
                Some(rel) => {
                    i += rel;
                    match self.handle_structural_byte(i, bytes_read, sink) {
                        ControlFlow::Continue => i += 1,
                        ControlFlow::Cancel => {
                            self.cursor = i + 1;
                            return Ok(Status::Cancelled);
                        }
                        ControlFlow::Suspend => {
                            self.cursor = i + 1;
                            return Ok(Status::Ok);
                        }
                    }
                }
                None => {
                    i = bytes_read;
                }
            }
        }

        self.cum_scanned_length += i.saturating_sub(began_at) as u64;
        self.cursor = i;
        Ok(Status::Ok)
    }

    /// Drives fixed-width scanning: each input line (bytes up to, but
    /// not including, the next `\n`) is split at the configured
    /// cell-end offsets. Bytes beyond the last offset are discarded;
    /// a line shorter than the offsets yields truncated trailing
    /// cells.
    fn drive_fixed(&mut self, sink: &mut dyn Sink) -> Result<Status, Error> {
        let bytes_read = self.bytes_read;
        let began_at = self.row_start;
        self.drive_began_at = began_at;

        loop {
            match memchr::memchr(b'\n', &self.buf[self.row_start..bytes_read]) {
                Some(rel) => {
                    let line_end = self.row_start + rel;
                    let next_row_start = line_end + 1;
                    self.pending_row_end_offset =
                        self.cum_scanned_length + (next_row_start - self.drive_began_at) as u64;
                    let row_start = self.row_start;
                    let ctrl = self.emit_fixed_row(row_start, line_end, sink);
                    self.row_start = next_row_start;
                    self.cell_start = next_row_start;
                    self.data_row_count += 1;
                    match ctrl {
                        ControlFlow::Continue => {}
                        ControlFlow::Cancel => {
                            self.cursor = next_row_start;
                            return Ok(Status::Cancelled);
                        }
                        ControlFlow::Suspend => {
                            self.cursor = next_row_start;
                            return Ok(Status::Ok);
                        }
                    }
                }
                None => break,
            }
        }

        self.cursor = bytes_read;
        self.cum_scanned_length += self.row_start.saturating_sub(began_at) as u64;
        Ok(Status::Ok)
    }

    /// Splits `[line_start, line_end)` at the configured fixed-width
    /// offsets and hands each resulting cell to `sink`, then dispatches
    /// the assembled row. `line_end` excludes the terminating `\n`, if
    /// any (the final, unterminated partial line at `finish` has none).
    fn emit_fixed_row(&mut self, line_start: usize, line_end: usize, sink: &mut dyn Sink) -> ControlFlow {
        let offsets = self.fixed_offsets.clone().expect("fixed mode");
        self.row_cells.clear();
        let mut prev = line_start;
        for &off in &offsets {
            let end = core::cmp::max(prev, core::cmp::min(line_start + off, line_end));
            self.row_cells.push(RawCell { start: prev, end, flags: CellFlags::empty() });
            sink.cell(Cell { buf: &self.buf[prev..end], flags: CellFlags::empty() });
            prev = end;
        }
        self.dispatch_row(sink)
    }

    fn force_truncate_row(&mut self, at: usize, sink: &mut dyn Sink) -> ControlFlow {
        self.pending_row_end_offset = self.cum_scanned_length + (at - self.drive_began_at) as u64;
        self.emit_cell(at, sink);
        self.truncated_pending = true;
        let ctrl = self.dispatch_row(sink);
        self.row_start = at;
        self.cell_start = at;
        self.quoted = 0;
        self.quote_close_position = 0;
        self.data_row_count += 1;
        ctrl
    }

    fn handle_structural_byte(&mut self, i: usize, bytes_read: usize, sink: &mut dyn Sink) -> ControlFlow {
        if self.skip_next_delim {
            self.skip_next_delim = false;
            return ControlFlow::Continue;
        }
        let c = self.buf[i];

        if self.quoted & flags::QUOTE_PENDING_LF != 0 {
            let prev = if i > 0 { self.buf[i - 1] } else { self.last };
            let confirmed = c == b'\n' && prev == b'\r';
            self.quoted &= !flags::QUOTE_PENDING_LF;
            if confirmed {
                return self.end_row(i - 1, i, sink);
            }
            self.quoted |= flags::QUOTE_NEEDED;
        }

        let delim = self.opts.delimiter;
        if c == delim {
            if self.quoted & flags::QUOTE_UNCLOSED == 0 {
                self.emit_cell(i, sink);
                self.cell_start = i + 1;
            } else {
                self.quoted |= flags::QUOTE_NEEDED;
            }
        } else if c == b'\r' {
            if self.quoted & flags::QUOTE_UNCLOSED != 0 {
                self.quoted |= flags::QUOTE_NEEDED;
            } else if self.opts.only_crlf_rowend {
                self.quoted |= flags::QUOTE_PENDING_LF;
            } else {
                return self.end_row(i, i, sink);
            }
        } else if c == b'\n' {
            if self.quoted & flags::QUOTE_UNCLOSED != 0 {
                self.quoted |= flags::QUOTE_NEEDED;
            } else if self.opts.only_crlf_rowend {
                self.quoted |= flags::QUOTE_NEEDED;
            } else if (if i > 0 { self.buf[i - 1] } else { self.last }) == b'\r' {
                self.cell_start = i + 1;
                self.row_start = i + 1;
            } else {
                return self.end_row(i, i, sink);
            }
        } else if !self.opts.no_quotes && c == b'"' {
            self.handle_quote(i, bytes_read);
        }
        ControlFlow::Continue
    }

    fn handle_quote(&mut self, i: usize, bytes_read: usize) {
        if i == self.cell_start && !self.buffer_exceeded {
            self.quoted = flags::QUOTE_UNCLOSED;
            self.quote_close_position = 0;
        } else if self.quoted & flags::QUOTE_UNCLOSED != 0 {
            if i + 1 < bytes_read {
                if self.buf[i + 1] != b'"' {
                    self.quoted |= flags::QUOTE_CLOSED;
                    self.quoted &= !flags::QUOTE_UNCLOSED;
                    if self.quote_close_position == 0 {
                        self.quote_close_position = i - self.cell_start;
                    }
                } else {
                    self.quoted |= flags::QUOTE_NEEDED | flags::QUOTE_EMBEDDED;
                    self.skip_next_delim = true;
                }
            } else {
                self.quoted |= flags::QUOTE_PENDING;
            }
        } else {
            self.quoted |= flags::QUOTE_EMBEDDED;
        }
    }

    fn end_row(&mut self, cell_end: usize, row_end_i: usize, sink: &mut dyn Sink) -> ControlFlow {
        self.pending_row_end_offset = self.cum_scanned_length + (row_end_i + 1 - self.drive_began_at) as u64;
        self.emit_cell(cell_end, sink);
        self.last = self.buf[row_end_i];
        let ctrl = self.dispatch_row(sink);
        self.cell_start = row_end_i + 1;
        self.row_start = row_end_i + 1;
        self.quoted = 0;
        self.quote_close_position = 0;
        self.data_row_count += 1;
        ctrl
    }

    fn emit_cell(&mut self, end: usize, sink: &mut dyn Sink) {
        let start = self.cell_start;
        let n = end.saturating_sub(start);
        let (s, mut len, public_flags) = self.postprocess_cell(start, n);

        if !matches!(self.opts.malformed_utf8, Utf8Policy::Keep)
            && core::str::from_utf8(&self.buf[s..s + len]).is_err()
        {
            len = self.repair_utf8(s, len);
        }
        if core::str::from_utf8(&self.buf[s..s + len]).is_err() {
            sink.warning(Warning::MalformedUtf8 { row: self.data_row_count, column: self.row_cells.len() });
        }

        if self.row_cells.len() < self.opts.max_columns {
            self.row_cells.push(RawCell { start: s, end: s + len, flags: public_flags });
            sink.cell(Cell { buf: &self.buf[s..s + len], flags: public_flags });
        } else {
            self.overflow_count += 1;
            sink.overflow(Cell { buf: &self.buf[s..s + len], flags: public_flags });
        }
        self.quoted = 0;
        self.quote_close_position = 0;
    }

    /// Strips/collapses quoting in place, following the same shifts as
    /// the scalar state machine's own bookkeeping. Returns the final
    /// `(start, len, public flags)` of the cell's content.
    fn postprocess_cell(&mut self, start: usize, n: usize) -> (usize, usize, CellFlags) {
        let quoted = self.quoted;
        if quoted == 0 {
            if self.opts.delimiter != b',' && memchr::memchr(b',', &self.buf[start..start + n]).is_some() {
                return (start, n, CellFlags::from_bits(flags::QUOTE_NEEDED));
            }
            return (start, n, CellFlags::empty());
        }

        let embedded = quoted & flags::QUOTE_EMBEDDED != 0;
        let closed = quoted & flags::QUOTE_CLOSED != 0;
        let mut public = 0u8;
        if quoted & flags::QUOTE_NEEDED != 0 {
            public |= flags::QUOTE_NEEDED;
        }
        if embedded {
            public |= flags::QUOTE_EMBEDDED;
        }
        if !closed {
            return (start, n, CellFlags::from_bits(public));
        }
        public |= flags::QUOTE_CLOSED;

        let qcp = self.quote_close_position;
        if qcp == 0 {
            return (start, n, CellFlags::from_bits(public));
        }
        if qcp + 1 == n {
            if !embedded {
                (start + 1, n - 2, CellFlags::from_bits(public))
            } else {
                let s0 = start + 1;
                let collapsed = collapse_doubled_quotes(&mut self.buf, s0, n - 1);
                (s0, collapsed - 1, CellFlags::from_bits(public))
            }
        } else {
            self.buf.copy_within(start..start + qcp, start + 1);
            let s = start + 2;
            let mut len = n - 2;
            if embedded {
                len = collapse_doubled_quotes(&mut self.buf, s, len);
            }
            (s, len, CellFlags::from_bits(public))
        }
    }

    fn repair_utf8(&mut self, start: usize, len: usize) -> usize {
        match self.opts.malformed_utf8 {
            Utf8Policy::Keep => len,
            Utf8Policy::Replace(byte) => replace_invalid_utf8(&mut self.buf[start..start + len], byte),
            Utf8Policy::Strip => strip_invalid_utf8(&mut self.buf[start..start + len]),
        }
    }

    pub(crate) fn take_truncated_warning(&mut self) -> bool {
        core::mem::replace(&mut self.truncated_pending, false)
    }

    pub(crate) fn take_overflow_count(&mut self) -> usize {
        core::mem::replace(&mut self.overflow_count, 0)
    }

    pub(crate) fn row_cursor(&self) -> RowCursor<'_> {
        RowCursor::new(&self.buf, &self.row_cells)
    }

    pub(crate) fn data_row_index(&self) -> u64 {
        self.data_row_count
    }

    /// Records the just-dispatched row's end offset into the row
    /// index, if enabled: the first call becomes the header-end
    /// checkpoint, every call after that is a regular indexed row.
    pub(crate) fn record_row_index(&mut self) {
        if !self.opts.build_row_index {
            return;
        }
        let offset = self.pending_row_end_offset;
        if !self.index_header_recorded {
            self.row_index.set_header_end(offset);
            self.index_header_recorded = true;
        } else {
            self.row_index.record_row(offset);
        }
    }

    /// Bookkeeping that runs once per row actually delivered to the
    /// user sink (`emitted_row_count`, the `extras` row cap, and the
    /// `extras` progress callback). Returns the control flow the
    /// caller should propagate, possibly escalated to `Cancel`.
    pub(crate) fn after_emit(&mut self, ctrl: ControlFlow) -> ControlFlow {
        if matches!(ctrl, ControlFlow::Cancel) {
            return ctrl;
        }
        self.emitted_row_count += 1;
        #[cfg(feature = "extras")]
        {
            if let Some(max) = self.opts.max_rows {
                if self.emitted_row_count >= max {
                    self.max_rows_hit = true;
                    return ControlFlow::Cancel;
                }
            }
            if !self.check_progress() {
                self.aborted = true;
                return ControlFlow::Cancel;
            }
        }
        ctrl
    }

    #[cfg(feature = "extras")]
    fn check_progress(&mut self) -> bool {
        let rows = self.emitted_row_count;
        let mut due = false;
        if let Some(progress) = self.opts.progress.as_ref() {
            if progress.rows_interval != 0 && rows % progress.rows_interval == 0 {
                due = true;
            }
        }
        #[cfg(feature = "std")]
        {
            if let Some(progress) = self.opts.progress.as_ref() {
                if progress.seconds_interval != 0 {
                    let now = std::time::Instant::now();
                    let elapsed = self
                        .last_progress_time
                        .map(|t| now.duration_since(t).as_secs())
                        .unwrap_or(u64::MAX);
                    if elapsed >= progress.seconds_interval {
                        due = true;
                    }
                    if due {
                        self.last_progress_time = Some(now);
                    }
                }
            }
        }
        if !due {
            return true;
        }
        match self.opts.progress.as_mut() {
            Some(progress) => (progress.callback)(rows),
            None => true,
        }
    }
}

fn collapse_doubled_quotes(buf: &mut [u8], s: usize, mut n: usize) -> usize {
    let mut i = 0usize;
    while i + 1 < n {
        if buf[s + i] == b'"' && buf[s + i + 1] == b'"' {
            if n > i + 2 {
                buf.copy_within((s + i + 2)..(s + n), s + i + 1);
            }
            n -= 1;
        }
        i += 1;
    }
    n
}

fn replace_invalid_utf8(buf: &mut [u8], replacement: u8) -> usize {
    let mut pos = 0;
    loop {
        match core::str::from_utf8(&buf[pos..]) {
            Ok(_) => break,
            Err(e) => {
                let valid_up_to = pos + e.valid_up_to();
                let bad_len = e.error_len().unwrap_or(buf.len() - valid_up_to);
                for b in &mut buf[valid_up_to..valid_up_to + bad_len] {
                    *b = replacement;
                }
                pos = valid_up_to + bad_len;
                if e.error_len().is_none() {
                    break;
                }
            }
        }
    }
    buf.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::flags as f;
    use crate::config::ScannerOptions;
    use crate::row::RowCursor;
    use crate::sink::RowControl;

    #[derive(Default)]
    struct Collector {
        rows: Vec<Vec<(alloc::string::String, CellFlags)>>,
    }

    impl Sink for Collector {
        fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
            self.rows.push(
                row.cells()
                    .map(|c| (alloc::string::String::from_utf8_lossy(c.buf).into_owned(), c.flags))
                    .collect(),
            );
            RowControl::Continue
        }
    }

    fn scan(opts: ScannerOptions, input: &[u8]) -> Collector {
        let mut scanner = Scanner::new(opts).unwrap();
        let mut sink = Collector::default();
        scanner.feed(input, &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        sink
    }

    #[test]
    fn closed_quote_cell_has_closed_flag_only() {
        let out = scan(ScannerOptions::default(), b"a,\"b\",c\n");
        assert_eq!(out.rows[0][1].0, "b");
        assert!(out.rows[0][1].1.contains(f::QUOTE_CLOSED));
        assert!(!out.rows[0][1].1.contains(f::QUOTE_NEEDED));
    }

    #[test]
    fn embedded_delimiter_sets_quote_needed() {
        let out = scan(ScannerOptions::default(), b"a,\"b,c\",d\n");
        assert_eq!(out.rows[0][1].0, "b,c");
        assert!(out.rows[0][1].1.contains(f::QUOTE_CLOSED));
        assert!(out.rows[0][1].1.contains(f::QUOTE_NEEDED));
    }

    #[test]
    fn doubled_quote_collapses_and_sets_embedded() {
        let out = scan(ScannerOptions::default(), b"a,\"say \"\"hi\"\"\",c\n");
        assert_eq!(out.rows[0][1].0, "say \"hi\"");
        assert!(out.rows[0][1].1.contains(f::QUOTE_EMBEDDED));
    }

    #[test]
    fn mid_cell_close_then_trailing_content_is_preserved() {
        // Quote opens at cell_start, closes mid-cell, then plain bytes follow.
        let out = scan(ScannerOptions::default(), b"a,\"b\"xyz,c\n");
        assert_eq!(out.rows[0][1].0, "bxyz");
    }

    #[test]
    fn only_crlf_rowend_treats_bare_lf_as_content() {
        let mut opts = ScannerOptions::default();
        opts.only_crlf_rowend = true;
        let out = scan(opts, b"a,b\nc\r\n");
        // The bare \n is content, so the whole thing is one row until \r\n.
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0][1].0, "b\nc");
    }

    #[test]
    fn row_exceeding_max_row_size_is_truncated() {
        let mut opts = ScannerOptions::default();
        opts.max_row_size = 8;
        opts.buffsize = 64 * 1024;
        let mut scanner = Scanner::new(opts).unwrap();

        #[derive(Default)]
        struct TruncationProbe {
            rows: usize,
            saw_truncated_warning: bool,
        }
        impl Sink for TruncationProbe {
            fn row(&mut self, _row: &RowCursor<'_>) -> RowControl {
                self.rows += 1;
                RowControl::Continue
            }
            fn warning(&mut self, warning: Warning) {
                if matches!(warning, Warning::RowTruncated) {
                    self.saw_truncated_warning = true;
                }
            }
        }

        let mut sink = TruncationProbe::default();
        scanner.feed(b"aaaaaaaaaaaaaaaa,b\nc,d\n", &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        assert!(sink.saw_truncated_warning);
        // The oversized row is split into more than one dispatched row.
        assert!(sink.rows >= 2);
    }

    #[test]
    fn fixed_width_splits_on_configured_offsets() {
        let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
        scanner.set_fixed_offsets(&[3, 6, 9]).unwrap();
        let mut sink = Collector::default();
        scanner.feed(b"abcdefghi\njkl\n", &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        assert_eq!(sink.rows[0].iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(), vec!["abc", "def", "ghi"]);
        // Short line: trailing cells truncate.
        assert_eq!(sink.rows[1].iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(), vec!["jkl", "", ""]);
    }

    #[test]
    fn fixed_width_offsets_cannot_change_after_scanning_begins() {
        let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
        scanner.set_fixed_offsets(&[3]).unwrap();
        let mut sink = Collector::default();
        scanner.feed(b"abc\n", &mut sink).unwrap();
        assert!(matches!(scanner.set_fixed_offsets(&[3, 5]), Err(Error::ModeLocked)));
    }

    #[test]
    fn bom_is_stripped_and_reported_in_cum_scanned_length() {
        let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
        let mut sink = Collector::default();
        let mut input = alloc::vec![0xEFu8, 0xBB, 0xBF];
        input.extend_from_slice(b"a,b\n");
        scanner.feed(&input, &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        assert_eq!(sink.rows[0].iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        // The 3 BOM bytes are folded into the exposed cumulative offset
        // even though they were never handed to the sink as cell content.
        assert_eq!(scanner.cum_scanned_length(), input.len() as u64);
    }

    #[test]
    fn insert_header_row_does_not_swallow_a_real_bom() {
        let mut opts = ScannerOptions::default();
        opts.insert_header_row = Some("h1,h2".into());
        let mut scanner = Scanner::new(opts).unwrap();
        let mut sink = Collector::default();
        let mut input = alloc::vec![0xEFu8, 0xBB, 0xBF];
        input.extend_from_slice(b"a,b\n");
        scanner.feed(&input, &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        assert_eq!(
            sink.rows.iter().map(|r| r.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>()).collect::<Vec<_>>(),
            vec![vec!["h1", "h2"], vec!["a", "b"]]
        );
    }

    fn scan_in_chunks(opts: ScannerOptions, input: &[u8], chunk_size: usize) -> Collector {
        let mut scanner = Scanner::new(opts).unwrap();
        let mut sink = Collector::default();
        for chunk in input.chunks(chunk_size.max(1)) {
            scanner.feed(chunk, &mut sink).unwrap();
        }
        scanner.finish(&mut sink).unwrap();
        sink
    }

    fn row_strings(rows: &[Vec<(alloc::string::String, CellFlags)>]) -> Vec<Vec<&str>> {
        rows.iter().map(|r| r.iter().map(|(s, _)| s.as_str()).collect()).collect()
    }

    #[test]
    fn crlf_split_exactly_between_cr_and_lf_does_not_emit_spurious_row() {
        let input = b"a,b\r\nc,d\r\n";
        // Chunk boundary falls right between the \r and the \n of the first row end.
        let out = scan_in_chunks(ScannerOptions::default(), input, 4);
        assert_eq!(row_strings(&out.rows), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn only_crlf_pending_lf_confirmed_across_chunk_boundary() {
        let mut opts = ScannerOptions::default();
        opts.only_crlf_rowend = true;
        let input = b"a,b\r\nc,d\r\n";
        let out = scan_in_chunks(opts, input, 4);
        assert_eq!(row_strings(&out.rows), vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn row_cells_rebase_across_refill_keeps_correct_cell_bytes() {
        // Chunk boundary falls mid-second-cell of the non-leading row, so
        // "d" is already emitted into row_cells before the refill that
        // carries in "e".
        let out = scan_in_chunks(ScannerOptions::default(), b"a,b\nc,d,e\n", 7);
        assert_eq!(row_strings(&out.rows), vec![vec!["a", "b"], vec!["c", "d", "e"]]);
    }

    #[test]
    fn finish_after_boundary_with_emitted_cell_in_partial_row() {
        // Final partial row "c,d" spans a refill: "c," is emitted and
        // buffered in row_cells, then "d" arrives with no trailing
        // newline, flushed only by `finish`.
        let out = scan_in_chunks(ScannerOptions::default(), b"a,b\nc,d", 5);
        assert_eq!(row_strings(&out.rows), vec![vec!["a", "b"], vec!["c", "d"]]);
    }
}

fn strip_invalid_utf8(buf: &mut [u8]) -> usize {
    let mut write = 0;
    let mut pos = 0;
    loop {
        match core::str::from_utf8(&buf[pos..]) {
            Ok(_) => {
                buf.copy_within(pos.., write);
                write += buf.len() - pos;
                break;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                buf.copy_within(pos..pos + valid_up_to, write);
                write += valid_up_to;
                let bad_len = e.error_len().unwrap_or(buf.len() - pos - valid_up_to);
                pos += valid_up_to + bad_len;
                if e.error_len().is_none() || pos >= buf.len() {
                    break;
                }
            }
        }
    }
    write
}
