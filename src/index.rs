//! A sparse row index: records the byte offset of every `ROW_N`th row
//! end, so seeking to an arbitrary row only has to scan forward at
//! most `ROW_N - 1` rows from the nearest recorded checkpoint.

use alloc::vec::Vec;

/// Only every 1024th row's end offset is recorded.
pub const ROW_SHIFT: u32 = 10;
pub const ROW_N: u64 = 1 << ROW_SHIFT;

/// One doubling-capacity segment of checkpoint offsets. Segments are
/// never resized in place (matching the chained-array growth of the
/// structure this is grounded on) — once full, a new, larger segment
/// is appended.
struct Segment {
    offsets: Vec<u64>,
}

/// A sparse index over a scanned file's row boundaries.
///
/// Built incrementally as rows are scanned (via [`RowIndex::record_row`]),
/// then used to plan a seek: [`RowIndex::seek_plan`] returns the byte
/// offset to start reading from and the number of rows to skip forward
/// from there to land exactly on the requested row.
pub struct RowIndex {
    header_end: Option<u64>,
    segments: Vec<Segment>,
    rows_seen: u64,
    next_segment_cap: usize,
}

impl Default for RowIndex {
    fn default() -> Self {
        RowIndex { header_end: None, segments: Vec::new(), rows_seen: 0, next_segment_cap: 64 }
    }
}

impl RowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header_end(&mut self, offset: u64) {
        self.header_end = Some(offset);
    }

    /// Called once per data row, in order, with the byte offset just
    /// past that row's terminator.
    pub fn record_row(&mut self, row_end_offset: u64) {
        if self.rows_seen % ROW_N == 0 {
            self.push_checkpoint(row_end_offset);
        }
        self.rows_seen += 1;
    }

    fn push_checkpoint(&mut self, offset: u64) {
        if self.segments.last().map(|s| s.offsets.len() == s.offsets.capacity()).unwrap_or(true) {
            self.segments.push(Segment { offsets: Vec::with_capacity(self.next_segment_cap) });
            self.next_segment_cap *= 2;
        }
        self.segments.last_mut().unwrap().offsets.push(offset);
    }

    pub fn row_count(&self) -> u64 {
        self.rows_seen
    }

    fn checkpoint(&self, index: usize) -> Option<u64> {
        let mut remaining = index;
        for seg in &self.segments {
            if remaining < seg.offsets.len() {
                return Some(seg.offsets[remaining]);
            }
            remaining -= seg.offsets.len();
        }
        None
    }

    /// Returns `(byte_offset, rows_to_skip)`: the byte offset to begin
    /// reading from, and how many additional data rows to skip forward
    /// (without reporting them to a sink) before row `target_row` (0
    /// based, relative to the first data row) is reached.
    pub fn seek_plan(&self, target_row: u64) -> Option<SeekPlan> {
        if target_row >= self.rows_seen {
            return None;
        }
        let checkpoint_index = (target_row / ROW_N) as usize;
        let checkpoint_row = checkpoint_index as u64 * ROW_N;
        let offset = if checkpoint_index == 0 {
            self.header_end.unwrap_or(0)
        } else {
            self.checkpoint(checkpoint_index - 1)?
        };
        Some(SeekPlan { byte_offset: offset, rows_to_skip: target_row - checkpoint_row })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPlan {
    pub byte_offset: u64,
    pub rows_to_skip: u64,
}

/// A [`crate::sink::Sink`] decorator that discards the first `N` rows
/// (and their cells) unconditionally, then forwards everything to an
/// inner sink. Used to fast-forward from a [`SeekPlan::rows_to_skip`]
/// checkpoint to the exact target row without surfacing the
/// intervening rows to the caller.
#[cfg(feature = "std")]
pub struct SkipRowsSink<'s, S: ?Sized> {
    inner: &'s mut S,
    remaining: u64,
}

#[cfg(feature = "std")]
impl<'s, S: crate::sink::Sink + ?Sized> SkipRowsSink<'s, S> {
    pub fn new(inner: &'s mut S, rows_to_skip: u64) -> Self {
        SkipRowsSink { inner, remaining: rows_to_skip }
    }

    /// Whether every row this was constructed to skip has gone by.
    pub fn done(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(feature = "std")]
impl<'s, S: crate::sink::Sink + ?Sized> crate::sink::Sink for SkipRowsSink<'s, S> {
    fn cell(&mut self, cell: crate::cell::Cell<'_>) {
        if self.remaining == 0 {
            self.inner.cell(cell);
        }
    }

    fn row(&mut self, row: &crate::row::RowCursor<'_>) -> crate::sink::RowControl {
        if self.remaining > 0 {
            self.remaining -= 1;
            crate::sink::RowControl::Continue
        } else {
            self.inner.row(row)
        }
    }

    fn overflow(&mut self, cell: crate::cell::Cell<'_>) {
        if self.remaining == 0 {
            self.inner.overflow(cell);
        }
    }

    fn warning(&mut self, warning: crate::error::Warning) {
        self.inner.warning(warning);
    }
}

/// Seeks `reader` to the nearest indexed checkpoint at or before
/// `target_row`, then drives `scanner` forward, discarding rows, until
/// `target_row` itself is about to be delivered — after which
/// `scanner`/`sink` behave exactly as if the whole file had been
/// scanned from the start.
///
/// Returns `Ok(false)` if `target_row` is beyond any row this index
/// has seen (the caller should fall back to a full scan).
#[cfg(feature = "std")]
pub fn seek_to_row<R, S>(
    index: &RowIndex,
    reader: &mut R,
    scanner: &mut crate::scanner::Scanner,
    target_row: u64,
    sink: &mut S,
) -> Result<bool, crate::error::Error>
where
    R: std::io::Read + std::io::Seek,
    S: crate::sink::Sink + ?Sized,
{
    let Some(plan) = index.seek_plan(target_row) else {
        return Ok(false);
    };
    reader.seek(std::io::SeekFrom::Start(plan.byte_offset))?;

    let mut skip = SkipRowsSink::new(sink, plan.rows_to_skip);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            scanner.finish(&mut skip)?;
            break;
        }
        scanner.feed(&buf[..n], &mut skip)?;
        if skip.done() && scanner.data_row_count() > target_row {
            break;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_recorded_every_row_n() {
        let mut idx = RowIndex::new();
        idx.set_header_end(10);
        for row_end in 1..=(ROW_N * 3) {
            idx.record_row(row_end * 4);
        }
        assert_eq!(idx.row_count(), ROW_N * 3);
        // Row 0 sits right after the header checkpoint.
        let plan0 = idx.seek_plan(0).unwrap();
        assert_eq!(plan0, SeekPlan { byte_offset: 10, rows_to_skip: 0 });

        // A row exactly on a checkpoint boundary seeks straight to it.
        let plan_n = idx.seek_plan(ROW_N).unwrap();
        assert_eq!(plan_n.rows_to_skip, 0);

        // A row mid-way between checkpoints requires skipping forward.
        let target = ROW_N + 5;
        let plan_mid = idx.seek_plan(target).unwrap();
        assert_eq!(plan_mid.rows_to_skip, 5);
    }

    #[test]
    fn seek_plan_rejects_rows_beyond_what_was_seen() {
        let mut idx = RowIndex::new();
        idx.record_row(100);
        assert!(idx.seek_plan(5).is_none());
    }

    #[test]
    fn segments_double_capacity_as_they_fill() {
        let mut idx = RowIndex::new();
        // The first segment starts with capacity 64 checkpoints; once
        // that many `ROW_N`-row boundaries have been crossed, a second,
        // larger segment must be allocated.
        let rows_needed = 64 * ROW_N + 1;
        for row_end in 0..rows_needed {
            idx.record_row(row_end);
        }
        assert_eq!(idx.row_count(), rows_needed);
        assert!(idx.segments.len() > 1);
    }
}
