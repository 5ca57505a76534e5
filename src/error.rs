use thiserror::Error;

/// Fatal errors returned by the core scanner API.
///
/// Recoverable conditions (row truncation, column overflow, malformed
/// UTF-8, blank header rows) are not represented here — they are
/// reported through [`crate::sink::Sink::warning`] as a [`Warning`],
/// so a caller can match on them instead of parsing a message string.
#[derive(Debug, Error)]
pub enum Error {
    /// An option was invalid at construction or reconfiguration time.
    #[error("invalid option: {0}")]
    InvalidOption(&'static str),

    /// The scanner's mode (delimited vs. fixed-width) cannot be changed
    /// once parsing has begun.
    #[error("scanner mode cannot be changed after parsing has begun")]
    ModeLocked,

    /// Fixed-width cell-end offsets were not strictly non-decreasing,
    /// or exceeded the configured buffer size.
    #[error("invalid fixed-width offsets: {0}")]
    InvalidFixedOffsets(&'static str),

    /// An overwrite source could not be opened or validated.
    #[error("overwrite source rejected: {0}")]
    OverwriteSourceInvalid(alloc::string::String),

    /// Re-entering the scanner's drive loop from within a callback is
    /// not supported (no re-entrancy).
    #[error("parse_more called re-entrantly from within a callback")]
    Reentrant,

    /// Reading from, or seeking within, an underlying [`std::io::Read`]
    /// source failed. Only constructed by [`crate::pull`] and
    /// [`crate::seek_to_row`], both of which need `std`.
    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal / control-flow outcomes of a scan step, distinct from
/// [`Error`] because they are expected, ordinary results rather than
/// failures (spec's "Flow" taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Scanning completed normally (possibly suspended between rows).
    Ok,
    /// A [`crate::sink::RowControl::Cancel`] or `abort()` stopped the scan.
    Cancelled,
    /// The input source reported zero bytes read.
    NoMoreInput,
    /// The configured `max_rows` cap was reached.
    #[cfg(feature = "extras")]
    MaxRowsRead,
}

/// Recoverable, non-fatal conditions surfaced through the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// A row exceeded the scanner's buffer and was truncated at the
    /// next row boundary.
    RowTruncated,
    /// A row had more cells than `max_columns`; the excess were
    /// dropped (but still passed to [`crate::sink::Sink::overflow`]).
    ColumnOverflow { max_columns: usize, overflow: usize },
    /// A cell's bytes were not valid UTF-8 and were handled per the
    /// configured [`crate::config::Utf8Policy`].
    MalformedUtf8 { row: u64, column: usize },
    /// Leading all-blank rows were skipped before the header.
    BlankHeaderRowsSkipped { count: usize },
    /// A supplied overwrite SQL query was rejected (not read-only, not
    /// a single statement, or missing required columns) and a safe
    /// default query was substituted instead.
    OverwriteQueryRejected,
}
