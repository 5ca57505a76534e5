//! Scanner configuration.

use alloc::string::String;

use crate::error::Error;

/// How a cell's bytes are repaired when they are not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8Policy {
    /// Leave the bytes untouched; `Cell::try_as_str` will return an
    /// error for the affected cell.
    #[default]
    Keep,
    /// Replace each malformed byte with the given substitute byte.
    Replace(u8),
    /// Drop malformed bytes from the cell entirely.
    Strip,
}

/// Callback configuration for `extras`-gated progress reporting.
#[cfg(feature = "extras")]
pub struct ProgressConfig {
    /// Invoke the callback at least this often, in scanned data rows
    /// (0 disables the row-count trigger).
    pub rows_interval: u64,
    /// Invoke the callback at least this often, in wall-clock seconds
    /// (0 disables the time trigger). Requires `std`.
    pub seconds_interval: u64,
    /// Called with the number of data rows scanned so far. Returning
    /// `false` cancels the scan, equivalent to a [`crate::sink::RowControl::Cancel`].
    pub callback: alloc::boxed::Box<dyn FnMut(u64) -> bool>,
}

/// Scanner construction and behavior options.
///
/// Cloned rather than shared: a [`crate::Scanner`] owns its options
/// for its whole lifetime and only a few fields (buffer size, column
/// limits) are read after construction.
#[derive(Clone)]
pub struct ScannerOptions {
    /// The field delimiter. Must not be `\n`, `\r`, or `"`.
    pub delimiter: u8,
    /// Disable all quote handling; `"` becomes an ordinary data byte.
    pub no_quotes: bool,
    /// Maximum number of cells kept per row; additional cells are
    /// routed to [`crate::sink::Sink::overflow`] instead of
    /// [`crate::sink::Sink::cell`].
    pub max_columns: usize,
    /// Maximum number of bytes a single row may occupy before it is
    /// truncated at the next row boundary and a
    /// [`crate::error::Warning::RowTruncated`] is raised.
    pub max_row_size: usize,
    /// Internal buffer capacity, in bytes. `0` resolves to
    /// `max(64 KiB, 2 * max_row_size)`.
    pub buffsize: usize,
    /// Number of leading rows to discard unconditionally, before any
    /// other header policy runs.
    pub rows_to_ignore: usize,
    /// If true, leading all-blank rows are kept rather than skipped
    /// before the header row is determined.
    pub keep_empty_header_rows: bool,
    /// Number of consecutive rows, after blank-skipping, to collate
    /// (space-joined per column) into a single synthesized header row.
    /// `1` (the default) means "use the first row as-is".
    pub header_span: usize,
    /// If set, a synthetic row is parsed ahead of all real input and
    /// used as row 0, as though it were the first line of the file.
    pub insert_header_row: Option<String>,
    /// Policy for repairing non-UTF-8 cell bytes.
    pub malformed_utf8: Utf8Policy,
    /// If true, a bare `\r` not followed by `\n` never ends a row; the
    /// only recognized row terminator is `\r\n`.
    pub only_crlf_rowend: bool,
    /// If true, the scanner accumulates a [`crate::index::RowIndex`]
    /// as it scans, recording the byte offset of every `ROW_N`th row
    /// end plus the header-row end, so a caller can later seek to an
    /// arbitrary row without rescanning from the start.
    pub build_row_index: bool,
    /// Hard cap on the number of data rows scanned, after which the
    /// scan stops as if cancelled (`extras`).
    #[cfg(feature = "extras")]
    pub max_rows: Option<u64>,
    /// Progress reporting (`extras`).
    #[cfg(feature = "extras")]
    pub progress: Option<ProgressConfig>,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        ScannerOptions {
            delimiter: b',',
            no_quotes: false,
            max_columns: 1024,
            max_row_size: 64 * 1024,
            buffsize: 0,
            rows_to_ignore: 0,
            keep_empty_header_rows: false,
            header_span: 1,
            insert_header_row: None,
            malformed_utf8: Utf8Policy::Keep,
            only_crlf_rowend: false,
            build_row_index: false,
            #[cfg(feature = "extras")]
            max_rows: None,
            #[cfg(feature = "extras")]
            progress: None,
        }
    }
}

impl ScannerOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if matches!(self.delimiter, b'\n' | b'\r' | b'"') {
            return Err(Error::InvalidOption("delimiter cannot be CR, LF, or a quote"));
        }
        if self.max_columns == 0 {
            return Err(Error::InvalidOption("max_columns must be at least 1"));
        }
        if self.max_row_size == 0 {
            return Err(Error::InvalidOption("max_row_size must be at least 1"));
        }
        if self.header_span == 0 {
            return Err(Error::InvalidOption("header_span must be at least 1"));
        }
        if self.buffsize != 0 && self.buffsize < 4096 {
            return Err(Error::InvalidOption("buffsize must be at least 4096 bytes"));
        }
        Ok(())
    }

    pub(crate) fn resolved_buffsize(&self) -> usize {
        let floor = core::cmp::max(64 * 1024, 2 * self.max_row_size);
        core::cmp::max(self.buffsize, floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        ScannerOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_newline_or_quote_as_delimiter() {
        for bad in [b'\n', b'\r', b'"'] {
            let mut opts = ScannerOptions::default();
            opts.delimiter = bad;
            assert!(matches!(opts.validate(), Err(Error::InvalidOption(_))));
        }
    }

    #[test]
    fn rejects_undersized_explicit_buffsize() {
        let mut opts = ScannerOptions::default();
        opts.buffsize = 100;
        assert!(matches!(opts.validate(), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn resolved_buffsize_grows_to_cover_max_row_size() {
        let mut opts = ScannerOptions::default();
        opts.max_row_size = 1_000_000;
        assert!(opts.resolved_buffsize() >= 2_000_000);
    }
}
