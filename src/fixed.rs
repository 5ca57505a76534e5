//! A compile-time-checked fixed-width scanner builder.
//!
//! [`Scanner::set_fixed_offsets`](crate::Scanner::set_fixed_offsets) enforces
//! at runtime that offsets can't change once scanning has begun — the
//! same guarantee the C original gives, re-checked on every call. When
//! a caller knows upfront that they want fixed-width mode, this
//! typestate wrapper makes "reconfigure offsets after scanning" a
//! compile error instead, by only exposing `set_offsets` on the
//! `Configuring` marker type.

use core::marker::PhantomData;

use crate::config::ScannerOptions;
use crate::error::{Error, Status};
use crate::sink::Sink;
use crate::Scanner;

pub struct Configuring;
pub struct Scanning;

/// A fixed-width scanner whose offsets can only be set while in the
/// `Configuring` state; [`FixedWidthScanner::<Configuring>::begin`]
/// consumes it and returns a `FixedWidthScanner<Scanning>` that no
/// longer exposes `set_offsets` at all.
pub struct FixedWidthScanner<State> {
    inner: Scanner,
    _state: PhantomData<State>,
}

impl FixedWidthScanner<Configuring> {
    pub fn new(opts: ScannerOptions) -> Result<Self, Error> {
        Ok(FixedWidthScanner { inner: Scanner::new(opts)?, _state: PhantomData })
    }

    pub fn set_offsets(&mut self, offsets: &[usize]) -> Result<(), Error> {
        self.inner.set_fixed_offsets(offsets)
    }

    /// Locks in the configured offsets and transitions to the
    /// `Scanning` state.
    pub fn begin(self) -> FixedWidthScanner<Scanning> {
        FixedWidthScanner { inner: self.inner, _state: PhantomData }
    }
}

impl FixedWidthScanner<Scanning> {
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn Sink) -> Result<Status, Error> {
        self.inner.feed(chunk, sink)
    }

    pub fn finish(&mut self, sink: &mut dyn Sink) -> Result<Status, Error> {
        self.inner.finish(sink)
    }

    pub fn abort(&mut self) {
        self.inner.abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowCursor;
    use crate::sink::RowControl;

    #[derive(Default)]
    struct Collector(alloc::vec::Vec<alloc::vec::Vec<alloc::string::String>>);

    impl Sink for Collector {
        fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
            self.0.push(
                row.cells()
                    .map(|c| alloc::string::String::from_utf8_lossy(c.buf).into_owned())
                    .collect(),
            );
            RowControl::Continue
        }
    }

    #[test]
    fn configuring_to_scanning_splits_rows_on_offsets() {
        let mut builder = FixedWidthScanner::<Configuring>::new(ScannerOptions::default()).unwrap();
        builder.set_offsets(&[2, 4]).unwrap();
        let mut scanner = builder.begin();
        let mut sink = Collector::default();
        scanner.feed(b"abcd\nefgh\n", &mut sink).unwrap();
        scanner.finish(&mut sink).unwrap();
        assert_eq!(sink.0, vec![vec!["ab", "cd"], vec!["ef", "gh"]]);
    }

    #[test]
    fn rejects_non_increasing_offsets_at_configure_time() {
        let mut builder = FixedWidthScanner::<Configuring>::new(ScannerOptions::default()).unwrap();
        assert!(matches!(builder.set_offsets(&[4, 2]), Err(Error::InvalidFixedOffsets(_))));
    }
}
