//! `zsv-core` is a streaming, vectorized scanner for delimited
//! (CSV/TSV/RFC-4180-ish) and fixed-width tabular data.
//!
//! - **Zero-copy**: cells handed to a [`Sink`] borrow directly from the
//!   scanner's internal buffer; a sink that needs to keep a value past
//!   its callback must copy it itself.
//! - **Streaming**: input arrives in arbitrary-sized chunks via
//!   [`Scanner::feed`]. A row, or even a single cell, may straddle a
//!   chunk boundary — the scanner carries the unterminated tail of its
//!   buffer forward rather than requiring pre-split input.
//! - **Vectorized**: structural bytes (delimiter, quote, `\r`, `\n`)
//!   are located with [`memchr`], which dispatches to SSE2/AVX2/AVX-512
//!   or NEON at runtime under `std`.
//!
//! # Example
//!
//! ```
//! use zsv_core::{Scanner, ScannerOptions, Sink, RowControl, RowCursor};
//!
//! struct Rows(Vec<Vec<String>>);
//! impl Sink for Rows {
//!     fn row(&mut self, row: &RowCursor<'_>) -> RowControl {
//!         self.0.push(row.cells().map(|c| c.try_as_str().unwrap().to_owned()).collect());
//!         RowControl::Continue
//!     }
//! }
//!
//! let mut scanner = Scanner::new(ScannerOptions::default()).unwrap();
//! let mut rows = Rows(Vec::new());
//! scanner.feed(b"a,b,c\n1,2,3\n", &mut rows).unwrap();
//! scanner.finish(&mut rows).unwrap();
//! assert_eq!(rows.0, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
//! ```
//!
//! # Crate features
//!
//! * **std** (default) — enables runtime SIMD dispatch in `memchr`,
//!   [`std::error::Error`] impls via `thiserror`, the file-backed
//!   overwrite sources, wall-clock progress reporting, and the
//!   [`pull`] and row-index seek adaptors (both need [`std::io`]).
//! * **alloc** (default) — the scanner's chunk buffer and header-span
//!   collation always need an allocator, so this is implied by `std`
//!   and otherwise must be enabled directly.
//! * **extras** — `max_rows`/progress-callback support, mirroring the
//!   optional `ZSV_EXTRAS` functionality of the library this crate is
//!   modeled on.
//! * **sqlite** — the SQLite-backed overwrite source, via `rusqlite`.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod cell;
mod config;
mod error;
mod fixed;
mod header;
mod index;
mod overwrite;
#[cfg(feature = "std")]
mod pull;
mod row;
mod scanner;
mod simd;
mod sink;

pub use cell::{Cell, CellFlags};
pub use config::{ScannerOptions, Utf8Policy};
#[cfg(feature = "extras")]
pub use config::ProgressConfig;
pub use error::{Error, Status, Warning};
pub use fixed::{Configuring, FixedWidthScanner, Scanning};
pub use index::{RowIndex, SeekPlan};
#[cfg(feature = "std")]
pub use index::{seek_to_row, SkipRowsSink};
pub use overwrite::{OverwriteEntry, OverwriteMerge, OverwriteSource, VecOverwriteSource};
#[cfg(feature = "std")]
pub use overwrite::{overwrite_auto_path, CsvOverwriteSource};
#[cfg(feature = "sqlite")]
pub use overwrite::SqliteOverwriteSource;
#[cfg(feature = "std")]
pub use pull::{PullScanner, PulledRow};
pub use row::RowCursor;
pub use scanner::Scanner;
pub use sink::{NullSink, RowControl, Sink};
