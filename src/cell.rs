//! Cell values and the flag bits attached to them.

/// Bit positions for [`CellFlags`], mirroring the scanner's internal
/// quote-state bitset. Only [`QUOTE_CLOSED`], [`QUOTE_NEEDED`] and
/// [`QUOTE_EMBEDDED`] are ever observed on an emitted cell; the
/// remaining bits (`UNCLOSED`, `PENDING`, `PENDING_LF`) describe
/// mid-scan state and never escape the scanner.
pub mod flags {
    pub const QUOTE_UNCLOSED: u8 = 0x01;
    pub const QUOTE_CLOSED: u8 = 0x02;
    pub const QUOTE_NEEDED: u8 = 0x04;
    pub const QUOTE_EMBEDDED: u8 = 0x08;
    pub const QUOTE_PENDING: u8 = 0x10;
    pub const QUOTE_PENDING_LF: u8 = 0x20;

    pub(crate) const PUBLIC_MASK: u8 = QUOTE_CLOSED | QUOTE_NEEDED | QUOTE_EMBEDDED;
}

/// Public, per-cell quoting metadata.
///
/// A plain newtype over a `u8` bitset rather than the `bitflags` crate:
/// the set of bits is small, fixed, and already shaped like the
/// original implementation's bit constants.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct CellFlags(u8);

impl CellFlags {
    pub const fn empty() -> Self {
        CellFlags(0)
    }

    pub(crate) const fn from_bits(bits: u8) -> Self {
        CellFlags(bits & flags::PUBLIC_MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// Whether the cell was enclosed in a matched pair of quotes.
    pub const fn was_quoted(self) -> bool {
        self.contains(flags::QUOTE_CLOSED)
    }

    /// Whether quoting would be required to losslessly re-serialize
    /// this cell with the scanner's delimiter (it contains the
    /// delimiter, a newline, a quote, or — with a non-comma delimiter
    /// — a literal comma).
    pub const fn quoting_needed(self) -> bool {
        self.contains(flags::QUOTE_NEEDED)
    }

    /// Whether the cell contained an escaped (doubled) quote
    /// character.
    pub const fn had_embedded_quote(self) -> bool {
        self.contains(flags::QUOTE_EMBEDDED)
    }
}

impl core::fmt::Debug for CellFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CellFlags")
            .field("quoted", &self.was_quoted())
            .field("quoting_needed", &self.quoting_needed())
            .field("embedded_quote", &self.had_embedded_quote())
            .finish()
    }
}

/// A single scanned cell: a zero-copy byte slice plus its quoting
/// flags.
///
/// Quote collapsing (stripping the enclosing quotes and collapsing
/// `""` into `"`) happens eagerly, in place, before the cell is
/// handed to a sink — unlike a purely lazy design, `buf` always holds
/// the decoded content, never the raw quoted bytes. This matches how
/// the scanner must mutate its own buffer to satisfy the invariant
/// that every cell byte is examined exactly once.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Cell<'a> {
    pub buf: &'a [u8],
    pub flags: CellFlags,
}

impl<'a> Cell<'a> {
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Validates the cell as UTF-8 without copying. Returns an error
    /// if the configured [`crate::config::Utf8Policy`] was `Keep` and
    /// the bytes are not valid UTF-8; under `Replace`/`Strip` the
    /// bytes have already been repaired by the scanner and this
    /// always succeeds.
    pub fn try_as_str(&self) -> Result<&'a str, core::str::Utf8Error> {
        core::str::from_utf8(self.buf)
    }
}

impl core::fmt::Debug for Cell<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.try_as_str() {
            Ok(s) => write!(f, "Cell({s:?}, {:?})", self.flags),
            Err(_) => write!(f, "Cell({:?}, {:?})", self.buf, self.flags),
        }
    }
}
