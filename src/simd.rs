//! Vectorized structural-byte search.
//!
//! `memchr` already dispatches to SSE2/AVX2/AVX-512/NEON at runtime
//! (under the `std` feature) or at compile time, so the scanner never
//! hand-rolls a movemask/bitmask loop itself: it asks for the position
//! of the next interesting byte and lets `memchr` pick the fastest way
//! to find it. `memchr3` covers three needles at once; a fourth
//! (`\r`, since `\n`, `"` and the delimiter already fill the other
//! three slots) is folded in with a second `memchr` call and a `min`.

/// Returns the offset of the first occurrence, in `hay`, of the
/// delimiter, `\n`, `\r`, or (if `quotes_enabled`) `"` — whichever
/// comes first.
#[inline]
pub(crate) fn find_structural(hay: &[u8], delimiter: u8, quotes_enabled: bool) -> Option<usize> {
    let primary = memchr::memchr3(delimiter, b'\n', b'\r', hay);
    if !quotes_enabled {
        return primary;
    }
    let quote = memchr::memchr(b'"', hay);
    match (primary, quote) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
/// A deliberately naive byte-at-a-time scan, used only to check that
/// [`find_structural`] agrees with it across many inputs.
pub(crate) fn find_structural_scalar(hay: &[u8], delimiter: u8, quotes_enabled: bool) -> Option<usize> {
    hay.iter()
        .position(|&b| b == delimiter || b == b'\n' || b == b'\r' || (quotes_enabled && b == b'"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agrees_with_scalar_on_random_inputs() {
        let mut state: u64 = 0x243F6A8885A308D3;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let alphabet = [b'a', b'b', b',', b'\n', b'\r', b'"', b'\t'];
        for _ in 0..500 {
            let len = (next() % 200) as usize;
            let buf: Vec<u8> = (0..len).map(|_| alphabet[(next() % alphabet.len() as u64) as usize]).collect();
            for quotes_enabled in [true, false] {
                for delim in [b',', b'\t'] {
                    assert_eq!(
                        find_structural(&buf, delim, quotes_enabled),
                        find_structural_scalar(&buf, delim, quotes_enabled),
                        "buf={buf:?} delim={delim} quotes_enabled={quotes_enabled}"
                    );
                }
            }
        }
    }
}
