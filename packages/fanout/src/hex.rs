//! Hex-dump rendering for the console sink.
//!
//! Bytes are printed as two lowercase hex digits, grouped four to a word
//! with a space between words and sixteen to a line, and every chunk ends
//! with a newline:
//!
//! ```text
//! 00010203 04050607 08090a0b 0c0d0e0f
//! 10111213
//! ```

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Append the hex rendering of `chunk` to `out`.
pub fn render(chunk: &[u8], out: &mut Vec<u8>) {
    out.reserve(chunk.len() * 2 + chunk.len() / 4 + 1);
    for (i, &byte) in chunk.iter().enumerate() {
        if i != 0 {
            if i % 16 == 0 {
                out.push(b'\n');
            } else if i % 4 == 0 {
                out.push(b' ');
            }
        }
        out.push(DIGITS[usize::from(byte >> 4)]);
        out.push(DIGITS[usize::from(byte & 0x0f)]);
    }
    out.push(b'\n');
}
