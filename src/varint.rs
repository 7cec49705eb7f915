//! Decodes SQLite's variable-length integer encoding: 1-9 big-endian bytes,
//! the high bit of each of the first 8 bytes marking "more bytes follow".
//!
//! The source can be a byte slice or a `Read`; both go through the same
//! `Cursor` trait so there is exactly one decoding loop.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Source ended before a varint terminated.")]
    Truncated,
}

/// A source of bytes a varint can be decoded from, one byte at a time.
pub trait Cursor {
    /// Returns the next byte, or `None` at end of input.
    fn next_byte(&mut self) -> Option<u8>;
}

/// Reads a varint from an in-memory byte slice without consuming it;
/// the caller advances past `bytes_consumed` bytes themselves if needed.
pub struct SliceCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        SliceCursor { bytes, pos: 0 }
    }
}

impl<'a> Cursor for SliceCursor<'a> {
    fn next_byte(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }
}

/// Adapts any `std::io::Read` into a `Cursor`, consuming bytes as it reads them.
pub struct ReadCursor<'a, R: std::io::Read> {
    r: &'a mut R,
}

impl<'a, R: std::io::Read> ReadCursor<'a, R> {
    pub fn new(r: &'a mut R) -> Self {
        ReadCursor { r }
    }
}

impl<'a, R: std::io::Read> Cursor for ReadCursor<'a, R> {
    fn next_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.r.read_exact(&mut buf) {
            Ok(()) => Some(buf[0]),
            Err(_) => None,
        }
    }
}

const MAX_VARINT_BYTES: usize = 9;

/// Decodes a varint from any `Cursor`, returning `(value, bytes_consumed)`.
pub fn read_varint<C: Cursor>(c: &mut C) -> Result<(i64, usize), Error> {
    let mut accum: i64 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = c.next_byte().ok_or(Error::Truncated)?;
        if i == MAX_VARINT_BYTES - 1 {
            // Ninth byte contributes all 8 bits, no continuation flag.
            accum = (accum << 8) | byte as i64;
            return Ok((accum, MAX_VARINT_BYTES));
        }
        accum = (accum << 7) | (byte & 0x7f) as i64;
        if byte & 0x80 == 0 {
            return Ok((accum, i + 1));
        }
    }
    unreachable!();
}

/// Convenience wrapper to decode a varint from the start of a byte slice.
pub fn read_varint_from_slice(bytes: &[u8]) -> Result<(i64, usize), Error> {
    read_varint(&mut SliceCursor::new(bytes))
}

/// Convenience wrapper to decode a varint from a positioned reader, consuming
/// exactly the bytes that make it up.
pub fn read_varint_from_reader<R: std::io::Read>(r: &mut R) -> Result<(i64, usize), Error> {
    read_varint(&mut ReadCursor::new(r))
}

/// Encodes `v` using the same scheme, for round-trip tests. This crate never
/// writes database files, so nothing on the read path calls this; it exists
/// to pin down that decode(encode(v)) == (v, minimal byte count).
#[cfg(test)]
fn encode_varint(v: i64) -> Vec<u8> {
    let v = v as u64;
    if v >> 56 != 0 {
        // Ninth byte case: first 8 bytes each carry 7 bits of the top 56 bits'
        // worth, last byte carries the remaining 8 bits raw.
        let mut out = Vec::with_capacity(9);
        let mut shift = 56;
        for _ in 0..8 {
            out.push((((v >> shift) & 0x7f) as u8) | 0x80);
            shift -= 7;
        }
        out.push((v & 0xff) as u8);
        return out;
    }
    let mut chunks = vec![];
    let mut x = v;
    loop {
        chunks.push((x & 0x7f) as u8);
        x >>= 7;
        if x == 0 {
            break;
        }
    }
    chunks.reverse();
    let last = chunks.len() - 1;
    for (i, b) in chunks.iter_mut().enumerate() {
        if i != last {
            *b |= 0x80;
        }
    }
    chunks
}
