//! Decoding helpers for the binary structures found in git's on-disk formats
//! (pack indexes, pack entry headers, and so on).
//!
//! All fixed-width integers are stored in network byte order (big-endian).
//! Variable-length integers use git's base-128 encoding: each byte carries
//! seven bits of the value, least significant group first, and the high bit
//! (`0x80`) signals that another byte follows.

use std::io::{self, Read};

use thiserror::Error;

/// An error which can be returned when decoding a binary buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The buffer is too short for a fixed-width read at the requested offset.
    #[error("need {needed} bytes at offset {offset}, but buffer is only {len} bytes long")]
    OutOfRange {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The input ended before a variable-length integer was terminated.
    #[error("input ended in the middle of a variable-length integer")]
    Truncated,

    /// A variable-length integer does not fit in 64 bits.
    #[error("variable-length integer overflows 64 bits")]
    Overflow,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialized `Result` type for binary decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

fn slice_at(buf: &[u8], offset: usize, needed: usize) -> Result<&[u8]> {
    let end = offset.checked_add(needed);
    match end {
        Some(end) if end <= buf.len() => Ok(&buf[offset..end]),
        _ => Err(DecodeError::OutOfRange {
            offset,
            needed,
            len: buf.len(),
        }),
    }
}

/// Reads a big-endian `u16` starting at `offset`.
pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16> {
    let bytes = slice_at(buf, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Reads a big-endian `u32` starting at `offset`.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    let bytes = slice_at(buf, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads `n` consecutive big-endian `u32` words starting at `offset`.
///
/// Fails without reading anything if the buffer holds fewer than `4 * n`
/// bytes from `offset`.
pub fn read_u32_array(n: usize, buf: &[u8], offset: usize) -> Result<Vec<u32>> {
    let needed = n.checked_mul(4).ok_or(DecodeError::OutOfRange {
        offset,
        needed: usize::MAX,
        len: buf.len(),
    })?;

    let bytes = slice_at(buf, offset, needed)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Reads a big-endian `u32` from a stream.
pub fn read_u32_from<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let mut word = [0u8; 4];
    read_exact(reader, &mut word)?;
    Ok(u32::from_be_bytes(word))
}

/// Reads `n` consecutive big-endian `u32` words from a stream.
///
/// Memory grows with the bytes actually read, not with `n`, so a bogus
/// count from a corrupt header fails with [`DecodeError::Truncated`].
pub fn read_u32_array_from<R: Read + ?Sized>(n: usize, reader: &mut R) -> Result<Vec<u32>> {
    let needed = n.checked_mul(4).ok_or(DecodeError::Truncated)?;

    let mut buf = Vec::new();
    Read::take(&mut *reader, needed as u64).read_to_end(&mut buf)?;
    if buf.len() != needed {
        return Err(DecodeError::Truncated);
    }

    read_u32_array(n, &buf, 0)
}

fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::Truncated,
        _ => DecodeError::Io(err),
    })
}

/// Decodes a variable-length integer starting at `*pos`.
///
/// On success, `*pos` is advanced past every byte consumed. On failure,
/// `*pos` is left untouched.
pub fn read_varint(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut cursor = *pos;

    loop {
        let byte = *buf.get(cursor).ok_or(DecodeError::Truncated)?;
        cursor += 1;

        let group = u64::from(byte & 0x7f);
        if shift >= 64 || (shift > 57 && group >> (64 - shift) != 0) {
            return Err(DecodeError::Overflow);
        }

        value |= group << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            *pos = cursor;
            return Ok(value);
        }
    }
}

/// Appends the variable-length encoding of `value` to `out`.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;

        if value == 0 {
            out.push(group);
            return;
        }

        out.push(group | 0x80);
    }
}
