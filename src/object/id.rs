use std::fmt::{self, Write};
use std::str::{self, FromStr};

use sha1::{Digest, Sha1};
use thiserror::Error;

use super::Kind;

/// An error which can be returned when parsing a git object ID.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ParseIdError {
    /// Value is not exactly 20 bytes (binary) or 40 digits (hex) long.
    #[error("object ID has invalid length {0}")]
    InvalidLength(usize),

    /// Contains an invalid digit.
    #[error("value contains invalid digit `{0}`")]
    InvalidDigit(char),

    /// Contains a byte that does not start a valid UTF-8 character.
    #[error("value contains invalid byte 0x{0:02x}")]
    InvalidByte(u8),
}

/// An object ID is a string that identifies an object within a repository.
/// It is stored as a 20-byte signature, but can also be represented as 40 hex digits.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Id {
    id: [u8; 20],
}

impl Id {
    /// Create a new ID from a 20-byte slice.
    ///
    /// It is an error if the slice contains anything other than 20 bytes.
    pub fn new(id: &[u8]) -> Result<Id, ParseIdError> {
        if id.len() != 20 {
            return Err(ParseIdError::InvalidLength(id.len()));
        }

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(id);
        Ok(Id { id: bytes })
    }

    /// Convert a 40-character hex ID to an object ID.
    ///
    /// Upper- and lowercase digits are both accepted.
    pub fn from_hex<T: AsRef<[u8]>>(id: T) -> Result<Id, ParseIdError> {
        let hex = id.as_ref();
        if hex.len() != 40 {
            return Err(ParseIdError::InvalidLength(hex.len()));
        }

        if let Some(pos) = hex.iter().position(|b| !b.is_ascii_hexdigit()) {
            return Err(invalid_digit(&hex[pos..]));
        }

        let mut bytes = [0u8; 20];
        for (byte, pair) in bytes.iter_mut().zip(hex.chunks_exact(2)) {
            *byte = digit_value(pair[0]) << 4 | digit_value(pair[1]);
        }

        Ok(Id { id: bytes })
    }

    /// Computes the ID git assigns to an object of the given kind and content.
    ///
    /// The ID is the SHA-1 hash of a `{kind} {len}\0` header followed by
    /// the content itself.
    pub fn for_object(kind: Kind, content: &[u8]) -> Id {
        let mut hasher = Sha1::new();

        hasher.update(kind.to_string());
        hasher.update(b" ");
        hasher.update(content.len().to_string());
        hasher.update(b"\0");
        hasher.update(content);

        let mut id = [0u8; 20];
        id.copy_from_slice(&hasher.finalize()[..]);
        Id { id }
    }

    /// Returns the raw 20-byte form of the ID.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.id
    }
}

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::from_hex(s.as_bytes())
    }
}

static CHARS: &[u8] = b"0123456789abcdef";

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.id.iter() {
            f.write_char(CHARS[(byte >> 4) as usize].into())?;
            f.write_char(CHARS[(byte & 0xf) as usize].into())?;
        }

        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

// `c` has already been checked with `is_ascii_hexdigit`.
fn digit_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

// Reports the character starting at the first rejected byte. Everything
// before that byte is ASCII, so it is a character boundary if the input is
// UTF-8 at all.
fn invalid_digit(rest: &[u8]) -> ParseIdError {
    let width = match rest[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    };

    str::from_utf8(&rest[..width.min(rest.len())])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(ParseIdError::InvalidByte(rest[0]), ParseIdError::InvalidDigit)
}
