use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::parse_utils::{drop_last_space, rsplit_once};

/// An error which can be returned when parsing an author, committer, or tagger line.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseStampError {
    #[error("malformed identity `{line}`: {reason}")]
    Malformed { line: String, reason: &'static str },
}

/// A `CommitStamp` combines a person's identity (name and e-mail address)
/// with the time of a particular action.
///
/// Stamps are typically associated with commits or tags in git.
///
/// The timestamp and time zone offset keep the exact text they were parsed
/// from, so that re-serializing a stamp reproduces its original bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitStamp {
    name: String,
    email: String,
    timestamp: i64,
    timestamp_text: String,
    tz_offset_text: String,
}

impl CommitStamp {
    /// Creates a new stamp.
    ///
    /// `timestamp` is in seconds relative to the Unix epoch and `tz_offset`
    /// is in minutes relative to GMT.
    pub fn new(name: &str, email: &str, timestamp: i64, tz_offset: i16) -> CommitStamp {
        CommitStamp {
            name: name.to_string(),
            email: email.to_string(),
            timestamp,
            timestamp_text: timestamp.to_string(),
            tz_offset_text: format_tz(tz_offset),
        }
    }

    /// Parse a name line (e.g. author, committer, tagger) into a `CommitStamp`.
    ///
    /// The line has the form `name <email> timestamp tz_offset`. A single
    /// trailing newline is ignored.
    pub fn parse(line: &str) -> Result<CommitStamp, ParseStampError> {
        let original = line;
        let line = line.strip_suffix('\n').unwrap_or(line);

        let malformed = |reason| ParseStampError::Malformed {
            line: original.to_string(),
            reason,
        };

        if line.contains('\n') {
            return Err(malformed("contains a line break"));
        }

        let (rest, tz_offset) =
            rsplit_once(line, ' ').ok_or_else(|| malformed("missing time zone"))?;
        let (ident, timestamp_text) =
            rsplit_once(rest, ' ').ok_or_else(|| malformed("missing timestamp"))?;

        if tz_offset.is_empty() {
            return Err(malformed("missing time zone"));
        }

        let timestamp =
            i64::from_str(timestamp_text).map_err(|_| malformed("timestamp is not an integer"))?;

        let ident = ident
            .strip_suffix('>')
            .ok_or_else(|| malformed("missing e-mail address"))?;
        let (name, email) =
            rsplit_once(ident, '<').ok_or_else(|| malformed("missing e-mail address"))?;

        if email.contains('>') {
            return Err(malformed("unbalanced e-mail brackets"));
        }

        Ok(CommitStamp {
            name: drop_last_space(name).to_string(),
            email: email.to_string(),
            timestamp,
            timestamp_text: timestamp_text.to_string(),
            tz_offset_text: tz_offset.to_string(),
        })
    }

    /// Returns the person's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the person's email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the timestamp (seconds since the Unix epoch).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the time zone offset exactly as it appears in the stamp.
    pub fn tz_offset_text(&self) -> &str {
        &self.tz_offset_text
    }

    /// Returns the time zone offset in minutes relative to GMT,
    /// or `None` if it is not in the usual `+HHMM` / `-HHMM` form.
    pub fn tz_offset(&self) -> Option<i16> {
        tz_from_str(&self.tz_offset_text)
    }
}

impl FromStr for CommitStamp {
    type Err = ParseStampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommitStamp::parse(s)
    }
}

impl fmt::Display for CommitStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp_text, self.tz_offset_text
        )
    }
}

fn format_tz(tz_offset: i16) -> String {
    let sign = if tz_offset < 0 { "-" } else { "+" };

    let offset = i32::from(tz_offset).abs();
    let hours = offset / 60;
    let min = offset % 60;

    format!("{}{:02}{:02}", sign, hours, min)
}

fn tz_from_str(s: &str) -> Option<i16> {
    let s = s.as_bytes();

    if s.len() != 5 || !s[1..].iter().all(u8::is_ascii_digit) {
        return None;
    }

    let sign: i16 = match s[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };

    let digit = |i: usize| i16::from(s[i] - b'0');
    let hh = digit(1) * 10 + digit(2);
    let mm = digit(3) * 10 + digit(4);
    Some(sign * (hh * 60 + mm))
}
