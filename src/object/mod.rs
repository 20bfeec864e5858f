//! Represents the git concept of an "object" which is a tuple of
//! object type and binary data identified by the hash of the binary data.
//!
//! Only commits are interpreted here. Trees, blobs, and tags are carried as
//! their raw bytes so that callers can still route any object by its type.

use std::str;

use thiserror::Error;

mod commit;
pub use commit::{Commit, ParseCommitError};

mod id;
pub use id::{Id, ParseIdError};

mod kind;
pub use kind::Kind;

pub(crate) mod parse_utils;

mod stamp;
pub use stamp::{CommitStamp, ParseStampError};

/// The contract shared by every kind of object record.
///
/// For any `data` that is a well-formed encoding of the implementing kind,
/// `serialize(parse(data)) == data`. `parse` must fail rather than fill in
/// missing mandatory fields.
pub trait ObjectRecord: Sized {
    type Error: std::error::Error;

    /// The object type this record describes.
    const KIND: Kind;

    fn parse(data: &[u8]) -> Result<Self, Self::Error>;

    fn serialize(&self) -> Vec<u8>;

    fn kind(&self) -> Kind {
        Self::KIND
    }
}

/// An error which can be returned when decoding an object of any kind.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseObjectError {
    #[error("unknown object type `{0}`")]
    UnknownKind(String),

    #[error("malformed object header")]
    MalformedHeader,

    #[error("object header declares {declared} bytes, but {actual} bytes follow")]
    LengthMismatch { declared: usize, actual: usize },

    #[error(transparent)]
    Commit(#[from] ParseCommitError),
}

/// Describes a single object stored (or about to be stored) in a git repository.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Commit(Commit),
    Tree(Vec<u8>),
    Blob(Vec<u8>),
    Tag(Vec<u8>),
}

impl Object {
    /// Decodes an object of the given kind from its content.
    pub fn parse(kind: Kind, data: &[u8]) -> Result<Object, ParseObjectError> {
        Ok(match kind {
            Kind::Commit => Object::Commit(Commit::parse(data)?),
            Kind::Tree => Object::Tree(data.to_vec()),
            Kind::Blob => Object::Blob(data.to_vec()),
            Kind::Tag => Object::Tag(data.to_vec()),
        })
    }

    /// Decodes an object prefixed with git's `{kind} {len}\0` header,
    /// as found in a loose object file once it has been inflated.
    pub fn parse_with_header(data: &[u8]) -> Result<Object, ParseObjectError> {
        let nul = data
            .iter()
            .position(|b| *b == 0)
            .ok_or(ParseObjectError::MalformedHeader)?;

        let header = str::from_utf8(&data[..nul]).map_err(|_| ParseObjectError::MalformedHeader)?;
        let content = &data[nul + 1..];

        let (kind, len) = match parse_utils::split_once(header, ' ') {
            (kind, Some(len)) => (kind, len),
            _ => return Err(ParseObjectError::MalformedHeader),
        };

        let kind: Kind = kind.parse()?;
        let declared: usize = len.parse().map_err(|_| ParseObjectError::MalformedHeader)?;

        if declared != content.len() {
            return Err(ParseObjectError::LengthMismatch {
                declared,
                actual: content.len(),
            });
        }

        Object::parse(kind, content)
    }

    /// Return the kind of the object.
    pub fn kind(&self) -> Kind {
        match self {
            Object::Commit(_) => Kind::Commit,
            Object::Tree(_) => Kind::Tree,
            Object::Blob(_) => Kind::Blob,
            Object::Tag(_) => Kind::Tag,
        }
    }

    /// Returns the object's content.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Object::Commit(commit) => commit.serialize(),
            Object::Tree(data) | Object::Blob(data) | Object::Tag(data) => data.clone(),
        }
    }

    /// Computes the object's ID from its content and type.
    ///
    /// This is functionally equivalent to the
    /// [`git hash-object`](https://git-scm.com/docs/git-hash-object) command
    /// without the `-w` option that would write the object to the repo.
    pub fn id(&self) -> Id {
        match self {
            Object::Commit(commit) => commit.id(),
            Object::Tree(data) | Object::Blob(data) | Object::Tag(data) => {
                Id::for_object(self.kind(), data)
            }
        }
    }

    /// Returns the commit, if this object is one.
    pub fn into_commit(self) -> Option<Commit> {
        match self {
            Object::Commit(commit) => Some(commit),
            _ => None,
        }
    }
}
