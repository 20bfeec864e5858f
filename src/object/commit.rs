use std::fmt;
use std::str::{self, Utf8Error};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::parse_utils::split_once;
use super::{CommitStamp, Id, Kind, ObjectRecord, ParseIdError, ParseStampError};

/// An error which can be returned when parsing a commit record.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseCommitError {
    #[error("commit is missing required `{0}` header")]
    MissingField(&'static str),

    #[error("invalid object ID in `{field}` header")]
    InvalidId {
        field: &'static str,
        #[source]
        source: ParseIdError,
    },

    #[error("invalid `{field}` header")]
    MalformedStamp {
        field: &'static str,
        #[source]
        source: ParseStampError,
    },

    #[error("malformed header line `{0}`")]
    MalformedHeader(String),

    #[error("commit is not valid UTF-8")]
    InvalidUtf8(#[from] Utf8Error),
}

/// A git commit: a snapshot (tree), the commits it was derived from
/// (parents), who wrote and committed it, and a message.
///
/// Commits are immutable once constructed. Their ID is derived from their
/// content, and two commits compare equal when their IDs do.
pub struct Commit {
    id: Id,
    tree: Id,
    parents: Vec<Id>,
    author: CommitStamp,
    committer: CommitStamp,
    extra_headers: Vec<(String, String)>,
    summary: String,
    detail: String,
    history: OnceCell<Vec<Arc<Commit>>>,
}

impl Commit {
    /// Creates a new commit.
    ///
    /// `summary` is the first line of the commit message and `detail` is
    /// everything after it.
    pub fn new(
        tree: Id,
        parents: Vec<Id>,
        author: CommitStamp,
        committer: CommitStamp,
        summary: &str,
        detail: &str,
    ) -> Commit {
        let mut commit = Commit {
            id: tree,
            tree,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            summary: summary.to_string(),
            detail: detail.to_string(),
            history: OnceCell::new(),
        };

        commit.id = Id::for_object(Kind::Commit, &commit.serialize());
        commit
    }

    /// Parses a commit record.
    ///
    /// The record is a block of `key value` header lines, a blank line, and
    /// the commit message. `tree`, `author`, and `committer` are required;
    /// `parent` may appear any number of times and its order is preserved.
    /// Other headers (`encoding`, `gpgsig`, ...) are kept so that they can be
    /// written back out.
    pub fn parse(data: &[u8]) -> Result<Commit, ParseCommitError> {
        let text = str::from_utf8(data)?;
        let mut lines = text.split('\n');

        let mut headers: Vec<(&str, String)> = Vec::new();
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                // Multi-line values (e.g. signatures) continue on lines
                // that start with a single space.
                match headers.last_mut() {
                    Some((_, value)) => {
                        value.push('\n');
                        value.push_str(continuation);
                        continue;
                    }
                    None => return Err(ParseCommitError::MalformedHeader(line.to_string())),
                }
            }

            match split_once(line, ' ') {
                (key, Some(value)) => headers.push((key, value.to_string())),
                (_, None) => return Err(ParseCommitError::MalformedHeader(line.to_string())),
            }
        }

        let summary = lines.next().unwrap_or("").to_string();
        let detail = lines.collect::<Vec<&str>>().join("\n");

        let mut tree: Option<Id> = None;
        let mut parents: Vec<Id> = Vec::new();
        let mut author: Option<CommitStamp> = None;
        let mut committer: Option<CommitStamp> = None;
        let mut extra_headers: Vec<(String, String)> = Vec::new();

        for (key, value) in headers {
            match key {
                "tree" => {
                    if tree.is_none() {
                        tree = Some(parse_id("tree", &value)?);
                    }
                }
                "parent" => parents.push(parse_id("parent", &value)?),
                "author" => {
                    if author.is_none() {
                        author = Some(parse_stamp("author", &value)?);
                    }
                }
                "committer" => {
                    if committer.is_none() {
                        committer = Some(parse_stamp("committer", &value)?);
                    }
                }
                _ => extra_headers.push((key.to_string(), value)),
            }
        }

        Ok(Commit {
            id: Id::for_object(Kind::Commit, data),
            tree: tree.ok_or(ParseCommitError::MissingField("tree"))?,
            parents,
            author: author.ok_or(ParseCommitError::MissingField("author"))?,
            committer: committer.ok_or(ParseCommitError::MissingField("committer"))?,
            extra_headers,
            summary,
            detail,
            history: OnceCell::new(),
        })
    }

    /// Writes the commit record in canonical form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut s = String::new();

        s.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            s.push_str(&format!("parent {}\n", parent));
        }
        s.push_str(&format!("author {}\n", self.author));
        s.push_str(&format!("committer {}\n", self.committer));
        for (key, value) in &self.extra_headers {
            s.push_str(&format!("{} {}\n", key, value.replace('\n', "\n ")));
        }

        s.push('\n');
        s.push_str(&self.message());
        s.into_bytes()
    }

    /// Returns the ID of this commit.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the ID of the tree this commit records.
    pub fn tree(&self) -> Id {
        self.tree
    }

    /// Returns the IDs of this commit's parents, in the order they were recorded.
    pub fn parents(&self) -> &[Id] {
        &self.parents
    }

    pub fn author(&self) -> &CommitStamp {
        &self.author
    }

    pub fn committer(&self) -> &CommitStamp {
        &self.committer
    }

    /// Returns headers other than `tree`, `parent`, `author`, and `committer`
    /// as `(key, value)` pairs in the order they were recorded.
    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }

    /// Returns the first line of the commit message.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns everything after the first line of the commit message.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the full commit message.
    pub fn message(&self) -> String {
        format!("{}\n{}", self.summary, self.detail)
    }

    /// Returns the history computed for this commit, if any.
    ///
    /// See [`crate::history::history`].
    pub fn cached_history(&self) -> Option<&[Arc<Commit>]> {
        self.history.get().map(Vec::as_slice)
    }

    pub(crate) fn history_cell(&self) -> &OnceCell<Vec<Arc<Commit>>> {
        &self.history
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<Id, ParseCommitError> {
    Id::from_hex(value).map_err(|source| ParseCommitError::InvalidId { field, source })
}

fn parse_stamp(field: &'static str, value: &str) -> Result<CommitStamp, ParseCommitError> {
    CommitStamp::parse(value).map_err(|source| ParseCommitError::MalformedStamp { field, source })
}

impl ObjectRecord for Commit {
    type Error = ParseCommitError;

    const KIND: Kind = Kind::Commit;

    fn parse(data: &[u8]) -> Result<Self, Self::Error> {
        Commit::parse(data)
    }

    fn serialize(&self) -> Vec<u8> {
        Commit::serialize(self)
    }
}

// A clone starts out without the original's cached history.
impl Clone for Commit {
    fn clone(&self) -> Self {
        Commit {
            id: self.id,
            tree: self.tree,
            parents: self.parents.clone(),
            author: self.author.clone(),
            committer: self.committer.clone(),
            extra_headers: self.extra_headers.clone(),
            summary: self.summary.clone(),
            detail: self.detail.clone(),
            history: OnceCell::new(),
        }
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Commit {}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("id", &self.id)
            .field("tree", &self.tree)
            .field("parents", &self.parents)
            .field("summary", &self.summary)
            .finish()
    }
}
