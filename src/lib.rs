//! This crate implements the commit side of git's object model: decoding
//! the binary primitives used by git's storage formats, reading and writing
//! commit records, and ordering the history reachable from a commit.
//!
//! Fetching objects is left to the caller. Anything that can produce a
//! [`Commit`](object::Commit) for an [`Id`](object::Id) can implement
//! [`history::Lookup`] and drive history resolution.

#![deny(warnings)]

pub mod binary;
pub mod history;
pub mod object;
