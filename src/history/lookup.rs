use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::trace;

use crate::object::{Commit, Id, ParseCommitError};

/// An error which can be returned when looking up a commit by ID.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LookupError {
    #[error("commit {0} not found")]
    NotFound(Id),
}

/// A source of commits, addressed by ID.
///
/// This is the seam between history traversal and whatever actually stores
/// the objects (an on-disk repository, a pack file, a network remote, ...).
pub trait Lookup {
    fn lookup(&self, id: &Id) -> Result<Arc<Commit>, LookupError>;
}

impl<F> Lookup for F
where
    F: Fn(&Id) -> Result<Arc<Commit>, LookupError>,
{
    fn lookup(&self, id: &Id) -> Result<Arc<Commit>, LookupError> {
        self(id)
    }
}

/// An in-memory collection of commits.
#[derive(Clone, Debug, Default)]
pub struct CommitStore {
    commits: HashMap<Id, Arc<Commit>>,
}

impl CommitStore {
    pub fn new() -> CommitStore {
        CommitStore::default()
    }

    /// Adds a commit to the store under its own ID.
    pub fn insert(&mut self, commit: Commit) -> Arc<Commit> {
        let commit = Arc::new(commit);
        self.commits.insert(commit.id(), Arc::clone(&commit));
        commit
    }

    /// Parses a raw commit record and adds it to the store.
    pub fn insert_raw(&mut self, data: &[u8]) -> Result<Arc<Commit>, ParseCommitError> {
        Ok(self.insert(Commit::parse(data)?))
    }

    pub fn get(&self, id: &Id) -> Option<Arc<Commit>> {
        self.commits.get(id).cloned()
    }

    pub fn remove(&mut self, id: &Id) -> Option<Arc<Commit>> {
        self.commits.remove(id)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

impl Lookup for CommitStore {
    fn lookup(&self, id: &Id) -> Result<Arc<Commit>, LookupError> {
        self.get(id).ok_or(LookupError::NotFound(*id))
    }
}

/// Wraps another `Lookup` so that each ID is resolved at most once.
///
/// Safe to share between threads. Concurrent lookups of the same ID wait
/// for the first one to finish; lookups of different IDs proceed
/// independently. Failed lookups are not remembered.
pub struct MemoizedLookup<L> {
    inner: L,
    cache: Mutex<HashMap<Id, Arc<OnceCell<Arc<Commit>>>>>,
}

impl<L: Lookup> MemoizedLookup<L> {
    pub fn new(inner: L) -> MemoizedLookup<L> {
        MemoizedLookup {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of commits resolved so far.
    pub fn cached_len(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    fn cell(&self, id: &Id) -> Arc<OnceCell<Arc<Commit>>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(*id).or_default())
    }

    // Drops `cell` from the cache unless another caller has since filled
    // it or replaced it.
    fn forget(&self, id: &Id, cell: &Arc<OnceCell<Arc<Commit>>>) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let unfilled = match cache.get(id) {
            Some(cached) => Arc::ptr_eq(cached, cell) && cached.get().is_none(),
            None => false,
        };

        if unfilled {
            cache.remove(id);
        }
    }
}

impl<L: Lookup> Lookup for MemoizedLookup<L> {
    fn lookup(&self, id: &Id) -> Result<Arc<Commit>, LookupError> {
        let cell = self.cell(id);
        let resolved = cell.get_or_try_init(|| {
            trace!(%id, "resolving commit");
            self.inner.lookup(id)
        });

        match resolved {
            Ok(commit) => Ok(Arc::clone(commit)),
            Err(err) => {
                self.forget(id, &cell);
                Err(err)
            }
        }
    }
}
