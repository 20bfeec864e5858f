//! Orders the commits reachable from a starting commit.
//!
//! History is produced in the conventional "log" order: every commit appears
//! before all of its ancestors. This is a topological order over the parent
//! graph, not a sort by time.
//!
//! Resolution runs in two passes. The first walks the graph breadth-first,
//! looking up each commit once (the lookups of one generation run in
//! parallel) and counting how many reachable commits name it as a parent.
//! The second starts over from the starting commit and only emits a commit
//! once every commit that depends on it has been emitted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::object::{Commit, Id};

mod lookup;
pub use lookup::{CommitStore, Lookup, LookupError, MemoizedLookup};

/// Describes the potential error conditions that might arise while resolving history.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum HistoryError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(
        "commit graph contains a cycle ({emitted} of {reachable} reachable commits could be ordered)"
    )]
    CyclicHistory { emitted: usize, reachable: usize },

    #[error("history traversal was cancelled")]
    Cancelled,
}

/// A specialized `Result` type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// The outcome of the discovery pass: every commit reachable from the start,
/// and for each one the number of reachable commits that list it as a parent.
#[derive(Debug)]
pub struct DependentCounts {
    start: Arc<Commit>,
    pending: HashMap<Id, usize>,
    commits: HashMap<Id, Arc<Commit>>,
}

impl DependentCounts {
    /// Returns how many reachable commits name `id` as a parent.
    ///
    /// The starting commit has no entry unless some reachable commit
    /// names it (which only happens in a cyclic graph).
    pub fn dependents(&self, id: &Id) -> Option<usize> {
        self.pending.get(id).copied()
    }

    /// Returns the number of reachable commits, including the start.
    pub fn reachable(&self) -> usize {
        self.commits.len()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.commits.contains_key(id)
    }
}

/// Computes commit history against a particular [`Lookup`].
pub struct HistoryResolver<'a, L: Lookup + ?Sized> {
    lookup: &'a L,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, L: Lookup + Sync + ?Sized> HistoryResolver<'a, L> {
    pub fn new(lookup: &'a L) -> HistoryResolver<'a, L> {
        HistoryResolver {
            lookup,
            cancel: None,
        }
    }

    /// Makes traversal stop with [`HistoryError::Cancelled`] once `flag`
    /// becomes `true`.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> HistoryResolver<'a, L> {
        self.cancel = Some(flag);
        self
    }

    /// Returns the history of `start`, computing it on first use.
    ///
    /// The result is cached on `start` and returned as-is by later calls,
    /// even if the underlying store has changed since.
    pub fn history<'c>(&self, start: &'c Commit) -> Result<&'c [Arc<Commit>]> {
        if let Some(history) = start.cached_history() {
            trace!(start = %start.id(), "using cached history");
            return Ok(history);
        }

        let computed = self.resolve(start)?;

        // Another caller may have published first; theirs wins.
        Ok(start.history_cell().get_or_init(|| computed).as_slice())
    }

    /// Computes the history of `start` without consulting or filling the cache.
    pub fn resolve(&self, start: &Commit) -> Result<Vec<Arc<Commit>>> {
        let counts = self.count_dependents(start)?;
        self.emit(counts)
    }

    /// Discovery pass: finds every commit reachable from `start` and counts
    /// the dependents of each.
    ///
    /// The graph is walked one generation at a time. Parents first seen in a
    /// generation are looked up in parallel, so `lookup` may be called from
    /// several threads at once.
    #[instrument(skip_all, fields(start = %start.id()))]
    pub fn count_dependents(&self, start: &Commit) -> Result<DependentCounts> {
        let start = Arc::new(start.clone());

        let mut counts = DependentCounts {
            start: Arc::clone(&start),
            pending: HashMap::new(),
            commits: HashMap::new(),
        };
        counts.commits.insert(start.id(), Arc::clone(&start));

        let mut generation = vec![start];

        while !generation.is_empty() {
            self.check_cancelled()?;

            let mut discovered: Vec<Id> = Vec::new();
            for commit in &generation {
                for parent in commit.parents() {
                    let count = counts.pending.entry(*parent).or_insert(0);
                    *count += 1;

                    if *count == 1 && !counts.commits.contains_key(parent) {
                        discovered.push(*parent);
                    }
                }
            }

            trace!(count = discovered.len(), "looking up parents");
            generation = discovered
                .par_iter()
                .map(|id| -> Result<Arc<Commit>> {
                    self.check_cancelled()?;
                    Ok(self.lookup.lookup(id)?)
                })
                .collect::<Result<Vec<Arc<Commit>>>>()?;

            for (id, commit) in discovered.iter().zip(&generation) {
                counts.commits.insert(*id, Arc::clone(commit));
            }
        }

        debug!(reachable = counts.commits.len(), "discovery complete");
        Ok(counts)
    }

    /// Emission pass: orders the commits found by [`count_dependents`].
    ///
    /// [`count_dependents`]: HistoryResolver::count_dependents
    #[instrument(skip_all, fields(start = %counts.start.id()))]
    pub fn emit(&self, mut counts: DependentCounts) -> Result<Vec<Arc<Commit>>> {
        let reachable = counts.commits.len();
        let mut emitted: HashSet<Id> = HashSet::with_capacity(reachable);
        let mut history: Vec<Arc<Commit>> = Vec::with_capacity(reachable);

        let mut stack = vec![(counts.start.id(), Arc::clone(&counts.start))];

        while let Some((id, commit)) = stack.pop() {
            self.check_cancelled()?;

            if !emitted.insert(id) {
                warn!(%id, "commit reached twice while ordering history");
                return Err(HistoryError::CyclicHistory {
                    emitted: history.len(),
                    reachable,
                });
            }

            history.push(Arc::clone(&commit));

            // Reverse so that the first parent is popped (and emitted) first
            // when several parents become ready at once.
            for parent in commit.parents().iter().rev() {
                let remaining = match counts.pending.get_mut(parent) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        *count
                    }
                    _ => {
                        return Err(HistoryError::CyclicHistory {
                            emitted: history.len(),
                            reachable,
                        })
                    }
                };

                if remaining == 0 {
                    let parent_commit = counts
                        .commits
                        .get(parent)
                        .cloned()
                        .ok_or(LookupError::NotFound(*parent))?;
                    stack.push((*parent, parent_commit));
                }
            }
        }

        if history.len() != reachable {
            warn!(
                emitted = history.len(),
                reachable, "commits left unordered; history is cyclic"
            );
            return Err(HistoryError::CyclicHistory {
                emitted: history.len(),
                reachable,
            });
        }

        debug!(len = history.len(), "history resolved");
        Ok(history)
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                debug!("history traversal cancelled");
                Err(HistoryError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

/// Returns the history of `start`, looking up ancestors through `lookup`.
///
/// Shorthand for `HistoryResolver::new(lookup).history(start)`.
pub fn history<'c, L>(start: &'c Commit, lookup: &L) -> Result<&'c [Arc<Commit>]>
where
    L: Lookup + Sync + ?Sized,
{
    HistoryResolver::new(lookup).history(start)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;

    use super::*;
    use crate::object::CommitStamp;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn new_commit(summary: &str, parents: &[Id]) -> Commit {
        let stamp = CommitStamp::new("A U Thor", "author@example.com", 1_142_878_501, 0);
        Commit::new(
            Id::from_hex(TREE).unwrap(),
            parents.to_vec(),
            stamp.clone(),
            stamp,
            summary,
            "",
        )
    }

    fn add(store: &mut CommitStore, summary: &str, parents: &[Id]) -> Id {
        store.insert(new_commit(summary, parents)).id()
    }

    fn summaries(history: &[Arc<Commit>]) -> Vec<&str> {
        history.iter().map(|c| c.summary()).collect()
    }

    fn position(history: &[Arc<Commit>], id: Id) -> Option<usize> {
        history.iter().position(|c| c.id() == id)
    }

    fn assert_topological(history: &[Arc<Commit>]) {
        let mut seen = HashSet::new();
        for (i, commit) in history.iter().enumerate() {
            assert!(seen.insert(commit.id()), "{:?} appears twice", commit);
            for parent in commit.parents() {
                if let Some(j) = position(history, *parent) {
                    assert!(j > i, "{:?} appears before its child", history[j]);
                }
            }
        }
    }

    #[test]
    fn root_commit() {
        let store = CommitStore::new();
        let root = new_commit("root", &[]);

        let h = history(&root, &store).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(*h[0], root);
    }

    #[test]
    fn linear_chain() {
        let mut store = CommitStore::new();
        let c = add(&mut store, "C", &[]);
        let b = add(&mut store, "B", &[c]);
        let a = add(&mut store, "A", &[b]);
        let a = store.get(&a).unwrap();

        let h = history(&a, &store).unwrap();
        assert_eq!(summaries(h), vec!["A", "B", "C"]);
    }

    #[test]
    fn diamond() {
        let mut store = CommitStore::new();
        let g = add(&mut store, "G", &[]);
        let p1 = add(&mut store, "P1", &[g]);
        let p2 = add(&mut store, "P2", &[g]);
        let m = new_commit("M", &[p1, p2]);

        let h = history(&m, &store).unwrap();
        assert_eq!(summaries(h), vec!["M", "P1", "P2", "G"]);
        assert_topological(h);
    }

    #[test]
    fn uneven_branches() {
        // M merges a long branch (L1..L3) and a short one (S1) that fork at F.
        let mut store = CommitStore::new();
        let root = add(&mut store, "root", &[]);
        let f = add(&mut store, "F", &[root]);
        let l1 = add(&mut store, "L1", &[f]);
        let l2 = add(&mut store, "L2", &[l1]);
        let l3 = add(&mut store, "L3", &[l2]);
        let s1 = add(&mut store, "S1", &[f]);
        let m = new_commit("M", &[s1, l3]);

        let h = history(&m, &store).unwrap();
        assert_eq!(h.len(), 7);
        assert_eq!(h[0].summary(), "M");
        assert_eq!(h[5].summary(), "F");
        assert_eq!(h[6].summary(), "root");
        assert_topological(h);
    }

    #[test]
    fn criss_cross_and_octopus() {
        let mut store = CommitStore::new();
        let base = add(&mut store, "base", &[]);
        let a1 = add(&mut store, "a1", &[base]);
        let b1 = add(&mut store, "b1", &[base]);
        let a2 = add(&mut store, "a2", &[a1, b1]);
        let b2 = add(&mut store, "b2", &[b1, a1]);
        let c1 = add(&mut store, "c1", &[base]);
        let top = new_commit("top", &[a2, b2, c1]);

        let h = history(&top, &store).unwrap();
        assert_eq!(h.len(), 7);
        assert_eq!(h[0].summary(), "top");
        assert_eq!(h[6].summary(), "base");
        assert_topological(h);
    }

    #[test]
    fn duplicate_parent() {
        let mut store = CommitStore::new();
        let p = add(&mut store, "P", &[]);
        let c = new_commit("C", &[p, p]);

        let h = history(&c, &store).unwrap();
        assert_eq!(summaries(h), vec!["C", "P"]);
    }

    #[test]
    fn missing_parent() {
        let mut store = CommitStore::new();
        let gone = add(&mut store, "gone", &[]);
        let p = add(&mut store, "P", &[gone]);
        let c = new_commit("C", &[p]);
        store.remove(&gone);

        assert_eq!(
            history(&c, &store).unwrap_err(),
            HistoryError::Lookup(LookupError::NotFound(gone))
        );
        assert!(c.cached_history().is_none());
    }

    #[test]
    fn two_passes() {
        let mut store = CommitStore::new();
        let g = add(&mut store, "G", &[]);
        let p1 = add(&mut store, "P1", &[g]);
        let p2 = add(&mut store, "P2", &[g]);
        let m = new_commit("M", &[p1, p2]);

        let resolver = HistoryResolver::new(&store);
        let counts = resolver.count_dependents(&m).unwrap();

        assert_eq!(counts.reachable(), 4);
        assert!(counts.contains(&m.id()));
        assert_eq!(counts.dependents(&g), Some(2));
        assert_eq!(counts.dependents(&p1), Some(1));
        assert_eq!(counts.dependents(&m.id()), None);

        let h = resolver.emit(counts).unwrap();
        assert_eq!(summaries(&h), vec!["M", "P1", "P2", "G"]);
        assert!(m.cached_history().is_none());
    }

    #[test]
    fn history_is_cached() {
        let mut store = CommitStore::new();
        let p = add(&mut store, "P", &[]);
        let c = new_commit("C", &[p]);

        let first = history(&c, &store).unwrap();
        assert_eq!(first.len(), 2);

        // The cache is not invalidated when the store changes.
        store.remove(&p);
        let second = history(&c, &store).unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(c.cached_history().unwrap().len(), 2);

        // A fresh resolution sees the change.
        assert!(HistoryResolver::new(&store).resolve(&c).is_err());

        // Clones do not share the cache.
        assert!(c.clone().cached_history().is_none());
    }

    #[test]
    fn concurrent_callers_share_one_history() {
        let mut store = CommitStore::new();
        let g = add(&mut store, "G", &[]);
        let p1 = add(&mut store, "P1", &[g]);
        let p2 = add(&mut store, "P2", &[g]);
        let m = new_commit("M", &[p1, p2]);

        let (a, b) = thread::scope(|s| {
            let a = s.spawn(|| history(&m, &store).unwrap());
            let b = s.spawn(|| history(&m, &store).unwrap());
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(a, m.cached_history().unwrap()));
        assert_eq!(summaries(a), vec!["M", "P1", "P2", "G"]);
    }

    #[test]
    fn each_ancestor_looked_up_once() {
        let mut store = CommitStore::new();
        let g = add(&mut store, "G", &[]);
        let p1 = add(&mut store, "P1", &[g]);
        let p2 = add(&mut store, "P2", &[g]);
        let m = new_commit("M", &[p1, p2, p1]);

        let calls = AtomicUsize::new(0);
        let lookup = |id: &Id| -> std::result::Result<Arc<Commit>, LookupError> {
            calls.fetch_add(1, Ordering::SeqCst);
            store.lookup(id)
        };

        let h = HistoryResolver::new(&lookup).resolve(&m).unwrap();
        assert_eq!(summaries(&h), vec!["M", "P1", "P2", "G"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn with_memoized_lookup() {
        let mut store = CommitStore::new();
        let c = add(&mut store, "C", &[]);
        let b = add(&mut store, "B", &[c]);
        let a = new_commit("A", &[b]);

        let memo = MemoizedLookup::new(store);
        let h = HistoryResolver::new(&memo).resolve(&a).unwrap();
        assert_eq!(summaries(&h), vec!["A", "B", "C"]);
        assert_eq!(memo.cached_len(), 2);
    }

    #[test]
    fn wide_merge_looks_up_each_commit_once() {
        struct RecordingLookup {
            store: CommitStore,
            calls: Mutex<HashMap<Id, usize>>,
        }

        impl Lookup for RecordingLookup {
            fn lookup(&self, id: &Id) -> std::result::Result<Arc<Commit>, LookupError> {
                *self.calls.lock().unwrap().entry(*id).or_insert(0) += 1;
                self.store.lookup(id)
            }
        }

        let mut store = CommitStore::new();
        let base = add(&mut store, "base", &[]);
        let branches: Vec<Id> = (0..32)
            .map(|i| add(&mut store, &format!("b{}", i), &[base]))
            .collect();
        let merges: Vec<Id> = (0..32)
            .map(|i| {
                let parents = [branches[i], branches[(i + 1) % 32]];
                add(&mut store, &format!("m{}", i), &parents)
            })
            .collect();
        let top = new_commit("top", &merges);

        let memo = MemoizedLookup::new(RecordingLookup {
            store,
            calls: Mutex::new(HashMap::new()),
        });

        let resolver = HistoryResolver::new(&memo);
        let first = resolver.resolve(&top).unwrap();
        let second = resolver.resolve(&top).unwrap();

        assert_eq!(first.len(), 66);
        assert_eq!(first, second);
        assert_eq!(first[0].summary(), "top");
        assert_eq!(first[65].summary(), "base");
        assert_topological(&first);

        let calls = memo.into_inner().calls.into_inner().unwrap();
        assert_eq!(calls.len(), 65);
        assert!(calls.values().all(|n| *n == 1), "{:?}", calls);
    }

    #[test]
    fn dyn_lookup() {
        let mut store = CommitStore::new();
        let p = add(&mut store, "P", &[]);
        let c = new_commit("C", &[p]);

        let lookup: &(dyn Lookup + Sync) = &store;
        let h = history(&c, lookup).unwrap();
        assert_eq!(summaries(h), vec!["C", "P"]);
    }

    // Content-addressed IDs make real cycles impossible to build, so these
    // tests use a lookup that hands back commits under IDs they don't have.

    #[test]
    fn cycle_through_start() {
        let fake_b = Id::from_hex("1111111111111111111111111111111111111111").unwrap();
        let a = Arc::new(new_commit("A", &[fake_b]));
        let b = Arc::new(new_commit("B", &[a.id()]));

        let lookup = |id: &Id| -> std::result::Result<Arc<Commit>, LookupError> {
            if *id == fake_b {
                Ok(Arc::clone(&b))
            } else if *id == a.id() {
                Ok(Arc::clone(&a))
            } else {
                Err(LookupError::NotFound(*id))
            }
        };

        assert_eq!(
            history(&a, &lookup).unwrap_err(),
            HistoryError::CyclicHistory {
                emitted: 2,
                reachable: 2
            }
        );
        assert!(a.cached_history().is_none());
    }

    #[test]
    fn cycle_below_start() {
        let fake_b = Id::from_hex("1111111111111111111111111111111111111111").unwrap();
        let fake_c = Id::from_hex("2222222222222222222222222222222222222222").unwrap();
        let s = new_commit("S", &[fake_b]);
        let b = Arc::new(new_commit("B", &[fake_c]));
        let c = Arc::new(new_commit("C", &[fake_b]));

        let lookup = |id: &Id| -> std::result::Result<Arc<Commit>, LookupError> {
            if *id == fake_b {
                Ok(Arc::clone(&b))
            } else if *id == fake_c {
                Ok(Arc::clone(&c))
            } else {
                Err(LookupError::NotFound(*id))
            }
        };

        let err = history(&s, &lookup).unwrap_err();
        assert_eq!(
            err,
            HistoryError::CyclicHistory {
                emitted: 1,
                reachable: 3
            }
        );
        assert_eq!(
            err.to_string(),
            "commit graph contains a cycle (1 of 3 reachable commits could be ordered)"
        );
    }

    #[test]
    fn cancelled_before_start() {
        let store = CommitStore::new();
        let root = new_commit("root", &[]);

        let flag = AtomicBool::new(true);
        let err = HistoryResolver::new(&store)
            .with_cancel_flag(&flag)
            .history(&root)
            .unwrap_err();

        assert_eq!(err, HistoryError::Cancelled);
        assert!(root.cached_history().is_none());
    }

    #[test]
    fn cancelled_during_discovery() {
        let mut store = CommitStore::new();
        let c = add(&mut store, "C", &[]);
        let b = add(&mut store, "B", &[c]);
        let a = new_commit("A", &[b]);

        let flag = AtomicBool::new(false);
        let lookup = |id: &Id| -> std::result::Result<Arc<Commit>, LookupError> {
            flag.store(true, Ordering::SeqCst);
            store.lookup(id)
        };

        let err = HistoryResolver::new(&lookup)
            .with_cancel_flag(&flag)
            .history(&a)
            .unwrap_err();

        assert_eq!(err, HistoryError::Cancelled);
        assert!(a.cached_history().is_none());
    }
}
