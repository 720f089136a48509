//! Memoized classifier comparisons.
//!
//! The cache is an explicit object owned by one commonization run and passed
//! by reference to every comparator of that run, including the per-worker
//! comparators of a parallel merge. Entries are insert-if-absent: the first
//! verdict stored for a pair wins.

use crate::result::Mismatch;
use dashmap::DashMap;
use klc_common::limits::COMPARISON_CACHE_CAPACITY;
use klc_model::DeclId;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Verdict for a (first classifier, second classifier) pair.
pub type ClassifierVerdict = Result<(), Mismatch>;

/// Key: first-tree classifier id, second-tree classifier id.
pub type PairKey = (DeclId, DeclId);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ComparisonCache {
    entries: DashMap<PairKey, ClassifierVerdict>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ComparisonCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonCache {
    pub fn new() -> Self {
        Self::with_capacity(COMPARISON_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: PairKey) -> Option<ClassifierVerdict> {
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `verdict` unless the pair already has one; returns the stored
    /// verdict.
    pub fn insert(&self, key: PairKey, verdict: ClassifierVerdict) -> ClassifierVerdict {
        let entry = self.entries.entry(key).or_insert_with(|| {
            trace!(
                first = key.0.0,
                second = key.1.0,
                matched = verdict.is_ok(),
                "ComparisonCache::insert"
            );
            verdict
        });
        entry.value().clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "../tests/cache_tests.rs"]
mod tests;
