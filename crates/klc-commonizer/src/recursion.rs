//! Recursion guard for classifier comparisons.
//!
//! Comparing two classifiers can recurse back into the same pair through type
//! arguments, type-parameter bounds or containing classes. The guard combines
//! three mechanisms:
//! 1. **Cycle detection** via a visiting set (`FxHashSet<K>`)
//! 2. **Depth limiting** to prevent stack overflow
//! 3. **Iteration bounding** to cap the total work of one comparator
//!
//! In debug builds, dropping a guard with active entries panics, catching a
//! forgotten `leave()`.

use klc_common::limits::MAX_VISITING_PAIRS;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Result of attempting to enter a recursive computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    /// Proceed with the computation.
    Entered,
    /// This key is already being visited.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

/// Tracks in-progress keys, nesting depth and total enter attempts.
///
/// ```ignore
/// match guard.enter(key) {
///     RecursionResult::Entered => {
///         let result = do_work();
///         guard.leave(key);
///         result
///     }
///     RecursionResult::Cycle => assume_matched(),
///     RecursionResult::DepthExceeded
///     | RecursionResult::IterationExceeded => give_up(),
/// }
/// ```
pub struct RecursionGuard<K: Hash + Eq + Copy> {
    visiting: FxHashSet<K>,
    depth: u32,
    iterations: u32,
    max_depth: u32,
    max_iterations: u32,
    max_visiting: u32,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            depth: 0,
            iterations: 0,
            max_depth,
            max_iterations,
            max_visiting: MAX_VISITING_PAIRS,
        }
    }

    /// Try to enter the computation for `key`.
    ///
    /// On [`RecursionResult::Entered`] the caller must call
    /// [`leave`](Self::leave) with the same key when done.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);

        if self.iterations > self.max_iterations {
            return RecursionResult::IterationExceeded;
        }
        if self.depth >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }
        if self.visiting.contains(&key) {
            return RecursionResult::Cycle;
        }
        if self.visiting.len() as u32 >= self.max_visiting {
            return RecursionResult::DepthExceeded;
        }

        self.visiting.insert(key);
        self.depth += 1;
        RecursionResult::Entered
    }

    /// Leave the computation for `key`. Must follow every successful `enter`.
    pub fn leave(&mut self, key: K) {
        let was_present = self.visiting.remove(&key);

        debug_assert!(
            was_present,
            "RecursionGuard::leave() called with a key that is not in the visiting set"
        );

        self.depth = self.depth.saturating_sub(1);
    }

    /// True while any key is being visited.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for RecursionGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.visiting.is_empty() {
            panic!(
                "RecursionGuard dropped with {} active entries still in the visiting set",
                self.visiting.len(),
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/recursion_tests.rs"]
mod tests;
