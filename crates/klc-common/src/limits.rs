//! Centralized limits and thresholds for the commonizer.
//!
//! The comparator recurses through classifier references (type arguments,
//! type-parameter bounds, containing classes). Well-formed libraries stay far
//! below these limits; they exist so that a malformed or adversarial tree
//! ends in a `RecursionLimit` mismatch instead of a stack overflow.

// =============================================================================
// Comparator recursion
// =============================================================================

/// Maximum nesting depth of classifier comparisons.
///
/// Each nested classifier comparison (a type argument whose classifier has a
/// bounded type parameter whose bound has another type argument...) adds one
/// level. Past this depth the pair is reported as not commonizable.
pub const MAX_COMPARISON_DEPTH: u32 = 100;

/// Maximum number of classifier comparisons attempted by one comparator.
///
/// Cached pairs do not count; only pairs that actually have to be computed.
pub const MAX_COMPARISON_ITERATIONS: u32 = 1_000_000;

/// Upper bound on simultaneously in-progress classifier pairs.
pub const MAX_VISITING_PAIRS: u32 = 10_000;

// =============================================================================
// Capacity hints
// =============================================================================

/// Initial capacity of the shared classifier comparison cache.
pub const COMPARISON_CACHE_CAPACITY: usize = 1_024;

/// Initial capacity of output forest arenas, per variant.
pub const FOREST_ARENA_CAPACITY: usize = 256;
