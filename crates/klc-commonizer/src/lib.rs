//! Commonization engine for klib declaration trees.
//!
//! Given the declarations of two platforms, computes the shared contract
//! both satisfy and splits everything into three forests:
//! - `first`: first-platform declarations (`actual` where a common one exists)
//! - `common`: the shared `expect` declarations
//! - `second`: second-platform declarations
//!
//! The pipeline runs three passes strictly in sequence: [`merge`] pairs the
//! two trees using the [`comparator`], [`skeleton`] creates named
//! placeholders, and [`materialize`] fills them and resolves references.

pub mod cache;
pub mod comparator;
pub mod error;
pub mod materialize;
pub mod merge;
pub mod options;
pub mod recursion;
pub mod result;
pub mod skeleton;

pub use cache::{CacheStats, ComparisonCache};
pub use comparator::StructuralComparator;
pub use error::{CommonizerError, Phase};
pub use materialize::{MaterializedForests, materialize};
pub use merge::{MergeEngine, MergeForest, MergeNode, MergeReport, Variant};
pub use options::{CommonizerOptions, CompiledOptions};
pub use result::{Cause, CommonizationResult, Mismatch, MismatchRecord, UnsupportedConstruct};
pub use skeleton::{Registry, SkeletonForests, build_skeletons};

use klc_model::{DeclKindTag, DeclTree};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info_span};

/// Per-kind declaration counts of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommonizationStats {
    pub common: BTreeMap<DeclKindTag, usize>,
    pub first_only: BTreeMap<DeclKindTag, usize>,
    pub second_only: BTreeMap<DeclKindTag, usize>,
    pub mismatches: usize,
    pub cache: CacheStats,
}

impl CommonizationStats {
    fn collect(forest: &MergeForest) -> Self {
        let mut stats = Self::default();
        forest.walk(|node| {
            let Some(tag) = node.tag() else {
                return;
            };
            let counts = if node.is_common() {
                &mut stats.common
            } else if node.first.is_some() {
                &mut stats.first_only
            } else {
                &mut stats.second_only
            };
            *counts.entry(tag).or_default() += 1;
        });
        stats
    }

    pub fn total_common(&self) -> usize {
        self.common.values().sum()
    }

    pub fn total_first_only(&self) -> usize {
        self.first_only.values().sum()
    }

    pub fn total_second_only(&self) -> usize {
        self.second_only.values().sum()
    }
}

/// Everything a commonization run produces.
#[derive(Clone, Debug)]
pub struct CommonizationOutput {
    pub first: DeclTree,
    pub common: DeclTree,
    pub second: DeclTree,
    pub mismatches: Vec<MismatchRecord>,
    pub stats: CommonizationStats,
}

/// Commonize two linked declaration trees.
pub fn commonize(
    first: &DeclTree,
    second: &DeclTree,
    options: &CommonizerOptions,
) -> Result<CommonizationOutput, CommonizerError> {
    let _span = info_span!("commonize", parallel = options.parallel).entered();
    let compiled = options.compile()?;
    let cache = ComparisonCache::new();

    let report = MergeEngine::new(first, second, &cache, &compiled).merge()?;
    let (registry, skeletons) = build_skeletons(&report.forest)?;
    let forests = materialize(&report.forest, &registry, skeletons, &compiled)?;

    let mut stats = CommonizationStats::collect(&report.forest);
    stats.mismatches = report.mismatches.len();
    stats.cache = cache.stats();
    debug!(
        common = stats.total_common(),
        first_only = stats.total_first_only(),
        second_only = stats.total_second_only(),
        mismatches = stats.mismatches,
        "commonization complete"
    );

    Ok(CommonizationOutput {
        first: forests.first,
        common: forests.common,
        second: forests.second,
        mismatches: report.mismatches,
        stats,
    })
}
