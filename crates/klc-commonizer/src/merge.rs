//! Tree merge engine.
//!
//! Walks the two input trees top-down in lock-step and produces a
//! [`MergeForest`]: one [`MergeNode`] per declaration, carrying up to three
//! payloads (first, common, second).
//!
//! Children of two matched containers are paired by simple name and the
//! comparator decides each name-equal pair. Pairing is greedy: a first-side
//! child takes the first compatible second-side child, in declaration order.
//! Leftovers on either side become single-target nodes. Parameters of a
//! matched function are paired by position.

use crate::cache::ComparisonCache;
use crate::comparator::StructuralComparator;
use crate::error::{CommonizerError, Phase};
use crate::options::CompiledOptions;
use crate::result::{CommonizationResult, MismatchRecord};
use klc_common::FqName;
use klc_model::{DeclData, DeclId, DeclKind, DeclKindTag, DeclTree, ModelError};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

/// One of the three output forests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    First,
    Common,
    Second,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::First, Variant::Common, Variant::Second];

    /// Position in [`Variant::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Common => "common",
            Self::Second => "second",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declaration of the merged forest.
///
/// A node without a common payload still carries its single-target payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeNode {
    pub first: Option<DeclData>,
    pub common: Option<DeclData>,
    pub second: Option<DeclData>,
    pub children: Vec<MergeNode>,
}

impl MergeNode {
    fn single(variant: Variant, data: DeclData) -> Self {
        let mut node = Self::default();
        match variant {
            Variant::First => node.first = Some(data),
            Variant::Common => node.common = Some(data),
            Variant::Second => node.second = Some(data),
        }
        node
    }

    pub fn payload(&self, variant: Variant) -> Option<&DeclData> {
        match variant {
            Variant::First => self.first.as_ref(),
            Variant::Common => self.common.as_ref(),
            Variant::Second => self.second.as_ref(),
        }
    }

    #[inline]
    pub fn is_common(&self) -> bool {
        self.common.is_some()
    }

    /// Target-side payload: first if present, else second, else common.
    pub fn primary(&self) -> Option<&DeclData> {
        self.first
            .as_ref()
            .or(self.second.as_ref())
            .or(self.common.as_ref())
    }

    /// Kind of the target declarations. The common variant of a type alias
    /// is a class, so the kind is taken from a target payload.
    pub fn tag(&self) -> Option<DeclKindTag> {
        self.primary().map(DeclData::tag)
    }

    pub fn fq_name(&self) -> Option<&FqName> {
        self.primary().map(|data| &data.fq_name)
    }

    /// Pre-order traversal of this node and its descendants.
    pub fn walk(&self, f: &mut impl FnMut(&MergeNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeForest {
    pub roots: Vec<MergeNode>,
}

impl MergeForest {
    pub fn walk(&self, mut f: impl FnMut(&MergeNode)) {
        for root in &self.roots {
            root.walk(&mut f);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_| count += 1);
        count
    }
}

/// Result of the merge pass.
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub forest: MergeForest,
    /// Name-equal pairs whose first-side declaration found no partner.
    pub mismatches: Vec<MismatchRecord>,
}

/// Outcome of pairing one child of each side.
enum Pairing {
    Matched {
        a: DeclId,
        b: DeclId,
        first: DeclData,
        common: DeclData,
        second: DeclData,
    },
    FirstOnly(DeclId),
    SecondOnly(DeclId),
}

pub struct MergeEngine<'a> {
    first: &'a DeclTree,
    second: &'a DeclTree,
    cache: &'a ComparisonCache,
    options: &'a CompiledOptions,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        first: &'a DeclTree,
        second: &'a DeclTree,
        cache: &'a ComparisonCache,
        options: &'a CompiledOptions,
    ) -> Self {
        Self {
            first,
            second,
            cache,
            options,
        }
    }

    pub fn merge(&self) -> Result<MergeReport, CommonizerError> {
        check_input(self.first, Variant::First)?;
        check_input(self.second, Variant::Second)?;

        let mut worker = self.worker();
        let plan = worker.pair(self.first.roots(), self.second.roots());
        let roots = worker.build_all(plan)?;
        let report = MergeReport {
            forest: MergeForest { roots },
            mismatches: worker.mismatches,
        };
        debug!(
            nodes = report.forest.node_count(),
            mismatches = report.mismatches.len(),
            cached_pairs = self.cache.len(),
            parallel = self.options.parallel,
            "merge complete"
        );
        Ok(report)
    }

    fn worker(&self) -> MergeWorker<'_, 'a> {
        MergeWorker {
            engine: self,
            comparator: StructuralComparator::new(
                self.first,
                self.second,
                self.cache,
                self.options,
            ),
            mismatches: Vec::new(),
        }
    }
}

fn check_input(tree: &DeclTree, side: Variant) -> Result<(), CommonizerError> {
    tree.validate()
        .map_err(|source| CommonizerError::InvalidInput { side, source })?;
    for &root in tree.roots() {
        let decl = &tree[root];
        if decl.tag() != DeclKindTag::Module {
            return Err(CommonizerError::InvalidInput {
                side,
                source: ModelError::RootNotModule {
                    name: decl.name().to_string(),
                    found: decl.tag(),
                },
            });
        }
    }
    Ok(())
}

/// Per-thread merge state: its own comparator (and recursion guard) over the
/// shared cache.
struct MergeWorker<'e, 'a> {
    engine: &'e MergeEngine<'a>,
    comparator: StructuralComparator<'a>,
    mismatches: Vec<MismatchRecord>,
}

impl<'a> MergeWorker<'_, 'a> {
    fn pair(&mut self, list_a: &[DeclId], list_b: &[DeclId]) -> Vec<Pairing> {
        let (first, second) = (self.engine.first, self.engine.second);
        let mut consumed = vec![false; list_b.len()];
        let mut plan = Vec::with_capacity(list_a.len().max(list_b.len()));

        for &a in list_a {
            if first.is_non_abstract_in_interface(a) {
                plan.push(Pairing::FirstOnly(a));
                continue;
            }
            let mut failures = Vec::new();
            let mut matched = None;
            for (ib, &b) in list_b.iter().enumerate() {
                if consumed[ib]
                    || second.is_non_abstract_in_interface(b)
                    || first[a].name() != second[b].name()
                {
                    continue;
                }
                match self.comparator.compare(a, b) {
                    CommonizationResult::Matched {
                        first,
                        common,
                        second,
                    } => {
                        consumed[ib] = true;
                        matched = Some(Pairing::Matched {
                            a,
                            b,
                            first,
                            common,
                            second,
                        });
                        break;
                    }
                    CommonizationResult::Mismatched(mismatch) => failures.push(mismatch),
                }
            }
            match matched {
                Some(pairing) => plan.push(pairing),
                None => {
                    let decl = &first[a];
                    for mismatch in &failures {
                        self.mismatches.push(MismatchRecord::new(
                            decl.fq_name().clone(),
                            decl.tag(),
                            mismatch,
                        ));
                    }
                    plan.push(Pairing::FirstOnly(a));
                }
            }
        }

        plan.extend(
            list_b
                .iter()
                .zip(&consumed)
                .filter(|(_, consumed)| !**consumed)
                .map(|(&b, _)| Pairing::SecondOnly(b)),
        );
        plan
    }

    fn build_all(&mut self, plan: Vec<Pairing>) -> Result<Vec<MergeNode>, CommonizerError> {
        plan.into_iter()
            .map(|pairing| self.build(pairing))
            .collect()
    }

    /// Build matched children on the rayon pool. Each task gets a fresh
    /// worker; output order and mismatch order follow the plan.
    fn build_all_parallel(&mut self, plan: Vec<Pairing>) -> Result<Vec<MergeNode>, CommonizerError> {
        let engine = self.engine;
        let results: Vec<Result<(MergeNode, Vec<MismatchRecord>), CommonizerError>> = plan
            .into_par_iter()
            .map(|pairing| {
                let mut worker = engine.worker();
                let node = worker.build(pairing)?;
                Ok((node, worker.mismatches))
            })
            .collect();

        let mut nodes = Vec::with_capacity(results.len());
        for result in results {
            let (node, mismatches) = result?;
            self.mismatches.extend(mismatches);
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn build(&mut self, pairing: Pairing) -> Result<MergeNode, CommonizerError> {
        let (first, second) = (self.engine.first, self.engine.second);
        let (a, b, first_data, mut common_data, second_data) = match pairing {
            Pairing::FirstOnly(a) => return single_target(first, a, Variant::First),
            Pairing::SecondOnly(b) => return single_target(second, b, Variant::Second),
            Pairing::Matched {
                a,
                b,
                first,
                common,
                second,
            } => (a, b, first, common, second),
        };

        if let (DeclKind::Class(ca), DeclKind::Class(cb)) = (first[a].kind(), second[b].kind()) {
            let supertypes = self
                .comparator
                .common_supertypes(&ca.supertypes, &cb.supertypes);
            let constructors = self
                .comparator
                .common_constructors(&ca.constructors, &cb.constructors);
            if let Some(common_class) = common_data.kind.as_class_mut() {
                common_class.supertypes = retain_indices(
                    std::mem::take(&mut common_class.supertypes),
                    &supertypes,
                );
                common_class.constructors = retain_indices(
                    std::mem::take(&mut common_class.constructors),
                    &constructors,
                );
            }
        }

        let children = match first[a].tag() {
            DeclKindTag::Function => self.build_parameters(a, b)?,
            tag => {
                let plan = self.pair(first.children(a), second.children(b));
                if tag == DeclKindTag::Module && self.engine.options.parallel {
                    self.build_all_parallel(plan)?
                } else {
                    self.build_all(plan)?
                }
            }
        };

        trace!(fq_name = %first_data.fq_name, children = children.len(), "merged pair");
        Ok(MergeNode {
            first: Some(first_data),
            common: Some(common_data),
            second: Some(second_data),
            children,
        })
    }

    fn build_parameters(&mut self, a: DeclId, b: DeclId) -> Result<Vec<MergeNode>, CommonizerError> {
        let (first, second) = (self.engine.first, self.engine.second);
        let (params_a, params_b) = (first.children(a), second.children(b));
        let mut nodes = Vec::with_capacity(params_a.len().max(params_b.len()));
        for (&pa, &pb) in params_a.iter().zip(params_b) {
            match self.comparator.compare(pa, pb) {
                CommonizationResult::Matched {
                    first,
                    common,
                    second,
                } => nodes.push(MergeNode {
                    first: Some(first),
                    common: Some(common),
                    second: Some(second),
                    children: Vec::new(),
                }),
                CommonizationResult::Mismatched(_) => {
                    nodes.push(single_target(first, pa, Variant::First)?);
                    nodes.push(single_target(second, pb, Variant::Second)?);
                }
            }
        }
        let shared = params_a.len().min(params_b.len());
        for &pa in &params_a[shared..] {
            nodes.push(single_target(first, pa, Variant::First)?);
        }
        for &pb in &params_b[shared..] {
            nodes.push(single_target(second, pb, Variant::Second)?);
        }
        Ok(nodes)
    }
}

/// A declaration present on one side only, with its whole subtree.
fn single_target(tree: &DeclTree, id: DeclId, variant: Variant) -> Result<MergeNode, CommonizerError> {
    let data = tree
        .detached_data(id)
        .ok_or(CommonizerError::Model {
            phase: Phase::Merge,
            source: ModelError::UnknownDeclaration(id),
        })?;
    let mut node = MergeNode::single(variant, data);
    node.children = tree
        .children(id)
        .iter()
        .map(|&child| single_target(tree, child, variant))
        .collect::<Result<_, _>>()?;
    Ok(node)
}

fn retain_indices<T>(items: Vec<T>, keep: &[usize]) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
#[path = "../tests/merge_tests.rs"]
mod tests;
