//! Skeleton pass and classifier registry.
//!
//! Before any reference is resolved, every module, package, class and type
//! alias node of the merged forest gets an empty placeholder in each output
//! forest it has a payload for. Placeholders are allocated with their
//! container link set but are not yet listed among the container's children;
//! materialization attaches them in forest order.

use crate::error::{CommonizerError, Phase};
use crate::merge::{MergeForest, MergeNode, Variant};
use indexmap::IndexMap;
use klc_common::FqName;
use klc_common::limits::FOREST_ARENA_CAPACITY;
use klc_model::{DeclData, DeclId, DeclKind, DeclKindTag, DeclTree};
use tracing::{debug, trace};

/// Placeholder ids of one qualified name, per variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slot {
    pub first: Option<DeclId>,
    pub common: Option<DeclId>,
    pub second: Option<DeclId>,
}

impl Slot {
    pub fn get(&self, variant: Variant) -> Option<DeclId> {
        match variant {
            Variant::First => self.first,
            Variant::Common => self.common,
            Variant::Second => self.second,
        }
    }

    fn get_mut(&mut self, variant: Variant) -> &mut Option<DeclId> {
        match variant {
            Variant::First => &mut self.first,
            Variant::Common => &mut self.common,
            Variant::Second => &mut self.second,
        }
    }
}

/// Name-keyed placeholder registry. Modules, packages and classifiers are
/// separate namespaces.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    modules: IndexMap<FqName, Slot>,
    packages: IndexMap<FqName, Slot>,
    classifiers: IndexMap<FqName, Slot>,
}

impl Registry {
    fn namespace(&self, tag: DeclKindTag) -> Option<&IndexMap<FqName, Slot>> {
        match tag {
            DeclKindTag::Module => Some(&self.modules),
            DeclKindTag::Package => Some(&self.packages),
            DeclKindTag::Class | DeclKindTag::TypeAlias => Some(&self.classifiers),
            _ => None,
        }
    }

    fn namespace_mut(&mut self, tag: DeclKindTag) -> Option<&mut IndexMap<FqName, Slot>> {
        match tag {
            DeclKindTag::Module => Some(&mut self.modules),
            DeclKindTag::Package => Some(&mut self.packages),
            DeclKindTag::Class | DeclKindTag::TypeAlias => Some(&mut self.classifiers),
            _ => None,
        }
    }

    /// Placeholder registered for a declaration of kind `tag`.
    pub fn lookup(&self, tag: DeclKindTag, fq_name: &FqName, variant: Variant) -> Option<DeclId> {
        self.namespace(tag)?
            .get(fq_name)
            .and_then(|slot| slot.get(variant))
    }

    pub fn classifier(&self, fq_name: &FqName, variant: Variant) -> Option<DeclId> {
        self.lookup(DeclKindTag::Class, fq_name, variant)
    }

    pub fn modules(&self) -> &IndexMap<FqName, Slot> {
        &self.modules
    }

    pub fn packages(&self) -> &IndexMap<FqName, Slot> {
        &self.packages
    }

    pub fn classifiers(&self) -> &IndexMap<FqName, Slot> {
        &self.classifiers
    }

    /// Number of registered placeholders across all namespaces and variants.
    pub fn len(&self) -> usize {
        [&self.modules, &self.packages, &self.classifiers]
            .into_iter()
            .flat_map(|namespace| namespace.values())
            .map(|slot| {
                Variant::ALL
                    .into_iter()
                    .filter(|&variant| slot.get(variant).is_some())
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(
        &mut self,
        data: &DeclData,
        variant: Variant,
        id: DeclId,
    ) -> Result<(), CommonizerError> {
        let tag = data.tag();
        let duplicate = || CommonizerError::DuplicateEntry {
            fq_name: data.fq_name.clone(),
            kind: tag,
            variant,
            phase: Phase::Skeleton,
        };
        let namespace = self.namespace_mut(tag).ok_or_else(duplicate)?;
        let entry = namespace.entry(data.fq_name.clone()).or_default().get_mut(variant);
        if entry.is_some() {
            return Err(duplicate());
        }
        *entry = Some(id);
        trace!(fq_name = %data.fq_name, kind = %tag, %variant, id = id.0, "registered placeholder");
        Ok(())
    }
}

/// The three output arenas, indexed by [`Variant`].
#[derive(Clone, Debug, Default)]
pub struct SkeletonForests {
    pub first: DeclTree,
    pub common: DeclTree,
    pub second: DeclTree,
}

impl SkeletonForests {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            first: DeclTree::with_capacity(capacity),
            common: DeclTree::with_capacity(capacity),
            second: DeclTree::with_capacity(capacity),
        }
    }

    pub fn get(&self, variant: Variant) -> &DeclTree {
        match variant {
            Variant::First => &self.first,
            Variant::Common => &self.common,
            Variant::Second => &self.second,
        }
    }

    pub fn get_mut(&mut self, variant: Variant) -> &mut DeclTree {
        match variant {
            Variant::First => &mut self.first,
            Variant::Common => &mut self.common,
            Variant::Second => &mut self.second,
        }
    }
}

/// Create placeholders for every registered node of `forest`.
pub fn build_skeletons(forest: &MergeForest) -> Result<(Registry, SkeletonForests), CommonizerError> {
    let mut builder = SkeletonBuilder {
        registry: Registry::default(),
        forests: SkeletonForests::with_capacity(FOREST_ARENA_CAPACITY),
    };
    for root in &forest.roots {
        builder.visit(root, [None; 3])?;
    }
    debug!(
        placeholders = builder.registry.len(),
        modules = builder.registry.modules.len(),
        packages = builder.registry.packages.len(),
        classifiers = builder.registry.classifiers.len(),
        "skeleton pass complete"
    );
    Ok((builder.registry, builder.forests))
}

struct SkeletonBuilder {
    registry: Registry,
    forests: SkeletonForests,
}

impl SkeletonBuilder {
    fn visit(&mut self, node: &MergeNode, parents: [Option<DeclId>; 3]) -> Result<(), CommonizerError> {
        if !node.tag().is_some_and(DeclKindTag::is_registered) {
            return Ok(());
        }

        let mut own = [None; 3];
        for variant in Variant::ALL {
            let Some(data) = node.payload(variant) else {
                continue;
            };
            let tag = data.tag();
            let tree = self.forests.get_mut(variant);
            let id = if tag == DeclKindTag::Module {
                tree.add_root(placeholder(data))
            } else {
                let container = parents[variant.index()].ok_or_else(|| {
                    CommonizerError::MissingContainer {
                        fq_name: data.fq_name.clone(),
                        kind: tag,
                        variant,
                        phase: Phase::Skeleton,
                    }
                })?;
                tree.alloc(placeholder(data), Some(container))
            };
            self.registry.register(data, variant, id)?;
            own[variant.index()] = Some(id);
        }

        for child in &node.children {
            self.visit(child, own)?;
        }
        Ok(())
    }
}

/// Named shell of a declaration: classes lose their type parameters,
/// supertypes and constructors until materialization.
fn placeholder(data: &DeclData) -> DeclData {
    let mut data = data.clone();
    if let DeclKind::Class(class) = &mut data.kind {
        class.type_parameters.clear();
        class.supertypes.clear();
        class.constructors.clear();
    }
    data
}

#[cfg(test)]
#[path = "../tests/skeleton_tests.rs"]
mod tests;
