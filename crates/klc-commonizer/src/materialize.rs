//! Materialization pass.
//!
//! Fills every placeholder created by the skeleton pass with its full
//! payload, constructs functions, properties and values fresh, and rewrites
//! every `Symbolic` classifier reference to `Resolved` through the registry.
//! Runs top-down so that a container is always attached before its children.

use crate::error::{CommonizerError, Phase};
use crate::merge::{MergeForest, MergeNode, Variant};
use crate::options::CompiledOptions;
use crate::skeleton::{Registry, SkeletonForests};
use klc_model::{
    ClassifierRef, DeclData, DeclId, DeclKindTag, DeclTree, Expectation, ModelError, Type,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

/// The three linked output forests.
#[derive(Clone, Debug, Default)]
pub struct MaterializedForests {
    pub first: DeclTree,
    pub common: DeclTree,
    pub second: DeclTree,
}

pub fn materialize(
    forest: &MergeForest,
    registry: &Registry,
    skeletons: SkeletonForests,
    options: &CompiledOptions,
) -> Result<MaterializedForests, CommonizerError> {
    let mut materializer = Materializer {
        registry,
        options,
        forests: skeletons,
        done: FxHashSet::default(),
    };
    for root in &forest.roots {
        materializer.visit(root, [None; 3])?;
    }

    let SkeletonForests {
        first,
        common,
        second,
    } = materializer.forests;
    debug!(
        first = first.len(),
        common = common.len(),
        second = second.len(),
        "materialization complete"
    );
    Ok(MaterializedForests {
        first,
        common,
        second,
    })
}

struct Materializer<'a> {
    registry: &'a Registry,
    options: &'a CompiledOptions,
    forests: SkeletonForests,
    /// Placeholders already filled, per variant.
    done: FxHashSet<(Variant, DeclId)>,
}

impl Materializer<'_> {
    fn visit(&mut self, node: &MergeNode, parents: [Option<DeclId>; 3]) -> Result<(), CommonizerError> {
        let mut own = [None; 3];
        for variant in Variant::ALL {
            let Some(payload) = node.payload(variant) else {
                continue;
            };
            let mut data = self.resolve(payload, variant)?;
            data.expectation = expectation(node, variant, data.tag());
            own[variant.index()] = Some(self.place(data, variant, parents[variant.index()])?);
        }
        for child in &node.children {
            self.visit(child, own)?;
        }
        Ok(())
    }

    /// Put a resolved payload into its forest: fill and attach the
    /// placeholder of a registered kind, insert anything else fresh.
    fn place(
        &mut self,
        data: DeclData,
        variant: Variant,
        parent: Option<DeclId>,
    ) -> Result<DeclId, CommonizerError> {
        let tag = data.tag();
        let model = |source: ModelError| CommonizerError::Model {
            phase: Phase::Materialize,
            source,
        };

        if !tag.is_registered() {
            let parent = parent.ok_or_else(|| CommonizerError::MissingContainer {
                fq_name: data.fq_name.clone(),
                kind: tag,
                variant,
                phase: Phase::Materialize,
            })?;
            return self.forests.get_mut(variant).insert(parent, data).map_err(model);
        }

        let id = self
            .registry
            .lookup(tag, &data.fq_name, variant)
            .ok_or_else(|| missing_placeholder(&data, variant))?;
        if !self.done.insert((variant, id)) {
            return Err(CommonizerError::AlreadyMaterialized {
                fq_name: data.fq_name.clone(),
                variant,
                phase: Phase::Materialize,
            });
        }

        let tree = self.forests.get_mut(variant);
        let slot = tree
            .data_mut(id)
            .ok_or(ModelError::UnknownDeclaration(id))
            .map_err(model)?;
        if slot.tag() != tag || slot.fq_name != data.fq_name {
            return Err(CommonizerError::ConflictingPayload {
                fq_name: data.fq_name.clone(),
                variant,
                phase: Phase::Materialize,
            });
        }
        trace!(fq_name = %data.fq_name, kind = %tag, %variant, id = id.0, "materialized placeholder");
        *slot = data;
        if let Some(parent) = parent {
            tree.attach_child(parent, id).map_err(model)?;
        }
        Ok(id)
    }

    /// Clone `payload` with its classifier references bound to `variant`'s
    /// placeholders.
    fn resolve(&self, payload: &DeclData, variant: Variant) -> Result<DeclData, CommonizerError> {
        let mut data = payload.clone();
        let owner = &payload.fq_name;
        data.kind.try_for_each_type_mut(&mut |ty: &mut Type| {
            ty.try_for_each_classifier_mut(&mut |classifier: &mut ClassifierRef| {
                let resolved = match &*classifier {
                    ClassifierRef::Symbolic(fq_name) => {
                        match self.registry.classifier(fq_name, variant) {
                            Some(id) => ClassifierRef::Resolved(id),
                            None if self.options.is_builtin(fq_name) => {
                                ClassifierRef::External(fq_name.clone())
                            }
                            None => {
                                return Err(CommonizerError::MissingClassifier {
                                    fq_name: fq_name.clone(),
                                    variant,
                                    phase: Phase::Materialize,
                                });
                            }
                        }
                    }
                    // Still bound to an input tree.
                    ClassifierRef::Resolved(_) => {
                        return Err(CommonizerError::ConflictingPayload {
                            fq_name: owner.clone(),
                            variant,
                            phase: Phase::Materialize,
                        });
                    }
                    ClassifierRef::External(_) | ClassifierRef::TypeParameter(_) => return Ok(()),
                };
                *classifier = resolved;
                Ok(())
            })
        })?;
        Ok(data)
    }
}

fn missing_placeholder(data: &DeclData, variant: Variant) -> CommonizerError {
    match data.tag() {
        DeclKindTag::Class | DeclKindTag::TypeAlias => CommonizerError::MissingClassifier {
            fq_name: data.fq_name.clone(),
            variant,
            phase: Phase::Materialize,
        },
        kind => CommonizerError::MissingContainer {
            fq_name: data.fq_name.clone(),
            kind,
            variant,
            phase: Phase::Materialize,
        },
    }
}

/// `expect` for the common variant, `actual` for the targets of a matched
/// node, plain otherwise. Modules, packages and parameters are always plain.
fn expectation(node: &MergeNode, variant: Variant, tag: DeclKindTag) -> Expectation {
    let marked = matches!(
        tag,
        DeclKindTag::Class | DeclKindTag::TypeAlias | DeclKindTag::Function | DeclKindTag::Property
    );
    match variant {
        _ if !marked => Expectation::Plain,
        Variant::Common => Expectation::Expect,
        Variant::First | Variant::Second if node.is_common() => Expectation::Actual,
        Variant::First | Variant::Second => Expectation::Plain,
    }
}

#[cfg(test)]
#[path = "../tests/materialize_tests.rs"]
mod tests;
