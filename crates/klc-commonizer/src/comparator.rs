//! Structural comparator.
//!
//! Decides, per declaration kind, whether a first-side and a second-side
//! declaration can be unified into one shared declaration. Rules of a kind
//! are AND-combined and every failing rule contributes its [`Cause`].
//!
//! Classifier pairs (classes and type aliases) are memoized in the run's
//! [`ComparisonCache`]. Re-entering a pair that is already being compared is
//! answered optimistically ("assume matched"); verdicts that relied on such
//! an assumption are only cached when they are definite.

use crate::cache::{ClassifierVerdict, ComparisonCache, PairKey};
use crate::options::CompiledOptions;
use crate::recursion::{RecursionGuard, RecursionResult};
use crate::result::{AccessorKind, Cause, CommonizationResult, Mismatch, UnsupportedConstruct};
use klc_model::{
    Accessor, ClassDecl, ClassKind, ClassifierRef, Constructor, DeclData, DeclId, DeclKind,
    DeclKindTag, DeclTree, Modality, SimpleType, Type, TypeArgument, TypeParameter, Visibility,
};
use std::convert::Infallible;
use tracing::trace;

/// Attributes of the class a type alias expands to.
#[derive(Clone, Debug)]
struct AliasTarget {
    class_kind: ClassKind,
    modality: Modality,
    visibility: Visibility,
    is_inline: bool,
    supertypes: Vec<Type>,
}

impl AliasTarget {
    /// An expansion to a classifier outside the tree: nothing is known about
    /// it, so it is treated as a plain final class.
    fn external() -> Self {
        Self {
            class_kind: ClassKind::Class,
            modality: Modality::Final,
            visibility: Visibility::Public,
            is_inline: false,
            supertypes: Vec::new(),
        }
    }
}

pub struct StructuralComparator<'a> {
    first: &'a DeclTree,
    second: &'a DeclTree,
    cache: &'a ComparisonCache,
    options: &'a CompiledOptions,
    guard: RecursionGuard<PairKey>,
    /// Cycle re-entries answered optimistically so far.
    assumptions: u32,
    /// Depth or iteration limit violations so far.
    limit_hits: u32,
}

impl<'a> StructuralComparator<'a> {
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
            guard: RecursionGuard::new(
                options.max_comparison_depth,
                options.max_comparison_iterations,
            ),
            assumptions: 0,
            limit_hits: 0,
        }
    }

    pub fn first(&self) -> &'a DeclTree {
        self.first
    }

    pub fn second(&self) -> &'a DeclTree {
        self.second
    }

    #[inline]
    fn same_tree(&self) -> bool {
        std::ptr::eq(self.first, self.second)
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Compare declaration `a` of the first tree with `b` of the second.
    ///
    /// On a match the three payloads are detached from their trees: `first`
    /// and `second` are the target variants, `common` is derived from the
    /// first side (for a type alias, an expect class named like the alias).
    pub fn compare(&mut self, a: DeclId, b: DeclId) -> CommonizationResult<DeclData> {
        if self.same_tree() && a == b {
            return self.matched(a, b);
        }

        let limit_hits = self.limit_hits;
        let mut mismatch = self.mismatch_of(a, b);
        if self.limit_hits > limit_hits {
            mismatch.push(Cause::RecursionLimit);
        }

        if mismatch.is_empty() {
            let result = self.matched(a, b);
            trace!(fq_name = %self.first[a].fq_name(), "compare: matched");
            result
        } else {
            trace!(fq_name = %self.first[a].fq_name(), causes = %mismatch, "compare: mismatched");
            CommonizationResult::Mismatched(mismatch)
        }
    }

    fn mismatch_of(&mut self, a: DeclId, b: DeclId) -> Mismatch {
        let (first, second) = (self.first, self.second);
        let (da, db) = (&first[a], &second[b]);
        if da.tag() != db.tag() {
            return Mismatch::new(Cause::KindMismatch {
                first: da.tag(),
                second: db.tag(),
            });
        }
        if da.data.visibility.is_private() || db.data.visibility.is_private() {
            return Mismatch::new(Cause::Private);
        }
        if first.is_non_abstract_in_interface(a) || second.is_non_abstract_in_interface(b) {
            return Mismatch::new(Cause::NonAbstractInInterface);
        }

        match da.tag() {
            DeclKindTag::Module => {
                let mut mismatch = Mismatch::default();
                mismatch.require(da.data.name == db.data.name, Cause::NameMismatch);
                mismatch
            }
            DeclKindTag::Package => {
                let mut mismatch = Mismatch::default();
                mismatch.require(da.data.fq_name == db.data.fq_name, Cause::NameMismatch);
                mismatch
            }
            DeclKindTag::Class | DeclKindTag::TypeAlias => {
                self.compare_classifiers(a, b).err().unwrap_or_default()
            }
            DeclKindTag::Function => self.compare_functions(a, b),
            DeclKindTag::Property => self.compare_properties(a, b),
            DeclKindTag::Value => self.compare_values(a, b),
        }
    }

    fn matched(&mut self, a: DeclId, b: DeclId) -> CommonizationResult<DeclData> {
        let first = detached(self.first, a);
        let second = detached(self.second, b);
        let mut common = match (first.kind.as_type_alias(), second.kind.as_type_alias()) {
            (Some(_), Some(_)) => self.common_alias_variant(a, b, &first),
            _ => first.clone(),
        };
        // Equal types may still expand to different classes; only the alias
        // spelling has a common classifier.
        let Ok(()) = common.kind.try_for_each_type_mut(&mut |ty: &mut Type| {
            ty.collapse_abbreviations();
            Ok::<(), Infallible>(())
        });
        CommonizationResult::Matched {
            first,
            common,
            second,
        }
    }

    // =========================================================================
    // Callables and values
    // =========================================================================

    fn compare_functions(&mut self, a: DeclId, b: DeclId) -> Mismatch {
        let (first, second) = (self.first, self.second);
        let (da, db) = (&first[a].data, &second[b].data);
        let (DeclKind::Function(fa), DeclKind::Function(fb)) = (&da.kind, &db.kind) else {
            return Mismatch::new(Cause::KindMismatch {
                first: da.tag(),
                second: db.tag(),
            });
        };

        let mut mismatch = Mismatch::default();
        mismatch.require(
            !self.options.is_excluded_function(&da.name)
                && !self.options.is_excluded_function(&db.name),
            Cause::Excluded,
        );
        mismatch.require(da.fq_name == db.fq_name, Cause::NameMismatch);
        mismatch.require(da.visibility == db.visibility, Cause::VisibilityMismatch);
        mismatch.require(fa.is_suspend == fb.is_suspend, Cause::SuspendMismatch);
        mismatch.require(
            self.types_equal(&fa.return_type, &fb.return_type),
            Cause::ReturnTypeMismatch,
        );
        mismatch.require(
            self.optional_types_equal(
                fa.extension_receiver.as_ref(),
                fb.extension_receiver.as_ref(),
            ),
            Cause::ExtensionReceiverMismatch,
        );
        mismatch.require(
            self.type_parameters_equal(&fa.type_parameters, &fb.type_parameters),
            Cause::TypeParameterMismatch,
        );

        let params_a = first.children(a);
        let params_b = second.children(b);
        if params_a.len() != params_b.len() {
            mismatch.push(Cause::ParameterCountMismatch);
        } else {
            for (index, (&pa, &pb)) in params_a.iter().zip(params_b).enumerate() {
                if !self.compare_values(pa, pb).is_empty() {
                    mismatch.push(Cause::ParameterMismatch { index });
                }
            }
        }
        mismatch
    }

    /// Parameter names are never grounds for rejection.
    fn compare_values(&mut self, a: DeclId, b: DeclId) -> Mismatch {
        let (first, second) = (self.first, self.second);
        let (da, db) = (&first[a].data, &second[b].data);
        let (DeclKind::Value(va), DeclKind::Value(vb)) = (&da.kind, &db.kind) else {
            return Mismatch::new(Cause::KindMismatch {
                first: da.tag(),
                second: db.tag(),
            });
        };
        let mut mismatch = Mismatch::default();
        mismatch.require(self.types_equal(&va.ty, &vb.ty), Cause::TypeMismatch);
        mismatch.require(va.is_vararg == vb.is_vararg, Cause::VarargMismatch);
        mismatch
    }

    fn compare_properties(&mut self, a: DeclId, b: DeclId) -> Mismatch {
        let (first, second) = (self.first, self.second);
        let (da, db) = (&first[a].data, &second[b].data);
        let (DeclKind::Property(pa), DeclKind::Property(pb)) = (&da.kind, &db.kind) else {
            return Mismatch::new(Cause::KindMismatch {
                first: da.tag(),
                second: db.tag(),
            });
        };

        let mut mismatch = Mismatch::default();
        mismatch.require(da.fq_name == db.fq_name, Cause::NameMismatch);
        mismatch.require(da.visibility == db.visibility, Cause::VisibilityMismatch);
        mismatch.require(self.types_equal(&pa.ty, &pb.ty), Cause::TypeMismatch);
        mismatch.require(
            self.type_parameters_equal(&pa.type_parameters, &pb.type_parameters),
            Cause::TypeParameterMismatch,
        );
        mismatch.require(!pa.is_const && !pb.is_const, Cause::ConstProperty);
        mismatch.require(!pa.is_lateinit && !pb.is_lateinit, Cause::LateinitProperty);
        mismatch.require(pa.is_var == pb.is_var, Cause::VarMismatch);
        mismatch.require(
            accessors_equal(pa.getter.as_ref(), pb.getter.as_ref()),
            Cause::AccessorMismatch {
                accessor: AccessorKind::Getter,
            },
        );
        mismatch.require(
            accessors_equal(pa.setter.as_ref(), pb.setter.as_ref()),
            Cause::AccessorMismatch {
                accessor: AccessorKind::Setter,
            },
        );
        mismatch.require(
            self.optional_types_equal(
                pa.extension_receiver.as_ref(),
                pb.extension_receiver.as_ref(),
            ),
            Cause::ExtensionReceiverMismatch,
        );
        mismatch
    }

    // =========================================================================
    // Classifiers
    // =========================================================================

    /// Memoized comparison of two classifiers.
    pub fn compare_classifiers(&mut self, a: DeclId, b: DeclId) -> ClassifierVerdict {
        let key = (a, b);
        if let Some(verdict) = self.cache.get(key) {
            return verdict;
        }

        match self.guard.enter(key) {
            RecursionResult::Entered => {}
            RecursionResult::Cycle => {
                self.assumptions += 1;
                trace!(first = a.0, second = b.0, "compare_classifiers: cycle, assuming matched");
                return Ok(());
            }
            RecursionResult::DepthExceeded | RecursionResult::IterationExceeded => {
                self.limit_hits += 1;
                return Err(Mismatch::new(Cause::RecursionLimit));
            }
        }

        let assumptions = self.assumptions;
        let limit_hits = self.limit_hits;
        let verdict = self.classifier_rules(a, b).into_result();
        self.guard.leave(key);

        let outermost = !self.guard.is_active();
        let definite = self.assumptions == assumptions || verdict.is_err() || outermost;
        if definite && self.limit_hits == limit_hits {
            self.cache.insert(key, verdict)
        } else {
            verdict
        }
    }

    fn classifier_rules(&mut self, a: DeclId, b: DeclId) -> Mismatch {
        let (first, second) = (self.first, self.second);
        let (da, db) = (&first[a].data, &second[b].data);
        if da.tag() != db.tag() {
            return Mismatch::new(Cause::KindMismatch {
                first: da.tag(),
                second: db.tag(),
            });
        }
        if da.visibility.is_private() || db.visibility.is_private() {
            return Mismatch::new(Cause::Private);
        }

        let mut mismatch = Mismatch::default();
        mismatch.require(da.fq_name == db.fq_name, Cause::NameMismatch);
        match (&da.kind, &db.kind) {
            (DeclKind::Class(ca), DeclKind::Class(cb)) => {
                self.class_rules(a, b, ca, cb, &mut mismatch);
            }
            (DeclKind::TypeAlias(aa), DeclKind::TypeAlias(ab)) => {
                if !aa.type_parameters.is_empty() || !ab.type_parameters.is_empty() {
                    mismatch.push(Cause::Unsupported {
                        construct: UnsupportedConstruct::ParameterizedAlias,
                    });
                }
                match (
                    alias_target(first, &aa.underlying),
                    alias_target(second, &ab.underlying),
                ) {
                    (Ok(ta), Ok(tb)) => {
                        mismatch.require(
                            ta.class_kind == tb.class_kind
                                && ta.modality == tb.modality
                                && ta.visibility == tb.visibility,
                            Cause::AliasTargetMismatch,
                        );
                        if ta.is_inline || tb.is_inline {
                            mismatch.push(Cause::Unsupported {
                                construct: UnsupportedConstruct::InlineAliasTarget,
                            });
                        }
                    }
                    (Err(construct), _) | (_, Err(construct)) => {
                        mismatch.push(Cause::Unsupported { construct });
                    }
                }
            }
            _ => {}
        }
        mismatch
    }

    fn class_rules(
        &mut self,
        a: DeclId,
        b: DeclId,
        ca: &ClassDecl,
        cb: &ClassDecl,
        mismatch: &mut Mismatch,
    ) {
        mismatch.require(ca.class_kind == cb.class_kind, Cause::ClassKindMismatch);
        mismatch.require(
            self.type_parameters_equal(&ca.type_parameters, &cb.type_parameters),
            Cause::TypeParameterMismatch,
        );

        let (first, second) = (self.first, self.second);
        let container_a = first.containing_class(a).map(|(id, _)| id);
        let container_b = second.containing_class(b).map(|(id, _)| id);
        let containers_ok = match (container_a, container_b) {
            (None, None) => true,
            (Some(x), Some(y)) => self.compare_classifiers(x, y).is_ok(),
            _ => false,
        };
        mismatch.require(containers_ok, Cause::ContainerMismatch);
    }

    fn type_parameters_equal(&mut self, a: &[TypeParameter], b: &[TypeParameter]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).all(|(pa, pb)| {
            pa.variance == pb.variance
                && pa.upper_bounds.len() == pb.upper_bounds.len()
                && pa
                    .upper_bounds
                    .iter()
                    .zip(&pb.upper_bounds)
                    .all(|(ba, bb)| self.types_equal(ba, bb))
        })
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Structural type equality between a first-tree and a second-tree type.
    pub fn types_equal(&mut self, a: &Type, b: &Type) -> bool {
        if self.same_tree() && a == b {
            return true;
        }
        match (a, b) {
            (Type::Simple(sa), Type::Simple(sb)) => self.simple_types_equal(sa, sb),
            (Type::Flexible(fa), Type::Flexible(fb)) => {
                self.simple_types_equal(&fa.lower, &fb.lower)
                    && self.simple_types_equal(&fa.upper, &fb.upper)
            }
            _ => false,
        }
    }

    fn optional_types_equal(&mut self, a: Option<&Type>, b: Option<&Type>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(ta), Some(tb)) => self.types_equal(ta, tb),
            _ => false,
        }
    }

    fn simple_types_equal(&mut self, a: &SimpleType, b: &SimpleType) -> bool {
        let (args_a, args_b) = (a.effective_arguments(), b.effective_arguments());
        if args_a.len() != args_b.len()
            || a.nullable != b.nullable
            || a.definitely_not_null != b.definitely_not_null
        {
            return false;
        }
        if !self.classifier_refs_equal(a.effective_classifier(), b.effective_classifier()) {
            return false;
        }
        args_a.iter().zip(args_b).all(|pair| match pair {
            (TypeArgument::Star, TypeArgument::Star) => true,
            (
                TypeArgument::Projection {
                    variance: va,
                    ty: ta,
                },
                TypeArgument::Projection {
                    variance: vb,
                    ty: tb,
                },
            ) => va == vb && self.types_equal(ta, tb),
            _ => false,
        })
    }

    fn classifier_refs_equal(&mut self, a: &ClassifierRef, b: &ClassifierRef) -> bool {
        match (a, b) {
            (ClassifierRef::TypeParameter(x), ClassifierRef::TypeParameter(y)) => x == y,
            (ClassifierRef::TypeParameter(_), _) | (_, ClassifierRef::TypeParameter(_)) => false,
            _ => {
                let (first, second, options) = (self.first, self.second, self.options);
                let fq_a = first.classifier_fq_name(a);
                let fq_b = second.classifier_fq_name(b);
                let builtin = fq_a.is_some_and(|fq| options.is_builtin(fq))
                    || fq_b.is_some_and(|fq| options.is_builtin(fq));
                let resolved = (first.resolve_classifier(a), second.resolve_classifier(b));
                match resolved {
                    (Some(x), Some(y)) if !builtin => self.compare_classifiers(x, y).is_ok(),
                    // A classifier declared on one side only has no common node.
                    (Some(_), None) | (None, Some(_)) if !builtin => false,
                    _ => fq_a.is_some() && fq_a == fq_b,
                }
            }
        }
    }

    // =========================================================================
    // Intersections
    // =========================================================================

    /// Greedy pairing of two supertype lists. Each first-side supertype takes
    /// the first unused second-side supertype equal to it. Returns the
    /// first-side indices of the paired supertypes, in order.
    pub fn common_supertypes(&mut self, a: &[Type], b: &[Type]) -> Vec<usize> {
        let mut used = vec![false; b.len()];
        let mut common = Vec::new();
        for (ia, ta) in a.iter().enumerate() {
            for (ib, tb) in b.iter().enumerate() {
                if !used[ib] && self.types_equal(ta, tb) {
                    used[ib] = true;
                    common.push(ia);
                    break;
                }
            }
        }
        common
    }

    /// Greedy pairing of two constructor sets. Paired constructors agree on
    /// visibility and on their parameter lists position by position.
    pub fn common_constructors(&mut self, a: &[Constructor], b: &[Constructor]) -> Vec<usize> {
        let mut used = vec![false; b.len()];
        let mut common = Vec::new();
        for (ia, ca) in a.iter().enumerate() {
            for (ib, cb) in b.iter().enumerate() {
                if !used[ib] && self.constructors_equal(ca, cb) {
                    used[ib] = true;
                    common.push(ia);
                    break;
                }
            }
        }
        common
    }

    fn constructors_equal(&mut self, a: &Constructor, b: &Constructor) -> bool {
        a.visibility == b.visibility
            && a.parameters.len() == b.parameters.len()
            && a.parameters.iter().zip(&b.parameters).all(|(pa, pb)| {
                pa.is_vararg == pb.is_vararg && self.types_equal(&pa.ty, &pb.ty)
            })
    }

    /// Common variant of a matched alias pair: an expect class named like
    /// the alias, shaped like the right-hand classes.
    fn common_alias_variant(&mut self, a: DeclId, b: DeclId, first: &DeclData) -> DeclData {
        let target_a = alias_target_of(self.first, a);
        let target_b = alias_target_of(self.second, b);
        let supertypes = self
            .common_supertypes(&target_a.supertypes, &target_b.supertypes)
            .into_iter()
            .map(|idx| self.first.detached_type(&target_a.supertypes[idx]))
            .collect();
        let class = ClassDecl {
            class_kind: target_a.class_kind,
            supertypes,
            ..ClassDecl::default()
        };
        DeclData::new(first.name.clone(), first.fq_name.clone(), DeclKind::Class(class))
            .with_visibility(first.visibility)
            .with_modality(target_a.modality)
    }
}

fn detached(tree: &DeclTree, id: DeclId) -> DeclData {
    let mut data = tree[id].data.clone();
    let Ok(()) = data.kind.try_for_each_type_mut(&mut |ty: &mut Type| {
        *ty = tree.detached_type(ty);
        Ok::<(), Infallible>(())
    });
    data
}

fn alias_target_of(tree: &DeclTree, alias: DeclId) -> AliasTarget {
    tree[alias]
        .kind()
        .as_type_alias()
        .and_then(|decl| alias_target(tree, &decl.underlying).ok())
        .unwrap_or_else(AliasTarget::external)
}

/// Resolve the right-hand side of a type alias to the class it names.
fn alias_target(tree: &DeclTree, underlying: &Type) -> Result<AliasTarget, UnsupportedConstruct> {
    let Type::Simple(simple) = underlying else {
        return Err(UnsupportedConstruct::AliasOfAlias);
    };
    if simple.abbreviation.is_some() {
        return Err(UnsupportedConstruct::AliasOfAlias);
    }
    if !simple.arguments.is_empty() {
        return Err(UnsupportedConstruct::ParameterizedAlias);
    }
    let Some(target) = tree.resolve_classifier(&simple.classifier) else {
        return Ok(AliasTarget::external());
    };
    let decl = &tree[target];
    match decl.kind() {
        DeclKind::Class(class) => Ok(AliasTarget {
            class_kind: class.class_kind,
            modality: decl.data.modality,
            visibility: decl.data.visibility,
            is_inline: class.is_inline,
            supertypes: class.supertypes.clone(),
        }),
        _ => Err(UnsupportedConstruct::AliasOfAlias),
    }
}

fn accessors_equal(a: Option<&Accessor>, b: Option<&Accessor>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            x.modality == y.modality && x.visibility == y.visibility && x.is_inline == y.is_inline
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "../tests/comparator_tests.rs"]
mod tests;
