use super::*;
use crate::cache::ComparisonCache;
use crate::merge::MergeEngine;
use crate::options::CommonizerOptions;
use crate::skeleton::build_skeletons;
use klc_common::{FqName, Name};
use klc_model::{ClassDecl, ClassKind, DeclKind, FunctionDecl, TypeAliasDecl, ValueDecl};

fn options() -> CompiledOptions {
    CommonizerOptions::default().compile().expect("options")
}

fn sample(linux: bool) -> DeclTree {
    let mut tree = DeclTree::new();
    let module = tree.add_module("lib");
    let package = tree.add_package(module, "a").expect("package");
    tree.add_class(package, "Base", ClassDecl::new(ClassKind::Interface))
        .expect("class");
    tree.add_class(
        package,
        "Handle",
        ClassDecl::default().with_supertypes(vec![Type::named("a.Base")]),
    )
    .expect("class");
    let open = tree
        .add_function(package, "open", FunctionDecl::new(Type::named("a.Handle")))
        .expect("function");
    tree.add_value(open, "path", ValueDecl::new(Type::named("kotlin.String")))
        .expect("value");
    tree.add_type_alias(package, "Ptr", TypeAliasDecl::new(Type::named("a.Handle")))
        .expect("alias");
    if linux {
        tree.add_function(package, "epoll", FunctionDecl::new(Type::named("a.Handle")))
            .expect("function");
    }
    tree.link();
    tree
}

fn run(first: &DeclTree, second: &DeclTree) -> Result<MaterializedForests, CommonizerError> {
    let options = options();
    let cache = ComparisonCache::new();
    let report = MergeEngine::new(first, second, &cache, &options).merge()?;
    let (registry, skeletons) = build_skeletons(&report.forest)?;
    materialize(&report.forest, &registry, skeletons, &options)
}

fn resolved_target<'t>(tree: &'t DeclTree, ty: &Type) -> &'t FqName {
    let Type::Simple(simple) = ty else {
        panic!("expected a simple type");
    };
    let ClassifierRef::Resolved(id) = simple.classifier else {
        panic!("expected a resolved classifier, got {:?}", simple.classifier);
    };
    tree[id].fq_name()
}

#[test]
fn test_forests_are_linked_and_valid() {
    let (first, second) = (sample(true), sample(false));
    let forests = run(&first, &second).expect("materialize");

    for tree in [&forests.first, &forests.common, &forests.second] {
        tree.validate().expect("ownership invariant");
        assert_eq!(tree.roots().len(), 1);
    }

    let common = &forests.common;
    let handle = common.find("a.Handle", DeclKindTag::Class).expect("common Handle");
    let class = common[handle].kind().as_class().expect("class");
    assert_eq!(class.supertypes.len(), 1);
    assert_eq!(resolved_target(common, &class.supertypes[0]).as_str(), "a.Base");

    let open = common.find("a.open", DeclKindTag::Function).expect("common open");
    let DeclKind::Function(function) = common[open].kind() else {
        panic!("function payload");
    };
    assert_eq!(resolved_target(common, &function.return_type).as_str(), "a.Handle");
    assert_eq!(common.children(open).len(), 1);

    assert!(common.find("a.epoll", DeclKindTag::Function).is_none());
    let epoll = forests
        .first
        .find("a.epoll", DeclKindTag::Function)
        .expect("first-only epoll");
    assert_eq!(forests.first.container(epoll), forests.first.find("a", DeclKindTag::Package));
}

#[test]
fn test_expectation_markers() {
    let (first, second) = (sample(true), sample(false));
    let forests = run(&first, &second).expect("materialize");
    let expectation_of = |tree: &DeclTree, fq: &str, tag: DeclKindTag| {
        let id = tree.find(fq, tag).unwrap_or_else(|| panic!("missing {fq}"));
        tree[id].data.expectation
    };

    assert_eq!(expectation_of(&forests.common, "a.Handle", DeclKindTag::Class), Expectation::Expect);
    assert_eq!(expectation_of(&forests.first, "a.Handle", DeclKindTag::Class), Expectation::Actual);
    assert_eq!(expectation_of(&forests.second, "a.open", DeclKindTag::Function), Expectation::Actual);
    assert_eq!(expectation_of(&forests.first, "a.epoll", DeclKindTag::Function), Expectation::Plain);
    assert_eq!(expectation_of(&forests.common, "a", DeclKindTag::Package), Expectation::Plain);
    assert_eq!(expectation_of(&forests.common, "a.open.path", DeclKindTag::Value), Expectation::Plain);

    assert_eq!(expectation_of(&forests.common, "a.Ptr", DeclKindTag::Class), Expectation::Expect);
    assert_eq!(expectation_of(&forests.first, "a.Ptr", DeclKindTag::TypeAlias), Expectation::Actual);
}

fn data(fq_name: &str, kind: DeclKind) -> DeclData {
    let fq_name = FqName::new(fq_name);
    let name = match kind {
        DeclKind::Module(_) | DeclKind::Package => Name::new(fq_name.as_str()),
        _ => fq_name.short_name(),
    };
    DeclData::new(name, fq_name, kind)
}

/// A common module/package pair holding one common function returning `ret`.
fn forest_returning(ret: ClassifierRef) -> MergeForest {
    let ret = Type::Simple(klc_model::SimpleType::new(ret));
    let both = |data: DeclData| MergeNode {
        first: Some(data.clone()),
        common: Some(data.clone()),
        second: Some(data),
        children: Vec::new(),
    };
    let function = both(data("p.f", DeclKind::Function(FunctionDecl::new(ret))));
    let mut package = both(data("p", DeclKind::Package));
    package.children.push(function);
    let mut module = both(data("m", DeclKind::Module(Default::default())));
    module.children.push(package);
    MergeForest {
        roots: vec![module],
    }
}

#[test]
fn test_missing_classifier_is_fatal() {
    let forest = forest_returning(ClassifierRef::Symbolic(FqName::new("p.Ghost")));
    let (registry, skeletons) = build_skeletons(&forest).expect("skeletons");
    let err = materialize(&forest, &registry, skeletons, &options()).expect_err("ghost");
    assert!(matches!(
        err,
        CommonizerError::MissingClassifier {
            ref fq_name,
            variant: Variant::First,
            phase: Phase::Materialize,
        } if fq_name.as_str() == "p.Ghost"
    ));
}

#[test]
fn test_unregistered_builtin_becomes_external() {
    let forest = forest_returning(ClassifierRef::Symbolic(FqName::new("kotlin.Int")));
    let (registry, skeletons) = build_skeletons(&forest).expect("skeletons");
    let forests = materialize(&forest, &registry, skeletons, &options()).expect("materialize");
    let f = forests.common.find("p.f", DeclKindTag::Function).expect("f");
    let DeclKind::Function(function) = forests.common[f].kind() else {
        panic!("function payload");
    };
    let Type::Simple(simple) = &function.return_type else {
        panic!("simple type");
    };
    assert_eq!(simple.classifier, ClassifierRef::External(FqName::new("kotlin.Int")));
}

#[test]
fn test_foreign_resolved_reference_is_rejected() {
    let forest = forest_returning(ClassifierRef::Resolved(DeclId(7)));
    let (registry, skeletons) = build_skeletons(&forest).expect("skeletons");
    let err = materialize(&forest, &registry, skeletons, &options()).expect_err("foreign id");
    assert!(matches!(err, CommonizerError::ConflictingPayload { .. }));
}

#[test]
fn test_placeholder_is_filled_once() {
    let forest = forest_returning(ClassifierRef::External(FqName::new("kotlin.Unit")));
    let (registry, skeletons) = build_skeletons(&forest).expect("skeletons");
    let doubled = MergeForest {
        roots: vec![forest.roots[0].clone(), forest.roots[0].clone()],
    };
    let err = materialize(&doubled, &registry, skeletons, &options()).expect_err("twice");
    assert!(matches!(
        err,
        CommonizerError::AlreadyMaterialized {
            variant: Variant::First,
            ..
        }
    ));
}
