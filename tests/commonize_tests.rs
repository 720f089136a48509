//! End-to-end commonization scenarios.

use klib_commonizer::commonizer::{
    Cause, MergeForest, MergeNode, Phase, Variant, build_skeletons, materialize,
};
use klib_commonizer::model::{
    ClassifierRef, DeclData, DeclKind, DeclKindTag, Declaration, Expectation, FunctionDecl, Type,
};
use klib_commonizer::{
    CommonizationOutput, CommonizerError, CommonizerOptions, DeclTree, commonize, io,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::convert::Infallible;

fn platform(members: Value) -> DeclTree {
    let doc = json!({
        "name": "lib",
        "kind": "module",
        "members": [{ "name": "sample", "kind": "package", "members": members }]
    });
    io::parse_tree(&doc.to_string()).expect("valid tree")
}

fn ty(fq: &str) -> Value {
    json!({ "classifier": fq })
}

fn function(name: &str, ret: &str) -> Value {
    json!({ "name": name, "kind": "function", "return_type": ty(ret) })
}

fn class(name: &str, supertypes: &[&str]) -> Value {
    let supertypes: Vec<Value> = supertypes.iter().map(|fq| ty(fq)).collect();
    json!({ "name": name, "kind": "class", "supertypes": supertypes })
}

fn run(first: &DeclTree, second: &DeclTree) -> CommonizationOutput {
    commonize(first, second, &CommonizerOptions::default()).expect("commonize")
}

fn fq_names(tree: &DeclTree) -> BTreeSet<String> {
    tree.iter()
        .map(|(_, decl)| decl.fq_name().to_string())
        .collect()
}

fn decl<'t>(tree: &'t DeclTree, fq: &str, tag: DeclKindTag) -> &'t Declaration {
    let id = tree
        .find(fq, tag)
        .unwrap_or_else(|| panic!("no {tag} `{fq}`"));
    &tree[id]
}

fn has(tree: &DeclTree, fq: &str, tag: DeclKindTag) -> bool {
    tree.find(fq, tag).is_some()
}

/// Qualified names of the classifiers a class lists as supertypes.
fn supertype_names(tree: &DeclTree, class: &Declaration) -> Vec<String> {
    class
        .kind()
        .as_class()
        .expect("class")
        .supertypes
        .iter()
        .map(|supertype| {
            let Type::Simple(simple) = supertype else {
                panic!("simple supertype");
            };
            tree.classifier_fq_name(&simple.classifier)
                .expect("named classifier")
                .to_string()
        })
        .collect()
}

fn rich_members() -> Value {
    json!([
        { "name": "Closeable", "kind": "class", "class_kind": "interface", "members": [
            { "name": "close", "kind": "function", "modality": "abstract",
              "return_type": ty("kotlin.Unit") }
        ]},
        { "name": "Handle", "kind": "class", "modality": "open",
          "supertypes": [ty("sample.Closeable")],
          "constructors": [
            { "is_primary": true, "parameters": [{ "name": "fd", "type": ty("kotlin.Int") }] }
          ],
          "members": [
            { "name": "Mode", "kind": "class", "class_kind": "enum_class" },
            { "name": "fd", "kind": "property", "type": ty("kotlin.Int") }
          ]},
        { "name": "open", "kind": "function", "return_type": ty("sample.Handle"), "members": [
            { "name": "path", "kind": "value", "type": ty("kotlin.String") },
            { "name": "mode", "kind": "value", "type": ty("sample.Handle.Mode") }
        ]},
        { "name": "HandleRef", "kind": "type_alias", "underlying": ty("sample.Handle") }
    ])
}

#[test]
fn test_structurally_equal_trees_keep_everything() {
    let first = platform(rich_members());
    let second = platform(rich_members());
    let output = run(&first, &second);

    assert!(output.mismatches.is_empty(), "{:?}", output.mismatches);
    assert_eq!(output.stats.total_first_only(), 0);
    assert_eq!(output.stats.total_second_only(), 0);
    assert_eq!(fq_names(&output.common), fq_names(&first));
    assert_eq!(fq_names(&output.first), fq_names(&first));
    assert_eq!(fq_names(&output.second), fq_names(&second));
    assert_eq!(output.common.len(), first.len());
}

#[test]
fn test_commonizing_a_tree_with_itself_keeps_everything() {
    let tree = platform(rich_members());
    let output = run(&tree, &tree);

    assert!(output.mismatches.is_empty());
    assert_eq!(output.stats.total_first_only(), 0);
    assert_eq!(fq_names(&output.common), fq_names(&tree));
    assert_eq!(output.common.len(), tree.len());
}

#[test]
fn test_commonization_is_symmetric() {
    let a = platform(json!([
        function("bar", "kotlin.Int"),
        function("linuxOnly", "kotlin.Unit"),
        class("Foo", &[]),
    ]));
    let b = platform(json!([
        function("bar", "kotlin.String"),
        class("Foo", &[]),
        class("MacOnly", &[]),
    ]));

    let ab = run(&a, &b);
    let ba = run(&b, &a);
    assert_eq!(fq_names(&ab.common), fq_names(&ba.common));
    assert_eq!(fq_names(&ab.first), fq_names(&ba.second));
    assert_eq!(ab.stats.common, ba.stats.common);
    assert_eq!(ab.stats.first_only, ba.stats.second_only);
}

#[test]
fn test_private_declarations_stay_platform_specific() {
    let members = json!([
        { "name": "secret", "kind": "function", "visibility": "private",
          "return_type": ty("kotlin.Unit") },
        { "name": "Hidden", "kind": "class", "visibility": "private" },
    ]);
    let (a, b) = (platform(members.clone()), platform(members));
    let output = run(&a, &b);

    assert!(!has(&output.common, "sample.secret", DeclKindTag::Function));
    assert!(!has(&output.common, "sample.Hidden", DeclKindTag::Class));
    let secret = decl(&output.first, "sample.secret", DeclKindTag::Function);
    assert_eq!(secret.data.expectation, Expectation::Plain);
    assert!(has(&output.second, "sample.Hidden", DeclKindTag::Class));
    assert!(output.mismatches.iter().any(|record| record.causes == vec![Cause::Private]));
}

#[test]
fn test_only_abstract_interface_members_are_shared() {
    let members = json!([
        { "name": "Stream", "kind": "class", "class_kind": "interface", "members": [
            { "name": "read", "kind": "function", "modality": "abstract",
              "return_type": ty("kotlin.Int") },
            { "name": "skip", "kind": "function", "modality": "open",
              "return_type": ty("kotlin.Unit") },
            { "name": "size", "kind": "property", "type": ty("kotlin.Long") }
        ]}
    ]);
    let (a, b) = (platform(members.clone()), platform(members));
    let output = run(&a, &b);

    assert!(has(&output.common, "sample.Stream", DeclKindTag::Class));
    assert!(has(&output.common, "sample.Stream.read", DeclKindTag::Function));
    assert!(!has(&output.common, "sample.Stream.skip", DeclKindTag::Function));
    assert!(!has(&output.common, "sample.Stream.size", DeclKindTag::Property));
    assert!(has(&output.first, "sample.Stream.skip", DeclKindTag::Function));
    assert!(has(&output.second, "sample.Stream.size", DeclKindTag::Property));
}

#[test]
fn test_unsupported_aliases_are_not_shared() {
    let members = json!([
        class("Handle", &[]),
        { "name": "Ptr", "kind": "type_alias", "underlying": ty("sample.Handle") },
        { "name": "PtrPtr", "kind": "type_alias", "underlying": ty("sample.Ptr") },
        { "name": "Box", "kind": "type_alias", "underlying": ty("sample.Handle"),
          "type_parameters": [{ "name": "T" }] },
        { "name": "Ints", "kind": "type_alias",
          "underlying": { "classifier": "kotlin.collections.List",
                          "arguments": [{ "projection": { "type": ty("kotlin.Int") } }] } }
    ]);
    let (a, b) = (platform(members.clone()), platform(members));
    let output = run(&a, &b);

    assert!(has(&output.common, "sample.Ptr", DeclKindTag::Class));
    for excluded in ["sample.PtrPtr", "sample.Box", "sample.Ints"] {
        assert!(!has(&output.common, excluded, DeclKindTag::Class), "{excluded}");
        assert!(!has(&output.common, excluded, DeclKindTag::TypeAlias), "{excluded}");
        let alias = decl(&output.first, excluded, DeclKindTag::TypeAlias);
        assert_eq!(alias.data.expectation, Expectation::Plain);
    }
}

#[test]
fn test_every_reference_is_bound_in_its_own_forest() {
    let a = platform(rich_members());
    let b = platform(json!([
        class("Closeable", &[]),
        function("open", "sample.Closeable"),
    ]));
    let output = run(&a, &b);

    for tree in [&output.first, &output.common, &output.second] {
        for (_, decl) in tree.iter() {
            let mut kind = decl.kind().clone();
            let visited = kind.try_for_each_type_mut(&mut |ty: &mut Type| {
                ty.try_for_each_classifier_mut(&mut |classifier: &mut ClassifierRef| {
                    match classifier {
                        ClassifierRef::Symbolic(fq) => {
                            panic!("unbound reference to {fq} in {}", decl.fq_name())
                        }
                        ClassifierRef::Resolved(id) => {
                            let target = tree.get(*id).expect("id inside the forest");
                            assert!(target.data.kind.is_classifier());
                        }
                        ClassifierRef::External(_) | ClassifierRef::TypeParameter(_) => {}
                    }
                    Ok::<(), Infallible>(())
                })
            });
            visited.unwrap_or_else(|never| match never {});
        }
    }
}

#[test]
fn test_return_type_mismatch_keeps_both_functions() {
    let a = platform(json!([function("bar", "kotlin.Int")]));
    let b = platform(json!([function("bar", "kotlin.String")]));
    let output = run(&a, &b);

    assert!(!has(&output.common, "sample.bar", DeclKindTag::Function));
    for tree in [&output.first, &output.second] {
        let bar = decl(tree, "sample.bar", DeclKindTag::Function);
        assert_eq!(bar.data.expectation, Expectation::Plain);
    }
    assert_eq!(output.mismatches.len(), 1);
    assert_eq!(
        output.mismatches[0].to_string(),
        "function `sample.bar`: return types differ"
    );
}

#[test]
fn test_supertype_lists_are_intersected() {
    let with_foo = |supertype: &str| {
        platform(json!([
            class("Base1", &[]),
            class("Base2", &[]),
            class("Foo", &[supertype]),
        ]))
    };
    let (a, b) = (with_foo("sample.Base1"), with_foo("sample.Base2"));
    let output = run(&a, &b);

    let common_foo = decl(&output.common, "sample.Foo", DeclKindTag::Class);
    assert_eq!(common_foo.data.expectation, Expectation::Expect);
    assert!(supertype_names(&output.common, common_foo).is_empty());

    let first_foo = decl(&output.first, "sample.Foo", DeclKindTag::Class);
    assert_eq!(first_foo.data.expectation, Expectation::Actual);
    assert_eq!(supertype_names(&output.first, first_foo), vec!["sample.Base1"]);
    let second_foo = decl(&output.second, "sample.Foo", DeclKindTag::Class);
    assert_eq!(supertype_names(&output.second, second_foo), vec!["sample.Base2"]);
}

#[test]
fn test_recursive_classifiers_commonize() {
    let members = json!([
        { "name": "Node", "kind": "class", "type_parameters": [
            { "name": "T", "upper_bounds": [
                { "classifier": "sample.Node",
                  "arguments": [{ "projection": { "type": { "type_parameter": "T" } } }] }
            ]}
        ]},
        { "name": "Parent", "kind": "class",
          "members": [{ "name": "child", "kind": "property", "type": ty("sample.Child") }] },
        { "name": "Child", "kind": "class",
          "members": [{ "name": "parent", "kind": "property", "type": ty("sample.Parent") }] },
        { "name": "root", "kind": "function", "return_type": {
            "classifier": "sample.Node",
            "arguments": ["star"]
        }}
    ]);
    let (a, b) = (platform(members.clone()), platform(members));
    let output = run(&a, &b);

    assert!(output.mismatches.is_empty(), "{:?}", output.mismatches);
    for fq in ["sample.Node", "sample.Parent", "sample.Child"] {
        assert!(has(&output.common, fq, DeclKindTag::Class), "{fq}");
    }
    assert!(has(&output.common, "sample.Parent.child", DeclKindTag::Property));
    assert!(has(&output.common, "sample.root", DeclKindTag::Function));
}

#[test]
fn test_constructors_are_intersected() {
    let with_ctors = |second_param: &str| {
        platform(json!([{
            "name": "Buffer", "kind": "class",
            "constructors": [
                { "is_primary": true },
                { "parameters": [{ "name": "size", "type": ty(second_param) }] }
            ]
        }]))
    };
    let output = run(&with_ctors("kotlin.Int"), &with_ctors("kotlin.Long"));

    let ctor_count = |tree: &DeclTree| {
        decl(tree, "sample.Buffer", DeclKindTag::Class)
            .kind()
            .as_class()
            .expect("class")
            .constructors
            .len()
    };
    assert_eq!(ctor_count(&output.common), 1);
    assert_eq!(ctor_count(&output.first), 2);
    assert_eq!(ctor_count(&output.second), 2);
}

#[test]
fn test_common_variant_of_alias_is_expect_class() {
    let a = platform(json!([
        class("Base", &[]),
        { "name": "NativeHandle", "kind": "class", "class_kind": "object",
          "supertypes": [ty("sample.Base"), ty("kotlin.Any")] },
        { "name": "Handle", "kind": "type_alias", "underlying": ty("sample.NativeHandle") }
    ]));
    let b = platform(json!([
        class("Base", &[]),
        { "name": "DarwinHandle", "kind": "class", "class_kind": "object",
          "supertypes": [ty("sample.Base")] },
        { "name": "Handle", "kind": "type_alias", "underlying": ty("sample.DarwinHandle") }
    ]));
    let output = run(&a, &b);

    let common = decl(&output.common, "sample.Handle", DeclKindTag::Class);
    assert_eq!(common.data.expectation, Expectation::Expect);
    let class = common.kind().as_class().expect("class");
    assert_eq!(class.class_kind, klib_commonizer::model::ClassKind::Object);
    assert_eq!(supertype_names(&output.common, common), vec!["sample.Base"]);

    let actual = decl(&output.first, "sample.Handle", DeclKindTag::TypeAlias);
    assert_eq!(actual.data.expectation, Expectation::Actual);
    assert!(!has(&output.common, "sample.NativeHandle", DeclKindTag::Class));
}

#[test]
fn test_parallel_merge_matches_sequential() {
    let build = |ret: &str| {
        let packages: Vec<Value> = (0..6)
            .map(|idx| {
                json!({ "name": format!("pkg{idx}"), "kind": "package", "members": [
                    class("Shared", &[]),
                    { "name": "Derived", "kind": "class",
                      "supertypes": [ty(&format!("pkg{idx}.Shared"))] },
                    function("get", ret),
                ]})
            })
            .collect();
        let doc = json!({ "name": "lib", "kind": "module", "members": packages });
        io::parse_tree(&doc.to_string()).expect("valid tree")
    };
    let (a, b) = (build("kotlin.Int"), build("kotlin.Long"));

    let sequential = commonize(&a, &b, &CommonizerOptions::default()).expect("sequential");
    let parallel_options = CommonizerOptions {
        parallel: true,
        ..CommonizerOptions::default()
    };
    let parallel = commonize(&a, &b, &parallel_options).expect("parallel");

    for (left, right) in [
        (&sequential.first, &parallel.first),
        (&sequential.common, &parallel.common),
        (&sequential.second, &parallel.second),
    ] {
        assert_eq!(
            io::tree_to_json(left).expect("json"),
            io::tree_to_json(right).expect("json")
        );
    }
    assert_eq!(sequential.mismatches, parallel.mismatches);
    assert_eq!(sequential.mismatches.len(), 6);
}

#[test]
fn test_exclusion_patterns() {
    let members = json!([
        function("kniBridge12", "kotlin.Unit"),
        function("objcKniBridge3", "kotlin.Unit"),
        function("internalHelper", "kotlin.Unit"),
        function("open", "kotlin.Int"),
    ]);
    let (a, b) = (platform(members.clone()), platform(members));

    let output = run(&a, &b);
    assert!(!has(&output.common, "sample.kniBridge12", DeclKindTag::Function));
    assert!(!has(&output.common, "sample.objcKniBridge3", DeclKindTag::Function));
    assert!(has(&output.common, "sample.internalHelper", DeclKindTag::Function));

    let options = CommonizerOptions {
        excluded_function_patterns: vec!["internal.*".to_string()],
        ..CommonizerOptions::default()
    };
    let output = commonize(&a, &b, &options).expect("commonize");
    assert!(has(&output.common, "sample.kniBridge12", DeclKindTag::Function));
    assert!(!has(&output.common, "sample.internalHelper", DeclKindTag::Function));
    assert!(has(&output.common, "sample.open", DeclKindTag::Function));
}

#[test]
fn test_invalid_pattern_is_reported_before_merging() {
    let tree = platform(json!([]));
    let options = CommonizerOptions {
        excluded_function_patterns: vec!["[".to_string()],
        ..CommonizerOptions::default()
    };
    let err = commonize(&tree, &tree, &options).expect_err("bad pattern");
    assert!(matches!(err, CommonizerError::InvalidPattern { .. }));
}

#[test]
fn test_missing_registry_entry_is_fatal() {
    let node = |data: DeclData| MergeNode {
        first: Some(data.clone()),
        common: Some(data.clone()),
        second: Some(data),
        children: Vec::new(),
    };
    let fq = |text: &str| klib_commonizer::common::FqName::new(text);
    let name = |text: &str| klib_commonizer::common::Name::new(text);

    let ghost = FunctionDecl::new(Type::named("sample.Ghost"));
    let mut package = node(DeclData::new(name("sample"), fq("sample"), DeclKind::Package));
    package.children.push(node(DeclData::new(
        name("haunt"),
        fq("sample.haunt"),
        DeclKind::Function(ghost),
    )));
    let mut module = node(DeclData::new(
        name("lib"),
        fq("lib"),
        DeclKind::Module(Default::default()),
    ));
    module.children.push(package);
    let forest = MergeForest {
        roots: vec![module],
    };

    let options = CommonizerOptions::default().compile().expect("options");
    let (registry, skeletons) = build_skeletons(&forest).expect("skeletons");
    let err = materialize(&forest, &registry, skeletons, &options).expect_err("unregistered");
    assert_eq!(err.phase(), Some(Phase::Materialize));
    assert!(matches!(
        err,
        CommonizerError::MissingClassifier { ref fq_name, variant: Variant::First, .. }
            if fq_name.as_str() == "sample.Ghost"
    ));
}

#[test]
fn test_abbreviated_types_use_the_common_alias() {
    let with_target = |target: &str| {
        let expanded = format!("sample.{target}");
        platform(json!([
            class(target, &[]),
            { "name": "X", "kind": "type_alias", "underlying": ty(&expanded) },
            { "name": "f", "kind": "function", "return_type": {
                "classifier": expanded, "abbreviation": { "classifier": "sample.X" }
            }},
            { "name": "current", "kind": "property", "type": {
                "classifier": expanded, "abbreviation": { "classifier": "sample.X" }
            }}
        ]))
    };
    let output = run(&with_target("A"), &with_target("B"));

    let common_x = decl(&output.common, "sample.X", DeclKindTag::Class).data.fq_name.clone();
    let f = decl(&output.common, "sample.f", DeclKindTag::Function);
    let DeclKind::Function(function) = f.kind() else {
        panic!("function");
    };
    let ret = function.return_type.as_simple().expect("simple");
    assert_eq!(output.common.classifier_fq_name(&ret.classifier), Some(&common_x));
    assert!(ret.abbreviation.is_none());
    assert!(has(&output.common, "sample.current", DeclKindTag::Property));
    assert!(!has(&output.common, "sample.A", DeclKindTag::Class));

    let first_f = decl(&output.first, "sample.f", DeclKindTag::Function);
    assert_eq!(first_f.data.expectation, Expectation::Actual);
}

#[test]
fn test_type_parameter_bounds_must_agree() {
    let with_bound = |bound: &str| {
        platform(json!([
            class(bound, &[]),
            { "name": "g", "kind": "function", "return_type": ty("kotlin.Unit"),
              "type_parameters": [{ "name": "T", "upper_bounds": [ty(&format!("sample.{bound}"))] }] },
            { "name": "h", "kind": "function", "return_type": ty("kotlin.Unit"),
              "type_parameters": [{ "name": "T", "upper_bounds": [ty("kotlin.Any")] }] }
        ]))
    };
    let output = run(&with_bound("A"), &with_bound("B"));

    assert!(!has(&output.common, "sample.g", DeclKindTag::Function));
    assert!(has(&output.common, "sample.h", DeclKindTag::Function));
    assert!(has(&output.first, "sample.g", DeclKindTag::Function));
    assert!(has(&output.second, "sample.g", DeclKindTag::Function));
    assert!(output.mismatches.iter().any(|record| {
        record.fq_name.as_str() == "sample.g" && record.causes == vec![Cause::TypeParameterMismatch]
    }));
}
