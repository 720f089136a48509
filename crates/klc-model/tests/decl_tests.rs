use super::*;
use crate::types::{ClassifierRef, SimpleType, TypeArgument};

#[test]
fn test_kind_tag_and_classifier() {
    let class = DeclKind::Class(ClassDecl::new(ClassKind::Interface));
    assert_eq!(class.tag(), DeclKindTag::Class);
    assert!(class.is_classifier());
    assert!(class.as_class().is_some_and(ClassDecl::is_interface));

    let alias = DeclKind::TypeAlias(TypeAliasDecl::new(Type::named("kotlin.Int")));
    assert!(alias.is_classifier());
    assert!(!DeclKind::Package.is_classifier());
    assert!(DeclKindTag::TypeAlias.is_registered());
    assert!(!DeclKindTag::Function.is_registered());
}

#[test]
fn test_property_constructors() {
    let val = PropertyDecl::val(Type::named("kotlin.Int"));
    assert!(!val.is_var);
    assert!(val.getter.is_some());
    assert!(val.setter.is_none());

    let var = PropertyDecl::var(Type::named("kotlin.Int"));
    assert!(var.is_var);
    assert!(var.setter.is_some());
}

#[test]
fn test_for_each_type_visits_every_type() {
    let mut kind = DeclKind::Class(
        ClassDecl::new(ClassKind::Class)
            .with_type_parameters(vec![
                TypeParameter::new("T").with_bound(Type::named("a.Bound")),
            ])
            .with_supertypes(vec![Type::named("a.Base")])
            .with_constructor(Constructor {
                is_primary: true,
                visibility: Visibility::Public,
                parameters: vec![ValueParameter::new("x", Type::named("a.Param"))],
            }),
    );

    let mut seen = Vec::new();
    let result: Result<(), ()> = kind.try_for_each_type_mut(&mut |ty| {
        if let Type::Simple(simple) = ty {
            if let ClassifierRef::Symbolic(fq) = &simple.classifier {
                seen.push(fq.as_str().to_string());
            }
        }
        Ok(())
    });
    assert!(result.is_ok());
    assert_eq!(seen, vec!["a.Bound", "a.Base", "a.Param"]);
}

#[test]
fn test_for_each_type_stops_at_first_error() {
    let mut kind = DeclKind::Function(FunctionDecl {
        extension_receiver: Some(Type::named("a.Receiver")),
        ..FunctionDecl::new(Type::named("a.Return"))
    });
    let mut visits = 0;
    let result = kind.try_for_each_type_mut(&mut |_| {
        visits += 1;
        Err("stop")
    });
    assert_eq!(result, Err("stop"));
    assert_eq!(visits, 1);
}

#[test]
fn test_primary_constructor() {
    let class = ClassDecl::new(ClassKind::Class)
        .with_constructor(Constructor::default())
        .with_constructor(Constructor {
            is_primary: true,
            ..Constructor::default()
        });
    assert!(class.primary_constructor().is_some_and(|ctor| ctor.is_primary));
    assert!(ClassDecl::default().primary_constructor().is_none());
}

#[test]
fn test_collapse_abbreviations_keeps_alias_spelling() {
    let alias = SimpleType::new(ClassifierRef::Symbolic("p.X".into()));
    let inner = Type::named("p.A").abbreviated_as(alias.clone()).nullable();
    let mut ty = Type::generic("kotlin.collections.List", vec![TypeArgument::invariant(inner)])
        .abbreviated_as(SimpleType::new(ClassifierRef::Symbolic("p.Xs".into())));

    ty.collapse_abbreviations();

    let outer = ty.as_simple().expect("simple");
    assert_eq!(outer.classifier, ClassifierRef::Symbolic("p.Xs".into()));
    assert!(outer.abbreviation.is_none());
    assert!(outer.arguments.is_empty(), "the alias spelling has no arguments");

    let mut nested = Type::named("p.A").abbreviated_as(alias).nullable();
    nested.collapse_abbreviations();
    let nested = nested.as_simple().expect("simple");
    assert_eq!(nested.classifier, ClassifierRef::Symbolic("p.X".into()));
    assert!(nested.nullable);
    assert!(nested.abbreviation.is_none());
}
