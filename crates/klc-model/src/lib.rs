//! Declaration model for the klib commonizer.
//!
//! This crate provides:
//! - `DeclTree`: arena of declarations addressed by `DeclId`
//! - `DeclData` / `DeclKind`: per-declaration attributes over a closed set of kinds
//! - `Type`: owned value types with classifier references
//! - `DeclSource`: the JSON interchange format

pub mod decl;
pub mod error;
pub mod source;
pub mod tree;
pub mod types;

pub use decl::{
    Accessor, ClassDecl, ClassKind, Constructor, DeclData, DeclKind, DeclKindTag, Declaration,
    Expectation, FunctionDecl, Modality, ModuleDecl, PropertyDecl, TypeAliasDecl, ValueDecl,
    ValueParameter, Visibility,
};
pub use error::ModelError;
pub use source::DeclSource;
pub use tree::{DeclId, DeclTree};
pub use types::{
    ClassifierRef, FlexibleType, SimpleType, Type, TypeArgument, TypeParameter, Variance,
};
