//! Errors raised while building or checking a declaration tree.

use crate::decl::DeclKindTag;
use crate::tree::DeclId;
use klc_common::FqName;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// An id that does not belong to the tree it was used with.
    #[error("unknown declaration {0}")]
    UnknownDeclaration(DeclId),

    /// A declaration placed under a container that cannot own it.
    #[error("a {child} cannot be declared inside a {container}")]
    InvalidContainer {
        child: DeclKindTag,
        container: DeclKindTag,
    },

    /// Input trees are rooted at a module.
    #[error("tree root `{name}` is a {found}, expected a module")]
    RootNotModule { name: String, found: DeclKindTag },

    /// A child's container does not point back at the parent listing it.
    #[error("`{fq_name}` is listed under {listed_under} but its container is {container:?}")]
    BrokenContainerLink {
        fq_name: FqName,
        listed_under: DeclId,
        container: Option<DeclId>,
    },

    /// A child listed by two containers, or twice by the same one.
    #[error("`{fq_name}` is owned by more than one container")]
    SharedChild { fq_name: FqName },

    /// A declaration name that cannot be used as a segment of a qualified name.
    #[error("invalid declaration name `{text}`")]
    InvalidName { text: String },

    /// A serialized type that names neither a classifier nor a type
    /// parameter, or both.
    #[error("malformed type in `{owner}`: {detail}")]
    MalformedType { owner: String, detail: &'static str },
}
