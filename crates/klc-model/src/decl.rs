//! Declaration data.
//!
//! A declaration is split into two layers:
//!
//! - [`DeclData`]: the attribute set of one declaration (names, visibility,
//!   modality, kind payload). It carries no links and can be copied freely
//!   between trees; the merge forest stores these as node payloads.
//! - [`Declaration`]: a `DeclData` placed in a [`DeclTree`](crate::DeclTree)
//!   with its container back-reference and its owned children.
//!
//! The set of kinds is closed ([`DeclKind`]); every pass matches on it
//! exhaustively.

use crate::tree::DeclId;
use crate::types::{Type, TypeParameter};
use klc_common::{FqName, Name};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Attribute enums
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Internal,
    Private,
}

impl Visibility {
    #[inline]
    pub const fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Final,
    Open,
    Abstract,
    Sealed,
}

/// Role of a declaration in a multi-target library.
///
/// Input declarations are `Plain`. The materializer marks common variants of
/// matched nodes as `Expect` and their target variants as `Actual`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Plain,
    Expect,
    Actual,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    EnumClass,
    EnumEntry,
    Object,
    AnnotationClass,
}

// =============================================================================
// Kind payloads
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleDecl {
    pub stable_name: Option<Name>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassDecl {
    pub class_kind: ClassKind,
    pub is_inline: bool,
    pub is_data: bool,
    pub is_inner: bool,
    pub is_companion: bool,
    pub is_external: bool,
    pub type_parameters: Vec<TypeParameter>,
    pub supertypes: Vec<Type>,
    pub constructors: Vec<Constructor>,
}

impl ClassDecl {
    pub fn new(class_kind: ClassKind) -> Self {
        Self {
            class_kind,
            ..Self::default()
        }
    }

    pub fn with_supertypes(mut self, supertypes: Vec<Type>) -> Self {
        self.supertypes = supertypes;
        self
    }

    pub fn with_type_parameters(mut self, type_parameters: Vec<TypeParameter>) -> Self {
        self.type_parameters = type_parameters;
        self
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.class_kind == ClassKind::Interface
    }

    pub fn primary_constructor(&self) -> Option<&Constructor> {
        self.constructors.iter().find(|ctor| ctor.is_primary)
    }
}

/// A class constructor. Constructors are part of their class payload rather
/// than separate declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constructor {
    pub is_primary: bool,
    pub visibility: Visibility,
    pub parameters: Vec<ValueParameter>,
}

/// A constructor parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueParameter {
    pub name: Name,
    pub ty: Type,
    pub is_vararg: bool,
    pub has_default: bool,
}

impl ValueParameter {
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            is_vararg: false,
            has_default: false,
        }
    }
}

/// Function payload. Parameters are `Value` child declarations of the
/// function, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    pub return_type: Type,
    pub extension_receiver: Option<Type>,
    pub type_parameters: Vec<TypeParameter>,
    pub is_suspend: bool,
    pub is_external: bool,
    pub is_inline: bool,
    pub is_operator: bool,
}

impl FunctionDecl {
    pub fn new(return_type: Type) -> Self {
        Self {
            return_type,
            extension_receiver: None,
            type_parameters: Vec::new(),
            is_suspend: false,
            is_external: false,
            is_inline: false,
            is_operator: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Accessor {
    pub modality: Modality,
    pub visibility: Visibility,
    pub is_inline: bool,
    pub is_external: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDecl {
    pub ty: Type,
    pub extension_receiver: Option<Type>,
    pub type_parameters: Vec<TypeParameter>,
    pub is_var: bool,
    pub is_const: bool,
    pub is_lateinit: bool,
    pub is_external: bool,
    pub getter: Option<Accessor>,
    pub setter: Option<Accessor>,
}

impl PropertyDecl {
    /// A `val` with a default getter.
    pub fn val(ty: Type) -> Self {
        Self {
            ty,
            extension_receiver: None,
            type_parameters: Vec::new(),
            is_var: false,
            is_const: false,
            is_lateinit: false,
            is_external: false,
            getter: Some(Accessor::default()),
            setter: None,
        }
    }

    /// A `var` with default getter and setter.
    pub fn var(ty: Type) -> Self {
        Self {
            is_var: true,
            setter: Some(Accessor::default()),
            ..Self::val(ty)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAliasDecl {
    pub type_parameters: Vec<TypeParameter>,
    pub underlying: Type,
    pub expanded: Type,
}

impl TypeAliasDecl {
    /// Alias whose underlying type is already fully expanded.
    pub fn new(underlying: Type) -> Self {
        Self {
            type_parameters: Vec::new(),
            expanded: underlying.clone(),
            underlying,
        }
    }
}

/// A function parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueDecl {
    pub ty: Type,
    pub is_vararg: bool,
    pub has_default: bool,
}

impl ValueDecl {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            is_vararg: false,
            has_default: false,
        }
    }
}

// =============================================================================
// DeclKind
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Module(ModuleDecl),
    Package,
    Class(ClassDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
    TypeAlias(TypeAliasDecl),
    Value(ValueDecl),
}

/// Payload-free discriminant of [`DeclKind`], used in diagnostics and stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKindTag {
    Module,
    Package,
    Class,
    Function,
    Property,
    TypeAlias,
    Value,
}

impl DeclKindTag {
    pub const ALL: [DeclKindTag; 7] = [
        Self::Module,
        Self::Package,
        Self::Class,
        Self::Function,
        Self::Property,
        Self::TypeAlias,
        Self::Value,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Package => "package",
            Self::Class => "class",
            Self::Function => "function",
            Self::Property => "property",
            Self::TypeAlias => "type alias",
            Self::Value => "value",
        }
    }

    /// Classifiers and containers get registry placeholders in the skeleton
    /// pass; callables and values are built directly.
    pub const fn is_registered(self) -> bool {
        matches!(
            self,
            Self::Module | Self::Package | Self::Class | Self::TypeAlias
        )
    }
}

impl fmt::Display for DeclKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeclKind {
    pub const fn tag(&self) -> DeclKindTag {
        match self {
            Self::Module(_) => DeclKindTag::Module,
            Self::Package => DeclKindTag::Package,
            Self::Class(_) => DeclKindTag::Class,
            Self::Function(_) => DeclKindTag::Function,
            Self::Property(_) => DeclKindTag::Property,
            Self::TypeAlias(_) => DeclKindTag::TypeAlias,
            Self::Value(_) => DeclKindTag::Value,
        }
    }

    #[inline]
    pub const fn is_classifier(&self) -> bool {
        matches!(self, Self::Class(_) | Self::TypeAlias(_))
    }

    pub const fn as_class(&self) -> Option<&ClassDecl> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    pub const fn as_class_mut(&mut self) -> Option<&mut ClassDecl> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    pub const fn as_type_alias(&self) -> Option<&TypeAliasDecl> {
        match self {
            Self::TypeAlias(alias) => Some(alias),
            _ => None,
        }
    }

    /// Visit every type stored in this payload, mutably.
    ///
    /// Stops at the first error. Used to rewrite classifier references when a
    /// payload moves between trees.
    pub fn try_for_each_type_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut Type) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Self::Module(_) | Self::Package => Ok(()),
            Self::Class(class) => {
                for param in &mut class.type_parameters {
                    param.try_for_each_bound_mut(f)?;
                }
                for supertype in &mut class.supertypes {
                    f(supertype)?;
                }
                for ctor in &mut class.constructors {
                    for param in &mut ctor.parameters {
                        f(&mut param.ty)?;
                    }
                }
                Ok(())
            }
            Self::Function(function) => {
                for param in &mut function.type_parameters {
                    param.try_for_each_bound_mut(f)?;
                }
                if let Some(receiver) = &mut function.extension_receiver {
                    f(receiver)?;
                }
                f(&mut function.return_type)
            }
            Self::Property(property) => {
                for param in &mut property.type_parameters {
                    param.try_for_each_bound_mut(f)?;
                }
                if let Some(receiver) = &mut property.extension_receiver {
                    f(receiver)?;
                }
                f(&mut property.ty)
            }
            Self::TypeAlias(alias) => {
                for param in &mut alias.type_parameters {
                    param.try_for_each_bound_mut(f)?;
                }
                f(&mut alias.underlying)?;
                f(&mut alias.expanded)
            }
            Self::Value(value) => f(&mut value.ty),
        }
    }
}

// =============================================================================
// DeclData / Declaration
// =============================================================================

/// Attribute set of one declaration, without tree links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclData {
    pub name: Name,
    pub fq_name: FqName,
    pub visibility: Visibility,
    pub modality: Modality,
    pub expectation: Expectation,
    pub kind: DeclKind,
}

impl DeclData {
    pub fn new(name: Name, fq_name: FqName, kind: DeclKind) -> Self {
        Self {
            name,
            fq_name,
            visibility: Visibility::Public,
            modality: Modality::Final,
            expectation: Expectation::Plain,
            kind,
        }
    }

    #[inline]
    pub fn tag(&self) -> DeclKindTag {
        self.kind.tag()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectation = expectation;
        self
    }
}

/// A declaration placed in a tree.
#[derive(Clone, Debug)]
pub struct Declaration {
    pub data: DeclData,
    /// Non-owning link to the parent. Only used for name resolution and
    /// container-kind queries, never for ownership.
    pub container: Option<DeclId>,
    pub children: Vec<DeclId>,
}

impl Declaration {
    #[inline]
    pub fn name(&self) -> &Name {
        &self.data.name
    }

    #[inline]
    pub fn fq_name(&self) -> &FqName {
        &self.data.fq_name
    }

    #[inline]
    pub fn kind(&self) -> &DeclKind {
        &self.data.kind
    }

    #[inline]
    pub fn tag(&self) -> DeclKindTag {
        self.data.kind.tag()
    }
}

#[cfg(test)]
#[path = "../tests/decl_tests.rs"]
mod tests;
