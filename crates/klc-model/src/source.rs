//! JSON interchange format for declaration trees.
//!
//! A [`DeclSource`] is a nested, self-contained description of one
//! declaration and its members. Types name their classifier by qualified
//! name; [`DeclTree::from_sources`] links those names to declarations of the
//! same tree and treats everything else as external.
//!
//! ```json
//! {
//!   "name": "platform",
//!   "kind": "module",
//!   "members": [
//!     { "name": "posix", "kind": "package", "members": [
//!       { "name": "bar", "kind": "function",
//!         "return_type": { "classifier": "kotlin.Int" } }
//!     ] }
//!   ]
//! }
//! ```

use crate::decl::{
    Accessor, ClassDecl, ClassKind, Constructor, DeclData, DeclKind, Expectation, FunctionDecl,
    Modality, ModuleDecl, PropertyDecl, TypeAliasDecl, ValueDecl, ValueParameter, Visibility,
};
use crate::error::ModelError;
use crate::tree::{DeclId, DeclTree};
use crate::types::{ClassifierRef, SimpleType, Type, TypeArgument, TypeParameter, Variance};
use klc_common::{FqName, Name};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeclSource {
    /// Simple name; for packages the full package name.
    pub name: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "is_default")]
    pub modality: Modality,
    #[serde(default, skip_serializing_if = "is_default")]
    pub expectation: Expectation,
    #[serde(flatten)]
    pub kind: KindSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<DeclSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindSource {
    Module {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stable_name: Option<String>,
    },
    Package,
    Class(ClassSource),
    Function(FunctionSource),
    Property(PropertySource),
    TypeAlias(TypeAliasSource),
    Value(ValueSource),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassSource {
    #[serde(skip_serializing_if = "is_default")]
    pub class_kind: ClassKind,
    #[serde(skip_serializing_if = "is_false")]
    pub is_inline: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_data: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_inner: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_companion: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_external: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameterSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<TypeSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constructors: Vec<ConstructorSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructorSource {
    #[serde(skip_serializing_if = "is_false")]
    pub is_primary: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSource {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSource,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_vararg: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_default: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSource {
    pub return_type: TypeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_receiver: Option<TypeSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameterSource>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_suspend: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_inline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_operator: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySource {
    #[serde(rename = "type")]
    pub ty: TypeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_receiver: Option<TypeSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameterSource>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_var: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_const: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_lateinit: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getter: Option<Accessor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setter: Option<Accessor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasSource {
    pub underlying: TypeSource,
    /// Defaults to `underlying` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<TypeSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameterSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueSource {
    #[serde(rename = "type")]
    pub ty: TypeSource,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_vararg: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_default: bool,
}

// =============================================================================
// Types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSource {
    Flexible {
        lower: SimpleTypeSource,
        upper: SimpleTypeSource,
    },
    Simple(SimpleTypeSource),
}

/// A simple type names either a classifier or a type parameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleTypeSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<FqName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_parameter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<TypeArgumentSource>,
    #[serde(skip_serializing_if = "is_false")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub definitely_not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<Box<SimpleTypeSource>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeArgumentSource {
    Star,
    Projection {
        #[serde(default, skip_serializing_if = "is_default")]
        variance: Variance,
        #[serde(rename = "type")]
        ty: TypeSource,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeParameterSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub variance: Variance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upper_bounds: Vec<TypeSource>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_reified: bool,
}

// =============================================================================
// Source -> tree
// =============================================================================

impl DeclTree {
    /// Build and link a tree from module sources. Each source becomes one
    /// root and must be a module.
    pub fn from_sources(sources: &[DeclSource]) -> Result<DeclTree, ModelError> {
        let mut tree = DeclTree::new();
        for source in sources {
            if !matches!(source.kind, KindSource::Module { .. }) {
                return Err(ModelError::RootNotModule {
                    name: source.name.clone(),
                    found: kind_from_source(&source.kind, &source.name)?.tag(),
                });
            }
            let data = source.to_data(FqName::new(&source.name))?;
            let root = tree.add_root(data);
            add_members(&mut tree, root, &source.members)?;
        }
        tree.link();
        debug!(
            roots = tree.roots().len(),
            declarations = tree.len(),
            "built tree from sources"
        );
        Ok(tree)
    }

    /// Build and link a tree from a single module source.
    pub fn from_source(source: &DeclSource) -> Result<DeclTree, ModelError> {
        Self::from_sources(std::slice::from_ref(source))
    }

    /// One source per root, in root order.
    pub fn to_sources(&self) -> Vec<DeclSource> {
        self.roots()
            .iter()
            .filter_map(|&root| self.to_source(root))
            .collect()
    }

    /// Serialize the subtree rooted at `id`.
    pub fn to_source(&self, id: DeclId) -> Option<DeclSource> {
        let decl = self.get(id)?;
        let data = &decl.data;
        Some(DeclSource {
            name: data.name.as_str().to_string(),
            visibility: data.visibility,
            modality: data.modality,
            expectation: data.expectation,
            kind: self.kind_to_source(&data.kind),
            members: decl
                .children
                .iter()
                .filter_map(|&child| self.to_source(child))
                .collect(),
        })
    }

    fn kind_to_source(&self, kind: &DeclKind) -> KindSource {
        match kind {
            DeclKind::Module(module) => KindSource::Module {
                stable_name: module
                    .stable_name
                    .as_ref()
                    .map(|name| name.as_str().to_string()),
            },
            DeclKind::Package => KindSource::Package,
            DeclKind::Class(class) => KindSource::Class(ClassSource {
                class_kind: class.class_kind,
                is_inline: class.is_inline,
                is_data: class.is_data,
                is_inner: class.is_inner,
                is_companion: class.is_companion,
                is_external: class.is_external,
                type_parameters: self.type_parameters_to_source(&class.type_parameters),
                supertypes: class
                    .supertypes
                    .iter()
                    .map(|ty| self.type_to_source(ty))
                    .collect(),
                constructors: class
                    .constructors
                    .iter()
                    .map(|ctor| ConstructorSource {
                        is_primary: ctor.is_primary,
                        visibility: ctor.visibility,
                        parameters: ctor
                            .parameters
                            .iter()
                            .map(|param| ParameterSource {
                                name: param.name.as_str().to_string(),
                                ty: self.type_to_source(&param.ty),
                                is_vararg: param.is_vararg,
                                has_default: param.has_default,
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            DeclKind::Function(function) => KindSource::Function(FunctionSource {
                return_type: self.type_to_source(&function.return_type),
                extension_receiver: function
                    .extension_receiver
                    .as_ref()
                    .map(|ty| self.type_to_source(ty)),
                type_parameters: self.type_parameters_to_source(&function.type_parameters),
                is_suspend: function.is_suspend,
                is_external: function.is_external,
                is_inline: function.is_inline,
                is_operator: function.is_operator,
            }),
            DeclKind::Property(property) => KindSource::Property(PropertySource {
                ty: self.type_to_source(&property.ty),
                extension_receiver: property
                    .extension_receiver
                    .as_ref()
                    .map(|ty| self.type_to_source(ty)),
                type_parameters: self.type_parameters_to_source(&property.type_parameters),
                is_var: property.is_var,
                is_const: property.is_const,
                is_lateinit: property.is_lateinit,
                is_external: property.is_external,
                getter: property.getter,
                setter: property.setter,
            }),
            DeclKind::TypeAlias(alias) => KindSource::TypeAlias(TypeAliasSource {
                underlying: self.type_to_source(&alias.underlying),
                expanded: (alias.expanded != alias.underlying)
                    .then(|| self.type_to_source(&alias.expanded)),
                type_parameters: self.type_parameters_to_source(&alias.type_parameters),
            }),
            DeclKind::Value(value) => KindSource::Value(ValueSource {
                ty: self.type_to_source(&value.ty),
                is_vararg: value.is_vararg,
                has_default: value.has_default,
            }),
        }
    }

    fn type_parameters_to_source(&self, params: &[TypeParameter]) -> Vec<TypeParameterSource> {
        params
            .iter()
            .map(|param| TypeParameterSource {
                name: param.name.as_str().to_string(),
                variance: param.variance,
                upper_bounds: param
                    .upper_bounds
                    .iter()
                    .map(|bound| self.type_to_source(bound))
                    .collect(),
                is_reified: param.is_reified,
            })
            .collect()
    }

    pub fn type_to_source(&self, ty: &Type) -> TypeSource {
        match ty {
            Type::Simple(simple) => TypeSource::Simple(self.simple_to_source(simple)),
            Type::Flexible(flexible) => TypeSource::Flexible {
                lower: self.simple_to_source(&flexible.lower),
                upper: self.simple_to_source(&flexible.upper),
            },
        }
    }

    fn simple_to_source(&self, simple: &SimpleType) -> SimpleTypeSource {
        let (classifier, type_parameter) = match &simple.classifier {
            ClassifierRef::TypeParameter(name) => (None, Some(name.as_str().to_string())),
            other => (self.classifier_fq_name(other).cloned(), None),
        };
        SimpleTypeSource {
            classifier,
            type_parameter,
            arguments: simple
                .arguments
                .iter()
                .map(|argument| match argument {
                    TypeArgument::Star => TypeArgumentSource::Star,
                    TypeArgument::Projection { variance, ty } => TypeArgumentSource::Projection {
                        variance: *variance,
                        ty: self.type_to_source(ty),
                    },
                })
                .collect(),
            nullable: simple.nullable,
            definitely_not_null: simple.definitely_not_null,
            abbreviation: simple
                .abbreviation
                .as_ref()
                .map(|abbreviation| Box::new(self.simple_to_source(abbreviation))),
        }
    }
}

fn add_members(
    tree: &mut DeclTree,
    container: DeclId,
    members: &[DeclSource],
) -> Result<(), ModelError> {
    for member in members {
        let fq_name = match member.kind {
            KindSource::Package => FqName::new(&member.name),
            _ => {
                let parent = tree
                    .get(container)
                    .ok_or(ModelError::UnknownDeclaration(container))?;
                let name = Name::new(&member.name);
                if name.is_empty() || member.name.contains(klc_common::names::SEPARATOR) {
                    return Err(ModelError::InvalidName {
                        text: member.name.clone(),
                    });
                }
                parent.fq_name().child(&name)
            }
        };
        let data = member.to_data(fq_name)?;
        let id = tree.insert(container, data)?;
        add_members(tree, id, &member.members)?;
    }
    Ok(())
}

impl DeclSource {
    fn to_data(&self, fq_name: FqName) -> Result<DeclData, ModelError> {
        Ok(DeclData {
            name: Name::new(&self.name),
            fq_name,
            visibility: self.visibility,
            modality: self.modality,
            expectation: self.expectation,
            kind: kind_from_source(&self.kind, &self.name)?,
        })
    }
}

fn kind_from_source(kind: &KindSource, owner: &str) -> Result<DeclKind, ModelError> {
    Ok(match kind {
        KindSource::Module { stable_name } => DeclKind::Module(ModuleDecl {
            stable_name: stable_name.as_deref().map(Name::new),
        }),
        KindSource::Package => DeclKind::Package,
        KindSource::Class(class) => DeclKind::Class(ClassDecl {
            class_kind: class.class_kind,
            is_inline: class.is_inline,
            is_data: class.is_data,
            is_inner: class.is_inner,
            is_companion: class.is_companion,
            is_external: class.is_external,
            type_parameters: type_parameters_from_source(&class.type_parameters, owner)?,
            supertypes: class
                .supertypes
                .iter()
                .map(|ty| type_from_source(ty, owner))
                .collect::<Result<_, _>>()?,
            constructors: class
                .constructors
                .iter()
                .map(|ctor| {
                    Ok(Constructor {
                        is_primary: ctor.is_primary,
                        visibility: ctor.visibility,
                        parameters: ctor
                            .parameters
                            .iter()
                            .map(|param| {
                                Ok(ValueParameter {
                                    name: Name::new(&param.name),
                                    ty: type_from_source(&param.ty, owner)?,
                                    is_vararg: param.is_vararg,
                                    has_default: param.has_default,
                                })
                            })
                            .collect::<Result<_, ModelError>>()?,
                    })
                })
                .collect::<Result<_, ModelError>>()?,
        }),
        KindSource::Function(function) => DeclKind::Function(FunctionDecl {
            return_type: type_from_source(&function.return_type, owner)?,
            extension_receiver: function
                .extension_receiver
                .as_ref()
                .map(|ty| type_from_source(ty, owner))
                .transpose()?,
            type_parameters: type_parameters_from_source(&function.type_parameters, owner)?,
            is_suspend: function.is_suspend,
            is_external: function.is_external,
            is_inline: function.is_inline,
            is_operator: function.is_operator,
        }),
        KindSource::Property(property) => DeclKind::Property(PropertyDecl {
            ty: type_from_source(&property.ty, owner)?,
            extension_receiver: property
                .extension_receiver
                .as_ref()
                .map(|ty| type_from_source(ty, owner))
                .transpose()?,
            type_parameters: type_parameters_from_source(&property.type_parameters, owner)?,
            is_var: property.is_var,
            is_const: property.is_const,
            is_lateinit: property.is_lateinit,
            is_external: property.is_external,
            getter: property.getter,
            setter: property.setter,
        }),
        KindSource::TypeAlias(alias) => {
            let underlying = type_from_source(&alias.underlying, owner)?;
            let expanded = match &alias.expanded {
                Some(expanded) => type_from_source(expanded, owner)?,
                None => underlying.clone(),
            };
            DeclKind::TypeAlias(TypeAliasDecl {
                type_parameters: type_parameters_from_source(&alias.type_parameters, owner)?,
                underlying,
                expanded,
            })
        }
        KindSource::Value(value) => DeclKind::Value(ValueDecl {
            ty: type_from_source(&value.ty, owner)?,
            is_vararg: value.is_vararg,
            has_default: value.has_default,
        }),
    })
}

fn type_parameters_from_source(
    params: &[TypeParameterSource],
    owner: &str,
) -> Result<Vec<TypeParameter>, ModelError> {
    params
        .iter()
        .map(|param| {
            Ok(TypeParameter {
                name: Name::new(&param.name),
                variance: param.variance,
                upper_bounds: param
                    .upper_bounds
                    .iter()
                    .map(|bound| type_from_source(bound, owner))
                    .collect::<Result<_, _>>()?,
                is_reified: param.is_reified,
            })
        })
        .collect()
}

fn type_from_source(source: &TypeSource, owner: &str) -> Result<Type, ModelError> {
    Ok(match source {
        TypeSource::Simple(simple) => Type::Simple(simple_from_source(simple, owner)?),
        TypeSource::Flexible { lower, upper } => Type::flexible(
            simple_from_source(lower, owner)?,
            simple_from_source(upper, owner)?,
        ),
    })
}

fn simple_from_source(source: &SimpleTypeSource, owner: &str) -> Result<SimpleType, ModelError> {
    let classifier = match (&source.classifier, &source.type_parameter) {
        (Some(fq_name), None) => ClassifierRef::Symbolic(fq_name.clone()),
        (None, Some(name)) => ClassifierRef::TypeParameter(Name::new(name)),
        (None, None) => {
            return Err(ModelError::MalformedType {
                owner: owner.to_string(),
                detail: "type names neither a classifier nor a type parameter",
            });
        }
        (Some(_), Some(_)) => {
            return Err(ModelError::MalformedType {
                owner: owner.to_string(),
                detail: "type names both a classifier and a type parameter",
            });
        }
    };
    Ok(SimpleType {
        classifier,
        arguments: source
            .arguments
            .iter()
            .map(|argument| {
                Ok(match argument {
                    TypeArgumentSource::Star => TypeArgument::Star,
                    TypeArgumentSource::Projection { variance, ty } => TypeArgument::Projection {
                        variance: *variance,
                        ty: type_from_source(ty, owner)?,
                    },
                })
            })
            .collect::<Result<_, ModelError>>()?,
        nullable: source.nullable,
        definitely_not_null: source.definitely_not_null,
        abbreviation: source
            .abbreviation
            .as_ref()
            .map(|abbreviation| simple_from_source(abbreviation, owner).map(Box::new))
            .transpose()?,
    })
}

#[cfg(test)]
#[path = "../tests/source_tests.rs"]
mod tests;
