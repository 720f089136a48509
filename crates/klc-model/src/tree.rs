//! Arena-backed declaration tree.
//!
//! Every declaration of one tree lives in a single `Vec` and is addressed by
//! [`DeclId`]. Ownership runs parent → children through `children` lists; the
//! `container` field is a plain index back to the parent and never owns.
//!
//! Classifiers (classes and type aliases) are additionally indexed by
//! qualified name so that type references can be resolved by name.

use crate::decl::{
    ClassDecl, DeclData, DeclKind, DeclKindTag, Declaration, FunctionDecl, Modality, ModuleDecl,
    PropertyDecl, TypeAliasDecl, ValueDecl,
};
use crate::error::ModelError;
use crate::types::{ClassifierRef, Type};
use klc_common::names::SEPARATOR;
use klc_common::{FqName, Name};
use rustc_hash::FxHashMap;
use std::convert::Infallible;
use std::fmt;
use std::ops::Index;
use tracing::trace;

/// Index of a declaration inside its [`DeclTree`].
///
/// Ids are only meaningful together with the tree that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeclTree {
    decls: Vec<Declaration>,
    roots: Vec<DeclId>,
    classifiers: FxHashMap<FqName, DeclId>,
}

impl DeclTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            decls: Vec::with_capacity(capacity),
            roots: Vec::new(),
            classifiers: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    #[inline]
    pub fn get(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.index())
    }

    #[inline]
    pub fn data_mut(&mut self, id: DeclId) -> Option<&mut DeclData> {
        self.decls.get_mut(id.index()).map(|decl| &mut decl.data)
    }

    pub fn roots(&self) -> &[DeclId] {
        &self.roots
    }

    /// Owned children of `id`, in declaration order. Empty for unknown ids.
    pub fn children(&self, id: DeclId) -> &[DeclId] {
        self.get(id).map_or(&[], |decl| decl.children.as_slice())
    }

    pub fn container(&self, id: DeclId) -> Option<DeclId> {
        self.get(id).and_then(|decl| decl.container)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls
            .iter()
            .enumerate()
            .map(|(idx, decl)| (DeclId(idx as u32), decl))
    }

    // -------------------------------------------------------------------------
    // Classifier lookup
    // -------------------------------------------------------------------------

    /// Class or type alias declared under `fq_name`. The first declaration
    /// registered under a name wins.
    pub fn classifier(&self, fq_name: &FqName) -> Option<DeclId> {
        self.classifiers.get(fq_name).copied()
    }

    /// Declaration a classifier reference points at inside this tree.
    ///
    /// `Symbolic` references are looked up by name; `External` and
    /// type-parameter references never resolve.
    pub fn resolve_classifier(&self, classifier: &ClassifierRef) -> Option<DeclId> {
        match classifier {
            ClassifierRef::Resolved(id) => self.get(*id).map(|_| *id),
            ClassifierRef::Symbolic(fq_name) => self.classifier(fq_name),
            ClassifierRef::External(_) | ClassifierRef::TypeParameter(_) => None,
        }
    }

    /// Qualified name behind a classifier reference, if it has one.
    pub fn classifier_fq_name<'a>(&'a self, classifier: &'a ClassifierRef) -> Option<&'a FqName> {
        match classifier {
            ClassifierRef::Resolved(id) => self.get(*id).map(Declaration::fq_name),
            ClassifierRef::Symbolic(fq_name) | ClassifierRef::External(fq_name) => Some(fq_name),
            ClassifierRef::TypeParameter(_) => None,
        }
    }

    /// First declaration with the given qualified name and kind, in
    /// allocation order.
    pub fn find(&self, fq_name: &str, tag: DeclKindTag) -> Option<DeclId> {
        self.iter()
            .find(|(_, decl)| decl.tag() == tag && decl.fq_name().as_str() == fq_name)
            .map(|(id, _)| id)
    }

    // -------------------------------------------------------------------------
    // Allocation and linking
    // -------------------------------------------------------------------------

    /// Allocate a declaration without attaching it to its container's
    /// children. Callers that allocate placeholders first and attach later
    /// use this together with [`attach_child`](Self::attach_child).
    pub fn alloc(&mut self, data: DeclData, container: Option<DeclId>) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        if data.kind.is_classifier() {
            self.classifiers.entry(data.fq_name.clone()).or_insert(id);
        }
        trace!(id = id.0, fq_name = %data.fq_name, kind = %data.tag(), "alloc declaration");
        self.decls.push(Declaration {
            data,
            container,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a root declaration.
    pub fn add_root(&mut self, data: DeclData) -> DeclId {
        let id = self.alloc(data, None);
        self.roots.push(id);
        id
    }

    /// Append `child` to `parent`'s children and point its container at
    /// `parent`. A child already owned by another container is rejected.
    pub fn attach_child(&mut self, parent: DeclId, child: DeclId) -> Result<(), ModelError> {
        let parent_tag = self
            .get(parent)
            .ok_or(ModelError::UnknownDeclaration(parent))?
            .tag();
        let child_decl = self
            .decls
            .get_mut(child.index())
            .ok_or(ModelError::UnknownDeclaration(child))?;
        check_container(child_decl.tag(), parent_tag)?;
        match child_decl.container {
            Some(owner) if owner != parent => {
                return Err(ModelError::SharedChild {
                    fq_name: child_decl.data.fq_name.clone(),
                });
            }
            _ => child_decl.container = Some(parent),
        }
        let siblings = &mut self.decls[parent.index()].children;
        if siblings.contains(&child) {
            return Err(ModelError::SharedChild {
                fq_name: self.decls[child.index()].data.fq_name.clone(),
            });
        }
        siblings.push(child);
        Ok(())
    }

    /// Allocate `data` and attach it as the last child of `container`.
    pub fn insert(&mut self, container: DeclId, data: DeclData) -> Result<DeclId, ModelError> {
        let container_tag = self
            .get(container)
            .ok_or(ModelError::UnknownDeclaration(container))?
            .tag();
        check_container(data.tag(), container_tag)?;
        let id = self.alloc(data, Some(container));
        self.decls[container.index()].children.push(id);
        Ok(id)
    }

    /// Declare `name` inside `container`, deriving its qualified name from
    /// the container's.
    pub fn declare(
        &mut self,
        container: DeclId,
        name: &str,
        kind: DeclKind,
    ) -> Result<DeclId, ModelError> {
        let name = checked_name(name)?;
        let parent = self
            .get(container)
            .ok_or(ModelError::UnknownDeclaration(container))?;
        let fq_name = parent.fq_name().child(&name);
        self.insert(container, DeclData::new(name, fq_name, kind))
    }

    /// Rewrite every `Symbolic` classifier reference to `Resolved` when this
    /// tree declares the classifier, and to `External` otherwise.
    pub fn link(&mut self) {
        let classifiers = &self.classifiers;
        let mut resolved = 0usize;
        let mut external = 0usize;
        for decl in &mut self.decls {
            rewrite_classifiers(&mut decl.data.kind, &mut |classifier| {
                if let ClassifierRef::Symbolic(fq_name) = classifier {
                    *classifier = match classifiers.get(fq_name) {
                        Some(id) => {
                            resolved += 1;
                            ClassifierRef::Resolved(*id)
                        }
                        None => {
                            external += 1;
                            ClassifierRef::External(fq_name.clone())
                        }
                    };
                }
            });
        }
        trace!(resolved, external, "linked classifier references");
    }

    /// Check the ownership invariant: every listed child points back at the
    /// parent listing it, no child has two owners, and roots have no
    /// container.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut owner: Vec<Option<DeclId>> = vec![None; self.decls.len()];
        for (parent, decl) in self.iter() {
            for &child in &decl.children {
                let child_decl = self
                    .get(child)
                    .ok_or(ModelError::UnknownDeclaration(child))?;
                if owner[child.index()].replace(parent).is_some() {
                    return Err(ModelError::SharedChild {
                        fq_name: child_decl.data.fq_name.clone(),
                    });
                }
                if child_decl.container != Some(parent) {
                    return Err(ModelError::BrokenContainerLink {
                        fq_name: child_decl.data.fq_name.clone(),
                        listed_under: parent,
                        container: child_decl.container,
                    });
                }
            }
        }
        for (id, decl) in self.iter() {
            if let Some(container) = decl.container {
                if owner[id.index()] != Some(container) {
                    return Err(ModelError::BrokenContainerLink {
                        fq_name: decl.data.fq_name.clone(),
                        listed_under: container,
                        container: decl.container,
                    });
                }
            }
        }
        Ok(())
    }

    /// Copy of a declaration's attributes with every `Resolved` classifier
    /// turned back into `Symbolic`, so the payload can move to another tree.
    pub fn detached_data(&self, id: DeclId) -> Option<DeclData> {
        let mut data = self.get(id)?.data.clone();
        rewrite_classifiers(&mut data.kind, &mut |classifier| {
            if let ClassifierRef::Resolved(target) = classifier {
                if let Some(decl) = self.get(*target) {
                    *classifier = ClassifierRef::Symbolic(decl.data.fq_name.clone());
                }
            }
        });
        Some(data)
    }

    /// Detach a standalone type from this tree, see [`detached_data`](Self::detached_data).
    pub fn detached_type(&self, ty: &Type) -> Type {
        let mut ty = ty.clone();
        let Ok(()) = ty.try_for_each_classifier_mut(&mut |classifier| {
            if let ClassifierRef::Resolved(target) = classifier {
                if let Some(decl) = self.get(*target) {
                    *classifier = ClassifierRef::Symbolic(decl.data.fq_name.clone());
                }
            }
            Ok::<(), Infallible>(())
        });
        ty
    }

    // -------------------------------------------------------------------------
    // Containment queries
    // -------------------------------------------------------------------------

    /// The class directly containing `id`, if its container is a class.
    pub fn containing_class(&self, id: DeclId) -> Option<(DeclId, &ClassDecl)> {
        let container = self.container(id)?;
        let class = self.get(container)?.kind().as_class()?;
        Some((container, class))
    }

    /// True for a function or property whose container is an interface and
    /// which is not abstract.
    pub fn is_non_abstract_in_interface(&self, id: DeclId) -> bool {
        let Some(decl) = self.get(id) else {
            return false;
        };
        if !matches!(decl.kind(), DeclKind::Function(_) | DeclKind::Property(_)) {
            return false;
        }
        match self.containing_class(id) {
            Some((_, class)) => {
                class.is_interface() && decl.data.modality != Modality::Abstract
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Builder helpers
    // -------------------------------------------------------------------------

    pub fn add_module(&mut self, name: &str) -> DeclId {
        self.add_root(DeclData::new(
            Name::new(name),
            FqName::new(name),
            DeclKind::Module(ModuleDecl::default()),
        ))
    }

    /// Add a package. Package names are fully qualified and may be empty for
    /// the root package.
    pub fn add_package(&mut self, module: DeclId, fq_name: &str) -> Result<DeclId, ModelError> {
        let fq_name = FqName::new(fq_name);
        self.insert(
            module,
            DeclData::new(Name::new(fq_name.as_str()), fq_name, DeclKind::Package),
        )
    }

    pub fn add_class(
        &mut self,
        container: DeclId,
        name: &str,
        class: ClassDecl,
    ) -> Result<DeclId, ModelError> {
        self.declare(container, name, DeclKind::Class(class))
    }

    pub fn add_function(
        &mut self,
        container: DeclId,
        name: &str,
        function: FunctionDecl,
    ) -> Result<DeclId, ModelError> {
        self.declare(container, name, DeclKind::Function(function))
    }

    /// Add a value parameter as the last parameter of `function`.
    pub fn add_value(
        &mut self,
        function: DeclId,
        name: &str,
        value: ValueDecl,
    ) -> Result<DeclId, ModelError> {
        self.declare(function, name, DeclKind::Value(value))
    }

    pub fn add_property(
        &mut self,
        container: DeclId,
        name: &str,
        property: PropertyDecl,
    ) -> Result<DeclId, ModelError> {
        self.declare(container, name, DeclKind::Property(property))
    }

    pub fn add_type_alias(
        &mut self,
        container: DeclId,
        name: &str,
        alias: TypeAliasDecl,
    ) -> Result<DeclId, ModelError> {
        self.declare(container, name, DeclKind::TypeAlias(alias))
    }
}

impl Index<DeclId> for DeclTree {
    type Output = Declaration;

    fn index(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }
}

fn checked_name(text: &str) -> Result<Name, ModelError> {
    if text.is_empty() || text.contains(SEPARATOR) {
        return Err(ModelError::InvalidName {
            text: text.to_string(),
        });
    }
    Ok(Name::new(text))
}

/// Which containers may own which kinds.
fn check_container(child: DeclKindTag, container: DeclKindTag) -> Result<(), ModelError> {
    use DeclKindTag as K;
    let allowed = match child {
        K::Module => false,
        K::Package => container == K::Module,
        K::Class | K::TypeAlias | K::Function | K::Property => {
            matches!(container, K::Package | K::Class)
        }
        K::Value => container == K::Function,
    };
    if allowed {
        Ok(())
    } else {
        Err(ModelError::InvalidContainer { child, container })
    }
}

fn rewrite_classifiers(kind: &mut DeclKind, f: &mut impl FnMut(&mut ClassifierRef)) {
    let Ok(()) = kind.try_for_each_type_mut(&mut |ty: &mut Type| {
        ty.try_for_each_classifier_mut(&mut |classifier: &mut ClassifierRef| {
            f(classifier);
            Ok::<(), Infallible>(())
        })
    });
}

#[cfg(test)]
#[path = "../tests/tree_tests.rs"]
mod tests;
