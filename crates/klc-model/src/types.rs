//! Value types.
//!
//! Types are owned values, not arena entries: a supertype list or a return
//! type owns its `Type` outright. The only cross-declaration link inside a
//! type is its [`ClassifierRef`].

use crate::tree::DeclId;
use klc_common::{FqName, Name};
use serde::{Deserialize, Serialize};

/// Declaration-site or use-site variance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variance {
    #[default]
    Invariant,
    In,
    Out,
}

/// Reference from a simple type to its classifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassifierRef {
    /// A class or type alias declared in the same tree.
    Resolved(DeclId),
    /// Not yet resolved. Produced by builders and by payloads detached from
    /// their tree; turned into `Resolved` or `External` by linking.
    Symbolic(FqName),
    /// A classifier outside every loaded tree (built-ins, dependencies).
    External(FqName),
    /// A type parameter of an enclosing declaration, by name.
    TypeParameter(Name),
}

impl ClassifierRef {
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Qualified name carried inline, if any. `Resolved` references need the
    /// tree to answer this, see [`DeclTree::classifier_fq_name`](crate::DeclTree::classifier_fq_name).
    pub fn inline_fq_name(&self) -> Option<&FqName> {
        match self {
            Self::Symbolic(fq) | Self::External(fq) => Some(fq),
            Self::Resolved(_) | Self::TypeParameter(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeArgument {
    Star,
    Projection { variance: Variance, ty: Type },
}

impl TypeArgument {
    pub fn invariant(ty: Type) -> Self {
        Self::Projection {
            variance: Variance::Invariant,
            ty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SimpleType {
    pub classifier: ClassifierRef,
    pub arguments: Vec<TypeArgument>,
    pub nullable: bool,
    pub definitely_not_null: bool,
    /// The alias spelling of this type (`typealias Handle = Long` seen as
    /// `Handle`). `classifier`/`arguments` hold the expanded form.
    pub abbreviation: Option<Box<SimpleType>>,
}

impl SimpleType {
    pub fn new(classifier: ClassifierRef) -> Self {
        Self {
            classifier,
            arguments: Vec::new(),
            nullable: false,
            definitely_not_null: false,
            abbreviation: None,
        }
    }

    /// Classifier used for comparison: the abbreviation's when present.
    pub fn effective_classifier(&self) -> &ClassifierRef {
        match &self.abbreviation {
            Some(abbreviation) => &abbreviation.classifier,
            None => &self.classifier,
        }
    }

    /// Arguments used for comparison: the abbreviation's when present.
    pub fn effective_arguments(&self) -> &[TypeArgument] {
        match &self.abbreviation {
            Some(abbreviation) => &abbreviation.arguments,
            None => &self.arguments,
        }
    }

    /// Replace the expanded form with the alias spelling, here and in every
    /// argument. Nullability stays the outer type's.
    pub fn collapse_abbreviations(&mut self) {
        while let Some(abbreviation) = self.abbreviation.take() {
            let SimpleType {
                classifier,
                arguments,
                abbreviation,
                ..
            } = *abbreviation;
            self.classifier = classifier;
            self.arguments = arguments;
            self.abbreviation = abbreviation;
        }
        for argument in &mut self.arguments {
            if let TypeArgument::Projection { ty, .. } = argument {
                ty.collapse_abbreviations();
            }
        }
    }

    fn try_for_each_classifier_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut ClassifierRef) -> Result<(), E>,
    ) -> Result<(), E> {
        f(&mut self.classifier)?;
        for argument in &mut self.arguments {
            if let TypeArgument::Projection { ty, .. } = argument {
                ty.try_for_each_classifier_mut(f)?;
            }
        }
        if let Some(abbreviation) = &mut self.abbreviation {
            abbreviation.try_for_each_classifier_mut(f)?;
        }
        Ok(())
    }
}

/// A platform type with distinct lower and upper bounds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlexibleType {
    pub lower: SimpleType,
    pub upper: SimpleType,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Simple(SimpleType),
    Flexible(FlexibleType),
}

impl Type {
    /// Non-null simple type with a symbolic classifier and no arguments.
    pub fn named(fq_name: impl Into<FqName>) -> Self {
        Self::Simple(SimpleType::new(ClassifierRef::Symbolic(fq_name.into())))
    }

    /// Reference to a type parameter in scope.
    pub fn type_parameter(name: impl Into<Name>) -> Self {
        Self::Simple(SimpleType::new(ClassifierRef::TypeParameter(name.into())))
    }

    /// Symbolic generic type with invariant arguments.
    pub fn generic(fq_name: impl Into<FqName>, arguments: Vec<TypeArgument>) -> Self {
        let mut simple = SimpleType::new(ClassifierRef::Symbolic(fq_name.into()));
        simple.arguments = arguments;
        Self::Simple(simple)
    }

    pub fn flexible(lower: SimpleType, upper: SimpleType) -> Self {
        Self::Flexible(FlexibleType { lower, upper })
    }

    /// The same type marked nullable. Flexible types are returned unchanged.
    pub fn nullable(self) -> Self {
        match self {
            Self::Simple(mut simple) => {
                simple.nullable = true;
                Self::Simple(simple)
            }
            flexible @ Self::Flexible(_) => flexible,
        }
    }

    /// Attach an alias spelling to a simple type.
    pub fn abbreviated_as(self, abbreviation: SimpleType) -> Self {
        match self {
            Self::Simple(mut simple) => {
                simple.abbreviation = Some(Box::new(abbreviation));
                Self::Simple(simple)
            }
            flexible @ Self::Flexible(_) => flexible,
        }
    }

    pub const fn as_simple(&self) -> Option<&SimpleType> {
        match self {
            Self::Simple(simple) => Some(simple),
            Self::Flexible(_) => None,
        }
    }

    /// See [`SimpleType::collapse_abbreviations`].
    pub fn collapse_abbreviations(&mut self) {
        match self {
            Self::Simple(simple) => simple.collapse_abbreviations(),
            Self::Flexible(flexible) => {
                flexible.lower.collapse_abbreviations();
                flexible.upper.collapse_abbreviations();
            }
        }
    }

    /// Visit every classifier reference in this type, including arguments,
    /// abbreviations and both flexible bounds.
    pub fn try_for_each_classifier_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut ClassifierRef) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Self::Simple(simple) => simple.try_for_each_classifier_mut(f),
            Self::Flexible(flexible) => {
                flexible.lower.try_for_each_classifier_mut(f)?;
                flexible.upper.try_for_each_classifier_mut(f)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeParameter {
    pub name: Name,
    pub variance: Variance,
    pub upper_bounds: Vec<Type>,
    pub is_reified: bool,
}

impl TypeParameter {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            variance: Variance::Invariant,
            upper_bounds: Vec::new(),
            is_reified: false,
        }
    }

    pub fn with_bound(mut self, bound: Type) -> Self {
        self.upper_bounds.push(bound);
        self
    }

    pub(crate) fn try_for_each_bound_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut Type) -> Result<(), E>,
    ) -> Result<(), E> {
        for bound in &mut self.upper_bounds {
            f(bound)?;
        }
        Ok(())
    }
}
