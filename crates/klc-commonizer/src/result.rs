//! Outcome of comparing two declarations.
//!
//! A non-match is an ordinary value ([`CommonizationResult::Mismatched`]),
//! never an error: most declarations of two platforms are expected to differ
//! somewhere. Fatal conditions live in [`CommonizerError`](crate::CommonizerError).

use klc_common::FqName;
use klc_model::DeclKindTag;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Three-way outcome of comparing a first-side and a second-side declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommonizationResult<T> {
    Matched { first: T, common: T, second: T },
    Mismatched(Mismatch),
}

impl<T> CommonizationResult<T> {
    #[inline]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    #[inline]
    pub fn is_mismatched(&self) -> bool {
        !self.is_matched()
    }

    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Self::Matched { .. } => None,
            Self::Mismatched(mismatch) => Some(mismatch),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> CommonizationResult<U> {
        match self {
            Self::Matched {
                first,
                common,
                second,
            } => CommonizationResult::Matched {
                first: f(first),
                common: f(common),
                second: f(second),
            },
            Self::Mismatched(mismatch) => CommonizationResult::Mismatched(mismatch),
        }
    }
}

/// Why a pair is not commonizable. Holds every failing rule, in rule order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mismatch {
    causes: SmallVec<[Cause; 2]>,
}

impl Mismatch {
    pub fn new(cause: Cause) -> Self {
        let mut causes = SmallVec::new();
        causes.push(cause);
        Self { causes }
    }

    pub fn push(&mut self, cause: Cause) {
        if !self.causes.contains(&cause) {
            self.causes.push(cause);
        }
    }

    /// Record `cause` unless `ok` holds.
    #[inline]
    pub fn require(&mut self, ok: bool, cause: Cause) {
        if !ok {
            self.push(cause);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    pub fn contains(&self, cause: &Cause) -> bool {
        self.causes.contains(cause)
    }

    /// `Ok` when no rule failed.
    pub fn into_result(self) -> Result<(), Mismatch> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, cause) in self.causes.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}

/// Constructs that cannot be unified into a shared declaration at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedConstruct {
    /// A type alias whose right-hand side is another alias.
    AliasOfAlias,
    /// A type alias with type parameters or type arguments on its right-hand side.
    ParameterizedAlias,
    /// A type alias expanding to an inline class.
    InlineAliasTarget,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    Getter,
    Setter,
}

/// A single failing comparison rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Cause {
    KindMismatch {
        first: DeclKindTag,
        second: DeclKindTag,
    },
    Private,
    NameMismatch,
    VisibilityMismatch,
    ClassKindMismatch,
    TypeParameterMismatch,
    /// A nested class whose containing classes are not commonizable.
    ContainerMismatch,
    SuspendMismatch,
    ReturnTypeMismatch,
    ExtensionReceiverMismatch,
    ParameterCountMismatch,
    ParameterMismatch {
        index: usize,
    },
    TypeMismatch,
    VarargMismatch,
    ConstProperty,
    LateinitProperty,
    VarMismatch,
    AccessorMismatch {
        accessor: AccessorKind,
    },
    /// Right-hand classes of two aliases disagree on kind, modality or visibility.
    AliasTargetMismatch,
    Unsupported {
        construct: UnsupportedConstruct,
    },
    NonAbstractInInterface,
    /// The name matches a configured exclusion pattern.
    Excluded,
    RecursionLimit,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindMismatch { first, second } => write!(f, "kind mismatch ({first} vs {second})"),
            Self::Private => f.write_str("private declaration"),
            Self::NameMismatch => f.write_str("qualified names differ"),
            Self::VisibilityMismatch => f.write_str("visibility differs"),
            Self::ClassKindMismatch => f.write_str("class kind differs"),
            Self::TypeParameterMismatch => f.write_str("type parameters differ"),
            Self::ContainerMismatch => f.write_str("containing classes differ"),
            Self::SuspendMismatch => f.write_str("suspend modifier differs"),
            Self::ReturnTypeMismatch => f.write_str("return types differ"),
            Self::ExtensionReceiverMismatch => f.write_str("extension receivers differ"),
            Self::ParameterCountMismatch => f.write_str("parameter counts differ"),
            Self::ParameterMismatch { index } => write!(f, "parameter #{index} differs"),
            Self::TypeMismatch => f.write_str("types differ"),
            Self::VarargMismatch => f.write_str("vararg modifier differs"),
            Self::ConstProperty => f.write_str("const property"),
            Self::LateinitProperty => f.write_str("lateinit property"),
            Self::VarMismatch => f.write_str("var/val differs"),
            Self::AccessorMismatch { accessor } => match accessor {
                AccessorKind::Getter => f.write_str("getters differ"),
                AccessorKind::Setter => f.write_str("setters differ"),
            },
            Self::AliasTargetMismatch => f.write_str("alias targets differ"),
            Self::Unsupported { construct } => match construct {
                UnsupportedConstruct::AliasOfAlias => f.write_str("unsupported: alias of alias"),
                UnsupportedConstruct::ParameterizedAlias => {
                    f.write_str("unsupported: parameterized alias")
                }
                UnsupportedConstruct::InlineAliasTarget => {
                    f.write_str("unsupported: alias of inline class")
                }
            },
            Self::NonAbstractInInterface => f.write_str("non-abstract interface member"),
            Self::Excluded => f.write_str("excluded by name"),
            Self::RecursionLimit => f.write_str("comparison recursion limit reached"),
        }
    }
}

/// A name-equal pair that failed to commonize, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MismatchRecord {
    pub fq_name: FqName,
    pub kind: DeclKindTag,
    pub causes: Vec<Cause>,
}

impl MismatchRecord {
    pub fn new(fq_name: FqName, kind: DeclKindTag, mismatch: &Mismatch) -> Self {
        Self {
            fq_name,
            kind,
            causes: mismatch.causes().to_vec(),
        }
    }
}

impl fmt::Display for MismatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`: ", self.kind, self.fq_name)?;
        for (idx, cause) in self.causes.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/result_tests.rs"]
mod tests;
