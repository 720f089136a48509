//! Fatal commonizer errors.
//!
//! These signal a structural inconsistency in the engine's own bookkeeping
//! (or invalid input), never an ordinary non-match.

use crate::merge::Variant;
use klc_common::FqName;
use klc_model::{DeclKindTag, ModelError};
use std::fmt;
use thiserror::Error;

/// Pipeline pass in which an error was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Merge,
    Skeleton,
    Materialize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merge => "merge",
            Self::Skeleton => "skeleton",
            Self::Materialize => "materialize",
        })
    }
}

#[derive(Debug, Error)]
pub enum CommonizerError {
    #[error("invalid exclusion pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// One of the input trees violates the model invariants.
    #[error("invalid {side} input tree")]
    InvalidInput {
        side: Variant,
        #[source]
        source: ModelError,
    },

    #[error("model error during {phase}")]
    Model {
        phase: Phase,
        #[source]
        source: ModelError,
    },

    /// A classifier reference with no registry entry for its variant.
    #[error("{phase}: no {variant} classifier registered for `{fq_name}`")]
    MissingClassifier {
        fq_name: FqName,
        variant: Variant,
        phase: Phase,
    },

    /// A declaration whose container has no placeholder in its variant.
    #[error("{phase}: no {variant} container for {kind} `{fq_name}`")]
    MissingContainer {
        fq_name: FqName,
        kind: DeclKindTag,
        variant: Variant,
        phase: Phase,
    },

    /// Two placeholders of the same variant under one name.
    #[error("{phase}: duplicate {variant} {kind} `{fq_name}`")]
    DuplicateEntry {
        fq_name: FqName,
        kind: DeclKindTag,
        variant: Variant,
        phase: Phase,
    },

    /// A payload that does not agree with the placeholder it fills, or still
    /// carries references into a foreign tree.
    #[error("{phase}: conflicting {variant} payload for `{fq_name}`")]
    ConflictingPayload {
        fq_name: FqName,
        variant: Variant,
        phase: Phase,
    },

    #[error("{phase}: {variant} `{fq_name}` materialized twice")]
    AlreadyMaterialized {
        fq_name: FqName,
        variant: Variant,
        phase: Phase,
    },
}

impl CommonizerError {
    /// Phase of the error, if it was raised inside a pass.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::InvalidPattern { .. } | Self::InvalidInput { .. } => None,
            Self::Model { phase, .. }
            | Self::MissingClassifier { phase, .. }
            | Self::MissingContainer { phase, .. }
            | Self::DuplicateEntry { phase, .. }
            | Self::ConflictingPayload { phase, .. }
            | Self::AlreadyMaterialized { phase, .. } => Some(*phase),
        }
    }
}
