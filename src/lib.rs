//! klib commonizer.
//!
//! Computes the shared `expect` contract of two platform-specific
//! declaration trees and splits them into first, common and second forests.
//!
//! The engine lives in the workspace crates, re-exported here:
//! - [`common`]: names and limits
//! - [`model`]: declaration trees and the JSON interchange format
//! - [`commonizer`]: comparator, merge, skeleton and materialization passes

pub use klc_common as common;
pub use klc_commonizer as commonizer;
pub use klc_model as model;

pub use klc_commonizer::{
    CommonizationOutput, CommonizationStats, CommonizerError, CommonizerOptions, commonize,
};
pub use klc_model::{DeclSource, DeclTree};

pub mod io;
pub mod tracing_config;
