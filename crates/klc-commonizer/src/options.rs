//! Commonizer configuration.
//!
//! [`CommonizerOptions`] is the serializable form read from a config file;
//! [`CompiledOptions`] is what the passes consume (patterns compiled once).

use crate::error::CommonizerError;
use klc_common::limits::{MAX_COMPARISON_DEPTH, MAX_COMPARISON_ITERATIONS};
use klc_common::{FqName, Name};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Interop bridge functions generated per platform.
pub const DEFAULT_EXCLUDED_FUNCTION_PATTERN: &str = r"(objc)?[Kk]niBridge\d+";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonizerOptions {
    /// Classifiers under these packages compare by qualified name only.
    pub builtin_namespaces: Vec<String>,
    /// Functions whose whole name matches one of these are never commonized.
    pub excluded_function_patterns: Vec<String>,
    /// Merge matched packages on the rayon pool.
    pub parallel: bool,
    pub max_comparison_depth: u32,
    pub max_comparison_iterations: u32,
}

impl Default for CommonizerOptions {
    fn default() -> Self {
        Self {
            builtin_namespaces: vec!["kotlin".to_string(), "kotlinx".to_string()],
            excluded_function_patterns: vec![DEFAULT_EXCLUDED_FUNCTION_PATTERN.to_string()],
            parallel: false,
            max_comparison_depth: MAX_COMPARISON_DEPTH,
            max_comparison_iterations: MAX_COMPARISON_ITERATIONS,
        }
    }
}

impl CommonizerOptions {
    pub fn compile(&self) -> Result<CompiledOptions, CommonizerError> {
        let excluded_functions = self
            .excluded_function_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                    CommonizerError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledOptions {
            builtin_namespaces: self.builtin_namespaces.clone(),
            excluded_functions,
            parallel: self.parallel,
            max_comparison_depth: self.max_comparison_depth,
            max_comparison_iterations: self.max_comparison_iterations,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CompiledOptions {
    builtin_namespaces: Vec<String>,
    excluded_functions: Vec<Regex>,
    pub parallel: bool,
    pub max_comparison_depth: u32,
    pub max_comparison_iterations: u32,
}

impl CompiledOptions {
    /// True when `fq_name` lies inside one of the built-in namespaces.
    pub fn is_builtin(&self, fq_name: &FqName) -> bool {
        self.builtin_namespaces
            .iter()
            .any(|namespace| fq_name.starts_with(namespace))
    }

    pub fn is_excluded_function(&self, name: &Name) -> bool {
        self.excluded_functions
            .iter()
            .any(|pattern| pattern.is_match(name.as_str()))
    }
}

#[cfg(test)]
#[path = "../tests/options_tests.rs"]
mod tests;
