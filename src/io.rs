//! Reading and writing declaration trees and configuration as JSON.
//!
//! A tree file holds either one module source or an array of them.

use anyhow::{Context, Result};
use klc_commonizer::{CommonizationOutput, CommonizerOptions};
use klc_model::{DeclSource, DeclTree};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Output file names, in first/common/second order.
pub const OUTPUT_FILES: [&str; 3] = ["first.json", "common.json", "second.json"];

#[derive(Deserialize)]
#[serde(untagged)]
enum TreeDocument {
    Many(Vec<DeclSource>),
    One(DeclSource),
}

/// Parse a tree document from JSON text and link it.
pub fn parse_tree(text: &str) -> Result<DeclTree> {
    let sources = match serde_json::from_str::<TreeDocument>(text).context("malformed declaration JSON")? {
        TreeDocument::Many(sources) => sources,
        TreeDocument::One(source) => vec![source],
    };
    DeclTree::from_sources(&sources).context("invalid declaration tree")
}

pub fn read_tree(path: &Path) -> Result<DeclTree> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tree = parse_tree(&text).with_context(|| format!("failed to load {}", path.display()))?;
    debug!(path = %path.display(), declarations = tree.len(), "loaded tree");
    Ok(tree)
}

pub fn tree_to_json(tree: &DeclTree) -> Result<String> {
    serde_json::to_string_pretty(&tree.to_sources()).context("failed to serialize tree")
}

pub fn write_tree(path: &Path, tree: &DeclTree) -> Result<()> {
    let json = tree_to_json(tree)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Options from a JSON config file, or the defaults when no file is given.
pub fn read_options(path: Option<&Path>) -> Result<CommonizerOptions> {
    let Some(path) = path else {
        return Ok(CommonizerOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Write the three output forests into `dir`, creating it if needed.
pub fn write_output(dir: &Path, output: &CommonizationOutput) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for (file, tree) in OUTPUT_FILES
        .iter()
        .zip([&output.first, &output.common, &output.second])
    {
        write_tree(&dir.join(file), tree)?;
    }
    Ok(())
}
