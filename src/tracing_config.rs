//! Tracing configuration for the `klc` binary.
//!
//! Supports three output formats controlled by `KLC_LOG_FORMAT`:
//!
//! - `text` (default): standard `tracing-subscriber` flat output
//! - `tree`: hierarchical indented output via `tracing-tree`
//! - `json`: one JSON object per span/event
//!
//! ## Quick start
//!
//! ```bash
//! # Pass boundaries only
//! KLC_LOG=debug klc commonize --first a.json --second b.json --out out/
//!
//! # Every comparison, nested under its pass
//! KLC_LOG=klc_commonizer=trace KLC_LOG_FORMAT=tree klc diff --first a.json --second b.json
//! ```
//!
//! The subscriber is only initialised when `KLC_LOG` (or `RUST_LOG`) is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    /// Parse a `KLC_LOG_FORMAT` value. Unknown values fall back to text.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("KLC_LOG_FORMAT").unwrap_or_default())
    }
}

/// Build an `EnvFilter` from `KLC_LOG`, falling back to `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("KLC_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Initialise the global tracing subscriber.
///
/// Does nothing when neither `KLC_LOG` nor `RUST_LOG` is set. All output goes
/// to stderr so it never mixes with the stats and mismatch lines on stdout.
pub fn init_tracing() {
    let has_klc_log = std::env::var("KLC_LOG").is_ok();
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if !has_klc_log && !has_rust_log {
        return;
    }

    let filter = build_filter();
    match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_deferred_spans(true)
                .with_span_retrace(true)
                .with_targets(true);

            Registry::default().with(filter).with(tree_layer).init();
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);

            Registry::default().with(filter).with(json_layer).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
