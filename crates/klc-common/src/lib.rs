//! Common types and utilities for the klib commonizer.
//!
//! This crate provides foundational types used across all klc crates:
//! - Declaration names (`Name`, `FqName`)
//! - Comparison limits and thresholds

// Simple and fully qualified declaration names
pub mod names;
pub use names::{FqName, Name};

// Centralized limits and thresholds
pub mod limits;
