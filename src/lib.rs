//! Churn - a YAML-driven task orchestrator
//!
//! Churn runs named tasks made of ordered steps. A step either references
//! another task or invokes a plugin collaborator, optionally behind a guard
//! that decides at run time whether the step applies.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{ChurnError, Result};

/// Current version of Churn
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
