//! Task orchestration
//!
//! This module holds the task registry, guard evaluation, the collaborator
//! seam and the executor that ties them together.

pub mod collaborator;
pub mod context;
pub mod executor;
pub mod guard;
pub mod interpolate;
pub mod registry;

// Re-export main types
pub use collaborator::*;
pub use context::*;
pub use executor::*;
pub use guard::*;
pub use interpolate::*;
pub use registry::*;
