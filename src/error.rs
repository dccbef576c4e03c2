//! Error types for Churn

use crate::runner::StepId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Churn operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Main error type for Churn
#[derive(Error, Debug)]
pub enum ChurnError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task orchestration errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Project file parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Step in task '{task}' is invalid: {reason}")]
    InvalidStep { task: String, reason: String },

    #[error("Task '{task}' refers to '{name}', which is neither a task nor a plugin")]
    UnresolvedReference { task: String, name: String },

    #[error("Plugin '{plugin}' has no target named '{target}'")]
    UnknownTarget { plugin: String, target: String },

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },

    #[error("Failed to load environment file '{path}': {error}")]
    EnvFile { path: PathBuf, error: String },
}

/// Orchestration errors. Every variant is terminal to the run that raised it.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Task '{0}' is not defined")]
    UnknownTask(String),

    #[error("Task '{0}' is already defined")]
    DuplicateTask(String),

    #[error("Circular task reference detected: {}", .0.join(" -> "))]
    CyclicTask(Vec<String>),

    #[error("Could not evaluate condition for {step}: {source}")]
    GuardEvaluation {
        step: StepId,
        #[source]
        source: GuardError,
    },

    #[error("{step} failed: {source}")]
    Collaborator {
        step: StepId,
        #[source]
        source: CollaboratorError,
    },
}

impl ExecutionError {
    /// The leaf step that caused the failure, if the failure came from one
    pub fn failed_step(&self) -> Option<&StepId> {
        match self {
            ExecutionError::GuardEvaluation { step, .. }
            | ExecutionError::Collaborator { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Failures while evaluating a guard condition
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid exclude pattern '{pattern}': {source}")]
    Exclude {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to read '{}': {}", .0.path().display(), .0.error())]
    Probe(#[from] glob::GlobError),

    #[error("failed to start probe command '{command}': {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error("{0}")]
    Predicate(String),
}

/// Failures reported by (or while reaching) a collaborator
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Command failed with exit code {0:?}")]
    CommandFailed(Option<i32>),

    #[error("Failed to start command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid plugin configuration: {0}")]
    InvalidConfig(String),

    #[error("No collaborator is registered for plugin '{0}'")]
    Unavailable(String),

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for orchestration operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;
