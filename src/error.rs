//! Error types for precondition operations.
//!
//! This module defines [`PreconditionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Registration-time errors abort discovery; a registry that failed to
//!   freeze must never be queried
//! - Query-time errors surface to the caller; the host decides whether an
//!   evaluation error means "skip" or "hard failure"
//! - Probe and evaluation failures are `Clone` so sessions can cache them

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for precondition operations.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// A precondition with this name is already registered.
    #[error("Precondition '{name}' is already registered")]
    DuplicateName { name: String },

    /// A fact with this key is already registered.
    #[error("Fact '{key}' is already registered")]
    DuplicateFact { key: String },

    /// Registration attempted after the registry was frozen.
    #[error("Registry is frozen; cannot register '{name}'")]
    RegistryFrozen { name: String },

    /// Query attempted against a registry that is still accepting registrations.
    #[error("Registry is not frozen; call freeze() before evaluating preconditions")]
    RegistryNotFrozen,

    /// The requested precondition was never registered.
    #[error("Unknown precondition: {name}")]
    UnknownPrecondition { name: String },

    /// A precondition references a fact nobody registered.
    #[error("Precondition '{precondition}' depends on unknown fact '{fact}'")]
    UnknownFact { precondition: String, fact: String },

    /// Preconditions depend on each other in a loop.
    #[error("Cyclic precondition dependency: {cycle}")]
    CyclicDependency { cycle: String },

    /// Evaluating a precondition failed; the cause is preserved.
    #[error("Failed to evaluate precondition '{name}': {cause}")]
    PreconditionEvaluation {
        name: String,
        #[source]
        cause: EvaluationFailure,
    },

    /// A contributor failed during discovery.
    #[error("Contributor '{contributor}' failed: {source}")]
    Contributor {
        contributor: String,
        #[source]
        source: Box<PreconditionError>,
    },

    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single fact probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The probe process could not be started.
    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// The probe process exited unsuccessfully.
    #[error("`{command}` exited with code {code:?}")]
    CommandFailed { command: String, code: Option<i32> },

    /// The probe did not finish within its time budget.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The probed resource could not be inspected.
    #[error("{message}")]
    Unavailable { message: String },

    /// The probe ran but its output could not be interpreted.
    #[error("could not parse output of `{command}`: {message}")]
    Parse { command: String, message: String },
}

/// Why a precondition could not produce a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationFailure {
    /// A required fact's provider failed.
    #[error("probe for fact '{fact}' failed: {source}")]
    Probe {
        fact: String,
        #[source]
        source: ProbeError,
    },

    /// The predicate itself rejected its inputs.
    #[error("predicate failed: {message}")]
    Predicate { message: String },

    /// A required precondition failed to evaluate.
    #[error("required precondition '{name}' failed: {message}")]
    Dependency { name: String, message: String },
}

/// Result type alias for precondition operations.
pub type Result<T> = std::result::Result<T, PreconditionError>;
