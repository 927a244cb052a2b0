//! Preconditions - discover, evaluate and report environment preconditions.
//!
//! A precondition is a named boolean fact about the execution environment
//! ("Docker is reachable", "a JDK 17+ is on PATH") that gates whether a unit
//! of work may run. Contributors register facts and preconditions during a
//! discovery phase; the registry is then frozen and queried through
//! per-session caches that probe each fact at most once.
//!
//! # Modules
//!
//! - [`facts`] - Fact values, the provider trait and built-in probes
//! - [`registry`] - Precondition definitions, the registry and discovery
//! - [`cache`] - Session-scoped evaluation cache
//! - [`query`] - The facade test hosts consume
//! - [`contrib`] - Built-in contributors (OS, JVM, network, tooling)
//! - [`config`] - YAML configuration and configured preconditions
//! - [`cli`] - Command-line interface
//! - [`ui`] - Terminal output
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use preconditions::facts::{builtin::Constant, FactValue};
//! use preconditions::query::Preconditions;
//! use preconditions::registry::{contributor, PreconditionDefinition};
//! use preconditions::PreconditionError;
//!
//! let docker = contributor("docker", |registry| {
//!     registry.register_fact("docker_probe", Arc::new(Constant(FactValue::Bool(true))))?;
//!     registry.register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
//! });
//!
//! let preconditions = Preconditions::discover(&[&docker]).unwrap();
//! assert!(preconditions.is_satisfied("HAS_DOCKER").unwrap());
//! assert!(matches!(
//!     preconditions.is_satisfied("HAS_GPU"),
//!     Err(PreconditionError::UnknownPrecondition { .. })
//! ));
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod contrib;
pub mod error;
pub mod facts;
pub mod query;
pub mod registry;
pub mod ui;

pub use error::{PreconditionError, Result};
