//! Query API consumed by test hosts.
//!
//! [`Preconditions`] is a thin facade over a frozen registry and the current
//! evaluation session. Hosts ask whether a precondition holds, decide
//! whether a unit of work may run, and render diagnostics.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use preconditions::facts::{builtin::Constant, FactValue};
//! use preconditions::query::{ErrorPolicy, Preconditions, RunDecision};
//! use preconditions::registry::{contributor, PreconditionDefinition};
//!
//! let docker = contributor("docker", |registry| {
//!     registry.register_fact("docker_probe", Arc::new(Constant(FactValue::Bool(false))))?;
//!     registry.register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
//! });
//! let preconditions = Preconditions::discover(&[&docker]).unwrap();
//!
//! let decision = preconditions.decide(&["HAS_DOCKER"], ErrorPolicy::Skip).unwrap();
//! assert!(!decision.should_run());
//! assert_eq!(decision.to_string(), "skipped: requires HAS_DOCKER, got: not satisfied");
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{EvaluationCache, SessionId};
use crate::error::{PreconditionError, Result};
use crate::facts::FactValue;
use crate::registry::{Contributor, PreconditionRegistry};

/// What `decide` does when a precondition cannot be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the error as a skip reason.
    #[default]
    Skip,
    /// Return the error to the caller.
    Fail,
}

/// What was observed for an unmet precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum Observed {
    NotSatisfied,
    Error(String),
}

/// One precondition that prevented a unit of work from running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub precondition: String,
    pub observed: Observed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.observed {
            Observed::NotSatisfied => write!(f, "requires {}, got: not satisfied", self.precondition),
            Observed::Error(message) => {
                write!(f, "requires {}, got: error: {}", self.precondition, message)
            }
        }
    }
}

/// Outcome of checking a unit of work's preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    Run,
    Skip { reasons: Vec<SkipReason> },
}

impl RunDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, RunDecision::Run)
    }

    pub fn reasons(&self) -> &[SkipReason] {
        match self {
            RunDecision::Run => &[],
            RunDecision::Skip { reasons } => reasons,
        }
    }
}

impl fmt::Display for RunDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunDecision::Run => write!(f, "run"),
            RunDecision::Skip { reasons } => {
                let rendered: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
                write!(f, "skipped: {}", rendered.join("; "))
            }
        }
    }
}

/// Static description of a registered precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreconditionDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub facts: Vec<String>,
    pub requires: Vec<String>,
}

/// Evaluated state of one precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum PreconditionStatus {
    Satisfied,
    Unsatisfied,
    Error(String),
}

impl PreconditionStatus {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PreconditionStatus::Satisfied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreconditionReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PreconditionStatus,
}

/// Observed value of one probed fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactReport {
    pub key: String,
    pub probe: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FactValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Every precondition evaluated in one session, plus the facts behind them.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: SessionId,
    pub started_at: DateTime<Utc>,
    pub preconditions: Vec<PreconditionReport>,
    pub facts: Vec<FactReport>,
}

impl SessionReport {
    pub fn satisfied(&self) -> usize {
        self.preconditions
            .iter()
            .filter(|p| p.status.is_satisfied())
            .count()
    }
}

/// Facade over a frozen registry and the current evaluation session.
///
/// Safe to share between worker threads. [`new_session`](Self::new_session)
/// swaps in a fresh cache; callers already holding the previous session
/// keep reading it until they finish.
pub struct Preconditions {
    registry: Arc<PreconditionRegistry>,
    session: RwLock<Arc<EvaluationCache>>,
}

impl Preconditions {
    /// Wrap a frozen registry and start its first session.
    pub fn new(registry: Arc<PreconditionRegistry>) -> Result<Self> {
        let session = EvaluationCache::new(Arc::clone(&registry))?;
        Ok(Self {
            registry,
            session: RwLock::new(Arc::new(session)),
        })
    }

    /// Run discovery over `contributors` and start a session.
    pub fn discover(contributors: &[&dyn Contributor]) -> Result<Self> {
        Self::new(Arc::new(PreconditionRegistry::discover(contributors)?))
    }

    pub fn registry(&self) -> &Arc<PreconditionRegistry> {
        &self.registry
    }

    /// The session currently answering queries.
    pub fn session(&self) -> Arc<EvaluationCache> {
        match self.session.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Discard every cached result and start a fresh session.
    pub fn new_session(&self) -> Result<SessionId> {
        let fresh = Arc::new(EvaluationCache::new(Arc::clone(&self.registry))?);
        let id = fresh.session().clone();
        match self.session.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        Ok(id)
    }

    /// Whether `name` holds in the current session.
    pub fn is_satisfied(&self, name: &str) -> Result<bool> {
        self.session().evaluate(name)
    }

    /// Re-probe `key` on next use; returns the preconditions it affects.
    pub fn invalidate(&self, key: &str) -> Vec<String> {
        self.session().invalidate(key)
    }

    /// Every registered precondition with its dependencies, in
    /// registration order.
    pub fn describe_all(&self) -> Vec<PreconditionDescription> {
        self.registry
            .list_all()
            .iter()
            .filter_map(|name| self.registry.lookup(name).ok())
            .map(|definition| PreconditionDescription {
                name: definition.name().to_string(),
                description: definition.description().map(str::to_string),
                facts: definition.facts().to_vec(),
                requires: definition.requires().to_vec(),
            })
            .collect()
    }

    /// Decide whether a unit of work gated on `names` may run.
    ///
    /// Unknown names are always an error: a typo must not silently skip.
    /// Evaluation errors follow `policy`.
    pub fn decide<S: AsRef<str>>(&self, names: &[S], policy: ErrorPolicy) -> Result<RunDecision> {
        let session = self.session();
        let mut reasons = Vec::new();

        for name in names {
            let name = name.as_ref();
            match session.evaluate(name) {
                Ok(true) => {}
                Ok(false) => reasons.push(SkipReason {
                    precondition: name.to_string(),
                    observed: Observed::NotSatisfied,
                }),
                Err(e @ PreconditionError::PreconditionEvaluation { .. })
                    if policy == ErrorPolicy::Skip =>
                {
                    tracing::debug!(name, error = %e, "Treating evaluation error as skip");
                    reasons.push(SkipReason {
                        precondition: name.to_string(),
                        observed: Observed::Error(evaluation_message(&e)),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if reasons.is_empty() {
            Ok(RunDecision::Run)
        } else {
            Ok(RunDecision::Skip { reasons })
        }
    }

    /// Evaluate every precondition and collect the observed facts.
    pub fn report(&self) -> SessionReport {
        let session = self.session();

        let preconditions = self
            .registry
            .list_all()
            .iter()
            .map(|name| {
                let status = match session.evaluate(name) {
                    Ok(true) => PreconditionStatus::Satisfied,
                    Ok(false) => PreconditionStatus::Unsatisfied,
                    Err(e) => PreconditionStatus::Error(evaluation_message(&e)),
                };
                PreconditionReport {
                    name: name.clone(),
                    description: self
                        .registry
                        .lookup(name)
                        .ok()
                        .and_then(|d| d.description().map(str::to_string)),
                    status,
                }
            })
            .collect();

        let facts = session
            .probed_facts()
            .into_iter()
            .map(|(key, result)| {
                let probe = self
                    .registry
                    .fact(&key)
                    .map(|f| f.provider.describe())
                    .unwrap_or_default();
                let (value, error) = match result {
                    Ok(value) => (Some(value), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                FactReport {
                    key,
                    probe,
                    value,
                    error,
                }
            })
            .collect();

        SessionReport {
            session: session.session().clone(),
            started_at: session.session().timestamp(),
            preconditions,
            facts,
        }
    }
}

/// The innermost cause, without the "failed to evaluate X" wrapper that the
/// skip reason already names.
fn evaluation_message(error: &PreconditionError) -> String {
    match error {
        PreconditionError::PreconditionEvaluation { cause, .. } => cause.to_string(),
        other => other.to_string(),
    }
}
