//! Raw environment facts and the providers that compute them.
//!
//! A fact is a single measurement of the execution environment ("is Docker
//! available", "which JDK is on PATH"). Preconditions are predicates over
//! facts. Providers may be expensive, so the evaluation cache invokes each
//! one at most once per session.
//!
//! # Modules
//!
//! - [`builtin`] - Stock providers (commands, files, env vars, network, platform)
//! - [`command`] - Bounded-time subprocess execution used by command probes
//! - [`path`] - PATH parsing and executable resolution

pub mod builtin;
pub mod command;
pub mod path;

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use crate::error::ProbeError;

/// The result of evaluating a fact provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Bool(bool),
    Number(i64),
    Text(String),
    Version(Version),
    List(Vec<FactValue>),
    /// The probed thing does not exist (binary missing, variable unset).
    Absent,
}

impl FactValue {
    /// Boolean interpretation used by `FactIsTrue` predicates.
    pub fn is_truthy(&self) -> bool {
        match self {
            FactValue::Bool(b) => *b,
            FactValue::Number(n) => *n != 0,
            FactValue::Text(s) => !s.is_empty(),
            FactValue::Version(_) => true,
            FactValue::List(items) => !items.is_empty(),
            FactValue::Absent => false,
        }
    }

}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{}", b),
            FactValue::Number(n) => write!(f, "{}", n),
            FactValue::Text(s) => write!(f, "{}", s),
            FactValue::Version(v) => write!(f, "{}", v),
            FactValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            FactValue::Absent => write!(f, "absent"),
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl From<Version> for FactValue {
    fn from(value: Version) -> Self {
        FactValue::Version(value)
    }
}

/// Regex for the first dotted numeric sequence in a string.
static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("VERSION_REGEX must compile")
});

/// A dotted numeric version (missing components are zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Find the first `N[.N[.N]]` sequence in `text`.
    ///
    /// ```
    /// use preconditions::facts::Version;
    ///
    /// let v = Version::find_in("git version 2.43.0").unwrap();
    /// assert_eq!(v, Version::new(2, 43, 0));
    /// ```
    pub fn find_in(text: &str) -> Option<Self> {
        Self::from_captures(&VERSION_REGEX, text)
    }

    /// Extract a version using a caller-supplied pattern.
    ///
    /// Capture groups 1-3 are major, minor and patch.
    pub fn from_captures(pattern: &Regex, text: &str) -> Option<Self> {
        let caps = pattern.captures(text)?;
        let part = |i: usize| -> Option<u64> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0),
            }
        };
        let major: u64 = caps.get(1)?.as_str().parse().ok()?;
        Some(Self::new(major, part(2)?, part(3)?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// What a session does when a fact's provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailurePolicy {
    /// Surface the failure as an evaluation error (fail loud).
    #[default]
    Propagate,
    /// Treat the fact as `Bool(false)` (fail safe, skip more).
    AssumeFalse,
}

/// Computes one raw environment fact.
///
/// Implementations must be callable any number of times. Results are
/// expected to be stable within a session but may change across sessions.
pub trait FactProvider: Send + Sync {
    /// Short human-readable description of what is probed.
    fn describe(&self) -> String;

    /// Probe the environment.
    fn compute(&self) -> Result<FactValue, ProbeError>;
}

/// A fact provider backed by a closure.
pub struct FnProvider<F> {
    description: String,
    probe: F,
}

impl<F> FactProvider for FnProvider<F>
where
    F: Fn() -> Result<FactValue, ProbeError> + Send + Sync,
{
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        (self.probe)()
    }
}

/// Wrap a closure as a shareable provider.
///
/// ```
/// use preconditions::facts::{from_fn, FactValue};
///
/// let provider = from_fn("always on", || Ok(FactValue::Bool(true)));
/// assert_eq!(provider.compute().unwrap(), FactValue::Bool(true));
/// ```
pub fn from_fn<F>(description: impl Into<String>, probe: F) -> Arc<dyn FactProvider>
where
    F: Fn() -> Result<FactValue, ProbeError> + Send + Sync + 'static,
{
    Arc::new(FnProvider {
        description: description.into(),
        probe,
    })
}
