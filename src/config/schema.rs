//! Configuration schema definitions.
//!
//! These structs map to the YAML format of `.preconditions/config.yml`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::facts::builtin::DEFAULT_NETWORK_TARGETS;
use crate::facts::command::DEFAULT_TIMEOUT;
use crate::facts::ProbeFailurePolicy;

/// Default per-target connect timeout for the online check.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(2);

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreconditionsConfig {
    /// Probe settings
    pub settings: Settings,

    /// Project-specific preconditions, keyed by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub preconditions: BTreeMap<String, CustomPrecondition>,
}

impl PreconditionsConfig {
    /// Overlay `other` on top of this config.
    ///
    /// Settings merge field by field; preconditions are replaced by name.
    pub fn merge(&mut self, other: PreconditionsConfig) {
        self.settings.merge(other.settings);
        self.preconditions.extend(other.preconditions);
    }
}

/// Probe settings.
///
/// Every field is optional so that a local override can set one value
/// without resetting the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout for subprocess probes, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,

    /// `host:port` targets for the `ONLINE` check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_targets: Option<Vec<String>>,

    /// Connect timeout per network target, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_timeout_ms: Option<u64>,
}

impl Settings {
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn network_targets(&self) -> Vec<String> {
        match &self.network_targets {
            Some(targets) => targets.clone(),
            None => DEFAULT_NETWORK_TARGETS.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn network_timeout(&self) -> Duration {
        self.network_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_NETWORK_TIMEOUT)
    }

    /// Take every value `other` sets.
    pub fn merge(&mut self, other: Settings) {
        if other.probe_timeout_secs.is_some() {
            self.probe_timeout_secs = other.probe_timeout_secs;
        }
        if other.network_targets.is_some() {
            self.network_targets = other.network_targets;
        }
        if other.network_timeout_ms.is_some() {
            self.network_timeout_ms = other.network_timeout_ms;
        }
    }
}

/// A precondition declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPrecondition {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// How to check it
    pub check: CustomCheck,

    /// What to do when the probe itself fails (leaf checks only)
    #[serde(default)]
    pub on_failure: ProbeFailurePolicy,
}

/// Check performed for a configured precondition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomCheck {
    /// A shell command exits 0
    CommandSucceeds {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },

    /// A file or directory exists (relative paths resolve against the project root)
    FileExists { path: String },

    /// An environment variable is set and non-empty
    EnvVarSet { name: String },

    /// An executable is on PATH
    ExecutableOnPath { name: String },

    /// Any target accepts a TCP connection
    TcpReachable {
        targets: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Every listed precondition holds
    AllOf { preconditions: Vec<String> },

    /// At least one listed precondition holds
    AnyOf { preconditions: Vec<String> },

    /// The named precondition does not hold
    Not { precondition: String },
}

impl CustomCheck {
    /// Whether this check probes the environment (as opposed to combining
    /// other preconditions).
    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            CustomCheck::AllOf { .. } | CustomCheck::AnyOf { .. } | CustomCheck::Not { .. }
        )
    }
}
