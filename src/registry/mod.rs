//! Precondition registry.
//!
//! The registry is a catalog of facts (with their providers) and named
//! preconditions. It has two lifecycle phases:
//!
//! - `Open`: contributors register facts and preconditions
//! - `Frozen`: read-only; sessions evaluate against it without locking
//!
//! [`PreconditionRegistry::freeze`] is the one-way transition. It validates
//! every reference and rejects dependency cycles so that no query ever
//! recurses forever.
//!
//! # Modules
//!
//! - [`definition`] - Precondition definitions and predicates
//! - [`discovery`] - Contributors and the discovery phase

pub mod definition;
pub mod discovery;
mod graph;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PreconditionError, Result};
use crate::facts::{FactProvider, ProbeFailurePolicy};

pub use definition::{Predicate, PredicateFn, PredicateInputs, PreconditionDefinition};
pub use discovery::{contributor, Contributor, FnContributor};

/// Lifecycle phase of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Accepting registrations.
    Open,
    /// Read-only, accepting queries.
    Frozen,
}

/// A registered fact: its provider and what to do when the provider fails.
#[derive(Clone)]
pub struct FactRegistration {
    pub key: String,
    pub provider: Arc<dyn FactProvider>,
    pub on_failure: ProbeFailurePolicy,
}

impl fmt::Debug for FactRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactRegistration")
            .field("key", &self.key)
            .field("provider", &self.provider.describe())
            .field("on_failure", &self.on_failure)
            .finish()
    }
}

/// Catalog of facts and preconditions, in registration order.
#[derive(Debug)]
pub struct PreconditionRegistry {
    state: RegistryState,
    definitions: HashMap<String, PreconditionDefinition>,
    order: Vec<String>,
    facts: HashMap<String, FactRegistration>,
    fact_order: Vec<String>,
    /// Fact key -> every precondition depending on it, directly or not.
    affected: HashMap<String, Vec<String>>,
}

impl PreconditionRegistry {
    /// Create an empty, open registry.
    pub fn new() -> Self {
        Self {
            state: RegistryState::Open,
            definitions: HashMap::new(),
            order: Vec::new(),
            facts: HashMap::new(),
            fact_order: Vec::new(),
            affected: HashMap::new(),
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == RegistryState::Frozen
    }

    /// Register a precondition.
    ///
    /// Fails with `DuplicateName` if the name is taken and `RegistryFrozen`
    /// after [`freeze`](Self::freeze). A failed call leaves the registry
    /// unchanged.
    pub fn register(&mut self, definition: PreconditionDefinition) -> Result<()> {
        if self.is_frozen() {
            return Err(PreconditionError::RegistryFrozen {
                name: definition.name().to_string(),
            });
        }
        if self.definitions.contains_key(definition.name()) {
            return Err(PreconditionError::DuplicateName {
                name: definition.name().to_string(),
            });
        }

        tracing::debug!(
            name = definition.name(),
            facts = ?definition.facts(),
            requires = ?definition.requires(),
            "Registered precondition"
        );
        self.order.push(definition.name().to_string());
        self.definitions
            .insert(definition.name().to_string(), definition);
        Ok(())
    }

    /// Register a fact provider under `key`, failing loudly on probe errors.
    pub fn register_fact(
        &mut self,
        key: impl Into<String>,
        provider: Arc<dyn FactProvider>,
    ) -> Result<()> {
        self.register_fact_with_policy(key, provider, ProbeFailurePolicy::Propagate)
    }

    /// Register a fact provider with an explicit probe-failure policy.
    pub fn register_fact_with_policy(
        &mut self,
        key: impl Into<String>,
        provider: Arc<dyn FactProvider>,
        on_failure: ProbeFailurePolicy,
    ) -> Result<()> {
        let key = key.into();
        if self.is_frozen() {
            return Err(PreconditionError::RegistryFrozen { name: key });
        }
        if self.facts.contains_key(&key) {
            return Err(PreconditionError::DuplicateFact { key });
        }

        tracing::debug!(key = %key, provider = %provider.describe(), ?on_failure, "Registered fact");
        self.fact_order.push(key.clone());
        self.facts.insert(
            key.clone(),
            FactRegistration {
                key,
                provider,
                on_failure,
            },
        );
        Ok(())
    }

    /// Validate references, reject cycles, and make the registry read-only.
    ///
    /// Freezing an already frozen registry is a no-op. On error the
    /// registry stays open and must not be queried.
    pub fn freeze(&mut self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }

        for name in &self.order {
            let def = &self.definitions[name];
            if let Some(fact) = def.facts().iter().find(|f| !self.facts.contains_key(*f)) {
                return Err(PreconditionError::UnknownFact {
                    precondition: name.clone(),
                    fact: fact.clone(),
                });
            }
            if let Some(missing) = def
                .requires()
                .iter()
                .find(|r| !self.definitions.contains_key(*r))
            {
                tracing::error!(precondition = %name, requires = %missing, "Unknown required precondition");
                return Err(PreconditionError::UnknownPrecondition {
                    name: missing.clone(),
                });
            }
        }

        let edges: HashMap<&str, &[String]> = self
            .definitions
            .iter()
            .map(|(name, def)| (name.as_str(), def.requires()))
            .collect();
        if let Some(cycle) = graph::find_cycle(&self.order, &edges) {
            return Err(PreconditionError::CyclicDependency {
                cycle: cycle.join(" -> "),
            });
        }

        self.affected = self.compute_affected();
        self.state = RegistryState::Frozen;

        tracing::info!(
            preconditions = self.order.len(),
            facts = self.fact_order.len(),
            "Precondition registry frozen"
        );
        Ok(())
    }

    fn compute_affected(&self) -> HashMap<String, Vec<String>> {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut direct: HashMap<&str, Vec<String>> = HashMap::new();
        for name in &self.order {
            let def = &self.definitions[name];
            for required in def.requires() {
                dependents
                    .entry(required.clone())
                    .or_default()
                    .push(name.clone());
            }
            for fact in def.facts() {
                direct.entry(fact.as_str()).or_default().push(name.clone());
            }
        }

        self.fact_order
            .iter()
            .map(|key| {
                let roots = direct.get(key.as_str()).cloned().unwrap_or_default();
                let closure = graph::transitive_closure(&roots, &dependents);
                let ordered: Vec<String> = self
                    .order
                    .iter()
                    .filter(|n| closure.contains(*n))
                    .cloned()
                    .collect();
                (key.clone(), ordered)
            })
            .collect()
    }

    /// Look up a precondition by name.
    pub fn lookup(&self, name: &str) -> Result<&PreconditionDefinition> {
        self.definitions
            .get(name)
            .ok_or_else(|| PreconditionError::UnknownPrecondition {
                name: name.to_string(),
            })
    }

    /// Look up a fact registration by key.
    pub fn fact(&self, key: &str) -> Option<&FactRegistration> {
        self.facts.get(key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn contains_fact(&self, key: &str) -> bool {
        self.facts.contains_key(key)
    }

    /// All precondition names in registration order.
    pub fn list_all(&self) -> &[String] {
        &self.order
    }

    /// All fact keys in registration order.
    pub fn list_facts(&self) -> &[String] {
        &self.fact_order
    }

    /// Preconditions whose results depend on `key`, in registration order.
    ///
    /// Empty until the registry is frozen.
    pub fn affected_by_fact(&self, key: &str) -> &[String] {
        self.affected.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for PreconditionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
