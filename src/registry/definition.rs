//! Precondition definitions and predicates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::facts::{FactValue, Version};

/// Signature of a custom predicate.
pub type PredicateFn = Arc<dyn Fn(&PredicateInputs<'_>) -> Result<bool, String> + Send + Sync>;

/// Resolved inputs handed to a predicate.
///
/// Only the facts and preconditions the definition declared are present.
pub struct PredicateInputs<'a> {
    facts: &'a HashMap<String, FactValue>,
    preconditions: &'a HashMap<String, bool>,
}

impl<'a> PredicateInputs<'a> {
    pub(crate) fn new(
        facts: &'a HashMap<String, FactValue>,
        preconditions: &'a HashMap<String, bool>,
    ) -> Self {
        Self {
            facts,
            preconditions,
        }
    }

    /// A declared fact's value.
    pub fn fact(&self, key: &str) -> Result<&FactValue, String> {
        self.facts
            .get(key)
            .ok_or_else(|| format!("fact '{}' was not declared", key))
    }

    /// A declared fact as a version, `None` if it is absent.
    pub fn version(&self, key: &str) -> Result<Option<&Version>, String> {
        match self.fact(key)? {
            FactValue::Version(v) => Ok(Some(v)),
            FactValue::Absent => Ok(None),
            other => Err(format!("fact '{}' is not a version: {}", key, other)),
        }
    }

    /// A declared fact as text, `None` if it is absent.
    pub fn text(&self, key: &str) -> Result<Option<&str>, String> {
        match self.fact(key)? {
            FactValue::Text(s) => Ok(Some(s)),
            FactValue::Absent => Ok(None),
            other => Err(format!("fact '{}' is not text: {}", key, other)),
        }
    }

    /// A required precondition's result.
    pub fn precondition(&self, name: &str) -> Result<bool, String> {
        self.preconditions
            .get(name)
            .copied()
            .ok_or_else(|| format!("precondition '{}' was not declared", name))
    }
}

/// How a definition turns its inputs into a boolean.
#[derive(Clone)]
pub enum Predicate {
    /// Truthiness of a single fact.
    FactIsTrue(String),
    /// Every required precondition holds.
    AllOf,
    /// At least one required precondition holds.
    AnyOf,
    /// The single required precondition does not hold.
    Not,
    /// Arbitrary logic over the declared inputs.
    Custom(PredicateFn),
}

impl Predicate {
    pub(crate) fn apply(&self, inputs: &PredicateInputs<'_>, requires: &[String]) -> Result<bool, String> {
        match self {
            Predicate::FactIsTrue(key) => Ok(inputs.fact(key)?.is_truthy()),
            Predicate::AllOf => {
                for name in requires {
                    if !inputs.precondition(name)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::AnyOf => {
                for name in requires {
                    if inputs.precondition(name)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not => match requires {
                [only] => Ok(!inputs.precondition(only)?),
                _ => Err(format!(
                    "negation needs exactly one precondition, got {}",
                    requires.len()
                )),
            },
            Predicate::Custom(f) => f(inputs),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Predicate::FactIsTrue(_) => "fact",
            Predicate::AllOf => "all_of",
            Predicate::AnyOf => "any_of",
            Predicate::Not => "not",
            Predicate::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::FactIsTrue(key) => f.debug_tuple("FactIsTrue").field(key).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// A named, side-effect-free boolean predicate over facts and other
/// preconditions.
///
/// The declared fact keys and required preconditions are the complete input
/// set: they drive cycle detection, invalidation and diagnostics.
///
/// ```
/// use preconditions::registry::PreconditionDefinition;
///
/// let def = PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe")
///     .with_description("Docker daemon is reachable");
/// assert_eq!(def.name(), "HAS_DOCKER");
/// assert_eq!(def.facts(), ["docker_probe".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct PreconditionDefinition {
    name: String,
    description: Option<String>,
    facts: Vec<String>,
    requires: Vec<String>,
    predicate: Predicate,
}

impl PreconditionDefinition {
    /// Satisfied when the fact is truthy.
    pub fn fact_is_true(name: impl Into<String>, fact: impl Into<String>) -> Self {
        let fact = fact.into();
        Self {
            name: name.into(),
            description: None,
            facts: vec![fact.clone()],
            requires: Vec::new(),
            predicate: Predicate::FactIsTrue(fact),
        }
    }

    /// Custom logic over the listed facts.
    pub fn custom<I, S, F>(name: impl Into<String>, facts: I, predicate: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&PredicateInputs<'_>) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            facts: facts.into_iter().map(Into::into).collect(),
            requires: Vec::new(),
            predicate: Predicate::Custom(Arc::new(predicate)),
        }
    }

    /// Satisfied when every listed precondition is.
    pub fn all_of<I, S>(name: impl Into<String>, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::composite(name, requires, Predicate::AllOf)
    }

    /// Satisfied when any listed precondition is.
    pub fn any_of<I, S>(name: impl Into<String>, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::composite(name, requires, Predicate::AnyOf)
    }

    /// Satisfied when `other` is not.
    pub fn not(name: impl Into<String>, other: impl Into<String>) -> Self {
        Self::composite(name, [other.into()], Predicate::Not)
    }

    fn composite<I, S>(name: impl Into<String>, requires: I, predicate: Predicate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: None,
            facts: Vec::new(),
            requires: requires.into_iter().map(Into::into).collect(),
            predicate,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}
