//! Discovery phase: contributors populate a registry, then it is frozen.
//!
//! Each module that owns preconditions exposes a [`Contributor`]. The host
//! passes the set of contributors it wants to [`PreconditionRegistry::discover`];
//! nothing needs a fixed list of contributors known in advance.

use super::PreconditionRegistry;
use crate::error::{PreconditionError, Result};

/// A module that registers facts and preconditions during discovery.
pub trait Contributor {
    /// Name used in diagnostics when the contributor fails.
    fn name(&self) -> &str;

    /// Register this contributor's facts and preconditions.
    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()>;
}

/// A contributor backed by a closure.
pub struct FnContributor<F> {
    name: String,
    register: F,
}

impl<F> Contributor for FnContributor<F>
where
    F: Fn(&mut PreconditionRegistry) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        (self.register)(registry)
    }
}

/// Build a contributor from a closure.
///
/// ```
/// use std::sync::Arc;
/// use preconditions::facts::{builtin::Constant, FactValue};
/// use preconditions::registry::{contributor, PreconditionDefinition, PreconditionRegistry};
///
/// let docker = contributor("docker", |registry| {
///     registry.register_fact("docker_probe", Arc::new(Constant(FactValue::Bool(true))))?;
///     registry.register(PreconditionDefinition::fact_is_true("HAS_DOCKER", "docker_probe"))
/// });
///
/// let registry = PreconditionRegistry::discover(&[&docker]).unwrap();
/// assert!(registry.is_frozen());
/// assert_eq!(registry.list_all(), ["HAS_DOCKER"]);
/// ```
pub fn contributor<F>(name: impl Into<String>, register: F) -> FnContributor<F>
where
    F: Fn(&mut PreconditionRegistry) -> Result<()>,
{
    FnContributor {
        name: name.into(),
        register,
    }
}

impl PreconditionRegistry {
    /// Run every contributor in order, then freeze.
    ///
    /// Any failure aborts discovery: a misconfigured registry must not
    /// silently drop a precondition.
    pub fn discover(contributors: &[&dyn Contributor]) -> Result<Self> {
        let mut registry = Self::new();
        for contributor in contributors {
            let before = registry.len();
            contributor
                .contribute(&mut registry)
                .map_err(|e| PreconditionError::Contributor {
                    contributor: contributor.name().to_string(),
                    source: Box::new(e),
                })?;
            tracing::debug!(
                contributor = contributor.name(),
                added = registry.len() - before,
                "Contributor registered preconditions"
            );
        }
        registry.freeze()?;
        Ok(registry)
    }
}
