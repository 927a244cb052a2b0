//! Developer tooling and CI detection.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::facts::builtin::{CommandSucceeds, EnvVar, ExecutableOnPath};
use crate::facts::ProbeFailurePolicy;
use crate::registry::{Contributor, PreconditionDefinition, PreconditionRegistry};

pub const DOCKER_DAEMON: &str = "docker.daemon";
pub const GIT_ON_PATH: &str = "git.on_path";
pub const CI_ENV: &str = "env.ci";

/// Registers `HAS_DOCKER`, `HAS_GIT`, `CI` and `NOT_CI`.
///
/// The Docker probe asks the daemon for its info, so a stopped daemon or a
/// missing CLI both read as "no Docker". Probe failures there count as false.
#[derive(Debug, Clone)]
pub struct ToolsContributor {
    timeout: Duration,
}

impl ToolsContributor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Contributor for ToolsContributor {
    fn name(&self) -> &str {
        "tools"
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        registry.register_fact_with_policy(
            DOCKER_DAEMON,
            Arc::new(CommandSucceeds::new("docker info").with_timeout(self.timeout)),
            ProbeFailurePolicy::AssumeFalse,
        )?;
        registry.register_fact(GIT_ON_PATH, Arc::new(ExecutableOnPath::new("git")))?;
        registry.register_fact(CI_ENV, Arc::new(EnvVar::new("CI")))?;

        registry.register(
            PreconditionDefinition::fact_is_true("HAS_DOCKER", DOCKER_DAEMON)
                .with_description("A Docker daemon is reachable"),
        )?;
        registry.register(
            PreconditionDefinition::fact_is_true("HAS_GIT", GIT_ON_PATH)
                .with_description("`git` is on PATH"),
        )?;
        registry.register(
            PreconditionDefinition::custom("CI", [CI_ENV], |inputs| {
                Ok(match inputs.text(CI_ENV)? {
                    Some(value) => !matches!(value.trim(), "" | "0" | "false"),
                    None => false,
                })
            })
            .with_description("Running under continuous integration"),
        )?;
        registry.register(PreconditionDefinition::not("NOT_CI", "CI"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvaluationCache;

    #[test]
    fn registers_tool_preconditions() {
        let contributor = ToolsContributor::new(Duration::from_secs(1));
        let registry = PreconditionRegistry::discover(&[&contributor]).unwrap();

        for name in ["HAS_DOCKER", "HAS_GIT", "CI", "NOT_CI"] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert_eq!(
            registry.fact(DOCKER_DAEMON).unwrap().on_failure,
            ProbeFailurePolicy::AssumeFalse
        );
    }

    #[test]
    fn ci_and_not_ci_are_complementary() {
        let contributor = ToolsContributor::new(Duration::from_secs(1));
        let registry = PreconditionRegistry::discover(&[&contributor]).unwrap();
        let cache = EvaluationCache::new(Arc::new(registry)).unwrap();

        assert_ne!(cache.evaluate("CI").unwrap(), cache.evaluate("NOT_CI").unwrap());
    }
}
