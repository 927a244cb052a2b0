//! Registers configuration-declared preconditions.
//!
//! Leaf checks get a backing fact keyed `config.<NAME>`; composite checks
//! combine other preconditions, built-in or configured.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{CustomCheck, CustomPrecondition, PreconditionsConfig};
use crate::error::Result;
use crate::facts::builtin::{CommandSucceeds, EnvVar, ExecutableOnPath, FileExists, TcpReachable};
use crate::facts::{FactProvider, ProbeFailurePolicy};
use crate::registry::{Contributor, PreconditionDefinition, PreconditionRegistry};

/// Fact key backing a configured leaf precondition.
pub fn fact_key(name: &str) -> String {
    format!("config.{}", name)
}

/// Contributes every precondition in a [`PreconditionsConfig`].
#[derive(Debug, Clone)]
pub struct ConfigContributor {
    config: PreconditionsConfig,
    project_root: PathBuf,
}

impl ConfigContributor {
    pub fn new(config: PreconditionsConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
        }
    }

    fn register_one(
        &self,
        registry: &mut PreconditionRegistry,
        name: &str,
        declared: &CustomPrecondition,
    ) -> Result<()> {
        let settings = &self.config.settings;
        let mut leaf = |provider: Arc<dyn FactProvider>| -> Result<PreconditionDefinition> {
            let key = fact_key(name);
            registry.register_fact_with_policy(&key, provider, declared.on_failure)?;
            Ok(PreconditionDefinition::fact_is_true(name, key))
        };

        let definition = match &declared.check {
            CustomCheck::CommandSucceeds {
                command,
                timeout_secs,
            } => {
                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| settings.probe_timeout());
                leaf(Arc::new(
                    CommandSucceeds::new(command.clone())
                        .with_timeout(timeout)
                        .in_dir(&self.project_root),
                ))?
            }
            CustomCheck::FileExists { path } => {
                leaf(Arc::new(FileExists::new(path).relative_to(&self.project_root)))?
            }
            CustomCheck::EnvVarSet { name: var } => leaf(Arc::new(EnvVar::new(var.clone())))?,
            CustomCheck::ExecutableOnPath { name: tool } => {
                leaf(Arc::new(ExecutableOnPath::new(tool.clone())))?
            }
            CustomCheck::TcpReachable {
                targets,
                timeout_ms,
            } => {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| settings.network_timeout());
                leaf(Arc::new(TcpReachable::new(targets.clone()).with_timeout(timeout)))?
            }
            CustomCheck::AllOf { preconditions } => {
                PreconditionDefinition::all_of(name, preconditions.iter().cloned())
            }
            CustomCheck::AnyOf { preconditions } => {
                PreconditionDefinition::any_of(name, preconditions.iter().cloned())
            }
            CustomCheck::Not { precondition } => {
                PreconditionDefinition::not(name, precondition.clone())
            }
        };

        if !declared.check.is_leaf() && declared.on_failure != ProbeFailurePolicy::Propagate {
            tracing::warn!(name, "on_failure has no effect on composite checks");
        }

        let definition = match &declared.description {
            Some(description) => definition.with_description(description.clone()),
            None => definition,
        };
        registry.register(definition)
    }
}

impl Contributor for ConfigContributor {
    fn name(&self) -> &str {
        "config"
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        for (name, declared) in &self.config.preconditions {
            self.register_one(registry, name, declared)?;
        }
        Ok(())
    }
}
