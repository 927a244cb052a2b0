//! Network reachability.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::facts::builtin::TcpReachable;
use crate::registry::{Contributor, PreconditionDefinition, PreconditionRegistry};

pub const NETWORK_ONLINE: &str = "network.online";

/// Registers `ONLINE` and `OFFLINE`.
///
/// A host is online when any of the configured targets accepts a TCP
/// connection within the timeout.
#[derive(Debug, Clone)]
pub struct NetworkContributor {
    targets: Vec<String>,
    timeout: Duration,
}

impl NetworkContributor {
    pub fn new(targets: Vec<String>, timeout: Duration) -> Self {
        Self { targets, timeout }
    }
}

impl Contributor for NetworkContributor {
    fn name(&self) -> &str {
        "network"
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        registry.register_fact(
            NETWORK_ONLINE,
            Arc::new(TcpReachable::new(self.targets.clone()).with_timeout(self.timeout)),
        )?;
        registry.register(
            PreconditionDefinition::fact_is_true("ONLINE", NETWORK_ONLINE)
                .with_description("The internet is reachable"),
        )?;
        registry.register(
            PreconditionDefinition::not("OFFLINE", "ONLINE")
                .with_description("The internet is not reachable"),
        )?;
        Ok(())
    }
}
