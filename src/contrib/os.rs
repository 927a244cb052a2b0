//! Operating system preconditions.

use std::sync::Arc;

use crate::error::Result;
use crate::facts::builtin::{Arch, OsFamily};
use crate::registry::{Contributor, PreconditionDefinition, PreconditionRegistry};

pub const OS_FAMILY: &str = "os.family";
pub const OS_ARCH: &str = "os.arch";

/// Registers `WINDOWS`, `LINUX`, `MAC_OS`, their negations,
/// `UNIX_DERIVATIVE` and `ARM64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsContributor;

fn os_is(name: &str, family: &'static str) -> PreconditionDefinition {
    PreconditionDefinition::custom(name, [OS_FAMILY], move |inputs| {
        Ok(inputs.text(OS_FAMILY)? == Some(family))
    })
    .with_description(format!("Running on {}", family))
}

impl Contributor for OsContributor {
    fn name(&self) -> &str {
        "os"
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        registry.register_fact(OS_FAMILY, Arc::new(OsFamily))?;
        registry.register_fact(OS_ARCH, Arc::new(Arch))?;

        registry.register(os_is("WINDOWS", "windows"))?;
        registry.register(PreconditionDefinition::not("NOT_WINDOWS", "WINDOWS"))?;
        registry.register(os_is("MAC_OS", "macos"))?;
        registry.register(PreconditionDefinition::not("NOT_MAC_OS", "MAC_OS"))?;
        registry.register(os_is("LINUX", "linux"))?;
        registry.register(
            PreconditionDefinition::custom("UNIX_DERIVATIVE", [OS_FAMILY], |inputs| {
                Ok(!matches!(inputs.text(OS_FAMILY)?, Some("windows") | None))
            })
            .with_description("Running on a Unix-like system"),
        )?;
        registry.register(
            PreconditionDefinition::custom("ARM64", [OS_ARCH], |inputs| {
                Ok(inputs.text(OS_ARCH)? == Some("aarch64"))
            })
            .with_description("Running on a 64-bit ARM CPU"),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvaluationCache;

    fn cache() -> EvaluationCache {
        let registry = PreconditionRegistry::discover(&[&OsContributor]).unwrap();
        EvaluationCache::new(Arc::new(registry)).unwrap()
    }

    #[test]
    fn exactly_one_of_windows_and_not_windows_holds() {
        let cache = cache();
        let windows = cache.evaluate("WINDOWS").unwrap();
        let not_windows = cache.evaluate("NOT_WINDOWS").unwrap();
        assert_ne!(windows, not_windows);
        assert_eq!(windows, cfg!(windows));
    }

    #[test]
    fn unix_derivative_matches_target() {
        assert_eq!(cache().evaluate("UNIX_DERIVATIVE").unwrap(), cfg!(unix));
    }

    #[test]
    fn linux_and_mac_match_target() {
        let cache = cache();
        assert_eq!(cache.evaluate("LINUX").unwrap(), cfg!(target_os = "linux"));
        assert_eq!(cache.evaluate("MAC_OS").unwrap(), cfg!(target_os = "macos"));
        assert_eq!(cache.evaluate("NOT_MAC_OS").unwrap(), !cfg!(target_os = "macos"));
    }

    #[test]
    fn platform_facts_probe_once() {
        let cache = cache();
        for name in ["WINDOWS", "NOT_WINDOWS", "LINUX", "MAC_OS", "UNIX_DERIVATIVE"] {
            cache.evaluate(name).unwrap();
        }
        assert_eq!(cache.probes_run(), 1);
    }
}
