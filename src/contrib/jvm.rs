//! JDK preconditions.
//!
//! The JDK on PATH is probed once via `java -version`. Legacy version
//! strings (`1.8.0_392`) are normalized to their feature release (`8.0.0`;
//! the update suffix is dropped), so predicates can compare `major` directly.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::error::Result;
use crate::facts::builtin::{CommandVersion, EnvVar};
use crate::facts::{FactProvider, FactValue, ProbeError, Version};
use crate::registry::{Contributor, PreconditionDefinition, PreconditionRegistry};

pub const JDK_VERSION: &str = "jdk.version";
pub const JAVA_HOME: &str = "jdk.java_home";

/// Regex for the quoted version in the `java -version` banner.
static JAVA_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"version "(\d+)(?:\.(\d+))?(?:\.(\d+))?"#)
        .expect("JAVA_VERSION_REGEX must compile")
});

/// Feature releases that get a `JDK{N}_OR_LATER` precondition.
const FEATURE_RELEASES: &[u64] = &[8, 11, 17, 21, 25];

/// Version of the `java` launcher on PATH, `Absent` if there is none.
pub struct JavaVersion {
    probe: CommandVersion,
}

impl JavaVersion {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probe: CommandVersion::new("java -version")
                .with_pattern(JAVA_VERSION_REGEX.clone())
                .with_timeout(timeout),
        }
    }
}

/// Map `1.x.y` to `x.y.0`; newer schemes are returned unchanged.
pub fn feature_release(version: Version) -> Version {
    if version.major == 1 {
        Version::new(version.minor, version.patch, 0)
    } else {
        version
    }
}

impl FactProvider for JavaVersion {
    fn describe(&self) -> String {
        self.probe.describe()
    }

    fn compute(&self) -> std::result::Result<FactValue, ProbeError> {
        Ok(match self.probe.compute()? {
            FactValue::Version(v) => FactValue::Version(feature_release(v)),
            other => other,
        })
    }
}

/// Registers `HAS_JDK`, `HAS_JAVA_HOME`, `JDK{N}_OR_LATER` and
/// `JDK8_OR_EARLIER`.
pub struct JvmContributor {
    timeout: Duration,
}

impl JvmContributor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn jdk_at_least(feature: u64) -> PreconditionDefinition {
    PreconditionDefinition::custom(format!("JDK{}_OR_LATER", feature), [JDK_VERSION], move |inputs| {
        Ok(inputs
            .version(JDK_VERSION)?
            .is_some_and(|v| v.major >= feature))
    })
    .with_description(format!("A JDK {} or later is on PATH", feature))
}

impl Contributor for JvmContributor {
    fn name(&self) -> &str {
        "jvm"
    }

    fn contribute(&self, registry: &mut PreconditionRegistry) -> Result<()> {
        registry.register_fact(JDK_VERSION, Arc::new(JavaVersion::new(self.timeout)))?;
        registry.register_fact(JAVA_HOME, Arc::new(EnvVar::new("JAVA_HOME")))?;

        registry.register(
            PreconditionDefinition::fact_is_true("HAS_JDK", JDK_VERSION)
                .with_description("A `java` launcher is on PATH"),
        )?;
        registry.register(
            PreconditionDefinition::fact_is_true("HAS_JAVA_HOME", JAVA_HOME)
                .with_description("JAVA_HOME is set"),
        )?;
        for feature in FEATURE_RELEASES {
            registry.register(jdk_at_least(*feature))?;
        }
        registry.register(
            PreconditionDefinition::custom("JDK8_OR_EARLIER", [JDK_VERSION], |inputs| {
                Ok(inputs.version(JDK_VERSION)?.is_some_and(|v| v.major <= 8))
            })
            .with_description("A JDK 8 or earlier is on PATH"),
        )?;
        Ok(())
    }
}
