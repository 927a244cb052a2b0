//! Built-in precondition contributors.
//!
//! Each submodule owns one family of environment facts and the
//! preconditions built on them. Hosts pick which contributors take part in
//! discovery; [`builtin_contributors`] returns the stock set.
//!
//! - [`os`] - Operating system family and CPU architecture
//! - [`jvm`] - JDK availability and feature release
//! - [`network`] - Internet reachability
//! - [`tools`] - Docker, git and CI detection

pub mod jvm;
pub mod network;
pub mod os;
pub mod tools;

use std::time::Duration;

use crate::config::Settings;
use crate::registry::Contributor;

pub use jvm::JvmContributor;
pub use network::NetworkContributor;
pub use os::OsContributor;
pub use tools::ToolsContributor;

/// The stock contributors, configured from `settings`.
pub fn builtin_contributors(settings: &Settings) -> Vec<Box<dyn Contributor>> {
    let timeout: Duration = settings.probe_timeout();
    vec![
        Box::new(OsContributor),
        Box::new(JvmContributor::new(timeout)),
        Box::new(NetworkContributor::new(
            settings.network_targets(),
            settings.network_timeout(),
        )),
        Box::new(ToolsContributor::new(timeout)),
    ]
}
