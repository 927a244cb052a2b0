//! Configuration file discovery and loading.
//!
//! Configuration is optional: a project without a `.preconditions`
//! directory gets the built-in preconditions and default settings.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::PreconditionsConfig;
use crate::error::{PreconditionError, Result};

/// Directory holding project configuration.
pub const CONFIG_DIR: &str = ".preconditions";

/// Paths to configuration files in priority order (later overrides earlier).
///
/// Merge order:
/// 1. Project config (`.preconditions/config.yml`)
/// 2. Local overrides (`.preconditions/config.local.yml`)
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project config: .preconditions/config.yml
    pub project: Option<PathBuf>,

    /// Local overrides: .preconditions/config.local.yml
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        Self {
            project: existing(project_root.join(CONFIG_DIR).join("config.yml")),
            project_local: existing(project_root.join(CONFIG_DIR).join("config.local.yml")),
        }
    }

    /// Returns all existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.project.iter().chain(self.project_local.iter()).collect()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Find the project root by walking up from `start`.
///
/// A `.preconditions` directory marks the root; a `.git` entry is the
/// fallback.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir() {
            return Some(current);
        }

        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a single config file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<PreconditionsConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PreconditionError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PreconditionError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content; `source_path` is used for error reporting.
pub fn parse_config(content: &str, source_path: &Path) -> Result<PreconditionsConfig> {
    // An empty file is a valid, empty config.
    if content.trim().is_empty() {
        return Ok(PreconditionsConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| PreconditionError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and merge the project config and its local overrides.
///
/// Missing files are skipped; with neither present the default config is
/// returned.
pub fn load_merged_config(project_root: &Path) -> Result<PreconditionsConfig> {
    let paths = ConfigPaths::discover(project_root);
    let mut config = PreconditionsConfig::default();

    for path in paths.all_existing() {
        tracing::debug!(path = %path.display(), "Loading config file");
        config.merge(load_config_file(path)?);
    }

    Ok(config)
}

/// Load configuration from an explicit file, or discover it under
/// `project_root`.
pub fn load_config(explicit: Option<&Path>, project_root: &Path) -> Result<PreconditionsConfig> {
    match explicit {
        Some(path) => load_config_file(path),
        None => load_merged_config(project_root),
    }
}
