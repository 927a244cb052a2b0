//! Configuration loading and the config-backed contributor.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Registration of configured preconditions in [`contributor`]
//!
//! # Example
//!
//! ```
//! use preconditions::config::load_merged_config;
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let dir = temp.path().join(".preconditions");
//! fs::create_dir_all(&dir).unwrap();
//! fs::write(
//!     dir.join("config.yml"),
//!     "preconditions:\n  HAS_TOKEN:\n    check: { type: env_var_set, name: TOKEN }\n",
//! )
//! .unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! assert!(config.preconditions.contains_key("HAS_TOKEN"));
//! ```
//!
//! # Configuration File Locations
//!
//! 1. Project config (`.preconditions/config.yml`)
//! 2. Local overrides (`.preconditions/config.local.yml`)
//!
//! `--config PATH` replaces discovery with a single file.

pub mod contributor;
pub mod loader;
pub mod schema;

pub use contributor::{fact_key, ConfigContributor};
pub use loader::{
    find_project_root, load_config, load_config_file, load_merged_config, parse_config,
    ConfigPaths, CONFIG_DIR,
};
pub use schema::{CustomCheck, CustomPrecondition, PreconditionsConfig, Settings};
