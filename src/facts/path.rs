//! PATH parsing and executable lookup.

use std::path::{Path, PathBuf};

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Elsewhere executability follows the file extension.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "exe" | "cmd" | "bat" | "com"))
}

/// First executable named `tool` in `path_entries`, in PATH order.
pub fn resolve_tool_path(tool: &str, path_entries: &[PathBuf]) -> Option<PathBuf> {
    for dir in path_entries {
        for name in candidate_names(tool) {
            let candidate = dir.join(&name);
            if candidate.is_file() && is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Parse the system PATH environment variable into a list of directories.
pub fn parse_system_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default()
}

fn candidate_names(tool: &str) -> Vec<String> {
    if cfg!(windows) && Path::new(tool).extension().is_none() {
        vec![format!("{}.exe", tool), format!("{}.cmd", tool), tool.to_string()]
    } else {
        vec![tool.to_string()]
    }
}
