//! Stock fact providers.
//!
//! Each provider probes one kind of environment property. Subprocess and
//! network probes carry their own time budget and report overruns as
//! [`ProbeError::Timeout`] rather than blocking a session indefinitely.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use regex::Regex;

use super::command::{self, CommandOptions};
use super::path::{parse_system_path, resolve_tool_path};
use super::{FactProvider, FactValue, ProbeError, Version};

/// `Bool(true)` when a shell command exits 0.
#[derive(Debug, Clone)]
pub struct CommandSucceeds {
    command: String,
    options: CommandOptions,
}

impl CommandSucceeds {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: CommandOptions::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(cwd.into());
        self
    }
}

impl FactProvider for CommandSucceeds {
    fn describe(&self) -> String {
        format!("`{}` succeeds", self.command)
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        let output = command::run(&self.command, &self.options)?;
        Ok(FactValue::Bool(output.success))
    }
}

/// Version reported by a command, or `Absent` if the command fails.
///
/// The version is searched in stdout followed by stderr.
#[derive(Debug, Clone)]
pub struct CommandVersion {
    command: String,
    pattern: Option<Regex>,
    options: CommandOptions,
}

impl CommandVersion {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            pattern: None,
            options: CommandOptions::default(),
        }
    }

    /// Use a custom pattern; groups 1-3 are major, minor and patch.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }
}

impl FactProvider for CommandVersion {
    fn describe(&self) -> String {
        format!("version reported by `{}`", self.command)
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        let output = command::run(&self.command, &self.options)?;
        if !output.success {
            return Ok(FactValue::Absent);
        }

        let text = output.combined();
        let version = match &self.pattern {
            Some(pattern) => Version::from_captures(pattern, &text),
            None => Version::find_in(&text),
        };

        version.map(FactValue::Version).ok_or_else(|| ProbeError::Parse {
            command: self.command.clone(),
            message: format!("no version found in {:?}", text.trim()),
        })
    }
}

/// `Bool(true)` when a tool resolves to an executable on PATH.
#[derive(Debug, Clone)]
pub struct ExecutableOnPath {
    tool: String,
    path_entries: Option<Vec<PathBuf>>,
}

impl ExecutableOnPath {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            path_entries: None,
        }
    }

    /// Search these directories instead of the process PATH.
    pub fn with_path(mut self, entries: Vec<PathBuf>) -> Self {
        self.path_entries = Some(entries);
        self
    }
}

impl FactProvider for ExecutableOnPath {
    fn describe(&self) -> String {
        format!("`{}` is on PATH", self.tool)
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        let found = match &self.path_entries {
            Some(entries) => resolve_tool_path(&self.tool, entries),
            None => resolve_tool_path(&self.tool, &parse_system_path()),
        };
        Ok(FactValue::Bool(found.is_some()))
    }
}

/// `Bool(true)` when a file or directory exists.
#[derive(Debug, Clone)]
pub struct FileExists {
    path: PathBuf,
    base: Option<PathBuf>,
}

impl FileExists {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: None,
        }
    }

    /// Resolve relative paths against `base` instead of the working directory.
    pub fn relative_to(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    fn resolved(&self) -> PathBuf {
        match &self.base {
            Some(base) if !self.path.is_absolute() => base.join(&self.path),
            _ => self.path.clone(),
        }
    }
}

impl FactProvider for FileExists {
    fn describe(&self) -> String {
        format!("{} exists", self.path.display())
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        Ok(FactValue::Bool(Path::new(&self.resolved()).exists()))
    }
}

/// Value of an environment variable, `Absent` when unset.
#[derive(Debug, Clone)]
pub struct EnvVar {
    name: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl FactProvider for EnvVar {
    fn describe(&self) -> String {
        format!("${}", self.name)
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        match std::env::var(&self.name) {
            Ok(value) => Ok(FactValue::Text(value)),
            Err(std::env::VarError::NotPresent) => Ok(FactValue::Absent),
            Err(std::env::VarError::NotUnicode(_)) => Err(ProbeError::Unavailable {
                message: format!("${} is not valid unicode", self.name),
            }),
        }
    }
}

/// `Bool(true)` when any target accepts a TCP connection within the timeout.
///
/// Host names are resolved under the same timeout; a target whose lookup
/// overruns counts as unreachable.
#[derive(Debug, Clone)]
pub struct TcpReachable {
    targets: Vec<String>,
    timeout: Duration,
}

/// Well-known anycast resolvers used for the default online check.
pub const DEFAULT_NETWORK_TARGETS: &[&str] = &["1.1.1.1:443", "8.8.8.8:443", "9.9.9.9:443"];

impl TcpReachable {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn addresses(&self, target: &str) -> Vec<SocketAddr> {
        let owned = target.to_string();
        let lookup = within(self.timeout, move || {
            owned.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>())
        });
        match lookup {
            Some(Ok(addrs)) => addrs,
            Some(Err(e)) => {
                tracing::debug!(target, error = %e, "Could not resolve network target");
                Vec::new()
            }
            None => {
                tracing::debug!(target, timeout = ?self.timeout, "Resolving network target timed out");
                Vec::new()
            }
        }
    }
}

impl FactProvider for TcpReachable {
    fn describe(&self) -> String {
        format!("TCP connect to any of {}", self.targets.join(", "))
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        for target in &self.targets {
            for addr in self.addresses(target) {
                if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                    return Ok(FactValue::Bool(true));
                }
            }
        }
        Ok(FactValue::Bool(false))
    }
}

/// Run `work` on a helper thread, giving up after `timeout`.
///
/// An abandoned thread runs to completion in the background.
fn within<T, F>(timeout: Duration, work: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx.recv_timeout(timeout).ok()
}

/// Operating system family of the current build target.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFamily;

impl FactProvider for OsFamily {
    fn describe(&self) -> String {
        "operating system".to_string()
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        Ok(FactValue::Text(std::env::consts::OS.to_string()))
    }
}

/// CPU architecture of the current build target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arch;

impl FactProvider for Arch {
    fn describe(&self) -> String {
        "CPU architecture".to_string()
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        Ok(FactValue::Text(std::env::consts::ARCH.to_string()))
    }
}

/// A fixed value.
#[derive(Debug, Clone)]
pub struct Constant(pub FactValue);

impl FactProvider for Constant {
    fn describe(&self) -> String {
        format!("constant {}", self.0)
    }

    fn compute(&self) -> Result<FactValue, ProbeError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn command_succeeds_reports_exit_status() {
        assert_eq!(
            CommandSucceeds::new("true").compute().unwrap(),
            FactValue::Bool(true)
        );
        assert_eq!(
            CommandSucceeds::new("false").compute().unwrap(),
            FactValue::Bool(false)
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_succeeds_times_out() {
        let provider = CommandSucceeds::new("sleep 5").with_timeout(Duration::from_millis(50));
        assert!(matches!(
            provider.compute(),
            Err(ProbeError::Timeout { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_version_parses_stderr() {
        let provider = CommandVersion::new("echo 'openjdk version \"21.0.1\"' >&2");
        assert_eq!(
            provider.compute().unwrap(),
            FactValue::Version(Version::new(21, 0, 1))
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_version_absent_on_failure() {
        let provider = CommandVersion::new("exit 127");
        assert_eq!(provider.compute().unwrap(), FactValue::Absent);
    }

    #[cfg(unix)]
    #[test]
    fn command_version_without_digits_is_parse_error() {
        let provider = CommandVersion::new("echo unknown");
        assert!(matches!(provider.compute(), Err(ProbeError::Parse { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn command_version_uses_custom_pattern() {
        let pattern = Regex::new(r"build (\d+)").unwrap();
        let provider = CommandVersion::new("echo 'tool 1.2 build 345'").with_pattern(pattern);
        assert_eq!(
            provider.compute().unwrap(),
            FactValue::Version(Version::new(345, 0, 0))
        );
    }

    #[test]
    fn file_exists_resolves_relative_to_base() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("gradle.properties"), "").unwrap();

        let present = FileExists::new("gradle.properties").relative_to(temp.path());
        let missing = FileExists::new("settings.gradle").relative_to(temp.path());

        assert_eq!(present.compute().unwrap(), FactValue::Bool(true));
        assert_eq!(missing.compute().unwrap(), FactValue::Bool(false));
    }

    #[test]
    fn env_var_absent_when_unset() {
        let provider = EnvVar::new("PRECONDITIONS_TEST_SURELY_UNSET_VAR");
        assert_eq!(provider.compute().unwrap(), FactValue::Absent);
    }

    #[test]
    fn env_var_reads_value() {
        let provider = EnvVar::new("PATH");
        assert!(matches!(provider.compute().unwrap(), FactValue::Text(_)));
    }

    #[test]
    fn tcp_reachable_connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let provider = TcpReachable::new([addr.to_string()]);
        assert_eq!(provider.compute().unwrap(), FactValue::Bool(true));
    }

    #[test]
    fn tcp_reachable_false_for_unresolvable_target() {
        let provider = TcpReachable::new(["not a socket address"]);
        assert_eq!(provider.compute().unwrap(), FactValue::Bool(false));
    }

    #[test]
    fn within_gives_up_on_slow_work() {
        let start = std::time::Instant::now();
        let slow = within(Duration::from_millis(100), || {
            thread::sleep(Duration::from_secs(3));
            1
        });

        assert_eq!(slow, None);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(within(Duration::from_secs(2), || 7), Some(7));
    }

    #[test]
    fn platform_facts_are_text() {
        assert_eq!(
            OsFamily.compute().unwrap(),
            FactValue::Text(std::env::consts::OS.to_string())
        );
        assert!(matches!(Arch.compute().unwrap(), FactValue::Text(_)));
    }

    #[test]
    fn executable_on_path_uses_given_entries() {
        let temp = TempDir::new().unwrap();
        let provider = ExecutableOnPath::new("no-such-tool").with_path(vec![temp.path().into()]);
        assert_eq!(provider.compute().unwrap(), FactValue::Bool(false));
    }
}
