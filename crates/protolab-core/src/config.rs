use crate::error::Result;
use crate::paths;
use crate::registry::{duplicate_ports, PrototypeRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the controller binds. Anything beyond loopback lets other
    /// hosts start processes and kill whatever owns a port.
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl ServerConfig {
    pub fn is_loopback(&self) -> bool {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        host.eq_ignore_ascii_case("localhost")
            || host
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// LauncherConfig
// ---------------------------------------------------------------------------

/// How a prototype's own dev server is started.
///
/// The command is explicit (`npm run dev`) rather than relying on whatever
/// default start script the package manager would pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// File that must exist in the prototype directory before launching.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,
    /// Delay after spawning before the start request answers.
    #[serde(default = "default_spawn_grace_ms")]
    pub spawn_grace_ms: u64,
}

fn default_program() -> String {
    if cfg!(target_os = "windows") {
        "npm.cmd".to_string()
    } else {
        "npm".to_string()
    }
}

fn default_args() -> Vec<String> {
    vec!["run".to_string(), "dev".to_string()]
}

fn default_descriptor() -> String {
    "package.json".to_string()
}

fn default_spawn_grace_ms() -> u64 {
    1000
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            descriptor: default_descriptor(),
            spawn_grace_ms: default_spawn_grace_ms(),
        }
    }
}

impl LauncherConfig {
    pub fn spawn_grace(&self) -> Duration {
        Duration::from_millis(self.spawn_grace_ms)
    }
}

// ---------------------------------------------------------------------------
// ProbeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_host() -> String {
    "localhost".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// PollerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_normal_interval_ms")]
    pub normal_interval_ms: u64,
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,
    #[serde(default = "default_max_fast_attempts")]
    pub max_fast_attempts: u32,
}

fn default_normal_interval_ms() -> u64 {
    3000
}

fn default_fast_interval_ms() -> u64 {
    500
}

fn default_max_fast_attempts() -> u32 {
    20
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            normal_interval_ms: default_normal_interval_ms(),
            fast_interval_ms: default_fast_interval_ms(),
            max_fast_attempts: default_max_fast_attempts(),
        }
    }
}

impl PollerConfig {
    pub fn normal_interval(&self) -> Duration {
        Duration::from_millis(self.normal_interval_ms)
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// GuardConfig
// ---------------------------------------------------------------------------

/// Optional in-process collision guard for concurrent starts on one port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    10
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: default_window_secs(),
        }
    }
}

impl GuardConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub guard: GuardConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            launcher: LauncherConfig::default(),
            probe: ProbeConfig::default(),
            poller: PollerConfig::default(),
            guard: GuardConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.protolab/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::new());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, records: &[PrototypeRecord]) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.server.host.trim().is_empty() {
            push(WarnLevel::Error, "server.host is empty".to_string());
        } else if !self.server.is_loopback() {
            push(
                WarnLevel::Warning,
                format!(
                    "server.host={} exposes start/stop to other hosts on the network",
                    self.server.host
                ),
            );
        }
        if self.launcher.program.trim().is_empty() {
            push(WarnLevel::Error, "launcher.program is empty".to_string());
        }
        if self.launcher.descriptor.trim().is_empty() {
            push(WarnLevel::Error, "launcher.descriptor is empty".to_string());
        }
        if self.probe.timeout_ms == 0 {
            push(
                WarnLevel::Error,
                "probe.timeout_ms must be greater than 0".to_string(),
            );
        } else if self.probe.timeout_ms > 2000 {
            push(
                WarnLevel::Warning,
                format!(
                    "probe.timeout_ms={} will hold status requests for over 2s on filtered ports",
                    self.probe.timeout_ms
                ),
            );
        }
        if self.poller.normal_interval_ms == 0 || self.poller.fast_interval_ms == 0 {
            push(
                WarnLevel::Error,
                "poller intervals must be greater than 0".to_string(),
            );
        } else if self.poller.fast_interval_ms >= self.poller.normal_interval_ms {
            push(
                WarnLevel::Warning,
                format!(
                    "poller.fast_interval_ms ({}) is not shorter than normal_interval_ms ({})",
                    self.poller.fast_interval_ms, self.poller.normal_interval_ms
                ),
            );
        }
        if self.poller.max_fast_attempts == 0 {
            push(
                WarnLevel::Error,
                "poller.max_fast_attempts must be at least 1".to_string(),
            );
        }
        if self.guard.enabled && self.guard.window_secs == 0 {
            push(
                WarnLevel::Warning,
                "guard is enabled with window_secs=0 and will never block".to_string(),
            );
        }

        for (port, ids) in duplicate_ports(records) {
            push(
                WarnLevel::Warning,
                format!(
                    "port {port} is shared by prototypes {}; they cannot run concurrently",
                    ids.join(", ")
                ),
            );
        }
        for r in records {
            if r.port == self.server.port {
                push(
                    WarnLevel::Error,
                    format!(
                        "prototype '{}' uses port {} which is the controller's own port",
                        r.id, r.port
                    ),
                );
            }
            if !r.directory_path.is_dir() {
                push(
                    WarnLevel::Warning,
                    format!(
                        "prototype '{}': directory not found: {}",
                        r.id,
                        r.directory_path.display()
                    ),
                );
            } else if !r.directory_path.join(&self.launcher.descriptor).is_file() {
                push(
                    WarnLevel::Warning,
                    format!(
                        "prototype '{}': no {} in {}",
                        r.id,
                        self.launcher.descriptor,
                        r.directory_path.display()
                    ),
                );
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
