//! Daemon configuration loaded from TOML.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use edgelink_protocol::ConnectOptions;
use edgelink_types::{Edge, Role, ScreenGeometry};
use serde::{Deserialize, Serialize};

use crate::error::DaemonError;
use crate::hotkey::HotkeyGate;

/// Connect retries are spaced at least this far apart.
const MIN_RETRY_INTERVAL_MS: u64 = 1000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
    #[serde(default)]
    pub sharing: SharingConfig,
    #[serde(default)]
    pub clipboard: ClipboardConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
}

impl Config {
    /// Defaults for one session with the given role and peer placement.
    ///
    /// `address` is the server's host and only matters for clients.
    #[must_use]
    pub fn for_session(role: Role, address: Option<&str>, edge: Edge, hotkey: &str) -> Self {
        Self {
            session: SessionConfig {
                role,
                address: address.map(str::to_string),
                ..SessionConfig::default()
            },
            edge: EdgeConfig {
                edge,
                ..EdgeConfig::default()
            },
            sharing: SharingConfig {
                hotkey: hotkey.to_string(),
                ..SharingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Check everything that would otherwise fail only once a session starts.
    pub fn validate(&self) -> Result<(), DaemonError> {
        let s = &self.session;
        if s.role == Role::Client && s.address.as_deref().map_or(true, |a| a.trim().is_empty()) {
            return Err(DaemonError::Config(
                "session.address is required for the client role".to_string(),
            ));
        }
        if s.primary_port == 0 || s.secondary_port == 0 {
            return Err(DaemonError::Config("ports must be non-zero".to_string()));
        }
        if s.primary_port == s.secondary_port {
            return Err(DaemonError::Config(format!(
                "primary and secondary ports must differ (both {})",
                s.primary_port
            )));
        }
        if s.role == Role::Server {
            s.bind_ip()?;
        }
        if s.retry_interval_ms < MIN_RETRY_INTERVAL_MS {
            return Err(DaemonError::Config(format!(
                "session.retry_interval_ms must be at least {MIN_RETRY_INTERVAL_MS}"
            )));
        }
        if s.connect_timeout_ms == 0 || s.read_timeout_ms == 0 {
            return Err(DaemonError::Config("timeouts must be non-zero".to_string()));
        }
        if self.edge.poll_interval_ms == 0 {
            return Err(DaemonError::Config(
                "edge.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.clipboard.enabled && self.clipboard.poll_interval_ms == 0 {
            return Err(DaemonError::Config(
                "clipboard.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if !self.screen.geometry().fits_margin(self.edge.margin) {
            return Err(DaemonError::Config(format!(
                "edge margin {} does not fit a {}x{} screen",
                self.edge.margin, self.screen.width, self.screen.height
            )));
        }
        HotkeyGate::new(&self.sharing.hotkey)?;
        Ok(())
    }
}

/// Daemon runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Network settings for the two session channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_role")]
    pub role: Role,
    /// Server host to connect to (client role).
    #[serde(default)]
    pub address: Option<String>,
    /// Interface to listen on (server role).
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_primary_port")]
    pub primary_port: u16,
    #[serde(default = "default_secondary_port")]
    pub secondary_port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Zero disables heartbeats.
    #[serde(default)]
    pub heartbeat_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            address: None,
            bind: default_bind(),
            primary_port: default_primary_port(),
            secondary_port: default_secondary_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            connect_retries: default_connect_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            heartbeat_interval_ms: 0,
        }
    }
}

impl SessionConfig {
    fn bind_ip(&self) -> Result<IpAddr, DaemonError> {
        self.bind
            .parse()
            .map_err(|e| DaemonError::Config(format!("invalid bind address {:?}: {e}", self.bind)))
    }

    /// Listen addresses for the primary and secondary channels.
    pub fn listen_addrs(&self) -> Result<(SocketAddr, SocketAddr), DaemonError> {
        let ip = self.bind_ip()?;
        Ok((
            SocketAddr::new(ip, self.primary_port),
            SocketAddr::new(ip, self.secondary_port),
        ))
    }

    /// `host:port` targets for the primary and secondary channels.
    pub fn peer_addrs(&self) -> Result<(String, String), DaemonError> {
        let host = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| DaemonError::Config("no server address configured".to_string()))?;
        Ok((
            join_host_port(host, self.primary_port),
            join_host_port(host, self.secondary_port),
        ))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_millis(self.connect_timeout_ms),
            retries: self.connect_retries,
            interval: Duration::from_millis(self.retry_interval_ms),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets.
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Edge handoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Where the peer's screen sits relative to this one.
    #[serde(default = "default_edge")]
    pub edge: Edge,
    /// Distance in pixels from the edge that counts as touching it.
    #[serde(default = "default_margin")]
    pub margin: i32,
    #[serde(default = "default_edge_poll_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            edge: default_edge(),
            margin: default_margin(),
            poll_interval_ms: default_edge_poll_ms(),
        }
    }
}

impl EdgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Sharing toggle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Empty disables the hotkey.
    #[serde(default = "default_hotkey")]
    pub hotkey: String,
    #[serde(default = "default_true")]
    pub enabled_at_start: bool,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            hotkey: default_hotkey(),
            enabled_at_start: true,
        }
    }
}

/// Clipboard subsystem settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_clipboard_poll_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_clipboard_size")]
    pub max_size: usize,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_clipboard_poll_ms(),
            max_size: default_max_clipboard_size(),
        }
    }
}

impl ClipboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Screen size reported by the headless backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    #[serde(default = "default_screen_width")]
    pub width: u32,
    #[serde(default = "default_screen_height")]
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
        }
    }
}

impl ScreenConfig {
    pub fn geometry(&self) -> ScreenGeometry {
        ScreenGeometry::new(self.width, self.height)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_role() -> Role {
    Role::Server
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_primary_port() -> u16 {
    50007
}

fn default_secondary_port() -> u16 {
    50008
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_connect_retries() -> u32 {
    10
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_edge() -> Edge {
    Edge::Right
}

fn default_margin() -> i32 {
    2
}

fn default_edge_poll_ms() -> u64 {
    10
}

fn default_hotkey() -> String {
    "control+alt+s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_clipboard_poll_ms() -> u64 {
    500
}

fn default_max_clipboard_size() -> usize {
    edgelink_clipboard::sync::DEFAULT_MAX_SIZE
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}
