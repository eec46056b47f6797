//! Configuration loading and typed config structures for the Crossview viewer.
//!
//! The configuration lives in `crossview.yaml` next to the binary's working
//! directory. Every field has a default, so the file is optional and may be
//! partial. Two environment variables override the file:
//!
//! - `CROSSVIEW_URL` overrides `connection.url`
//! - `CROSSVIEW_LOG` overrides `logging.level`

use std::f64::consts::PI;
use std::path::Path;
use std::time::Duration;

use crossview_types::{SignalId, SignalInit, WireMapping};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration. Mirrors `crossview.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Endpoint and connect timeout.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Retry strategy after a session ends.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Render loop pacing.
    #[serde(default)]
    pub render: RenderConfig,

    /// Wire id and coordinate mapping.
    #[serde(default)]
    pub wire: WireMapping,

    /// The two antiphase signal groups.
    #[serde(default)]
    pub phases: PhaseConfig,

    /// Session behavior.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fixtures created at startup.
    #[serde(default)]
    pub scene: SceneConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file, then apply process environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Like [`ClientConfig::from_file`], but a missing file yields the
    /// defaults (still subject to environment overrides).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CROSSVIEW_URL").filter(|v| !v.is_empty()) {
            self.connection.url = url;
        }
        if let Some(level) = lookup("CROSSVIEW_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }
}

/// Endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket URL of the simulation authority.
    #[serde(default = "default_url")]
    pub url: String,

    /// Milliseconds allowed for opening a session.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ConnectionConfig {
    /// The connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Which retry strategy to use after a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Stay closed until a manual reconnect.
    None,
    /// Retry after a constant delay.
    #[default]
    Fixed,
    /// Retry after a growing, capped delay.
    Exponential,
}

/// Reconnect configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReconnectConfig {
    /// Retry strategy.
    #[serde(default)]
    pub strategy: ReconnectStrategy,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Upper bound for exponential backoff, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor per failed attempt for exponential backoff.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of each delay that may be randomly shaved off (0.0..=1.0).
    #[serde(default)]
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::default(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: 0.0,
        }
    }
}

/// Render loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenderConfig {
    /// Milliseconds between render ticks.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl RenderConfig {
    /// The render tick period, never shorter than one millisecond.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

/// Signal group membership for phase changeovers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhaseConfig {
    /// Red on phase 0, green on any other phase.
    #[serde(default = "default_group_a")]
    pub group_a: Vec<SignalId>,

    /// Green on phase 0, red on any other phase.
    #[serde(default = "default_group_b")]
    pub group_b: Vec<SignalId>,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            group_a: default_group_a(),
            group_b: default_group_b(),
        }
    }
}

/// Session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Drop vehicles and rewind the clock when a later session opens.
    #[serde(default = "default_true")]
    pub reset_on_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_on_reconnect: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Startup scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneConfig {
    /// Fixtures created before the first session opens.
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalInit>,

    /// Run the local indicator cycle on every fixture until the authority
    /// sets its color.
    #[serde(default)]
    pub auto_cycle: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            signals: default_signals(),
            auto_cycle: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_url() -> String {
    String::from("wss://itsim.ru/ws")
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_delay_ms() -> u64 {
    3_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_frame_interval_ms() -> u64 {
    16
}

fn default_group_a() -> Vec<SignalId> {
    vec![SignalId::from("tl-1"), SignalId::from("tl-2")]
}

fn default_group_b() -> Vec<SignalId> {
    vec![SignalId::from("tl-3"), SignalId::from("tl-4")]
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_signals() -> Vec<SignalInit> {
    let fixture = |id: &str, x: f64, y: f64, rot: f64, color: &str| SignalInit {
        id: Some(id.to_owned()),
        x,
        y,
        z: 0.25,
        rot,
        color: Some(color.to_owned()),
    };
    vec![
        fixture("tl-1", -7.5, 10.5, PI / 2.0, "red"),
        fixture("tl-2", 7.5, -10.5, 3.0 * PI / 2.0, "green"),
        fixture("tl-3", 10.5, 7.5, 0.0, "yellow"),
        fixture("tl-4", -10.5, -7.5, PI, "yellow"),
    ]
}
