//! Configuration loading and typed config structures.
//!
//! The canonical configuration is a YAML file (`chutes.yaml` by
//! default). Every section has workable defaults, so an empty file (or
//! no file at all) is a fully working configuration. A handful of
//! environment variables override the file for containerized
//! deployments.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::session::{DEFAULT_MAX_PLAYERS, TurnPolicy};

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

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChutesConfig {
    /// Listener and CORS settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Admin inspection credentials.
    #[serde(default)]
    pub admin: AdminSection,

    /// Gameplay parameters.
    #[serde(default)]
    pub game: GameSection,

    /// Retention thresholds and sweep cadence.
    #[serde(default)]
    pub retention: RetentionSection,

    /// Push-socket keepalive settings.
    #[serde(default)]
    pub ws: WsSection,
}

impl ChutesConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `PORT` overrides `server.port`
    /// - `ALLOWED_ORIGINS` (comma-separated) overrides `server.allowed_origins`
    /// - `ADMIN_USERNAME` / `ADMIN_PASSWORD` override the admin credential
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus env overrides, for when no config file exists.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            self.server.port = parsed;
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS")
            && !origins.trim().is_empty()
        {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(user) = std::env::var("ADMIN_USERNAME") {
            self.admin.username = user;
        }
        if let Ok(pass) = std::env::var("ADMIN_PASSWORD") {
            self.admin.password = pass;
        }
    }
}

/// Listener and CORS settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// The host address to bind to.
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
    /// Origins allowed to attach observers. `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
            allowed_origins: vec![String::from("*")],
        }
    }
}

/// The single shared credential gating the inspection surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            username: String::from("admin"),
            password: String::from("change-me"),
        }
    }
}

/// Gameplay parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameSection {
    /// Roster capacity per session.
    pub max_players: usize,
    /// Who may roll while a session is active.
    pub turn_policy: TurnPolicy,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            turn_policy: TurnPolicy::FreeForAll,
        }
    }
}

/// Retention thresholds and sweep cadence, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    /// Sessions older than this are evicted regardless of status.
    pub session_max_age_secs: u64,
    /// How often the session eviction sweep runs.
    pub session_sweep_secs: u64,
    /// Poll connections idle longer than this are disconnected.
    pub poll_stale_secs: u64,
    /// How often the stale-poll sweep runs.
    pub poll_sweep_secs: u64,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            session_max_age_secs: 2 * 60 * 60,
            session_sweep_secs: 30 * 60,
            poll_stale_secs: 5 * 60,
            poll_sweep_secs: 60,
        }
    }
}

impl RetentionSection {
    /// Session age threshold as a [`chrono::Duration`].
    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.session_max_age_secs).unwrap_or(i64::MAX))
    }

    /// Session sweep interval.
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs)
    }

    /// Poll staleness threshold as a [`chrono::Duration`].
    pub fn poll_staleness(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.poll_stale_secs).unwrap_or(i64::MAX))
    }

    /// Poll sweep interval.
    pub fn poll_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.poll_sweep_secs)
    }
}

/// Push-socket keepalive settings, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WsSection {
    /// Interval between server pings.
    pub ping_secs: u64,
    /// A connection that produces no frame for this long is dead.
    pub liveness_secs: u64,
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            ping_secs: 54,
            liveness_secs: 60,
        }
    }
}

impl WsSection {
    /// Ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    /// Liveness deadline.
    pub fn liveness_deadline(&self) -> Duration {
        Duration::from_secs(self.liveness_secs)
    }
}
