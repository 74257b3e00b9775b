//! Configuration types

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tunnelgate_core::{Identity, DEFAULT_TOKEN};

use crate::{Result, SettingsError, ENV_PORT, ENV_UUID};

/// Port used when nothing else is configured
pub const DEFAULT_PORT: u16 = 30000;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Listener settings
    #[serde(default)]
    pub listen: ListenSettings,

    /// Peer authentication
    #[serde(default)]
    pub auth: AuthSettings,

    /// Outbound connections
    #[serde(default)]
    pub outbound: OutboundSettings,

    /// File these settings were loaded from (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a specific path, or fall back to defaults when the
    /// file does not exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let mut settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            settings.config_path = Some(path.to_path_buf());
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            info!("No settings file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(SettingsError::CreateDirError)?;
            }
        }

        let content = serde_json::to_string_pretty(self).map_err(SettingsError::ParseError)?;
        std::fs::write(path, content).map_err(SettingsError::WriteError)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Apply `UUID` and `PORT` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup.
    ///
    /// Empty values are ignored. A `PORT` that does not parse is kept as a
    /// pending error and reported by [`Settings::resolve`].
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uuid) = lookup(ENV_UUID).filter(|v| !v.trim().is_empty()) {
            self.auth.uuid = uuid.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT).filter(|v| !v.trim().is_empty()) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.listen.port = port,
                Err(e) => self.listen.env_port_error = Some(format!("{:?}: {}", port, e)),
            }
        }
    }

    /// Validate and freeze into the configuration a server runs with
    pub fn resolve(&self) -> Result<ServerConfig> {
        if let Some(reason) = &self.listen.env_port_error {
            return Err(SettingsError::InvalidValue {
                field: ENV_PORT,
                reason: reason.clone(),
            });
        }

        let ip: IpAddr = self.listen.host.parse().map_err(|e| SettingsError::InvalidValue {
            field: "listen.host",
            reason: format!("{:?}: {}", self.listen.host, e),
        })?;

        let identity =
            Identity::from_token(&self.auth.uuid).map_err(|e| SettingsError::InvalidValue {
                field: "auth.uuid",
                reason: e.to_string(),
            })?;

        if self.outbound.connect_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue {
                field: "outbound.connect_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        if identity.is_default() {
            warn!("Using the built-in default UUID; it is public and meant for testing only");
        }

        Ok(ServerConfig {
            listen_addr: SocketAddr::new(ip, self.listen.port),
            identity,
            connect_timeout: Duration::from_secs(self.outbound.connect_timeout_secs),
        })
    }
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenSettings {
    /// Interface address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip)]
    env_port_error: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            env_port_error: None,
        }
    }
}

/// Peer authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// UUID-like identity token; hyphens are ignored
    #[serde(default = "default_uuid")]
    pub uuid: String,
}

fn default_uuid() -> String {
    DEFAULT_TOKEN.to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            uuid: default_uuid(),
        }
    }
}

/// Outbound connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundSettings {
    /// Bound on a single connect attempt, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Immutable configuration shared by every session
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub identity: Identity,
    pub connect_timeout: Duration,
}
