//! TunnelGate Settings
//!
//! Server configuration: built-in defaults, an optional JSON file, the
//! `UUID`/`PORT` environment variables, then command-line overrides, in
//! that order of precedence.
//!
//! ## Usage
//!
//! ```no_run
//! use tunnelgate_settings::Settings;
//!
//! let mut settings = Settings::load_from("tunnelgate.json")?;
//! settings.apply_env();
//! settings.listen.port = 8080;
//!
//! let config = settings.resolve()?;
//! println!("listening on {}", config.listen_addr);
//! # Ok::<(), tunnelgate_settings::SettingsError>(())
//! ```

mod config;

pub use config::{
    AuthSettings, ListenSettings, OutboundSettings, ServerConfig, Settings, DEFAULT_PORT,
};

use thiserror::Error;

/// Environment variable holding the identity token
pub const ENV_UUID: &str = "UUID";

/// Environment variable holding the listen port
pub const ENV_PORT: &str = "PORT";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to write settings: {0}")]
    WriteError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("Failed to create config directory: {0}")]
    CreateDirError(std::io::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SettingsError>;
