//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::mcp::http::{HttpOptions, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_TIMEOUT};
use crate::render::{ConvertOptions, DEFAULT_MAX_INPUT_BYTES};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Transport settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Markdown conversion settings.
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.converter.max_input_bytes == 0 {
            return Err(ConfigError::ValidationError {
                message: "converter.max_input_bytes must be greater than zero".to_string(),
            });
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.max_sessions must be greater than zero".to_string(),
            });
        }

        if self.server.session_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "server.session_idle_timeout_secs must be greater than zero".to_string(),
            });
        }

        if let Some(ref theme) = self.converter.default_theme {
            if theme.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "converter.default_theme must not be blank; omit it for no theme"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// HTTP transport limits for these settings.
    ///
    /// The request body limit follows `converter.max_input_bytes`.
    #[must_use]
    pub const fn http_options(&self) -> HttpOptions {
        HttpOptions::for_input_limit(self.converter.max_input_bytes)
            .session_idle_timeout(Duration::from_secs(self.server.session_idle_timeout_secs))
            .max_sessions(self.server.max_sessions)
    }
}

/// Which transport the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Streamable HTTP on `server.bind`.
    #[default]
    Http,
    /// Newline-delimited JSON-RPC on stdin/stdout.
    Stdio,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Stdio => f.write_str("stdio"),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport to serve. Default: `http`
    #[serde(default)]
    pub transport: TransportKind,

    /// Listen address for the HTTP transport. Default: `127.0.0.1:8080`
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Seconds an HTTP session may sit idle before it is dropped. Default: 1800
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// Most HTTP sessions open at once. Default: 1024
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            bind: default_bind(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))
}

const fn default_session_idle_timeout_secs() -> u64 {
    DEFAULT_SESSION_IDLE_TIMEOUT.as_secs()
}

const fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

/// Markdown conversion configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    /// Code block theme used when a tool call does not name one.
    #[serde(default)]
    pub default_theme: Option<String>,

    /// Largest accepted Markdown input in bytes. Default: 1 MiB
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            default_theme: None,
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

impl ConverterConfig {
    /// Conversion options for these settings.
    #[must_use]
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions::default()
            .theme(self.default_theme.clone())
            .max_input_bytes(self.max_input_bytes)
    }
}

const fn default_max_input_bytes() -> usize {
    DEFAULT_MAX_INPUT_BYTES
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
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

fn default_log_level() -> String {
    "warn".to_string()
}
