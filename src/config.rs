//! Server configuration.
//!
//! Layered with the `config` crate, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. `INTERPOSE__*` environment variables (`INTERPOSE__ADDR=127.0.0.1:8080`).
//!
//! The merged result is validated before it is returned; an invalid value in
//! any layer is an [`Error::Config`].

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "INTERPOSE";

const DEFAULTS: &str = r#"
addr = "0.0.0.0:3000"
shutdown_grace_secs = 30
"#;

/// Settings for [`Server`](crate::http::Server).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[validate(custom(function = "socket_addr_syntax"))]
    pub addr: String,
    /// Per-request deadline, enforced by the router. Unset means no deadline.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub request_timeout_ms: Option<u64>,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    /// Defaults overridden by the environment.
    pub fn load() -> Result<Self> {
        Self::build(None, None)
    }

    /// Defaults, then `path` if it exists, then the environment.
    pub fn load_with_file(path: &Path) -> Result<Self> {
        Self::build(Some(path), None)
    }

    /// Defaults overridden by an in-memory TOML document. The environment is
    /// not consulted.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        config.try_deserialize::<Self>()?.checked()
    }

    /// `env` replaces the process environment when set.
    fn build(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        config.try_deserialize::<Self>()?.checked()
    }

    fn checked(self) -> Result<Self> {
        self.validate().map_err(|e| {
            Error::Config(ConfigError::Message(format!("invalid configuration: {e}")))
        })?;
        Ok(self)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr.parse()?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            request_timeout_ms: None,
            shutdown_grace_secs: 30,
        }
    }
}

fn socket_addr_syntax(addr: &str) -> std::result::Result<(), ValidationError> {
    match addr.parse::<SocketAddr>() {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("socket_addr")),
    }
}
