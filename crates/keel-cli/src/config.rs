//! `keel.toml` handling
//!
//! Settings are layered: built-in defaults, then the config file, then
//! `KEEL_*` environment variables, then command-line flags.
//!
//! ```toml
//! [app]
//! strict = true
//! validate_responses = false
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [openapi]
//! title = "Users API"
//! docs_path = "/openapi.json"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use keel_api::server::DEFAULT_MAX_BODY_SIZE;
use keel_api::{AppConfig, Info, OpenApiGenerator, ServerConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "keel.toml";

pub const ENV_HOST: &str = "KEEL_HOST";
pub const ENV_PORT: &str = "KEEL_PORT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeelConfig {
    pub app: AppConfig,
    pub server: ServerSection,
    pub openapi: OpenApiSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,
    /// Log one line per request
    pub access_log: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            access_log: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenApiSection {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Where `keel serve` exposes the document; `None` disables it
    pub docs_path: Option<String>,
    pub servers: Vec<String>,
}

impl Default for OpenApiSection {
    fn default() -> Self {
        Self {
            title: "Keel Users API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            docs_path: Some("/openapi.json".to_string()),
            servers: Vec::new(),
        }
    }
}

impl KeelConfig {
    /// Load `explicit`, or `keel.toml` if present, then apply the
    /// environment. An explicit path that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `KEEL_*` values from `lookup` on top of `self`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.app = self.app.with_overrides_from(&lookup);

        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(key = ENV_PORT, value = %raw, "Ignoring invalid port"),
            }
        }

        self
    }

    /// Flags given on the command line win over everything else.
    pub fn apply_flags(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.bind_addr())
            .max_body_size(self.server.max_body_size)
            .logging(self.server.access_log)
    }

    pub fn generator(&self) -> OpenApiGenerator {
        let section = &self.openapi;
        let mut info = Info::new(&section.title, &section.version);
        if let Some(description) = &section.description {
            info = info.description(description);
        }

        section
            .servers
            .iter()
            .fold(OpenApiGenerator::new(info), |generator, url| {
                generator.server(url, None)
            })
            .tag("users", Some("User management".to_string()))
    }
}
