// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of GrpcKit.
//
// GrpcKit is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// GrpcKit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with GrpcKit. If not, see <https://www.gnu.org/licenses/>.
//! # Sample Settings
//!
//! ## Purpose
//! TOML settings shared by the gateway host and the demo client.
//!
//! ## Precedence
//! 1. Environment: `GRPCKIT_SERVER_HOST`, `GRPCKIT_SERVER_PORT`, `GRPCKIT_GATEWAY_LISTEN`
//! 2. File values
//! 3. Defaults
//!
//! ## Example
//! ```toml
//! [server]
//! host = "localhost"
//! port = 50051
//!
//! [client]
//! host = "localhost"
//! port = 50051
//! gateway_url = "http://localhost:8080"
//!
//! [gateway]
//! listen = "0.0.0.0:8080"
//! header_prefix = "grpc."
//!
//! [search]
//! fetch_size = 10
//! delay_ms = 200
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::service::SearchOptions;

/// Environment variable overriding `server.host`
pub const ENV_SERVER_HOST: &str = "GRPCKIT_SERVER_HOST";
/// Environment variable overriding `server.port`
pub const ENV_SERVER_PORT: &str = "GRPCKIT_SERVER_PORT";
/// Environment variable overriding `gateway.listen`
pub const ENV_GATEWAY_LISTEN: &str = "GRPCKIT_GATEWAY_LISTEN";

/// Settings loading and saving failures
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read or written
    #[error("Settings file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid settings TOML
    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be rendered as TOML
    #[error("Failed to render settings: {0}")]
    Render(#[from] toml::ser::Error),

    /// An environment override has an invalid value
    #[error("Invalid value for {name}: {value}")]
    Env {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Where the sample server listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 50051,
        }
    }
}

/// Where the demo client connects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Server host name
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the HTTP gateway
    pub gateway_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 50051,
            gateway_url: "http://localhost:8080".to_string(),
        }
    }
}

/// HTTP gateway host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address
    pub listen: String,
    /// Prefix of HTTP headers forwarded as call metadata
    pub header_prefix: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            header_prefix: grpckit_gateway::DEFAULT_HEADER_PREFIX.to_string(),
        }
    }
}

/// Streaming pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Players per streamed batch
    pub fetch_size: usize,
    /// Wait before each batch in milliseconds
    pub delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let options = SearchOptions::default();
        Self {
            fetch_size: options.fetch_size,
            delay_ms: options.delay.as_millis() as u64,
        }
    }
}

/// All sample settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleSettings {
    /// `[server]`
    pub server: ServerSettings,
    /// `[client]`
    pub client: ClientSettings,
    /// `[gateway]`
    pub gateway: GatewayConfig,
    /// `[search]`
    pub search: SearchConfig,
}

impl SampleSettings {
    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML text
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a settings file and apply environment overrides
    ///
    /// ## Errors
    /// - [`SettingsError::Io`] when the file cannot be read
    /// - [`SettingsError::Parse`] when it is not valid TOML
    /// - [`SettingsError::Env`] when an override cannot be parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut settings = Self::from_toml(&content)?;
        settings.apply_env_overrides(|name| std::env::var(name).ok())?;
        debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Write the settings as TOML
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Apply overrides looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_SERVER_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT) {
            self.server.port = port.parse().map_err(|_| SettingsError::Env {
                name: ENV_SERVER_PORT,
                value: port,
            })?;
        }
        if let Some(listen) = lookup(ENV_GATEWAY_LISTEN) {
            self.gateway.listen = listen;
        }
        Ok(())
    }

    /// Pacing for the player search service
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            fetch_size: self.search.fetch_size,
            delay: Duration::from_millis(self.search.delay_ms),
            ..SearchOptions::default()
        }
    }
}
