// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`ServerConfig`] loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `EDV_STORAGE_TYPE` | Storage backend (`local` or `redb`) | `local` |
//! | `EDV_STORAGE_ROOT` | Data directory (local) or database file (redb) | `./data` / `./data/edv.redb` |
//! | `EDV_PUBLIC_URL` | Base URL prefixed to `Location` headers | unset (relative) |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::storage::paths::DATA_ROOT;
use crate::storage::{StorageDescriptor, StorageKind};

/// Environment variable selecting the storage backend.
pub const STORAGE_TYPE_ENV: &str = "EDV_STORAGE_TYPE";

/// Environment variable for the storage root.
///
/// For `local` this is the data directory holding `edvs/`; for `redb` it
/// is the database file.
pub const STORAGE_ROOT_ENV: &str = "EDV_STORAGE_ROOT";

/// Environment variable for the public base URL of the server.
pub const PUBLIC_URL_ENV: &str = "EDV_PUBLIC_URL";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Default database file of the redb backend.
pub const DEFAULT_REDB_FILE: &str = "./data/edv.redb";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Server configuration resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub storage: StorageDescriptor,
    pub public_url: Option<Url>,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Resolve the configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let kind = match get(STORAGE_TYPE_ENV) {
            Some(value) => value
                .parse::<StorageKind>()
                .map_err(|e| ConfigError::invalid(STORAGE_TYPE_ENV, e))?,
            None => StorageKind::Local,
        };
        let root = match get(STORAGE_ROOT_ENV) {
            Some(value) => PathBuf::from(value),
            None => match kind {
                StorageKind::Local => PathBuf::from(DATA_ROOT),
                StorageKind::Redb => PathBuf::from(DEFAULT_REDB_FILE),
            },
        };

        let public_url = get(PUBLIC_URL_ENV)
            .map(|value| {
                let url = Url::parse(value)
                    .map_err(|e| ConfigError::invalid(PUBLIC_URL_ENV, e.to_string()))?;
                if url.cannot_be_a_base() {
                    return Err(ConfigError::invalid(PUBLIC_URL_ENV, "not a base URL"));
                }
                Ok(url)
            })
            .transpose()?;

        let host = get(HOST_ENV).unwrap_or(DEFAULT_HOST);
        let port = match get(PORT_ENV) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid(PORT_ENV, e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::invalid(HOST_ENV, e.to_string()))?;

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(value) => value
                .parse()
                .map_err(|e: String| ConfigError::invalid(LOG_FORMAT_ENV, e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            storage: StorageDescriptor { kind, root },
            public_url,
            bind_addr,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.storage.kind, StorageKind::Local);
        assert_eq!(config.storage.root, PathBuf::from("./data"));
        assert_eq!(config.public_url, None);
        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn redb_has_its_own_default_root() {
        let config = ServerConfig::from_vars(vars(&[(STORAGE_TYPE_ENV, "redb")])).unwrap();
        assert_eq!(config.storage.kind, StorageKind::Redb);
        assert_eq!(config.storage.root, PathBuf::from(DEFAULT_REDB_FILE));
    }

    #[test]
    fn explicit_values() {
        let config = ServerConfig::from_vars(vars(&[
            (STORAGE_TYPE_ENV, "local"),
            (STORAGE_ROOT_ENV, "/var/lib/edv"),
            (PUBLIC_URL_ENV, "https://edv.example.com"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "8080"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/edv"));
        assert_eq!(
            config.public_url.unwrap().as_str(),
            "https://edv.example.com/"
        );
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            ServerConfig::from_vars(vars(&[(PORT_ENV, "  "), (PUBLIC_URL_ENV, "")])).unwrap();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.public_url, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            (STORAGE_TYPE_ENV, "s3"),
            (PORT_ENV, "eighty"),
            (PORT_ENV, "70000"),
            (PUBLIC_URL_ENV, "not a url"),
            (PUBLIC_URL_ENV, "mailto:ops@example.com"),
            (LOG_FORMAT_ENV, "xml"),
            (HOST_ENV, "local host"),
        ];
        for (name, value) in cases {
            let err = ServerConfig::from_vars(vars(&[(name, value)])).unwrap_err();
            let ConfigError::Invalid { name: got, .. } = err;
            assert_eq!(got, name, "{name}={value}");
        }
    }
}
