// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration for `fleet-registry` (C11): defaults, then
//! an optional TOML file, then `FLEET_REGISTRY_`-prefixed environment
//! variables — the same three-tier precedence and single-module
//! env-read discipline as the teacher's `Config::load()`/`env.rs` pair.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:9100";
const DEFAULT_LOG_PATH: &str = "fleet-registry.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    bind_address: Option<String>,
    log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bind_address: String,
    pub log_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

impl RegistryConfig {
    /// Resolve configuration: built-in defaults, then an optional TOML
    /// file (path from `FLEET_REGISTRY_CONFIG`, default
    /// `~/.config/fleet/fleet-registry.toml`), then environment
    /// variables. A missing optional file or unset variable is never a
    /// hard error (§8, property 8) — only a malformed *present* file is.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_file_path() {
            if let Some(file) = read_file_config(&path)? {
                if let Some(addr) = file.bind_address {
                    config.bind_address = addr;
                }
                if let Some(log_path) = file.log_path {
                    config.log_path = log_path;
                }
            }
        }

        if let Some(addr) = env_bind_address() {
            config.bind_address = addr;
        }
        if let Some(log_path) = env_log_path() {
            config.log_path = log_path;
        }

        Ok(config)
    }
}

fn read_file_config(path: &PathBuf) -> Result<Option<FileConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.clone(),
                source,
            })
        }
    };
    let parsed = toml::from_str(&contents).map_err(|source| ConfigError::ParseFile {
        path: path.clone(),
        source,
    })?;
    Ok(Some(parsed))
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FLEET_REGISTRY_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/fleet/fleet-registry.toml"))
}

fn env_bind_address() -> Option<String> {
    std::env::var("FLEET_REGISTRY_BIND_ADDRESS").ok()
}

fn env_log_path() -> Option<PathBuf> {
    std::env::var("FLEET_REGISTRY_LOG_PATH").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_bind_address_and_log_path() {
        let config = RegistryConfig::default();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.log_path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn read_file_config_treats_a_missing_file_as_absent_not_an_error() {
        let result = read_file_config(&PathBuf::from("/nonexistent/fleet-registry.toml"));
        assert!(result.unwrap().is_none());
    }
}
