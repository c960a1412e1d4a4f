// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration for `fleetctl` (C11): defaults, then an
//! optional TOML file, then a `FLEET_`-prefixed environment variable.
//! Every `std::env::var` read for the master address goes through this
//! module, matching the daemon and registry binaries' `Config::load()`
//! pattern — a `--master` flag still wins over all three tiers.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_MASTER_ADDRESS: &str = "127.0.0.1:9100";

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
    master_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub master_address: String,
}

impl CliConfig {
    /// Resolve the default `--master` value: built-in default, then an
    /// optional `~/.config/fleet/fleetctl.toml` (override with
    /// `FLEET_CONFIG`), then `FLEET_MASTER_ADDR`. A missing optional file
    /// or unset variable is never a hard error — only a malformed
    /// *present* file is.
    pub fn load() -> Result<Self, ConfigError> {
        let mut master_address = DEFAULT_MASTER_ADDRESS.to_string();

        if let Some(path) = config_file_path() {
            if let Some(file) = read_file_config(&path)? {
                if let Some(addr) = file.master_address {
                    master_address = addr;
                }
            }
        }

        if let Ok(addr) = std::env::var("FLEET_MASTER_ADDR") {
            master_address = addr;
        }

        Ok(Self { master_address })
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
    if let Ok(path) = std::env::var("FLEET_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/fleet/fleetctl.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_the_documented_master_address() {
        let config = CliConfig {
            master_address: DEFAULT_MASTER_ADDRESS.to_string(),
        };
        assert_eq!(config.master_address, "127.0.0.1:9100");
    }

    #[test]
    fn read_file_config_treats_a_missing_file_as_absent_not_an_error() {
        let result = read_file_config(&PathBuf::from("/nonexistent/fleetctl.toml"));
        assert!(result.unwrap().is_none());
    }
}
