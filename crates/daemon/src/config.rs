// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration for `fleetd` (C11): defaults, then an
//! optional TOML file, then `FLEETD_`-prefixed environment variables.
//! Every `std::env::var` read in this binary goes through this module,
//! matching the teacher daemon's `Config::load()` + `env.rs` pattern.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9300";
const DEFAULT_LOG_PATH: &str = "fleetd.log";
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

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
    #[error("agent name is required (FLEETD_NAME or config file's `name`)")]
    MissingName,
    #[error("master address is required (FLEETD_MASTER_ADDRESS or config file's `master_address`)")]
    MissingMasterAddress,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    name: Option<String>,
    listen_address: Option<String>,
    report_address: Option<String>,
    master_address: Option<String>,
    log_path: Option<PathBuf>,
    shell: Option<String>,
    update_url_template: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FleetdConfig {
    pub name: String,
    pub listen_address: String,
    pub report_address: String,
    pub master_address: String,
    pub version: String,
    pub log_path: PathBuf,
    /// Login shell spawned by `InteractiveShell`; `None` falls back to
    /// `/bin/sh` at the pty layer.
    pub shell: Option<String>,
    /// `{version}`-templated download URL consulted by `UpdateAgent`.
    /// `None` means self-update has no configured source and fails soft.
    pub update_url_template: Option<String>,
}

impl FleetdConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut name = None;
        let mut listen_address = DEFAULT_LISTEN_ADDRESS.to_string();
        let mut report_address = None;
        let mut master_address = None;
        let mut log_path = PathBuf::from(DEFAULT_LOG_PATH);
        let mut shell = None;
        let mut update_url_template = None;

        if let Some(path) = config_file_path() {
            if let Some(file) = read_file_config(&path)? {
                name = file.name.or(name);
                if let Some(addr) = file.listen_address {
                    listen_address = addr;
                }
                report_address = file.report_address.or(report_address);
                master_address = file.master_address.or(master_address);
                if let Some(path) = file.log_path {
                    log_path = path;
                }
                shell = file.shell.or(shell);
                update_url_template = file.update_url_template.or(update_url_template);
            }
        }

        if let Ok(v) = std::env::var("FLEETD_NAME") {
            name = Some(v);
        }
        if let Ok(v) = std::env::var("FLEETD_LISTEN_ADDRESS") {
            listen_address = v;
        }
        if let Ok(v) = std::env::var("FLEETD_REPORT_ADDRESS") {
            report_address = Some(v);
        }
        if let Ok(v) = std::env::var("FLEETD_MASTER_ADDRESS") {
            master_address = Some(v);
        }
        if let Ok(v) = std::env::var("FLEETD_LOG_PATH") {
            log_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FLEETD_SHELL") {
            shell = Some(v);
        }
        if let Ok(v) = std::env::var("FLEETD_UPDATE_URL_TEMPLATE") {
            update_url_template = Some(v);
        }

        let name = name.ok_or(ConfigError::MissingName)?;
        let master_address = master_address.ok_or(ConfigError::MissingMasterAddress)?;
        let report_address = report_address.unwrap_or_else(|| listen_address.clone());

        Ok(Self {
            name,
            listen_address,
            report_address,
            master_address,
            version: DEFAULT_VERSION.to_string(),
            log_path,
            shell,
            update_url_template,
        })
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
    if let Ok(path) = std::env::var("FLEETD_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/fleet/fleetd.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_file_config_treats_a_missing_file_as_absent_not_an_error() {
        let result = read_file_config(&PathBuf::from("/nonexistent/fleetd.toml"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn file_config_parses_a_minimal_toml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetd.toml");
        std::fs::write(&path, "name = \"a1\"\nmaster_address = \"10.0.0.1:9100\"\n").unwrap();
        let parsed = read_file_config(&path).unwrap().unwrap();
        assert_eq!(parsed.name.as_deref(), Some("a1"));
        assert_eq!(parsed.master_address.as_deref(), Some("10.0.0.1:9100"));
    }
}
