// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watcher configuration and the events watchers emit.
//!
//! A [`WatcherSpec`] is a tagged variant over eight watcher types sharing a
//! common envelope (`id`, `interval`, `conditions`); each variant carries
//! only the fields its type consumes. [`WatcherSpec::validate`] enforces
//! the "every configured type requires exactly the fields it consumes"
//! invariant before the watcher manager ever schedules a timer for it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::define_id;

define_id! {
    /// Identifier for a registered watcher, operator-chosen (not generated).
    pub struct WatcherId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatcherCondition {
    Created,
    Changed,
    Deleted,
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatcherType {
    File {
        path: String,
        recursive: bool,
        check_hash: bool,
        pattern: Option<String>,
    },
    Directory {
        path: String,
        recursive: bool,
        check_hash: bool,
        pattern: Option<String>,
    },
    Process {
        process_name: Option<String>,
        pid: Option<u32>,
    },
    Port {
        port: u16,
        protocol: String,
    },
    Service {
        service_name: String,
    },
    Cpu {
        threshold: f64,
    },
    Memory {
        threshold: f64,
    },
    Disk {
        path: String,
        threshold: f64,
    },
}

impl WatcherType {
    pub fn kind(&self) -> &'static str {
        match self {
            WatcherType::File { .. } => "file",
            WatcherType::Directory { .. } => "directory",
            WatcherType::Process { .. } => "process",
            WatcherType::Port { .. } => "port",
            WatcherType::Service { .. } => "service",
            WatcherType::Cpu { .. } => "cpu",
            WatcherType::Memory { .. } => "memory",
            WatcherType::Disk { .. } => "disk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherSpec {
    pub id: WatcherId,
    #[serde(flatten)]
    pub watcher_type: WatcherType,
    pub interval: Duration,
    pub conditions: Vec<WatcherCondition>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatcherConfigError {
    #[error("watcher {id}: field '{field}' is required for type '{kind}'")]
    MissingField {
        id: String,
        kind: &'static str,
        field: &'static str,
    },
    #[error("watcher {0}: at least one condition is required")]
    NoConditions(String),
}

impl WatcherSpec {
    /// Reject configs missing a field their type consumes, or with no
    /// conditions at all. Returns `Ok(())` for a well-formed spec.
    pub fn validate(&self) -> Result<(), WatcherConfigError> {
        if self.conditions.is_empty() {
            return Err(WatcherConfigError::NoConditions(self.id.to_string()));
        }

        let missing = |field: &'static str| WatcherConfigError::MissingField {
            id: self.id.to_string(),
            kind: self.watcher_type.kind(),
            field,
        };

        match &self.watcher_type {
            WatcherType::File { path, .. } | WatcherType::Directory { path, .. } => {
                if path.is_empty() {
                    return Err(missing("path"));
                }
            }
            WatcherType::Process {
                process_name, pid, ..
            } => {
                if process_name.is_none() && pid.is_none() {
                    return Err(missing("process_name or pid"));
                }
            }
            WatcherType::Port { port, .. } => {
                if *port == 0 {
                    return Err(missing("port"));
                }
            }
            WatcherType::Service { service_name } => {
                if service_name.is_empty() {
                    return Err(missing("service_name"));
                }
            }
            WatcherType::Cpu { threshold } | WatcherType::Memory { threshold } => {
                if !threshold.is_finite() || *threshold <= 0.0 {
                    return Err(missing("threshold"));
                }
            }
            WatcherType::Disk { path, threshold } => {
                if path.is_empty() {
                    return Err(missing("path"));
                }
                if !threshold.is_finite() || *threshold <= 0.0 {
                    return Err(missing("threshold"));
                }
            }
        }

        Ok(())
    }
}

/// An event produced by a watcher transition, delivered to the master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherEvent {
    pub watcher_id: WatcherId,
    pub kind: String,
    pub condition: WatcherCondition,
    pub timestamp: u64,
    pub details: String,
}

impl WatcherEvent {
    pub fn new(
        watcher_id: WatcherId,
        kind: &'static str,
        condition: WatcherCondition,
        timestamp: u64,
        details: impl Into<String>,
    ) -> Self {
        Self {
            watcher_id,
            kind: kind.to_string(),
            condition,
            timestamp,
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_spec(path: &str, conditions: Vec<WatcherCondition>) -> WatcherSpec {
        WatcherSpec {
            id: WatcherId::new("w1"),
            watcher_type: WatcherType::File {
                path: path.to_string(),
                recursive: false,
                check_hash: false,
                pattern: None,
            },
            interval: Duration::from_secs(1),
            conditions,
        }
    }

    #[test]
    fn file_watcher_with_empty_path_is_rejected() {
        let spec = file_spec("", vec![WatcherCondition::Created]);
        assert_eq!(
            spec.validate(),
            Err(WatcherConfigError::MissingField {
                id: "w1".to_string(),
                kind: "file",
                field: "path",
            })
        );
    }

    #[test]
    fn watcher_with_no_conditions_is_rejected() {
        let spec = file_spec("/tmp/t", vec![]);
        assert_eq!(
            spec.validate(),
            Err(WatcherConfigError::NoConditions("w1".to_string()))
        );
    }

    #[test]
    fn well_formed_file_watcher_validates() {
        let spec = file_spec("/tmp/t", vec![WatcherCondition::Created]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn process_watcher_requires_name_or_pid() {
        let spec = WatcherSpec {
            id: WatcherId::new("w2"),
            watcher_type: WatcherType::Process {
                process_name: None,
                pid: None,
            },
            interval: Duration::from_secs(5),
            conditions: vec![WatcherCondition::Created],
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn cpu_watcher_rejects_non_positive_threshold() {
        let spec = WatcherSpec {
            id: WatcherId::new("w3"),
            watcher_type: WatcherType::Cpu { threshold: 0.0 },
            interval: Duration::from_secs(5),
            conditions: vec![WatcherCondition::Above],
        };
        assert!(spec.validate().is_err());
    }
}
