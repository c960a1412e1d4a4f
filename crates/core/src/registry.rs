// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master's view of a single agent: what the registry holds, and the
//! liveness rule that derives `status` from `last_heartbeat`.

use serde::{Deserialize, Serialize};

/// Liveness window: an agent is `Active` iff `now - last_heartbeat` is
/// under this many seconds.
pub const HEARTBEAT_LIVENESS_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Record the master holds for a registered agent. The agent itself never
/// constructs this type; it only observes slices of it indirectly through
/// `GetAgentInfo`/`ListAgents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistryRecord {
    pub name: String,
    pub address: String,
    pub last_heartbeat: u64,
    pub last_info_collected: u64,
    pub version: String,
    /// Opaque system-info blob last reported, as raw JSON text.
    pub system_info_json: String,
}

impl AgentRegistryRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>, now: u64) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            last_heartbeat: now,
            last_info_collected: 0,
            version: String::new(),
            system_info_json: String::new(),
        }
    }

    /// Status derived from the liveness rule: `Active` iff the last
    /// heartbeat is within [`HEARTBEAT_LIVENESS_WINDOW_SECS`] of `now`.
    pub fn status(&self, now: u64) -> AgentStatus {
        if now.saturating_sub(self.last_heartbeat) < HEARTBEAT_LIVENESS_WINDOW_SECS {
            AgentStatus::Active
        } else {
            AgentStatus::Inactive
        }
    }

    /// Apply a heartbeat: bump `last_heartbeat` and, when `system_info_json`
    /// is non-empty, also bump `last_info_collected` and replace the blob.
    pub fn apply_heartbeat(&mut self, now: u64, system_info_json: Option<String>) {
        self.last_heartbeat = now;
        if let Some(blob) = system_info_json {
            if !blob.is_empty() {
                self.last_info_collected = now;
                self.system_info_json = blob;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_active_just_inside_the_window() {
        let record = AgentRegistryRecord::new("a1", "10.0.0.1:9000", 1_000);
        assert_eq!(record.status(1_000 + 59), AgentStatus::Active);
    }

    #[test]
    fn status_is_inactive_once_the_window_elapses() {
        let record = AgentRegistryRecord::new("a1", "10.0.0.1:9000", 1_000);
        assert_eq!(record.status(1_000 + 60), AgentStatus::Inactive);
        assert_eq!(record.status(1_000 + 600), AgentStatus::Inactive);
    }

    #[test]
    fn heartbeat_without_system_info_leaves_last_info_collected_untouched() {
        let mut record = AgentRegistryRecord::new("a1", "10.0.0.1:9000", 0);
        record.apply_heartbeat(60, None);
        assert_eq!(record.last_heartbeat, 60);
        assert_eq!(record.last_info_collected, 0);
    }

    #[test]
    fn heartbeat_with_system_info_updates_both_fields() {
        let mut record = AgentRegistryRecord::new("a1", "10.0.0.1:9000", 0);
        record.apply_heartbeat(60, Some("{\"hostname\":\"h1\"}".to_string()));
        assert_eq!(record.last_info_collected, 60);
        assert_eq!(record.system_info_json, "{\"hostname\":\"h1\"}");
    }
}
