// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry RPC surface (§6.1): the messages a `fleet-registry`
//! connection carries, one request per TCP connection except
//! `ExecuteCommand`, which fans out to the named agent and streams its
//! `RunCommand` response back. Lives in `fleet-core` rather than the
//! `fleet-registry` crate so both the registry binary and the agent
//! daemon's master-connection manager can depend on the wire shapes
//! without depending on each other.

use serde::{Deserialize, Serialize};

use crate::registry::AgentStatus;

/// The master's rendering of an [`crate::AgentRegistryRecord`] with its
/// derived `status` attached, since `status` is not itself stored — it
/// is computed from `last_heartbeat` at read time (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub address: String,
    pub status: AgentStatus,
    pub last_heartbeat: u64,
    pub last_info_collected: u64,
    pub version: String,
    pub system_info_json: String,
}

/// One frame of a command-execution stream, shared by the agent's
/// `RunCommand` and the registry's `ExecuteCommand` fan-out so the CLI
/// renders both identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub stdout_chunk: String,
    pub stderr_chunk: String,
    pub error: Option<String>,
    pub finished: bool,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryRequest {
    RegisterAgent {
        name: String,
        address: String,
        version: String,
    },
    Heartbeat {
        name: String,
        system_info_json: Option<String>,
    },
    ListAgents,
    GetAgentInfo {
        name: String,
    },
    UnregisterAgent {
        name: String,
    },
    StopAgent {
        name: String,
    },
    ExecuteCommand {
        agent_name: String,
        command: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryResponse {
    Success {
        success: bool,
    },
    AgentList {
        agents: Vec<AgentInfo>,
    },
    AgentDetail {
        success: bool,
        agent_info: Option<AgentInfo>,
        message: String,
    },
    StopResult {
        success: bool,
        message: String,
    },
    CommandOutput(CommandFrame),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_info_round_trips_through_json() {
        let info = AgentInfo {
            name: "a1".into(),
            address: "10.0.0.1:9000".into(),
            status: AgentStatus::Active,
            last_heartbeat: 100,
            last_info_collected: 60,
            version: "1.0.0".into(),
            system_info_json: String::new(),
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: AgentInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}
