// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent RPC surface (§6.2): every request/response shape a client
//! (the CLI or the registry's `ExecuteCommand` fan-out) exchanges with
//! a `fleetd` process over a single length-prefixed connection.
//!
//! Most RPCs are one request frame answered by one response frame.
//! `RunCommand` and `StreamLogs`/`StreamMetrics` are server-streams: one
//! request frame, then a sequence of response frames ending in a
//! terminal one. `InteractiveShell` is bidirectional: `ShellInput`
//! frames flow client-to-agent for as long as `ShellOutput` frames flow
//! the other way.

use serde::{Deserialize, Serialize};

use crate::sysinfo::{LogEntry, LogLevel, Memory, NetworkConnection, NetworkInterface, ProcessInfo};
use crate::wire::registry::CommandFrame;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentRequest {
    RunCommand {
        command: String,
        user: Option<String>,
    },
    ExecuteTask {
        task_name: Option<String>,
        task_group: String,
        lua_script: String,
        workspace: Vec<u8>,
        user: Option<String>,
    },
    Shutdown,
    UpdateAgent {
        target_version: String,
        force: bool,
        skip_restart: bool,
    },
    GetResourceUsage,
    GetDetailedMetrics,
    GetProcessList,
    GetNetworkInfo,
    GetDiskInfo,
    GetActiveConnections {
        state_filter: Option<String>,
        include_local: bool,
    },
    GetSystemErrors {
        since_timestamp: Option<u64>,
        include_warnings: bool,
        max_errors: usize,
    },
    GetRecentLogs {
        max_lines: usize,
        level_filter: Option<LogLevel>,
        source_filter: Option<String>,
        since_timestamp: Option<u64>,
    },
    GetPerformanceHistory {
        duration_minutes: u32,
        data_points: u32,
    },
    DiagnoseHealth {
        deep_check: bool,
    },
    StreamLogs,
    StreamMetrics,
    RestartService,
    InteractiveShellOpen {
        cols: u16,
        rows: u16,
    },
    RegisterWatcher {
        config: serde_json::Value,
    },
    ListWatchers,
    RemoveWatcher {
        watcher_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory: Memory,
    pub load_average: [f64; 3],
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedMetrics {
    pub resource: ResourceUsage,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub network_bytes_sent: u64,
    pub network_bytes_recv: u64,
    pub kernel: String,
    pub os: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfoResponse {
    pub interfaces: Vec<NetworkInterface>,
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskPartition {
    pub device: String,
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfoResponse {
    pub partitions: Vec<DiskPartition>,
    pub total_io_read_bytes: u64,
    pub total_io_write_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConnectionsResponse {
    pub connections: Vec<NetworkConnection>,
    pub totals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemErrorsResponse {
    pub errors: Vec<LogEntry>,
    pub counts: usize,
    pub most_common: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentLogsResponse {
    pub logs: Vec<LogEntry>,
    pub total_count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: u64,
    pub cpu_percent: f64,
    pub memory_used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceHistoryResponse {
    pub snapshots: Vec<PerformanceSnapshot>,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssueWire {
    pub severity: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnoseHealthResponse {
    pub overall_status: String,
    pub health_score: i32,
    pub issues: Vec<HealthIssueWire>,
    pub summary: String,
    pub totals: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteTaskResponse {
    pub success: bool,
    pub output: String,
    pub workspace: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAgentResponse {
    pub success: bool,
    pub message: String,
    pub old_version: String,
    pub new_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterWatcherResponse {
    pub success: bool,
    pub message: String,
    pub watcher_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListWatchersResponse {
    pub watchers: Vec<serde_json::Value>,
}

/// One frame of a `StreamMetrics` response; reuses [`ResourceUsage`]'s
/// field shape but is its own type since the cadence contract (every
/// 5s per §6.2) lives at the framing layer, not the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsFrame {
    pub timestamp: u64,
    pub usage: ResourceUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFrame {
    pub entry: LogEntry,
}

/// Client-to-agent half of an `InteractiveShell` bidi stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShellInput {
    Data { bytes: Vec<u8> },
    Resize { rows: u16, cols: u16 },
    Eof,
}

/// Agent-to-client half of an `InteractiveShell` bidi stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShellOutput {
    Data { bytes: Vec<u8> },
    Completed { exit_code: Option<i32> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentResponse {
    CommandOutput(CommandFrame),
    ExecuteTask(ExecuteTaskResponse),
    Shutdown,
    UpdateAgent(UpdateAgentResponse),
    ResourceUsage(ResourceUsage),
    DetailedMetrics(DetailedMetrics),
    ProcessList(Vec<ProcessInfo>),
    NetworkInfo(NetworkInfoResponse),
    DiskInfo(DiskInfoResponse),
    ActiveConnections(ActiveConnectionsResponse),
    SystemErrors(SystemErrorsResponse),
    RecentLogs(RecentLogsResponse),
    PerformanceHistory(PerformanceHistoryResponse),
    DiagnoseHealth(DiagnoseHealthResponse),
    LogStream(LogFrame),
    MetricsStream(MetricsFrame),
    RestartService { success: bool, message: String },
    ShellOpened,
    ShellFrame(ShellOutput),
    RegisterWatcher(RegisterWatcherResponse),
    ListWatchers(ListWatchersResponse),
    RemoveWatcher { success: bool, message: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_request_round_trips_through_json() {
        let req = AgentRequest::RunCommand {
            command: "echo hi".into(),
            user: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: AgentRequest = serde_json::from_str(&json).unwrap();
        match back {
            AgentRequest::RunCommand { command, user } => {
                assert_eq!(command, "echo hi");
                assert!(user.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn shell_input_resize_round_trips() {
        let input = ShellInput::Resize { rows: 30, cols: 120 };
        let json = serde_json::to_string(&input).unwrap();
        let back: ShellInput = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ShellInput::Resize { rows: 30, cols: 120 }));
    }
}
