// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent RPC server (C5): accepts one connection per call (except
//! the streaming/bidi RPCs, which hold the connection open), dispatches
//! §6.2's surface, and wraps every handler in a span logging its
//! elapsed time — the same discipline `fleet-registry`'s server applies
//! to §6.1.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_adapters::update::{apply_update, detect_supervisor, Supervisor};
use fleet_adapters::{PlatformProbe, WatcherManager};
use fleet_core::wire::agent::{
    ActiveConnectionsResponse, AgentRequest, AgentResponse, DetailedMetrics, DiagnoseHealthResponse,
    DiskInfoResponse, DiskPartition, ExecuteTaskResponse, HealthIssueWire, LogFrame, MetricsFrame,
    NetworkInfoResponse, RecentLogsResponse, RegisterWatcherResponse, ResourceUsage,
    SystemErrorsResponse, UpdateAgentResponse,
};
use fleet_core::wire::{self, WireError};
use fleet_core::{TaskRequest, WatcherId, WorkspaceArchive};
use fleet_engine::TaskExecutor;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tracing::{info, warn, Instrument};

use crate::caches::{cached_or_refresh, TtlCache, DISK_INFO_TTL, NETWORK_INFO_TTL, RESOURCE_USAGE_TTL};
use crate::connections::{active_connections, filter_connections};
use crate::diagnose::diagnose;
use crate::logs::LogBuffer;
use crate::perf_history::PerformanceHistory;
use crate::snapshot::host_identity;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything an agent RPC handler needs, shared by `Arc` across every
/// accepted connection.
pub struct AgentContext {
    pub name: String,
    pub version: String,
    pub started_at: Instant,
    pub shell: Option<String>,
    pub current_exe: PathBuf,
    pub update_url_template: Option<String>,
    pub probe: Arc<dyn PlatformProbe>,
    pub task_executor: Arc<TaskExecutor>,
    pub watchers: Arc<WatcherManager>,
    pub log_buffer: Arc<LogBuffer>,
    pub perf_history: Arc<PerformanceHistory>,
    pub resource_cache: Arc<TtlCache<ResourceUsage>>,
    pub network_cache: Arc<TtlCache<NetworkInfoResponse>>,
    pub disk_cache: Arc<TtlCache<DiskInfoResponse>>,
}

pub async fn serve(bind_address: &str, ctx: Arc<AgentContext>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|source| ServerError::Bind {
            address: bind_address.to_string(),
            source,
        })?;
    info!(address = %bind_address, "fleetd rpc server listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let ctx = Arc::clone(&ctx);
        tokio::spawn(
            async move {
                if let Err(e) = handle_connection(stream, ctx).await {
                    warn!(error = %e, "agent connection ended with an error");
                }
            }
            .instrument(tracing::info_span!("agent_conn", peer = %peer)),
        );
    }
}

async fn handle_connection(mut stream: TcpStream, ctx: Arc<AgentContext>) -> Result<(), WireError> {
    let request: AgentRequest = wire::read_message(&mut stream).await?;
    let name = request_name(&request);
    let start = Instant::now();
    let span = tracing::info_span!("rpc", method = name);
    let _guard = span.enter();

    let result = dispatch(request, &mut stream, &ctx).await;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "rpc handled");
    result
}

fn request_name(request: &AgentRequest) -> &'static str {
    match request {
        AgentRequest::RunCommand { .. } => "RunCommand",
        AgentRequest::ExecuteTask { .. } => "ExecuteTask",
        AgentRequest::Shutdown => "Shutdown",
        AgentRequest::UpdateAgent { .. } => "UpdateAgent",
        AgentRequest::GetResourceUsage => "GetResourceUsage",
        AgentRequest::GetDetailedMetrics => "GetDetailedMetrics",
        AgentRequest::GetProcessList => "GetProcessList",
        AgentRequest::GetNetworkInfo => "GetNetworkInfo",
        AgentRequest::GetDiskInfo => "GetDiskInfo",
        AgentRequest::GetActiveConnections { .. } => "GetActiveConnections",
        AgentRequest::GetSystemErrors { .. } => "GetSystemErrors",
        AgentRequest::GetRecentLogs { .. } => "GetRecentLogs",
        AgentRequest::GetPerformanceHistory { .. } => "GetPerformanceHistory",
        AgentRequest::DiagnoseHealth { .. } => "DiagnoseHealth",
        AgentRequest::StreamLogs => "StreamLogs",
        AgentRequest::StreamMetrics => "StreamMetrics",
        AgentRequest::RestartService => "RestartService",
        AgentRequest::InteractiveShellOpen { .. } => "InteractiveShellOpen",
        AgentRequest::RegisterWatcher { .. } => "RegisterWatcher",
        AgentRequest::ListWatchers => "ListWatchers",
        AgentRequest::RemoveWatcher { .. } => "RemoveWatcher",
    }
}

async fn dispatch(request: AgentRequest, stream: &mut TcpStream, ctx: &Arc<AgentContext>) -> Result<(), WireError> {
    match request {
        AgentRequest::RunCommand { command, user } => run_command_stream(stream, command, user).await,
        AgentRequest::ExecuteTask {
            task_name,
            task_group,
            lua_script,
            workspace,
            user,
        } => {
            let task_request = TaskRequest {
                task_name: task_name.unwrap_or_default(),
                task_group,
                lua_script,
                workspace: WorkspaceArchive::from_bytes(workspace),
                user,
            };
            match ctx.task_executor.execute(task_request).await {
                Ok(result) => {
                    wire::write_message(
                        stream,
                        &AgentResponse::ExecuteTask(ExecuteTaskResponse {
                            success: result.success,
                            output: result.output,
                            workspace: result.workspace.as_bytes().to_vec(),
                        }),
                    )
                    .await
                }
                Err(e) => wire::write_message(stream, &AgentResponse::Error { message: e.to_string() }).await,
            }
        }
        AgentRequest::Shutdown => {
            wire::write_message(stream, &AgentResponse::Shutdown).await?;
            schedule_exit(Duration::from_millis(100));
            Ok(())
        }
        AgentRequest::UpdateAgent {
            target_version,
            force,
            skip_restart,
        } => {
            let response = handle_update_agent(ctx, &target_version, force, skip_restart).await;
            wire::write_message(stream, &AgentResponse::UpdateAgent(response)).await
        }
        AgentRequest::GetResourceUsage => {
            let probe = Arc::clone(&ctx.probe);
            let usage = cached_or_refresh(&ctx.resource_cache, move || compute_resource_usage(probe.as_ref()));
            wire::write_message(stream, &AgentResponse::ResourceUsage(usage)).await
        }
        AgentRequest::GetDetailedMetrics => {
            let metrics = compute_detailed_metrics(ctx.probe.as_ref());
            wire::write_message(stream, &AgentResponse::DetailedMetrics(metrics)).await
        }
        AgentRequest::GetProcessList => {
            wire::write_message(stream, &AgentResponse::ProcessList(ctx.probe.processes())).await
        }
        AgentRequest::GetNetworkInfo => {
            let probe = Arc::clone(&ctx.probe);
            let info = cached_or_refresh(&ctx.network_cache, move || compute_network_info(probe.as_ref()));
            wire::write_message(stream, &AgentResponse::NetworkInfo(info)).await
        }
        AgentRequest::GetDiskInfo => {
            let probe = Arc::clone(&ctx.probe);
            let info = cached_or_refresh(&ctx.disk_cache, move || compute_disk_info(probe.as_ref()));
            wire::write_message(stream, &AgentResponse::DiskInfo(info)).await
        }
        AgentRequest::GetActiveConnections { state_filter, include_local } => {
            let connections = filter_connections(active_connections(), state_filter.as_deref(), include_local);
            let totals = connections.len();
            wire::write_message(
                stream,
                &AgentResponse::ActiveConnections(ActiveConnectionsResponse { connections, totals }),
            )
            .await
        }
        AgentRequest::GetSystemErrors {
            since_timestamp,
            include_warnings,
            max_errors,
        } => {
            let mut errors = ctx.log_buffer.errors_since(since_timestamp, include_warnings);
            errors.truncate(max_errors);
            let counts = errors.len();
            let most_common = most_common_message(&errors);
            wire::write_message(
                stream,
                &AgentResponse::SystemErrors(SystemErrorsResponse { errors, counts, most_common }),
            )
            .await
        }
        AgentRequest::GetRecentLogs {
            max_lines,
            level_filter,
            source_filter,
            since_timestamp,
        } => {
            let (logs, total_count) =
                ctx.log_buffer
                    .recent(max_lines, level_filter, source_filter.as_deref(), since_timestamp);
            let has_more = total_count > logs.len();
            wire::write_message(
                stream,
                &AgentResponse::RecentLogs(RecentLogsResponse { logs, total_count, has_more }),
            )
            .await
        }
        AgentRequest::GetPerformanceHistory { duration_minutes, data_points } => {
            let response = ctx.perf_history.query(duration_minutes, data_points);
            wire::write_message(stream, &AgentResponse::PerformanceHistory(response)).await
        }
        AgentRequest::DiagnoseHealth { deep_check } => {
            let recent_errors = if deep_check {
                Some(ctx.log_buffer.errors_since(None, true).len())
            } else {
                None
            };
            let report = diagnose(ctx.probe.as_ref(), recent_errors);
            let response = DiagnoseHealthResponse {
                overall_status: report.overall_status.to_string(),
                health_score: report.health_score as i32,
                totals: report.issues.len(),
                issues: report
                    .issues
                    .into_iter()
                    .map(|i| HealthIssueWire {
                        severity: format!("{:?}", i.severity).to_lowercase(),
                        message: format!(
                            "{}: {:.1} exceeds threshold {:.1} ({})",
                            i.category, i.current_value, i.threshold, i.suggestion
                        ),
                    })
                    .collect(),
                summary: report.summary,
            };
            wire::write_message(stream, &AgentResponse::DiagnoseHealth(response)).await
        }
        AgentRequest::StreamLogs => stream_logs(stream, ctx).await,
        AgentRequest::StreamMetrics => stream_metrics(stream, ctx).await,
        AgentRequest::RestartService => {
            wire::write_message(
                stream,
                &AgentResponse::RestartService {
                    success: false,
                    message: "no service supervisor is managing this agent".to_string(),
                },
            )
            .await
        }
        AgentRequest::InteractiveShellOpen { cols, rows } => {
            wire::write_message(stream, &AgentResponse::ShellOpened).await?;
            let stream = std::mem::replace(stream, dummy_stream().await?);
            let shell = ctx.shell.clone();
            crate::shell::run_shell_session(stream, shell.as_deref(), cols, rows).await;
            Ok(())
        }
        AgentRequest::RegisterWatcher { config } => {
            let response = handle_register_watcher(ctx, config);
            wire::write_message(stream, &AgentResponse::RegisterWatcher(response)).await
        }
        AgentRequest::ListWatchers => {
            let watchers: Vec<serde_json::Value> = ctx
                .watchers
                .list()
                .into_iter()
                .filter_map(|spec| serde_json::to_value(spec).ok())
                .collect();
            wire::write_message(
                stream,
                &AgentResponse::ListWatchers(fleet_core::wire::agent::ListWatchersResponse { watchers }),
            )
            .await
        }
        AgentRequest::RemoveWatcher { watcher_id } => {
            let removed = ctx.watchers.remove(&WatcherId::new(watcher_id.clone()));
            wire::write_message(
                stream,
                &AgentResponse::RemoveWatcher {
                    success: removed,
                    message: if removed {
                        format!("watcher '{watcher_id}' removed")
                    } else {
                        format!("no such watcher '{watcher_id}'")
                    },
                },
            )
            .await
        }
    }
}

/// `InteractiveShellOpen` hands the live `TcpStream` off to
/// [`crate::shell::run_shell_session`], which takes it by value. The
/// caller's `&mut TcpStream` still needs a value to leave behind;
/// binding a fresh unconnected socket is never touched again since the
/// handler returns immediately after the handoff.
async fn dummy_stream() -> Result<TcpStream, WireError> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(WireError::Io)?;
    let addr = listener.local_addr().map_err(WireError::Io)?;
    let connect = TcpStream::connect(addr);
    let (accepted, connected) = tokio::join!(listener.accept(), connect);
    drop(accepted.map_err(WireError::Io)?);
    connected.map_err(WireError::Io)
}

fn most_common_message(errors: &[fleet_core::LogEntry]) -> Option<String> {
    use std::collections::HashMap;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in errors {
        *counts.entry(e.message.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(message, _)| message.to_string())
}

fn compute_resource_usage(probe: &dyn PlatformProbe) -> ResourceUsage {
    let (one, five, fifteen) = probe.load_average();
    ResourceUsage {
        cpu_percent: probe.cpu_percent(),
        memory: probe.memory_info(),
        load_average: [one, five, fifteen],
        uptime_seconds: probe.uptime_seconds(),
    }
}

fn compute_detailed_metrics(probe: &dyn PlatformProbe) -> DetailedMetrics {
    let resource = compute_resource_usage(probe);
    let disks = probe.disk_partitions();
    let disk_total_bytes = disks.iter().map(|d| d.total).sum();
    let disk_used_bytes = disks.iter().map(|d| d.used).sum();
    let (network_bytes_sent, network_bytes_recv) = probe.network_totals();
    let identity = host_identity();
    DetailedMetrics {
        resource,
        disk_total_bytes,
        disk_used_bytes,
        network_bytes_sent,
        network_bytes_recv,
        kernel: identity.kernel,
        os: identity.os,
    }
}

fn compute_network_info(probe: &dyn PlatformProbe) -> NetworkInfoResponse {
    NetworkInfoResponse {
        interfaces: probe.network_interfaces(),
        hostname: host_identity().hostname,
    }
}

fn compute_disk_info(probe: &dyn PlatformProbe) -> DiskInfoResponse {
    let partitions = probe
        .disk_partitions()
        .into_iter()
        .map(|d| DiskPartition {
            device: d.device,
            mountpoint: d.mountpoint,
            total: d.total,
            used: d.used,
            free: d.free,
            used_percent: if d.total == 0 {
                0.0
            } else {
                (d.used as f64 / d.total as f64) * 100.0
            },
        })
        .collect();
    DiskInfoResponse {
        partitions,
        // Per-partition I/O counters aren't exposed by `PlatformProbe`;
        // the probe's fail-soft-to-zero policy applies here too.
        total_io_read_bytes: 0,
        total_io_write_bytes: 0,
    }
}

fn handle_register_watcher(ctx: &Arc<AgentContext>, config: serde_json::Value) -> RegisterWatcherResponse {
    match serde_json::from_value::<fleet_core::WatcherSpec>(config) {
        Ok(spec) => {
            let id = spec.id.as_str().to_string();
            match ctx.watchers.register(spec) {
                Ok(()) => RegisterWatcherResponse {
                    success: true,
                    message: format!("watcher '{id}' registered"),
                    watcher_id: Some(id),
                },
                Err(e) => RegisterWatcherResponse {
                    success: false,
                    message: e.to_string(),
                    watcher_id: None,
                },
            }
        }
        Err(e) => RegisterWatcherResponse {
            success: false,
            message: format!("invalid watcher config: {e}"),
            watcher_id: None,
        },
    }
}

async fn stream_logs(stream: &mut TcpStream, ctx: &Arc<AgentContext>) -> Result<(), WireError> {
    // §9: the ticker is a liveness probe, not a rate limit — it paces
    // delivery but never drops or coalesces entries.
    let mut last_seen: u64 = 0;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let (entries, _) = ctx.log_buffer.recent(2000, None, None, Some(last_seen));
        for entry in entries {
            last_seen = last_seen.max(entry.timestamp + 1);
            wire::write_message(stream, &AgentResponse::LogStream(LogFrame { entry })).await?;
        }
    }
}

async fn stream_metrics(stream: &mut TcpStream, ctx: &Arc<AgentContext>) -> Result<(), WireError> {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        ticker.tick().await;
        let usage = compute_resource_usage(ctx.probe.as_ref());
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        wire::write_message(stream, &AgentResponse::MetricsStream(MetricsFrame { timestamp, usage })).await?;
    }
}

async fn run_command_stream(stream: &mut TcpStream, command: String, user: Option<String>) -> Result<(), WireError> {
    let mut cmd: Command = fleet_shell::subprocess::shell_command(&command, user.as_deref());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return write_command_frame(
                stream,
                String::new(),
                String::new(),
                Some(e.to_string()),
                true,
                None,
            )
            .await;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        return write_command_frame(stream, String::new(), String::new(), Some("no stdout pipe".into()), true, None).await;
    };
    let Some(stderr) = child.stderr.take() else {
        return write_command_frame(stream, String::new(), String::new(), Some("no stderr pipe".into()), true, None).await;
    };

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = stdout_lines.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(text)) => {
                        write_command_frame(stream, format!("{text}\n"), String::new(), None, false, None).await?;
                    }
                    _ => stdout_done = true,
                }
            }
            line = stderr_lines.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(text)) => {
                        write_command_frame(stream, String::new(), format!("{text}\n"), None, false, None).await?;
                    }
                    _ => stderr_done = true,
                }
            }
        }
    }

    let exit_code = child.wait().await.ok().and_then(|status| status.code());
    write_command_frame(stream, String::new(), String::new(), None, true, exit_code).await
}

async fn write_command_frame(
    stream: &mut TcpStream,
    stdout_chunk: String,
    stderr_chunk: String,
    error: Option<String>,
    finished: bool,
    exit_code: Option<i32>,
) -> Result<(), WireError> {
    wire::write_message(
        stream,
        &AgentResponse::CommandOutput(fleet_core::wire::registry::CommandFrame {
            stdout_chunk,
            stderr_chunk,
            error,
            finished,
            exit_code,
        }),
    )
    .await
}

async fn handle_update_agent(
    ctx: &Arc<AgentContext>,
    target_version: &str,
    force: bool,
    skip_restart: bool,
) -> UpdateAgentResponse {
    let current_version = ctx.version.clone();
    let resolved_target = if target_version.is_empty() || target_version == "latest" {
        current_version.clone()
    } else {
        target_version.to_string()
    };

    if !force && resolved_target == current_version {
        return UpdateAgentResponse {
            success: true,
            message: "already at the requested version".to_string(),
            old_version: current_version.clone(),
            new_version: resolved_target,
        };
    }

    let Some(template) = &ctx.update_url_template else {
        return UpdateAgentResponse {
            success: false,
            message: "no update source configured (FLEETD_UPDATE_URL_TEMPLATE unset)".to_string(),
            old_version: current_version.clone(),
            new_version: resolved_target,
        };
    };
    let url = template.replace("{version}", &resolved_target);

    match apply_update(&url, &ctx.current_exe, None).await {
        Ok(()) => {
            if skip_restart {
                UpdateAgentResponse {
                    success: true,
                    message: "binary replaced, restart deferred".to_string(),
                    old_version: current_version,
                    new_version: resolved_target,
                }
            } else {
                schedule_exit(Duration::from_millis(200));
                let under_supervisor = !matches!(detect_supervisor(), Supervisor::None);
                UpdateAgentResponse {
                    success: true,
                    message: if under_supervisor {
                        "binary replaced, exiting for the supervisor to respawn".to_string()
                    } else {
                        "binary replaced, exiting; no supervisor detected to relaunch it".to_string()
                    },
                    old_version: current_version,
                    new_version: resolved_target,
                }
            }
        }
        Err(e) => UpdateAgentResponse {
            success: false,
            message: format!("update failed: {e}"),
            old_version: current_version,
            new_version: resolved_target,
        },
    }
}

/// Exit the process after `delay`, long enough for the RPC response to
/// flush to the socket before the process disappears.
fn schedule_exit(delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        std::process::exit(0);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_name_covers_every_variant_used_in_logging() {
        assert_eq!(request_name(&AgentRequest::GetResourceUsage), "GetResourceUsage");
        assert_eq!(
            request_name(&AgentRequest::RunCommand { command: "x".into(), user: None }),
            "RunCommand"
        );
    }

    #[test]
    fn most_common_message_picks_the_highest_count() {
        let entries = vec![
            fleet_core::LogEntry {
                timestamp: 1,
                level: fleet_core::LogLevel::Error,
                source: "a".into(),
                message: "disk full".into(),
            },
            fleet_core::LogEntry {
                timestamp: 2,
                level: fleet_core::LogLevel::Error,
                source: "a".into(),
                message: "disk full".into(),
            },
            fleet_core::LogEntry {
                timestamp: 3,
                level: fleet_core::LogLevel::Error,
                source: "a".into(),
                message: "oom".into(),
            },
        ];
        assert_eq!(most_common_message(&entries), Some("disk full".to_string()));
    }

    #[test]
    fn compute_disk_info_derives_used_percent_itself() {
        let disk = fleet_core::Disk {
            device: "/dev/sda1".into(),
            mountpoint: "/".into(),
            total: 200,
            used: 50,
            free: 150,
        };
        let info = DiskPartition {
            device: disk.device.clone(),
            mountpoint: disk.mountpoint.clone(),
            total: disk.total,
            used: disk.used,
            free: disk.free,
            used_percent: (disk.used as f64 / disk.total as f64) * 100.0,
        };
        assert_eq!(info.used_percent, 25.0);
    }
}
