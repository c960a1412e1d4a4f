// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task executor (C4): unpacks a workspace, evaluates the task's Lua
//! script in a fresh `mlua::Lua` context, runs the selected group/task,
//! repacks the workspace, and hands any watchers the script registered
//! to the watcher manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlua::{Lua, Table as LuaTable, Value as LuaValue};
use thiserror::Error;

use fleet_adapters::WatcherManager;
use fleet_core::{TaskRequest, TaskResult, WatcherCondition, WatcherId, WatcherSpec, WatcherType, WorkspaceArchive};
use fleet_runbook::{parse_script_result, strip_delegate_to, TaskGroup};
use fleet_shell::codec;
use fleet_shell::subprocess::{run_with_timeout, shell_command, RUN_COMMAND_TIMEOUT};

#[derive(Debug, Error)]
pub enum TaskExecuteError {
    #[error("workspace codec error: {0}")]
    Codec(#[from] codec::CodecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Restores the process working directory on drop, so a panic or early
/// return during task execution never leaves the process parked inside
/// a temp workspace that is about to be deleted.
struct CwdGuard(PathBuf);

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

pub struct TaskExecutor {
    watchers: Arc<WatcherManager>,
}

impl TaskExecutor {
    pub fn new(watchers: Arc<WatcherManager>) -> Self {
        Self { watchers }
    }

    /// Run a single `ExecuteTask` request to completion. Never returns
    /// `Err` for a script/task failure — those come back as
    /// `TaskResult { success: false, .. }` per the RPC's contract; `Err`
    /// is reserved for failures to even set up the workspace.
    pub async fn execute(&self, request: TaskRequest) -> Result<TaskResult, TaskExecuteError> {
        let span = tracing::info_span!(
            "task",
            task = %request.task_name,
            group = %request.task_group
        );
        let _guard = span.enter();
        let start = std::time::Instant::now();

        let temp = tempfile::tempdir()?;
        let workspace_dir = temp.path().to_path_buf();
        codec::unpack(&request.workspace, &workspace_dir)?;

        let result = self.run_in_workspace(&request, &workspace_dir).await;

        let elapsed = start.elapsed();
        match &result {
            Ok(r) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                success = r.success,
                "task finished"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "task setup failed"
            ),
        }
        result
    }

    async fn run_in_workspace(
        &self,
        request: &TaskRequest,
        workspace_dir: &Path,
    ) -> Result<TaskResult, TaskExecuteError> {
        let lua = Lua::new();
        if let Some(user) = &request.user {
            if lua.globals().set("user", user.clone()).is_err() {
                tracing::warn!("failed to set 'user' global");
            }
        }
        let watchers_table = match lua.create_table() {
            Ok(t) => t,
            Err(e) => {
                return Ok(self.fail(request, format!("lua setup failed: {e}"), workspace_dir));
            }
        };
        if lua.globals().set("watchers", watchers_table.clone()).is_err() {
            tracing::warn!("failed to install 'watchers' global");
        }

        let value = match lua.load(request.lua_script.as_str()).eval::<LuaValue>() {
            Ok(v) => v,
            Err(e) => {
                return Ok(self.fail(request, format!("script error: {e}"), workspace_dir));
            }
        };

        let mut groups = match parse_script_result(&value) {
            Ok(g) => g,
            Err(e) => return Ok(self.fail(request, e.to_string(), workspace_dir)),
        };
        strip_delegate_to(&mut groups);

        let Some(group) = groups.get_mut(&request.task_group) else {
            return Ok(self.fail(
                request,
                format!("no such task group '{}'", request.task_group),
                workspace_dir,
            ));
        };
        if !request.task_name.is_empty() {
            group.retain_only(&request.task_name);
        }

        let previous_dir = std::env::current_dir()?;
        std::env::set_current_dir(workspace_dir)?;
        let _restore = CwdGuard(previous_dir);
        let run_result = run_group(group, request.user.as_deref()).await;
        drop(_restore);

        self.drain_registered_watchers(&watchers_table);

        let workspace = codec::pack(workspace_dir)?;
        Ok(match run_result {
            Ok(output) => TaskResult::ok(output, workspace),
            Err(message) => TaskResult::failed(&request.task_name, &request.task_group, message, workspace),
        })
    }

    fn fail(&self, request: &TaskRequest, message: impl std::fmt::Display, workspace_dir: &Path) -> TaskResult {
        let workspace = codec::pack(workspace_dir).unwrap_or_else(|_| WorkspaceArchive::empty());
        TaskResult::failed(&request.task_name, &request.task_group, message, workspace)
    }

    fn drain_registered_watchers(&self, table: &LuaTable) {
        for entry in table.clone().sequence_values::<LuaTable>() {
            let Ok(entry) = entry else { continue };
            match watcher_spec_from_table(&entry) {
                Ok(spec) => {
                    if let Err(e) = self.watchers.register(spec) {
                        tracing::warn!(error = %e, "script-registered watcher rejected");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "malformed watcher table from task script"),
            }
        }
    }
}

async fn run_group(group: &TaskGroup, user: Option<&str>) -> Result<String, String> {
    let mut output = String::new();
    for task in &group.tasks {
        let Some(command) = &task.run else {
            continue;
        };
        let cmd = shell_command(command, user);
        match run_with_timeout(cmd, RUN_COMMAND_TIMEOUT, &task.name).await {
            Ok(out) => {
                output.push_str(&String::from_utf8_lossy(&out.stdout));
                if !out.status.success() {
                    return Err(format!(
                        "task '{}' exited with {:?}",
                        task.name,
                        out.status.code()
                    ));
                }
            }
            Err(e) => return Err(format!("task '{}': {e}", task.name)),
        }
    }
    Ok(output)
}

fn watcher_spec_from_table(table: &LuaTable) -> Result<WatcherSpec, String> {
    let id: String = table.get("id").map_err(|e| e.to_string())?;
    let kind: String = table.get("type").map_err(|e| e.to_string())?;
    let interval_secs: u64 = table.get("interval_secs").unwrap_or(60);
    let conditions = watcher_conditions_from_table(table);

    let watcher_type = match kind.as_str() {
        "file" | "directory" => {
            let path: String = table.get("path").map_err(|_| "missing 'path'".to_string())?;
            let recursive: bool = table.get("recursive").unwrap_or(false);
            let check_hash: bool = table.get("check_hash").unwrap_or(false);
            let pattern: Option<String> = table.get("pattern").ok();
            if kind == "file" {
                WatcherType::File { path, recursive, check_hash, pattern }
            } else {
                WatcherType::Directory { path, recursive, check_hash, pattern }
            }
        }
        "process" => WatcherType::Process {
            process_name: table.get("process_name").ok(),
            pid: table.get("pid").ok(),
        },
        "port" => WatcherType::Port {
            port: table.get("port").map_err(|_| "missing 'port'".to_string())?,
            protocol: table.get("protocol").unwrap_or_else(|_| "tcp".to_string()),
        },
        "service" => WatcherType::Service {
            service_name: table.get("service_name").map_err(|_| "missing 'service_name'".to_string())?,
        },
        "cpu" => WatcherType::Cpu {
            threshold: table.get("threshold").map_err(|_| "missing 'threshold'".to_string())?,
        },
        "memory" => WatcherType::Memory {
            threshold: table.get("threshold").map_err(|_| "missing 'threshold'".to_string())?,
        },
        "disk" => WatcherType::Disk {
            path: table.get("path").map_err(|_| "missing 'path'".to_string())?,
            threshold: table.get("threshold").map_err(|_| "missing 'threshold'".to_string())?,
        },
        other => return Err(format!("unknown watcher type '{other}'")),
    };

    Ok(WatcherSpec {
        id: WatcherId::new(id),
        watcher_type,
        interval: std::time::Duration::from_secs(interval_secs),
        conditions,
    })
}

fn watcher_conditions_from_table(table: &LuaTable) -> Vec<WatcherCondition> {
    let Ok(raw) = table.get::<LuaTable>("conditions") else {
        return Vec::new();
    };
    raw.sequence_values::<String>()
        .filter_map(|v| v.ok())
        .filter_map(|s| match s.as_str() {
            "created" => Some(WatcherCondition::Created),
            "changed" => Some(WatcherCondition::Changed),
            "deleted" => Some(WatcherCondition::Deleted),
            "above" => Some(WatcherCondition::Above),
            "below" => Some(WatcherCondition::Below),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[path = "task_executor_tests.rs"]
mod tests;
