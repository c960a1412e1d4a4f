// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ExecuteTask` request/result envelope. The Lua script body is
//! opaque to this crate — it is interpreted by `fleet-runbook`.

use serde::{Deserialize, Serialize};

use crate::workspace::WorkspaceArchive;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_name: String,
    pub task_group: String,
    pub lua_script: String,
    pub workspace: WorkspaceArchive,
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub output: String,
    pub workspace: WorkspaceArchive,
}

impl TaskResult {
    pub fn ok(output: impl Into<String>, workspace: WorkspaceArchive) -> Self {
        Self {
            success: true,
            output: output.into(),
            workspace,
        }
    }

    /// Build a failure result. `task_name`/`task_group` are framed into the
    /// diagnostic so the caller does not have to parse `output` to find
    /// them (§7: "framed diagnostics including task name, group, and error
    /// message").
    pub fn failed(
        task_name: &str,
        task_group: &str,
        message: impl std::fmt::Display,
        workspace: WorkspaceArchive,
    ) -> Self {
        Self {
            success: false,
            output: format!(
                "task '{task_name}' in group '{task_group}' failed: {message}"
            ),
            workspace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_frames_task_and_group_into_the_message() {
        let result = TaskResult::failed("build", "ci", "syntax error", WorkspaceArchive::empty());
        assert!(!result.success);
        assert!(result.output.contains("'build'"));
        assert!(result.output.contains("'ci'"));
        assert!(result.output.contains("syntax error"));
    }
}
