// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task/group data model a Lua task script evaluates to, and the
//! anti-recursion and task-filtering operations the executor applies
//! before running anything.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One task inside a [`TaskGroup`]. `run` is the shell command executed
/// inside the workspace; everything the script set beyond the modeled
/// fields is kept in `extra` so unrecognized keys survive a round-trip
/// instead of being silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub run: Option<String>,
    /// Target agent to hand this task off to. Always cleared before
    /// execution — see [`strip_delegate_to`].
    #[serde(default)]
    pub delegate_to: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A named group of tasks, the unit an `ExecuteTask` request selects
/// from the script's top-level table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup {
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

impl TaskGroup {
    pub fn get_task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Drop every task except the one named `name`. Leaves the group
    /// untouched when no task matches, matching the "run the whole
    /// group" default an unset `taskName` implies upstream.
    pub fn retain_only(&mut self, name: &str) {
        if self.tasks.iter().any(|t| t.name == name) {
            self.tasks.retain(|t| t.name == name);
        }
    }
}

/// The result of parsing a task script: zero or more named groups.
pub type ParsedScript = IndexMap<String, TaskGroup>;

/// Clear `delegate_to` on every task in every group. Returns how many
/// tasks carried it, purely for logging — the executor's anti-recursion
/// guarantee does not depend on the caller inspecting this value.
pub fn strip_delegate_to(groups: &mut ParsedScript) -> usize {
    let mut stripped = 0;
    for group in groups.values_mut() {
        for task in &mut group.tasks {
            if task.delegate_to.take().is_some() {
                stripped += 1;
            }
        }
    }
    stripped
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
