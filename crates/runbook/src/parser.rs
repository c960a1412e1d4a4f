// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Converts the Lua table a task script returns into a [`ParsedScript`].
//! The script is otherwise opaque to this crate: it is evaluated
//! elsewhere (the executor owns the `mlua::Lua` context), and only the
//! returned value reaches [`parse_script_result`].

use indexmap::IndexMap;
use mlua::Value as LuaValue;
use thiserror::Error;

use crate::task::{ParsedScript, TaskDef, TaskGroup};

#[derive(Debug, Error, PartialEq)]
pub enum ScriptParseError {
    #[error("task script did not return a table")]
    NotATable,
    #[error("task script returned an empty table")]
    Empty,
    #[error("group '{group}' field 'tasks' must be a sequence, found {found}")]
    TasksNotASequence { group: String, found: &'static str },
    #[error("group '{group}' has a task with no 'name' field")]
    TaskMissingName { group: String },
    #[error("group '{group}' value must be a table, found {found}")]
    GroupNotATable { group: String, found: &'static str },
}

/// Parse a script's return value into `groupName -> TaskGroup` per the
/// `{ [groupName] = { tasks = { ... } } }` contract. A non-table or
/// empty-table result is an error; the caller (the executor) maps that
/// straight onto `ExecuteTask`'s failure response.
pub fn parse_script_result(value: &LuaValue) -> Result<ParsedScript, ScriptParseError> {
    let LuaValue::Table(root) = value else {
        return Err(ScriptParseError::NotATable);
    };
    if root.pairs::<LuaValue, LuaValue>().next().is_none() {
        return Err(ScriptParseError::Empty);
    }

    let mut groups: ParsedScript = IndexMap::new();
    for pair in root.pairs::<String, LuaValue>() {
        let (group_name, group_value) = pair.map_err(|_| ScriptParseError::NotATable)?;
        let LuaValue::Table(group_table) = &group_value else {
            return Err(ScriptParseError::GroupNotATable {
                group: group_name,
                found: lua_type_name(&group_value),
            });
        };
        let tasks_value: LuaValue = group_table.get("tasks").unwrap_or(LuaValue::Nil);
        let tasks = parse_tasks(&group_name, &tasks_value)?;
        groups.insert(group_name, TaskGroup { tasks });
    }

    if groups.is_empty() {
        return Err(ScriptParseError::Empty);
    }
    Ok(groups)
}

fn parse_tasks(group: &str, value: &LuaValue) -> Result<Vec<TaskDef>, ScriptParseError> {
    match value {
        LuaValue::Nil => Ok(Vec::new()),
        LuaValue::Table(table) => {
            let mut tasks = Vec::new();
            for entry in table.clone().sequence_values::<LuaValue>() {
                let entry = entry.map_err(|_| ScriptParseError::TasksNotASequence {
                    group: group.to_string(),
                    found: "table",
                })?;
                tasks.push(parse_task(group, &entry)?);
            }
            Ok(tasks)
        }
        other => Err(ScriptParseError::TasksNotASequence {
            group: group.to_string(),
            found: lua_type_name(other),
        }),
    }
}

fn parse_task(group: &str, value: &LuaValue) -> Result<TaskDef, ScriptParseError> {
    let LuaValue::Table(table) = value else {
        return Err(ScriptParseError::TaskMissingName {
            group: group.to_string(),
        });
    };

    let name: Option<String> = table.get("name").ok();
    let name = name.ok_or_else(|| ScriptParseError::TaskMissingName {
        group: group.to_string(),
    })?;

    let run: Option<String> = table.get("run").ok();
    let delegate_to: Option<String> = table.get("delegate_to").ok();

    let mut extra = std::collections::HashMap::new();
    for pair in table.clone().pairs::<String, LuaValue>() {
        let Ok((key, val)) = pair else { continue };
        if matches!(key.as_str(), "name" | "run" | "delegate_to") {
            continue;
        }
        extra.insert(key, lua_value_to_json(&val));
    }

    Ok(TaskDef {
        name,
        run,
        delegate_to,
        extra,
    })
}

fn lua_type_name(value: &LuaValue) -> &'static str {
    match value {
        LuaValue::Nil => "nil",
        LuaValue::Boolean(_) => "boolean",
        LuaValue::Integer(_) => "integer",
        LuaValue::Number(_) => "number",
        LuaValue::String(_) => "string",
        LuaValue::Table(_) => "table",
        LuaValue::Function(_) => "function",
        _ => "userdata",
    }
}

fn lua_value_to_json(value: &LuaValue) -> serde_json::Value {
    match value {
        LuaValue::Nil => serde_json::Value::Null,
        LuaValue::Boolean(b) => serde_json::Value::Bool(*b),
        LuaValue::Integer(i) => serde_json::Value::from(*i),
        LuaValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        LuaValue::String(s) => serde_json::Value::String(s.to_string_lossy()),
        LuaValue::Table(t) => {
            if t.raw_len() > 0 {
                let items: Vec<serde_json::Value> = t
                    .clone()
                    .sequence_values::<LuaValue>()
                    .filter_map(|v| v.ok())
                    .map(|v| lua_value_to_json(&v))
                    .collect();
                serde_json::Value::Array(items)
            } else {
                let mut map = serde_json::Map::new();
                for pair in t.clone().pairs::<String, LuaValue>().filter_map(|p| p.ok()) {
                    map.insert(pair.0, lua_value_to_json(&pair.1));
                }
                serde_json::Value::Object(map)
            }
        }
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
