// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mlua::Lua;

fn eval(src: &str) -> LuaValue {
    let lua = Lua::new();
    lua.load(src).eval().expect("script evaluates")
}

#[test]
fn a_well_formed_script_parses_into_named_groups() {
    let value = eval(
        r#"
        return {
            deploy = {
                tasks = {
                    { name = "build", run = "make build" },
                    { name = "test", run = "make test" },
                },
            },
        }
        "#,
    );
    let parsed = parse_script_result(&value).unwrap();
    assert_eq!(parsed.len(), 1);
    let group = &parsed["deploy"];
    assert_eq!(group.tasks.len(), 2);
    assert_eq!(group.tasks[0].name, "build");
    assert_eq!(group.tasks[0].run.as_deref(), Some("make build"));
}

#[test]
fn a_non_table_result_is_rejected() {
    let value = eval("return 42");
    assert_eq!(parse_script_result(&value), Err(ScriptParseError::NotATable));
}

#[test]
fn an_empty_table_result_is_rejected() {
    let value = eval("return {}");
    assert_eq!(parse_script_result(&value), Err(ScriptParseError::Empty));
}

#[test]
fn a_task_without_a_name_is_rejected() {
    let value = eval(
        r#"
        return {
            deploy = { tasks = { { run = "make build" } } },
        }
        "#,
    );
    assert_eq!(
        parse_script_result(&value),
        Err(ScriptParseError::TaskMissingName {
            group: "deploy".to_string()
        })
    );
}

#[test]
fn delegate_to_and_extra_fields_survive_parsing() {
    let value = eval(
        r#"
        return {
            deploy = {
                tasks = {
                    { name = "handoff", delegate_to = "other-agent", priority = 3 },
                },
            },
        }
        "#,
    );
    let parsed = parse_script_result(&value).unwrap();
    let task = &parsed["deploy"].tasks[0];
    assert_eq!(task.delegate_to.as_deref(), Some("other-agent"));
    assert_eq!(task.extra.get("priority"), Some(&serde_json::json!(3)));
}
