// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn group_with(names: &[&str]) -> TaskGroup {
    TaskGroup {
        tasks: names
            .iter()
            .map(|n| TaskDef {
                name: n.to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

#[test]
fn retain_only_drops_every_other_task() {
    let mut group = group_with(&["build", "test", "deploy"]);
    group.retain_only("test");
    assert_eq!(group.tasks.len(), 1);
    assert_eq!(group.tasks[0].name, "test");
}

#[test]
fn retain_only_is_a_no_op_when_the_name_is_not_present() {
    let mut group = group_with(&["build", "test"]);
    group.retain_only("nonexistent");
    assert_eq!(group.tasks.len(), 2);
}

#[test]
fn get_task_finds_by_name() {
    let group = group_with(&["build", "test"]);
    assert!(group.get_task("build").is_some());
    assert!(group.get_task("missing").is_none());
}

#[test]
fn strip_delegate_to_clears_every_task_across_every_group() {
    let mut groups: ParsedScript = IndexMap::new();
    groups.insert(
        "deploy".to_string(),
        TaskGroup {
            tasks: vec![
                TaskDef {
                    name: "a".to_string(),
                    delegate_to: Some("other-agent".to_string()),
                    ..Default::default()
                },
                TaskDef {
                    name: "b".to_string(),
                    delegate_to: None,
                    ..Default::default()
                },
            ],
        },
    );

    let stripped = strip_delegate_to(&mut groups);
    assert_eq!(stripped, 1);
    assert!(groups["deploy"].tasks.iter().all(|t| t.delegate_to.is_none()));
}
