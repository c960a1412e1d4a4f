use crate::prelude::*;

#[test]
fn agent_registers_and_appears_in_agent_list() {
    let registry = RunningRegistry::start();
    let agent = RunningAgent::start("spec-agent-list", &registry);

    let found = wait_for(3000, || {
        fleetctl(&registry.address)
            .args(&["agent", "list"])
            .passes()
            .stdout()
            .contains(&agent.name)
    });
    assert!(found, "agent should appear in `agent list` once registered");
}

#[test]
fn agent_get_reports_an_active_status_once_heartbeating() {
    let registry = RunningRegistry::start();
    let agent = RunningAgent::start("spec-agent-get", &registry);

    let active = wait_for(3000, || {
        fleetctl(&registry.address)
            .args(&["agent", "get", &agent.name])
            .passes()
            .stdout()
            .to_lowercase()
            .contains("active")
    });
    assert!(active, "a freshly heartbeating agent should show as active");
}

#[test]
fn agent_exec_streams_command_output_back_through_the_agent() {
    let registry = RunningRegistry::start();
    let agent = RunningAgent::start("spec-agent-exec", &registry);

    wait_for(3000, || {
        fleetctl(&registry.address)
            .args(&["agent", "list"])
            .passes()
            .stdout()
            .contains(&agent.name)
    });

    fleetctl(&registry.address)
        .args(&["agent", "exec", &agent.name, "echo hello-from-fleetd"])
        .passes()
        .stdout_has("hello-from-fleetd");
}

#[test]
fn agent_get_against_an_unknown_name_fails() {
    let registry = RunningRegistry::start();

    fleetctl(&registry.address)
        .args(&["agent", "get", "never-registered"])
        .fails()
        .stderr_has("not found");
}
