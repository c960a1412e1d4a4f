use crate::prelude::*;

#[test]
fn agent_help_lists_the_full_subcommand_surface() {
    fleetctl("127.0.0.1:1")
        .args(&["agent", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("exec")
        .stdout_has("watcher");
}

#[test]
fn bare_invocation_without_a_subcommand_fails() {
    fleetctl("127.0.0.1:1")
        .fails()
        .stderr_has("Usage");
}
