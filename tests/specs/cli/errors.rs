use crate::prelude::*;

#[test]
fn get_against_an_unreachable_master_fails_with_a_clear_message() {
    // Port 1 is privileged and never listening in test sandboxes.
    fleetctl("127.0.0.1:1")
        .args(&["agent", "get", "nonexistent"])
        .fails()
        .stderr_has("could not reach master");
}

#[test]
fn exec_against_an_address_form_name_skips_registry_resolution() {
    // `host:port` already looks resolved, so this fails at the TCP
    // connect to the agent, not at master resolution.
    fleetctl("127.0.0.1:1")
        .args(&["agent", "exec", "127.0.0.1:1", "echo hi"])
        .fails();
}
