// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning and probing a local `fleetd` process, for `agent start
//! --daemon` and `agent install`. Mirrors the teacher daemon launcher's
//! binary-discovery convention: prefer a sibling of the running
//! `fleetctl` binary, fall back to `$PATH`.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use fleet_storage::PidFile;

/// Spawn `fleetd` detached, with the given agent name and master
/// address passed through its `FLEETD_*` environment variables (§6.4).
pub fn spawn_fleetd(
    name: &str,
    master_address: &str,
    listen_address: &str,
) -> std::io::Result<std::process::Child> {
    Command::new(find_fleetd_binary())
        .env("FLEETD_NAME", name)
        .env("FLEETD_MASTER_ADDRESS", master_address)
        .env("FLEETD_LISTEN_ADDRESS", listen_address)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Locate the `fleetd` binary: a sibling of the currently running
/// `fleetctl` executable first, then `$PATH`.
fn find_fleetd_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("fleetd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("fleetd")
}

/// Wait until the named agent's pid file disappears or `timeout` elapses.
pub async fn wait_for_exit(name: &str, timeout: Duration) -> bool {
    let path = PidFile::path_for(name);
    let start = Instant::now();
    while start.elapsed() < timeout {
        if PidFile::read_pid(&path).is_none() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

/// Read the pid of a locally running agent named `name`, if any.
pub fn read_agent_pid(name: &str) -> Option<u32> {
    PidFile::read_pid(&PidFile::path_for(name))
}

/// Send `SIGTERM` to a locally running agent process.
pub fn terminate(pid: u32) -> bool {
    Command::new("kill")
        .args(["-15", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
