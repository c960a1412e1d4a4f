// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers.

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Default timeout for `runCommand` invocations.
pub const RUN_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for self-update download/extract subprocess helpers.
pub const UPDATE_HELPER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: io::Error,
    },
    #[error("{description} timed out after {}s", .timeout.as_secs())]
    Timeout {
        description: String,
        timeout: Duration,
    },
}

use std::io;

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(SubprocessError::Io {
            description: description.to_string(),
            source,
        }),
        Err(_elapsed) => Err(SubprocessError::Timeout {
            description: description.to_string(),
            timeout,
        }),
    }
}

/// Build the `Command` for running a shell command, optionally wrapped in
/// `sudo -u <user>`. An empty user or `"root"` means no sudo wrapping, per
/// the agent RPC server's `runCommand` contract.
pub fn shell_command(command: &str, user: Option<&str>) -> Command {
    let needs_sudo = matches!(user, Some(u) if !u.is_empty() && u != "root");
    let mut cmd = if needs_sudo {
        let mut c = Command::new("sudo");
        c.arg("-u").arg(user.unwrap_or_default());
        c.arg("sh").arg("-c").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    cmd.kill_on_drop(true);
    cmd
}
