// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `InteractiveShell` bidi stream (C7). Once the caller's
//! `InteractiveShellOpen` request has been answered with
//! `AgentResponse::ShellOpened`, the connection switches protocols:
//! client-to-agent frames are bare [`ShellInput`] (no longer wrapped in
//! `AgentRequest`), while agent-to-client frames stay wrapped in
//! `AgentResponse::ShellFrame` so the client's single response decoder
//! keeps working for the life of the session.
//!
//! Two concurrent pumps bridge the PTY (blocking I/O) to the framed
//! stream (async I/O): [`PtySession`] already runs its read side on a
//! `spawn_blocking` task and exposes it as a channel, so the PTY-to-stream
//! pump here is a plain async loop; the stream-to-PTY direction owns the
//! session outright since writes and resizes need `&mut`.

use fleet_adapters::pty::PtySession;
use fleet_core::wire::agent::{AgentResponse, ShellInput, ShellOutput};
use fleet_core::wire::{self};
use tokio::net::TcpStream;

/// Environment a login shell gets when spawned for an interactive
/// session: readable prompt, history disabled, consistent terminal type
/// regardless of what the agent process itself inherited.
pub fn shell_environment_command(shell: &str) -> String {
    format!(
        "export TERM=xterm-256color; export HISTFILE=/dev/null; export PS1='\\u@\\h:\\w\\$ '; exec {shell}"
    )
}

pub async fn run_shell_session(stream: TcpStream, shell: Option<&str>, cols: u16, rows: u16) {
    let login_shell = shell.unwrap_or("/bin/sh");
    let wrapped = shell_environment_command(login_shell);

    let mut session = match PtySession::spawn(Some("/bin/sh"), cols, rows) {
        Ok(s) => s,
        Err(e) => {
            let (_, mut writer) = stream.into_split();
            let _ = wire::write_message(
                &mut writer,
                &AgentResponse::ShellFrame(ShellOutput::Error { message: e.to_string() }),
            )
            .await;
            return;
        }
    };

    if session.write(format!("{wrapped}\n").as_bytes()).is_err() {
        let (_, mut writer) = stream.into_split();
        let _ = wire::write_message(
            &mut writer,
            &AgentResponse::ShellFrame(ShellOutput::Error {
                message: "failed to start login shell".to_string(),
            }),
        )
        .await;
        return;
    }

    let Some(mut output_rx) = session.take_output() else {
        return;
    };
    let (mut reader, mut writer) = stream.into_split();

    let pump_out = async {
        loop {
            match output_rx.recv().await {
                Some(bytes) => {
                    let frame = AgentResponse::ShellFrame(ShellOutput::Data { bytes });
                    if wire::write_message(&mut writer, &frame).await.is_err() {
                        break;
                    }
                }
                None => {
                    let frame = AgentResponse::ShellFrame(ShellOutput::Completed { exit_code: None });
                    let _ = wire::write_message(&mut writer, &frame).await;
                    break;
                }
            }
        }
    };

    let pump_in = async {
        loop {
            let request: Result<ShellInput, wire::WireError> = wire::read_message(&mut reader).await;
            match request {
                Ok(ShellInput::Data { bytes }) => {
                    if session.write(&bytes).is_err() {
                        break;
                    }
                }
                Ok(ShellInput::Resize { rows, cols }) => {
                    let _ = session.resize(cols, rows);
                }
                Ok(ShellInput::Eof) | Err(_) => break,
            }
        }
    };

    tokio::select! {
        _ = pump_out => {}
        _ = pump_in => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_environment_disables_history_and_sets_term() {
        let cmd = shell_environment_command("/bin/bash");
        assert!(cmd.contains("HISTFILE=/dev/null"));
        assert!(cmd.contains("TERM=xterm-256color"));
        assert!(cmd.contains("exec /bin/bash"));
    }

    #[tokio::test]
    async fn a_session_streams_command_output_back_to_the_client() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            run_shell_session(stream, Some("/bin/sh"), 80, 24).await;
        });

        let client = TcpStream::connect(addr).await.unwrap();
        let (mut reader, mut writer) = client.into_split();

        wire::write_message(
            &mut writer,
            &ShellInput::Data {
                bytes: b"echo hello-from-pty\n".to_vec(),
            },
        )
        .await
        .unwrap();

        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            let frame: Result<AgentResponse, _> =
                tokio::time::timeout(std::time::Duration::from_millis(500), wire::read_message(&mut reader)).await.unwrap_or(Err(wire::WireError::ConnectionClosed));
            match frame {
                Ok(AgentResponse::ShellFrame(ShellOutput::Data { bytes })) => {
                    collected.extend_from_slice(&bytes);
                    if String::from_utf8_lossy(&collected).contains("hello-from-pty") {
                        break;
                    }
                }
                _ => continue,
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello-from-pty"));
    }
}
