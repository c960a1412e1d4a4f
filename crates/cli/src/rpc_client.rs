// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin client for talking directly to a `fleetd` agent (§6.2), used by
//! every `agent` subcommand once [`crate::resolve::resolve_agent_address`]
//! has turned a name into a `host:port`. Mirrors `fleet-registry`'s
//! `RegistryClient`: one short-lived connection per request/response
//! call, plus dedicated helpers for the streaming and bidi RPCs that
//! hold a connection open across many frames.

use fleet_core::wire::agent::{AgentRequest, AgentResponse};
use fleet_core::wire::{self, WireError};
use tokio::net::TcpStream;

#[derive(Debug, Clone)]
pub struct AgentClient {
    address: String,
}

impl AgentClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Issue a single request/response RPC over a fresh connection.
    pub async fn call(&self, request: AgentRequest) -> Result<AgentResponse, WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message(&mut stream, &request).await?;
        wire::read_message(&mut stream).await
    }

    /// Open a `RunCommand` stream and invoke `on_frame` for each
    /// `CommandFrame` until the agent marks one `finished`.
    pub async fn run_command(
        &self,
        command: String,
        user: Option<String>,
        mut on_frame: impl FnMut(fleet_core::wire::registry::CommandFrame),
    ) -> Result<(), WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message(&mut stream, &AgentRequest::RunCommand { command, user }).await?;
        loop {
            let response: AgentResponse = wire::read_message(&mut stream).await?;
            let AgentResponse::CommandOutput(frame) = response else {
                return Err(WireError::ConnectionClosed);
            };
            let finished = frame.finished;
            on_frame(frame);
            if finished {
                return Ok(());
            }
        }
    }

    /// Open a `StreamLogs` connection and invoke `on_entry` for every
    /// log frame the agent emits. Runs until the connection closes or
    /// `on_entry` returns `false`.
    pub async fn stream_logs(
        &self,
        mut on_entry: impl FnMut(fleet_core::LogEntry) -> bool,
    ) -> Result<(), WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message(&mut stream, &AgentRequest::StreamLogs).await?;
        loop {
            let response: AgentResponse = wire::read_message(&mut stream).await?;
            let AgentResponse::LogStream(frame) = response else {
                return Err(WireError::ConnectionClosed);
            };
            if !on_entry(frame.entry) {
                return Ok(());
            }
        }
    }

    /// Open a `StreamMetrics` connection and invoke `on_frame` for every
    /// tick until the connection closes or `on_frame` returns `false`.
    pub async fn stream_metrics(
        &self,
        mut on_frame: impl FnMut(fleet_core::wire::agent::MetricsFrame) -> bool,
    ) -> Result<(), WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message(&mut stream, &AgentRequest::StreamMetrics).await?;
        loop {
            let response: AgentResponse = wire::read_message(&mut stream).await?;
            let AgentResponse::MetricsStream(frame) = response else {
                return Err(WireError::ConnectionClosed);
            };
            if !on_frame(frame) {
                return Ok(());
            }
        }
    }

    /// Dial the agent and send `InteractiveShellOpen`, returning the
    /// still-open stream once the agent confirms with `ShellOpened`.
    /// The caller drives the resulting bidi `ShellInput`/`ShellOutput`
    /// exchange directly — raw terminal mode is the CLI's concern, not
    /// this client's.
    pub async fn open_shell(&self, cols: u16, rows: u16) -> Result<TcpStream, WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message(&mut stream, &AgentRequest::InteractiveShellOpen { cols, rows }).await?;
        match wire::read_message(&mut stream).await? {
            AgentResponse::ShellOpened => Ok(stream),
            AgentResponse::Error { message } => Err(WireError::Io(std::io::Error::other(message))),
            _ => Err(WireError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::wire::registry::CommandFrame;

    async fn spawn_echo_agent() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request: AgentRequest = wire::read_message(&mut stream).await.unwrap();
            match request {
                AgentRequest::GetResourceUsage => {
                    let usage = fleet_core::wire::agent::ResourceUsage {
                        cpu_percent: 1.0,
                        memory: fleet_core::Memory {
                            total: 0,
                            used: 0,
                            available: 0,
                            free: 0,
                            cached: 0,
                            buffers: 0,
                        },
                        load_average: [0.0, 0.0, 0.0],
                        uptime_seconds: 0,
                    };
                    wire::write_message(&mut stream, &AgentResponse::ResourceUsage(usage))
                        .await
                        .unwrap();
                }
                AgentRequest::RunCommand { .. } => {
                    wire::write_message(
                        &mut stream,
                        &AgentResponse::CommandOutput(CommandFrame {
                            stdout_chunk: "hi\n".into(),
                            stderr_chunk: String::new(),
                            error: None,
                            finished: false,
                            exit_code: None,
                        }),
                    )
                    .await
                    .unwrap();
                    wire::write_message(
                        &mut stream,
                        &AgentResponse::CommandOutput(CommandFrame {
                            stdout_chunk: String::new(),
                            stderr_chunk: String::new(),
                            error: None,
                            finished: true,
                            exit_code: Some(0),
                        }),
                    )
                    .await
                    .unwrap();
                }
                _ => {}
            }
        });
        addr
    }

    #[tokio::test]
    async fn call_round_trips_a_single_request() {
        let addr = spawn_echo_agent().await;
        let client = AgentClient::new(addr);
        let response = client.call(AgentRequest::GetResourceUsage).await.unwrap();
        assert!(matches!(response, AgentResponse::ResourceUsage(_)));
    }

    #[tokio::test]
    async fn run_command_collects_every_frame_until_finished() {
        let addr = spawn_echo_agent().await;
        let client = AgentClient::new(addr);
        let mut frames = Vec::new();
        client
            .run_command("echo hi".into(), None, |frame| frames.push(frame))
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.last().unwrap().finished);
    }
}
