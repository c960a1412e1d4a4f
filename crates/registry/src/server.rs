// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP accept loop and RPC dispatch for `fleet-registry` (§6.1). One
//! `tokio::spawn`ed task per inbound connection, matching the teacher's
//! one-task-per-client convention in its own listener; `ExecuteCommand`
//! dials the target agent directly and streams its `RunCommand`
//! response back to the caller unmodified.

use std::net::SocketAddr;
use std::sync::Arc;

use fleet_core::wire::agent::{AgentRequest, AgentResponse};
use fleet_core::wire::registry::{CommandFrame, RegistryRequest, RegistryResponse};
use fleet_core::wire::{self, WireError, DEFAULT_RPC_TIMEOUT};
use fleet_core::SystemClock;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, info_span, warn, Instrument};

use crate::state::AgentTable;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run the registry's accept loop until the process is killed. Never
/// returns on success; every per-connection failure is logged and the
/// loop continues, matching §7's "transient network" handling (log and
/// move on, no connection error should take the whole registry down).
pub async fn serve(bind_address: &str) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|source| ServerError::Bind {
            address: bind_address.to_string(),
            source,
        })?;
    info!(address = bind_address, "fleet-registry listening");

    let table = Arc::new(AgentTable::new(SystemClock));

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let table = Arc::clone(&table);
                tokio::spawn(
                    async move {
                        if let Err(e) = handle_connection(stream, peer, table).await {
                            warn!(error = %e, "connection ended with an error");
                        }
                    }
                    .instrument(info_span!("registry_conn", peer = %peer)),
                );
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}

pub(crate) async fn handle_connection(
    mut stream: TcpStream,
    _peer: SocketAddr,
    table: Arc<AgentTable<SystemClock>>,
) -> Result<(), WireError> {
    let request: RegistryRequest = wire::read_message_with_timeout(&mut stream, DEFAULT_RPC_TIMEOUT).await?;
    let span = info_span!("rpc", method = request_name(&request));
    let _enter = span.enter();
    let started = std::time::Instant::now();

    match request {
        RegistryRequest::RegisterAgent {
            name,
            address,
            version,
        } => {
            table.register(&name, &address, &version);
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::Success { success: true },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::Heartbeat {
            name,
            system_info_json,
        } => {
            let success = table.heartbeat(&name, system_info_json);
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::Success { success },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::ListAgents => {
            let agents = table.list();
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::AgentList { agents },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::GetAgentInfo { name } => {
            let agent_info = table.get(&name);
            let (success, message) = match &agent_info {
                Some(_) => (true, String::new()),
                None => (false, format!("no such agent: {name}")),
            };
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::AgentDetail {
                    success,
                    agent_info,
                    message,
                },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::UnregisterAgent { name } => {
            table.unregister(&name);
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::Success { success: true },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::StopAgent { name } => {
            let result = stop_agent(&table, &name).await;
            let (success, message) = match result {
                Ok(()) => (true, "shutdown requested".to_string()),
                Err(e) => (false, e.to_string()),
            };
            wire::write_message_with_timeout(
                &mut stream,
                &RegistryResponse::StopResult { success, message },
                DEFAULT_RPC_TIMEOUT,
            )
            .await?;
        }
        RegistryRequest::ExecuteCommand {
            agent_name,
            command,
        } => {
            execute_command_fanout(&mut stream, &table, &agent_name, &command).await?;
        }
    }

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "rpc completed");
    Ok(())
}

fn request_name(request: &RegistryRequest) -> &'static str {
    match request {
        RegistryRequest::RegisterAgent { .. } => "RegisterAgent",
        RegistryRequest::Heartbeat { .. } => "Heartbeat",
        RegistryRequest::ListAgents => "ListAgents",
        RegistryRequest::GetAgentInfo { .. } => "GetAgentInfo",
        RegistryRequest::UnregisterAgent { .. } => "UnregisterAgent",
        RegistryRequest::StopAgent { .. } => "StopAgent",
        RegistryRequest::ExecuteCommand { .. } => "ExecuteCommand",
    }
}

async fn stop_agent(table: &AgentTable<SystemClock>, name: &str) -> Result<(), WireError> {
    let address = table.raw_address(name).ok_or(WireError::ConnectionClosed)?;
    let mut stream = TcpStream::connect(&address).await?;
    wire::write_message_with_timeout(&mut stream, &AgentRequest::Shutdown, DEFAULT_RPC_TIMEOUT).await?;
    let _: AgentResponse = wire::read_message_with_timeout(&mut stream, DEFAULT_RPC_TIMEOUT).await?;
    Ok(())
}

/// Dial the named agent, issue `RunCommand`, and relay every frame of
/// its stream back to the caller as a [`RegistryResponse::CommandOutput`]
/// until the agent marks one `finished`.
async fn execute_command_fanout(
    caller: &mut TcpStream,
    table: &AgentTable<SystemClock>,
    agent_name: &str,
    command: &str,
) -> Result<(), WireError> {
    let address = match table.raw_address(agent_name) {
        Some(address) => address,
        None => {
            let frame = CommandFrame {
                stdout_chunk: String::new(),
                stderr_chunk: String::new(),
                error: Some(format!("no such agent: {agent_name}")),
                finished: true,
                exit_code: None,
            };
            return wire::write_message_with_timeout(
                caller,
                &RegistryResponse::CommandOutput(frame),
                DEFAULT_RPC_TIMEOUT,
            )
            .await;
        }
    };

    let mut agent_stream = match TcpStream::connect(&address).await {
        Ok(stream) => stream,
        Err(e) => {
            let frame = CommandFrame {
                stdout_chunk: String::new(),
                stderr_chunk: String::new(),
                error: Some(format!("failed to dial agent {agent_name}: {e}")),
                finished: true,
                exit_code: None,
            };
            return wire::write_message_with_timeout(
                caller,
                &RegistryResponse::CommandOutput(frame),
                DEFAULT_RPC_TIMEOUT,
            )
            .await;
        }
    };

    wire::write_message_with_timeout(
        &mut agent_stream,
        &AgentRequest::RunCommand {
            command: command.to_string(),
            user: None,
        },
        DEFAULT_RPC_TIMEOUT,
    )
    .await?;

    loop {
        let response: AgentResponse =
            wire::read_message_with_timeout(&mut agent_stream, DEFAULT_RPC_TIMEOUT).await?;
        let AgentResponse::CommandOutput(frame) = response else {
            error!("agent returned a non-command-output frame mid-stream");
            break;
        };
        let finished = frame.finished;
        wire::write_message_with_timeout(
            caller,
            &RegistryResponse::CommandOutput(frame),
            DEFAULT_RPC_TIMEOUT,
        )
        .await?;
        if finished {
            break;
        }
    }

    Ok(())
}
