// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin RPC client to a `fleet-registry` process, shared by the agent's
//! master connection manager (C6) and the CLI's registry façade (C9).
//! One short-lived `TcpStream` per call — registration and heartbeats
//! intentionally do not share a connection, matching §9's "registration
//! uses a short-lived context separate from heartbeats".

use fleet_core::wire::registry::{AgentInfo, RegistryRequest, RegistryResponse};
use fleet_core::wire::{self, WireError, DEFAULT_RPC_TIMEOUT};
use tokio::net::TcpStream;

/// Connects to a registry at `address` fresh for every call.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    address: String,
}

impl RegistryClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    async fn call(&self, request: &RegistryRequest) -> Result<RegistryResponse, WireError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        wire::write_message_with_timeout(&mut stream, request, DEFAULT_RPC_TIMEOUT).await?;
        wire::read_message_with_timeout(&mut stream, DEFAULT_RPC_TIMEOUT).await
    }

    pub async fn register_agent(
        &self,
        name: &str,
        address: &str,
        version: &str,
    ) -> Result<bool, WireError> {
        let response = self
            .call(&RegistryRequest::RegisterAgent {
                name: name.to_string(),
                address: address.to_string(),
                version: version.to_string(),
            })
            .await?;
        Ok(matches!(response, RegistryResponse::Success { success: true }))
    }

    pub async fn heartbeat(
        &self,
        name: &str,
        system_info_json: Option<String>,
    ) -> Result<bool, WireError> {
        let response = self
            .call(&RegistryRequest::Heartbeat {
                name: name.to_string(),
                system_info_json,
            })
            .await?;
        Ok(matches!(response, RegistryResponse::Success { success: true }))
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentInfo>, WireError> {
        match self.call(&RegistryRequest::ListAgents).await? {
            RegistryResponse::AgentList { agents } => Ok(agents),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn get_agent_info(
        &self,
        name: &str,
    ) -> Result<(bool, Option<AgentInfo>, String), WireError> {
        match self
            .call(&RegistryRequest::GetAgentInfo {
                name: name.to_string(),
            })
            .await?
        {
            RegistryResponse::AgentDetail {
                success,
                agent_info,
                message,
            } => Ok((success, agent_info, message)),
            _ => Ok((false, None, "unexpected response".to_string())),
        }
    }

    pub async fn unregister_agent(&self, name: &str) -> Result<bool, WireError> {
        let response = self
            .call(&RegistryRequest::UnregisterAgent {
                name: name.to_string(),
            })
            .await?;
        Ok(matches!(response, RegistryResponse::Success { success: true }))
    }

    pub async fn stop_agent(&self, name: &str) -> Result<(bool, String), WireError> {
        match self
            .call(&RegistryRequest::StopAgent {
                name: name.to_string(),
            })
            .await?
        {
            RegistryResponse::StopResult { success, message } => Ok((success, message)),
            _ => Ok((false, "unexpected response".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_heartbeat_round_trip_against_a_real_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bind_address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let table = std::sync::Arc::new(crate::state::AgentTable::new(fleet_core::SystemClock));
        let serve_address = bind_address.clone();
        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&serve_address).await.unwrap();
            loop {
                let (stream, peer) = listener.accept().await.unwrap();
                let table = std::sync::Arc::clone(&table);
                tokio::spawn(async move {
                    let _ = crate::server::handle_connection(stream, peer, table).await;
                });
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = RegistryClient::new(bind_address);
        let ok = client
            .register_agent("a1", "127.0.0.1:9200", "1.0.0")
            .await
            .unwrap();
        assert!(ok);

        let agents = client.list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "a1");
    }
}
