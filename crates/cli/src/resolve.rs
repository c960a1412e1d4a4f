// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry-client façade (C9): turn an operator-typed agent name
//! into the `host:port` the CLI should actually dial.
//!
//! A value that already looks like `host:port` (contains a `:`) is
//! used unchanged — this lets every `agent` subcommand accept either a
//! registered name or a direct address without a separate flag.
//! Otherwise the name is resolved against the master registry and the
//! result is written into the local agent cache (§6.4) so `--local`
//! and a future unreachable-master fall back to it.

use anyhow::{bail, Context, Result};
use fleet_registry::RegistryClient;
use fleet_storage::AgentCache;

pub async fn resolve_agent_address(
    name_or_address: &str,
    master_address: &str,
    local_only: bool,
) -> Result<String> {
    if name_or_address.contains(':') {
        return Ok(name_or_address.to_string());
    }

    let cache_path = AgentCache::default_path();
    let mut cache = AgentCache::load(&cache_path)
        .with_context(|| format!("reading agent cache at {}", cache_path.display()))?;

    if local_only {
        return cache
            .get(name_or_address)
            .map(|s| s.to_string())
            .with_context(|| {
                format!("no cached address for agent '{name_or_address}' (run without --local at least once)")
            });
    }

    let client = RegistryClient::new(master_address.to_string());
    match client.get_agent_info(name_or_address).await {
        Ok((true, Some(info), _)) => {
            let _ = cache.put(name_or_address, &info.address);
            Ok(info.address)
        }
        Ok((_, _, message)) => {
            if let Some(cached) = cache.get(name_or_address) {
                return Ok(cached.to_string());
            }
            bail!("agent '{name_or_address}' not found in the registry: {message}")
        }
        Err(e) => {
            if let Some(cached) = cache.get(name_or_address) {
                return Ok(cached.to_string());
            }
            bail!("could not reach master at '{master_address}': {e}")
        }
    }
}
