// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetd`: the agent server (C5), the master connection manager (C6),
//! and the host-local collaborators they share — metric caches, the log
//! buffer, the performance sampler, connection-table parsing, and
//! health diagnosis.
//!
//! The binary entrypoint lives in `main.rs`; this module tree is a
//! library so integration tests can start a real `fleetd` against a
//! real `fleet-registry` without spawning the compiled binary.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod caches;
pub mod config;
pub mod connections;
pub mod diagnose;
pub mod logs;
pub mod master_connection;
pub mod perf_history;
pub mod rpc_server;
pub mod shell;
pub mod snapshot;

pub use config::{ConfigError, FleetdConfig};
pub use rpc_server::{serve, AgentContext, ServerError};
