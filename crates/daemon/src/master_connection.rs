// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master connection manager (C6): one `tokio::spawn`ed task per
//! agent process that owns the single write path to the registry.
//!
//! State machine: `Disconnected -> Connecting -> Registered ->
//! Heartbeating <-> Degraded -> Disconnected`. Reconnect backoff and the
//! every-twelfth-heartbeat system-info attachment are driven by plain
//! counters, never wall-clock phase, so the cadence survives a paused
//! or slow process exactly as specified.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_registry::RegistryClient;
use tracing::{info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const SYSTEM_INFO_EVERY_N_HEARTBEATS: u32 = 12;
const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const FAILURES_BEFORE_DISCONNECT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionPhase {
    Disconnected = 0,
    Connecting = 1,
    Registered = 2,
    Heartbeating = 3,
    Degraded = 4,
}

impl From<u8> for ConnectionPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionPhase::Connecting,
            2 => ConnectionPhase::Registered,
            3 => ConnectionPhase::Heartbeating,
            4 => ConnectionPhase::Degraded,
            _ => ConnectionPhase::Disconnected,
        }
    }
}

/// Shared, lock-free view of the connection's current phase, readable
/// from `DiagnoseHealth`/metrics handlers without touching the
/// connection task itself.
#[derive(Default)]
pub struct ConnectionState {
    phase: AtomicU8,
}

impl ConnectionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from(self.phase.load(Ordering::Acquire))
    }

    fn set(&self, phase: ConnectionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// `backoff(n)`: the delay before the `n`th reconnect attempt (1-indexed),
/// doubling from [`INITIAL_BACKOFF`] and capped at [`MAX_BACKOFF`].
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(5);
    let millis = INITIAL_BACKOFF.as_millis() as u64 * (1u64 << doublings);
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

/// Runs forever: connect, register, heartbeat, reconnect on sustained
/// failure. `system_info_json` is called fresh for every heartbeat that
/// needs to carry a snapshot.
pub async fn run(
    state: Arc<ConnectionState>,
    client: RegistryClient,
    name: String,
    report_address: String,
    version: String,
    system_info_json: impl Fn() -> String + Send + Sync + 'static,
) {
    let mut reconnect_attempt: u32 = 0;

    loop {
        state.set(ConnectionPhase::Connecting);
        let registered = tokio::time::timeout(
            Duration::from_secs(10),
            client.register_agent(&name, &report_address, &version),
        )
        .await;

        let registered = matches!(registered, Ok(Ok(true)));
        if !registered {
            reconnect_attempt += 1;
            let delay = backoff_for_attempt(reconnect_attempt);
            warn!(attempt = reconnect_attempt, delay_secs = delay.as_secs(), "registration failed, backing off");
            state.set(ConnectionPhase::Disconnected);
            tokio::time::sleep(delay).await;
            continue;
        }

        info!(name = %name, "registered with master");
        state.set(ConnectionPhase::Registered);
        reconnect_attempt = 0;

        let mut heartbeat_count: u32 = 0;
        let mut consecutive_failures: u32 = 0;
        state.set(ConnectionPhase::Heartbeating);

        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            heartbeat_count += 1;
            let info_json = if heartbeat_count % SYSTEM_INFO_EVERY_N_HEARTBEATS == 0 {
                Some(system_info_json())
            } else {
                None
            };

            match client.heartbeat(&name, info_json).await {
                Ok(true) => {
                    if consecutive_failures > 0 {
                        info!("connection recovered");
                    }
                    consecutive_failures = 0;
                    state.set(ConnectionPhase::Heartbeating);
                }
                _ => {
                    consecutive_failures += 1;
                    if consecutive_failures >= FAILURES_BEFORE_DISCONNECT {
                        warn!("three consecutive heartbeat failures, disconnecting");
                        state.set(ConnectionPhase::Disconnected);
                        break;
                    }
                    state.set(ConnectionPhase::Degraded);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps_at_sixty_seconds() {
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(5));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(10));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(20));
        assert_eq!(backoff_for_attempt(4), Duration::from_secs(40));
        assert_eq!(backoff_for_attempt(5), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(6), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(100), Duration::from_secs(60));
    }

    #[test]
    fn connection_state_starts_disconnected() {
        let state = ConnectionState::new();
        assert_eq!(state.phase(), ConnectionPhase::Disconnected);
    }

    #[tokio::test]
    async fn registering_against_a_real_registry_reaches_heartbeating() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bind_address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let serve_address = bind_address.clone();
        tokio::spawn(async move {
            let _ = fleet_registry::serve(&serve_address).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = ConnectionState::new();
        let client = RegistryClient::new(bind_address);
        let state_clone = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            run(
                state_clone,
                client,
                "a1".to_string(),
                "127.0.0.1:9300".to_string(),
                "1.0.0".to_string(),
                || "{}".to_string(),
            )
            .await;
        });

        let mut reached = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if state.phase() == ConnectionPhase::Registered
                || state.phase() == ConnectionPhase::Heartbeating
            {
                reached = true;
                break;
            }
        }
        assert!(reached, "expected the connection to register within the timeout");
        handle.abort();
    }
}
