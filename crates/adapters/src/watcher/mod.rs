// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedules one task per registered [`WatcherSpec`] and forwards
//! transition events onto a single bounded channel, matching the
//! "single logical scheduler" requirement: every watcher's timer is
//! independent, but there is exactly one queue draining into the
//! master connection.

mod file;
mod poll;

use std::collections::HashMap;

use fleet_core::{WatcherConfigError, WatcherEvent, WatcherId, WatcherSpec};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct WatcherHandle {
    spec: WatcherSpec,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns one task per registered watcher plus the bounded channel every
/// task's fired conditions are multiplexed onto.
pub struct WatcherManager {
    handles: Mutex<HashMap<WatcherId, WatcherHandle>>,
    event_tx: mpsc::Sender<WatcherEvent>,
}

impl WatcherManager {
    pub fn new(event_tx: mpsc::Sender<WatcherEvent>) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    /// Register `spec`, replacing any existing watcher with the same id.
    /// Returns as soon as the new task is spawned, before its first tick —
    /// scheduling is asynchronous.
    pub fn register(&self, spec: WatcherSpec) -> Result<(), WatcherConfigError> {
        spec.validate()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = poll::spawn_watcher(spec.clone(), self.event_tx.clone(), shutdown_rx);
        let handle = WatcherHandle {
            spec: spec.clone(),
            shutdown: shutdown_tx,
            task,
        };
        let previous = self.handles.lock().insert(spec.id, handle);
        if let Some(prev) = previous {
            let _ = prev.shutdown.send(());
            prev.task.abort();
        }
        Ok(())
    }

    /// Snapshot of every currently registered watcher's configuration.
    pub fn list(&self) -> Vec<WatcherSpec> {
        self.handles
            .lock()
            .values()
            .map(|h| h.spec.clone())
            .collect()
    }

    /// Stop and forget a watcher. Idempotent: removing an id that is not
    /// registered returns `false` rather than failing.
    pub fn remove(&self, id: &WatcherId) -> bool {
        match self.handles.lock().remove(id) {
            Some(handle) => {
                let _ = handle.shutdown.send(());
                handle.task.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cpu_spec(id: &str) -> WatcherSpec {
        WatcherSpec {
            id: WatcherId::new(id),
            watcher_type: fleet_core::WatcherType::Cpu { threshold: 90.0 },
            interval: Duration::from_secs(60),
            conditions: vec![fleet_core::WatcherCondition::Above],
        }
    }

    #[tokio::test]
    async fn register_then_remove_round_trips_through_list() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = WatcherManager::new(tx);
        manager.register(cpu_spec("w1")).unwrap();
        assert_eq!(manager.list().len(), 1);
        assert!(manager.remove(&WatcherId::new("w1")));
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn removing_an_unknown_id_is_idempotent() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = WatcherManager::new(tx);
        assert!(!manager.remove(&WatcherId::new("does-not-exist")));
    }

    #[tokio::test]
    async fn registering_twice_with_the_same_id_replaces_the_watcher() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = WatcherManager::new(tx);
        manager.register(cpu_spec("w1")).unwrap();
        manager.register(cpu_spec("w1")).unwrap();
        assert_eq!(manager.list().len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_an_invalid_spec() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = WatcherManager::new(tx);
        let mut spec = cpu_spec("w1");
        spec.conditions.clear();
        assert!(manager.register(spec).is_err());
    }
}
