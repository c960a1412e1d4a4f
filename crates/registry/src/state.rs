// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master's in-memory agent table. Deliberately not durable — §1
//! scopes "the master's own persistence" out of this core, and §3's
//! liveness rule is heartbeat-driven rather than strongly consistent by
//! design; a restarted registry simply waits for agents to re-register.

use std::collections::HashMap;

use fleet_core::wire::registry::AgentInfo;
use fleet_core::{AgentRegistryRecord, Clock};
use parking_lot::Mutex;

/// Thread-safe table of `name -> AgentRegistryRecord`, guarded by a
/// single mutex — matches the teacher's blanket "mutex-guarded map,
/// `List` returns a snapshot copy" convention (§5).
pub struct AgentTable<C: Clock> {
    clock: C,
    records: Mutex<HashMap<String, AgentRegistryRecord>>,
}

impl<C: Clock> AgentTable<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// `RegisterAgent`: insert or replace the record for `name`. Always
    /// succeeds — registration is not an allocation of a scarce resource,
    /// it is simply recording an address the master should know about.
    pub fn register(&self, name: &str, address: &str, version: &str) {
        let now = self.clock.now_secs();
        let mut record = AgentRegistryRecord::new(name, address, now);
        record.version = version.to_string();
        self.records.lock().insert(name.to_string(), record);
    }

    /// `Heartbeat`: bump `last_heartbeat` (and, when `system_info_json`
    /// is non-empty, `last_info_collected`) for an already-registered
    /// agent. Returns `false` if `name` was never registered (a
    /// permanent-config-kind error per §7 — the caller should not retry
    /// this one, it should re-register).
    pub fn heartbeat(&self, name: &str, system_info_json: Option<String>) -> bool {
        let now = self.clock.now_secs();
        let mut guard = self.records.lock();
        match guard.get_mut(name) {
            Some(record) => {
                record.apply_heartbeat(now, system_info_json);
                true
            }
            None => false,
        }
    }

    /// `ListAgents`: a snapshot of every registered agent with status
    /// derived as of now.
    pub fn list(&self) -> Vec<AgentInfo> {
        let now = self.clock.now_secs();
        self.records
            .lock()
            .values()
            .map(|r| to_agent_info(r, now))
            .collect()
    }

    /// `GetAgentInfo`: a single agent's info, if registered.
    pub fn get(&self, name: &str) -> Option<AgentInfo> {
        let now = self.clock.now_secs();
        self.records.lock().get(name).map(|r| to_agent_info(r, now))
    }

    /// `UnregisterAgent`. Idempotent: removing an unknown name still
    /// reports success (§4.4-style "idempotent if the id does not
    /// exist" contract, applied here to agent names).
    pub fn unregister(&self, name: &str) {
        self.records.lock().remove(name);
    }

    pub fn raw_address(&self, name: &str) -> Option<String> {
        self.records.lock().get(name).map(|r| r.address.clone())
    }
}

fn to_agent_info(record: &AgentRegistryRecord, now: u64) -> AgentInfo {
    AgentInfo {
        name: record.name.clone(),
        address: record.address.clone(),
        status: record.status(now),
        last_heartbeat: record.last_heartbeat,
        last_info_collected: record.last_info_collected,
        version: record.version.clone(),
        system_info_json: record.system_info_json.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{AgentStatus, FakeClock};

    #[test]
    fn register_then_list_shows_the_agent_active() {
        let table = AgentTable::new(FakeClock::new(1_000));
        table.register("a1", "10.0.0.1:9000", "1.0.0");
        let agents = table.list();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].status, AgentStatus::Active);
    }

    #[test]
    fn an_agent_goes_inactive_once_the_liveness_window_elapses() {
        let clock = FakeClock::new(0);
        let table = AgentTable::new(clock.clone());
        table.register("a1", "10.0.0.1:9000", "1.0.0");
        clock.advance(61);
        assert_eq!(table.get("a1").unwrap().status, AgentStatus::Inactive);
    }

    #[test]
    fn heartbeat_on_an_unregistered_agent_fails() {
        let table = AgentTable::new(FakeClock::new(0));
        assert!(!table.heartbeat("ghost", None));
    }

    #[test]
    fn heartbeat_with_system_info_updates_last_info_collected() {
        let clock = FakeClock::new(0);
        let table = AgentTable::new(clock.clone());
        table.register("a1", "10.0.0.1:9000", "1.0.0");
        clock.advance(5);
        assert!(table.heartbeat("a1", Some("{}".to_string())));
        assert_eq!(table.get("a1").unwrap().last_info_collected, 5);
    }

    #[test]
    fn unregister_is_idempotent() {
        let table = AgentTable::new(FakeClock::new(0));
        table.unregister("ghost");
        table.register("a1", "10.0.0.1:9000", "1.0.0");
        table.unregister("a1");
        table.unregister("a1");
        assert!(table.get("a1").is_none());
    }
}
