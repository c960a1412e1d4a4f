// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity: the attributes an agent advertises about itself.

use serde::{Deserialize, Serialize};

/// Identity of a single agent process.
///
/// `name` is operator-assigned and unique within a registry; `listen_address`
/// is what the agent binds, `report_address` is what it advertises to the
/// master (they differ behind NAT or a wildcard bind). Lifetime is the agent
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub listen_address: String,
    pub report_address: String,
    pub version: String,
    /// Epoch-seconds the agent process started.
    pub started_at: u64,
    pub pid: u32,
}

impl AgentIdentity {
    pub fn new(
        name: impl Into<String>,
        listen_address: impl Into<String>,
        report_address: impl Into<String>,
        version: impl Into<String>,
        started_at: u64,
    ) -> Self {
        Self {
            name: name.into(),
            listen_address: listen_address.into(),
            report_address: report_address.into(),
            version: version.into(),
            started_at,
            pid: std::process::id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_captures_the_running_process_id() {
        let identity = AgentIdentity::new("a1", "0.0.0.0:9000", "10.0.0.5:9000", "1.0.0", 1000);
        assert_eq!(identity.pid, std::process::id());
        assert_eq!(identity.name, "a1");
        assert_eq!(identity.report_address, "10.0.0.5:9000");
    }
}
