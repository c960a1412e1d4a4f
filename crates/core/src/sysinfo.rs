// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical host snapshot returned by the platform probes and carried
//! over `GetDetailedMetrics`/heartbeat system-info attachments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub free: u64,
    pub cached: u64,
    pub buffers: u64,
}

impl Memory {
    /// `used / total`, recomputed locally rather than trusting whatever
    /// percent field an upstream source reported.
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.used as f64 / self.total as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl Disk {
    /// `used / total`, computed by the probe — defense against bad upstream
    /// percent fields.
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.used as f64 / self.total as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: String,
    pub addresses: Vec<String>,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub is_up: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub manager: String,
    pub installed_count: u64,
    pub updates_available: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub status: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub status: String,
    /// Command line, truncated to 50 characters by the probe.
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub proto: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub state: String,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: u64,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

/// Full host snapshot. Expensive fields (disk, network totals, process
/// list) are cached upstream by the agent RPC server; this type is just
/// the payload shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub platform: String,
    pub platform_version: String,
    pub architecture: String,
    pub cpu_count: u32,
    pub kernel: String,
    pub virtualization: String,
    pub uptime_seconds: u64,
    pub load_average: (f64, f64, f64),
    pub memory: Memory,
    pub disks: Vec<Disk>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub packages: PackageInfo,
    pub services: Vec<Service>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_percent_is_zero_when_total_is_zero() {
        let mem = Memory::default();
        assert_eq!(mem.used_percent(), 0.0);
    }

    #[test]
    fn memory_percent_divides_used_by_total() {
        let mem = Memory {
            total: 1000,
            used: 250,
            ..Default::default()
        };
        assert_eq!(mem.used_percent(), 25.0);
    }

    #[test]
    fn disk_percent_ignores_any_upstream_percent_field() {
        // Disk has no percent field at all — the probe always derives it.
        let disk = Disk {
            device: "/dev/sda1".into(),
            mountpoint: "/".into(),
            total: 200,
            used: 50,
            free: 150,
        };
        assert_eq!(disk.used_percent(), 25.0);
    }
}
