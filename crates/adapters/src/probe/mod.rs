// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host introspection: CPU, memory, disk, network, and process data read
//! directly from the kernel where a structured source exists.
//!
//! [`PlatformProbe`] never returns an error — an unreadable source
//! yields zero values rather than propagating an exception, so a
//! fleet-wide metrics scrape can't be stalled by one broken host.

#[cfg(target_os = "linux")]
mod linux;
mod portable;
mod process_cache;

pub use process_cache::ProcessCache;

#[cfg(target_os = "linux")]
use linux::LinuxProbe;
use portable::PortableProbe;

use fleet_core::{Disk, Memory, NetworkInterface, ProcessInfo};

/// Pure, fail-soft accessors over host state.
pub trait PlatformProbe: Send + Sync + 'static {
    fn cpu_percent(&self) -> f64;
    fn memory_info(&self) -> Memory;
    fn disk_usage(&self, path: &str) -> Disk;
    fn load_average(&self) -> (f64, f64, f64);
    fn process_count(&self) -> u64;
    fn uptime_seconds(&self) -> u64;
    fn processes(&self) -> Vec<ProcessInfo>;
    fn network_interfaces(&self) -> Vec<NetworkInterface>;
    fn disk_partitions(&self) -> Vec<Disk>;
    fn network_totals(&self) -> (u64, u64);
}

/// The best available probe for the current platform: direct `/proc`
/// reads on Linux, `sysinfo` everywhere else, wrapped with the
/// 10-second process-list cache every probe shares.
pub fn native_probe() -> Box<dyn PlatformProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcessCache::new(LinuxProbe::new()))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(ProcessCache::new(PortableProbe::new()))
    }
}
