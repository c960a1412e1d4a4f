// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the full [`SystemInfo`] heartbeat attachment (§4.6: "every
//! twelfth heartbeat attaches a freshly collected system-info
//! snapshot") and the handful of host-identity fields
//! `GetDetailedMetrics` needs that the platform probes don't carry
//! (hostname, OS name, kernel version) — read once via `sysinfo` rather
//! than duplicating `/proc` parsing the probes already do.

use fleet_adapters::PlatformProbe;
use fleet_core::{PackageInfo, SystemInfo};

pub struct HostIdentity {
    pub hostname: String,
    pub os: String,
    pub platform: String,
    pub platform_version: String,
    pub kernel: String,
}

pub fn host_identity() -> HostIdentity {
    HostIdentity {
        hostname: sysinfo::System::host_name().unwrap_or_default(),
        os: std::env::consts::OS.to_string(),
        platform: sysinfo::System::name().unwrap_or_default(),
        platform_version: sysinfo::System::os_version().unwrap_or_default(),
        kernel: sysinfo::System::kernel_version().unwrap_or_default(),
    }
}

pub fn collect_system_info(probe: &dyn PlatformProbe) -> SystemInfo {
    let identity = host_identity();
    SystemInfo {
        hostname: identity.hostname,
        os: identity.os,
        platform: identity.platform,
        platform_version: identity.platform_version,
        architecture: std::env::consts::ARCH.to_string(),
        cpu_count: num_cpus(),
        kernel: identity.kernel,
        virtualization: String::new(),
        uptime_seconds: probe.uptime_seconds(),
        load_average: probe.load_average(),
        memory: probe.memory_info(),
        disks: probe.disk_partitions(),
        network_interfaces: probe.network_interfaces(),
        packages: PackageInfo::default(),
        services: Vec::new(),
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_adapters::native_probe;

    #[test]
    fn collect_system_info_never_panics_on_the_native_probe() {
        let probe = native_probe();
        let info = collect_system_info(probe.as_ref());
        assert!(info.cpu_count >= 1);
    }
}
