// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sysinfo`-backed probe. Used as the non-Linux fallback and, on every
//! platform, as the source for disk partitions — `sysinfo`'s disk
//! listing is simpler to keep correct across filesystems than a
//! hand-rolled `/proc/mounts` parser.

use parking_lot::Mutex;
use sysinfo::{Disks, Networks, System};

use fleet_core::{Disk, Memory, NetworkInterface, ProcessInfo};

use super::PlatformProbe;

pub struct PortableProbe {
    system: Mutex<System>,
}

impl PortableProbe {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for PortableProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformProbe for PortableProbe {
    fn cpu_percent(&self) -> f64 {
        let mut sys = self.system.lock();
        sys.refresh_cpu_usage();
        sys.global_cpu_usage() as f64
    }

    fn memory_info(&self) -> Memory {
        let mut sys = self.system.lock();
        sys.refresh_memory();
        Memory {
            total: sys.total_memory(),
            used: sys.used_memory(),
            available: sys.available_memory(),
            free: sys.free_memory(),
            cached: 0,
            buffers: 0,
        }
    }

    fn disk_usage(&self, path: &str) -> Disk {
        self.disk_partitions()
            .into_iter()
            .filter(|d| path.starts_with(&d.mountpoint))
            .max_by_key(|d| d.mountpoint.len())
            .unwrap_or(Disk {
                device: String::new(),
                mountpoint: path.to_string(),
                total: 0,
                used: 0,
                free: 0,
            })
    }

    fn load_average(&self) -> (f64, f64, f64) {
        let avg = System::load_average();
        (avg.one, avg.five, avg.fifteen)
    }

    fn process_count(&self) -> u64 {
        let mut sys = self.system.lock();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        sys.processes().len() as u64
    }

    fn uptime_seconds(&self) -> u64 {
        System::uptime()
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let mut sys = self.system.lock();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        let mut procs: Vec<ProcessInfo> = sys
            .processes()
            .values()
            .map(|p| {
                let mut command = p
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                command.truncate(50);
                ProcessInfo {
                    pid: p.pid().as_u32(),
                    name: p.name().to_string_lossy().to_string(),
                    cpu_percent: p.cpu_usage() as f64,
                    memory_bytes: p.memory(),
                    status: p.status().to_string(),
                    command,
                }
            })
            .collect();
        procs.sort_by(|a, b| a.name.cmp(&b.name));
        procs.truncate(30);
        procs
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        let networks = Networks::new_with_refreshed_list();
        networks
            .iter()
            .map(|(name, data)| NetworkInterface {
                name: name.clone(),
                mac: data.mac_address().to_string(),
                addresses: data
                    .ip_networks()
                    .iter()
                    .map(|ip| ip.addr.to_string())
                    .collect(),
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
                is_up: data.total_received() > 0 || data.total_transmitted() > 0,
            })
            .collect()
    }

    fn disk_partitions(&self) -> Vec<Disk> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .map(|d| Disk {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().to_string_lossy().to_string(),
                total: d.total_space(),
                used: d.total_space().saturating_sub(d.available_space()),
                free: d.available_space(),
            })
            .collect()
    }

    fn network_totals(&self) -> (u64, u64) {
        self.network_interfaces()
            .into_iter()
            .fold((0, 0), |(rx, tx), iface| {
                (rx + iface.bytes_recv, tx + iface.bytes_sent)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_usage_never_panics_for_an_unknown_path() {
        let probe = PortableProbe::new();
        let disk = probe.disk_usage("/this/path/almost/certainly/does/not/exist/as/a/mount");
        assert!(disk.total == 0 || !disk.mountpoint.is_empty());
    }

    #[test]
    fn network_totals_sums_every_interface() {
        let probe = PortableProbe::new();
        let (rx, tx) = probe.network_totals();
        let expected = probe.network_interfaces().into_iter().fold(
            (0u64, 0u64),
            |(rx, tx), iface| (rx + iface.bytes_recv, tx + iface.bytes_sent),
        );
        assert_eq!((rx, tx), expected);
    }
}
