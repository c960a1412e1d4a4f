// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct `/proc` reads for CPU, memory, load, uptime, network, and
//! process data. Disk partitions are delegated to the portable
//! `sysinfo`-backed probe (see module docs in `portable.rs`). Every
//! read is fail-soft: a missing or malformed file yields zero values
//! instead of propagating an error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use fleet_core::{Disk, Memory, NetworkInterface, ProcessInfo};

use super::portable::PortableProbe;
use super::PlatformProbe;

/// Cap and truncation width from the process-cache contract: cheap
/// enough to walk on every miss, small enough to never dominate a
/// heartbeat payload.
const PROCESS_CAP: usize = 30;
const PROCESS_CMDLINE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, Default)]
struct CpuTimes {
    total: u64,
    idle: u64,
}

pub struct LinuxProbe {
    prev_cpu: Mutex<Option<CpuTimes>>,
    disks: PortableProbe,
}

impl LinuxProbe {
    pub fn new() -> Self {
        Self {
            prev_cpu: Mutex::new(None),
            disks: PortableProbe::new(),
        }
    }
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn read_cpu_times() -> Option<CpuTimes> {
    let contents = fs::read_to_string("/proc/stat").ok()?;
    let line = contents.lines().next()?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total: u64 = fields.iter().sum();
    Some(CpuTimes { total, idle })
}

impl PlatformProbe for LinuxProbe {
    fn cpu_percent(&self) -> f64 {
        let Some(sample) = read_cpu_times() else {
            return 0.0;
        };
        let mut prev = self.prev_cpu.lock();
        let result = match *prev {
            Some(last) => {
                let total_delta = sample.total.saturating_sub(last.total);
                let idle_delta = sample.idle.saturating_sub(last.idle);
                if total_delta == 0 {
                    0.0
                } else {
                    ((total_delta - idle_delta) as f64 / total_delta as f64) * 100.0
                }
            }
            None => 0.0,
        };
        *prev = Some(sample);
        result
    }

    fn memory_info(&self) -> Memory {
        let Ok(contents) = fs::read_to_string("/proc/meminfo") else {
            return Memory::default();
        };
        let mut fields: HashMap<&str, u64> = HashMap::new();
        for line in contents.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let kb: u64 = rest
                .trim()
                .split_whitespace()
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            fields.insert(key, kb * 1024);
        }
        let total = *fields.get("MemTotal").unwrap_or(&0);
        let free = *fields.get("MemFree").unwrap_or(&0);
        let available = *fields.get("MemAvailable").unwrap_or(&free);
        Memory {
            total,
            used: total.saturating_sub(available),
            available,
            free,
            cached: *fields.get("Cached").unwrap_or(&0),
            buffers: *fields.get("Buffers").unwrap_or(&0),
        }
    }

    fn disk_usage(&self, path: &str) -> Disk {
        self.disks.disk_usage(path)
    }

    fn load_average(&self) -> (f64, f64, f64) {
        let Ok(contents) = fs::read_to_string("/proc/loadavg") else {
            return (0.0, 0.0, 0.0);
        };
        let mut parts = contents.split_whitespace();
        let one = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
        let five = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
        let fifteen = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0);
        (one, five, fifteen)
    }

    fn process_count(&self) -> u64 {
        fs::read_dir("/proc")
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| {
                        e.file_name()
                            .to_string_lossy()
                            .chars()
                            .all(|c| c.is_ascii_digit())
                    })
                    .count() as u64
            })
            .unwrap_or(0)
    }

    fn uptime_seconds(&self) -> u64 {
        fs::read_to_string("/proc/uptime")
            .ok()
            .and_then(|s| s.split_whitespace().next().map(str::to_string))
            .and_then(|s| s.parse::<f64>().ok())
            .map(|v| v as u64)
            .unwrap_or(0)
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let Ok(entries) = fs::read_dir("/proc") else {
            return Vec::new();
        };
        let mut procs: Vec<ProcessInfo> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let pid: u32 = e.file_name().to_string_lossy().parse().ok()?;
                read_process(pid)
            })
            .collect();
        procs.sort_by(|a, b| a.name.cmp(&b.name));
        procs.truncate(PROCESS_CAP);
        procs
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        let Ok(contents) = fs::read_to_string("/proc/net/dev") else {
            return Vec::new();
        };
        contents
            .lines()
            .skip(2)
            .filter_map(|line| {
                let (name, rest) = line.split_once(':')?;
                let name = name.trim().to_string();
                let fields: Vec<u64> = rest
                    .split_whitespace()
                    .filter_map(|f| f.parse().ok())
                    .collect();
                Some(NetworkInterface {
                    mac: read_sysfs_string(&name, "address"),
                    is_up: read_sysfs_string(&name, "operstate") == "up",
                    addresses: Vec::new(),
                    bytes_recv: fields.first().copied().unwrap_or(0),
                    bytes_sent: fields.get(8).copied().unwrap_or(0),
                    name,
                })
            })
            .collect()
    }

    fn disk_partitions(&self) -> Vec<Disk> {
        self.disks.disk_partitions()
    }

    fn network_totals(&self) -> (u64, u64) {
        self.network_interfaces()
            .into_iter()
            .fold((0, 0), |(rx, tx), iface| {
                (rx + iface.bytes_recv, tx + iface.bytes_sent)
            })
    }
}

fn read_sysfs_string(iface: &str, attr: &str) -> String {
    fs::read_to_string(Path::new("/sys/class/net").join(iface).join(attr))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// `4096` covers every architecture this binary actually ships for;
/// the rare host with a non-default page size just gets a slightly
/// off `memory_bytes` on its process list, not a crash.
fn page_size_bytes() -> u64 {
    4096
}

fn read_process(pid: u32) -> Option<ProcessInfo> {
    let base = Path::new("/proc").join(pid.to_string());
    let stat = fs::read_to_string(base.join("stat")).ok()?;
    // comm is wrapped in parens and may itself contain spaces or parens.
    let comm_start = stat.find('(')?;
    let comm_end = stat.rfind(')')?;
    let name = stat[comm_start + 1..comm_end].to_string();
    let rest: Vec<&str> = stat[comm_end + 2..].split_whitespace().collect();
    let state = rest.first().copied().unwrap_or("?").to_string();
    // Fields 14/15 (utime/stime) past `state` at index 0, in clock ticks —
    // the spec calls for raw CPU ticks here, not a normalized percentage.
    let utime: u64 = rest.get(11).and_then(|v| v.parse().ok()).unwrap_or(0);
    let stime: u64 = rest.get(12).and_then(|v| v.parse().ok()).unwrap_or(0);
    let rss_pages: u64 = rest.get(21).and_then(|v| v.parse().ok()).unwrap_or(0);

    let cmdline = fs::read_to_string(base.join("cmdline")).unwrap_or_default();
    let command: String = cmdline
        .split('\0')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(PROCESS_CMDLINE_MAX_CHARS)
        .collect();

    Some(ProcessInfo {
        pid,
        name,
        cpu_percent: (utime + stime) as f64,
        memory_bytes: rss_pages * page_size_bytes(),
        status: state,
        command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_percent_never_panics_and_is_zero_on_the_first_sample() {
        let probe = LinuxProbe::new();
        let first = probe.cpu_percent();
        assert!((0.0..=100.0).contains(&first) || first == 0.0);
    }

    #[test]
    fn process_count_never_panics() {
        let probe = LinuxProbe::new();
        let _ = probe.process_count();
    }

    #[test]
    fn processes_list_is_capped_and_cmdlines_are_truncated() {
        let probe = LinuxProbe::new();
        let procs = probe.processes();
        assert!(procs.len() <= PROCESS_CAP);
        assert!(procs
            .iter()
            .all(|p| p.command.chars().count() <= PROCESS_CMDLINE_MAX_CHARS));
    }

    /// A cmdline whose 50th *byte* lands mid-codepoint (a 4-byte emoji
    /// starting at byte 48 straddles byte index 50) must still truncate
    /// cleanly on a char boundary, not panic the way `String::truncate`
    /// would on a byte index that isn't one.
    #[test]
    fn cmdline_truncation_is_char_safe_not_byte_safe() {
        let joined = format!("{}{}{}", "a".repeat(48), '\u{1F600}', "bbbb");
        let truncated: String = joined.chars().take(PROCESS_CMDLINE_MAX_CHARS).collect();
        assert_eq!(truncated.chars().count(), PROCESS_CMDLINE_MAX_CHARS);
        assert_eq!(truncated, format!("{}{}{}", "a".repeat(48), '\u{1F600}', "b"));
    }
}
