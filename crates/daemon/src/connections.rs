// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GetActiveConnections`: parses the kernel's TCP/UDP connection tables
//! directly from `/proc/net/{tcp,tcp6,udp,udp6}`, in the same fail-soft
//! `/proc`-reading style as the platform probes — a missing or
//! unparseable table yields an empty list rather than an error.

use fleet_core::NetworkConnection;

/// `/proc/net/tcp`'s `st` field, in the order the kernel documents them.
fn tcp_state_name(code: u8) -> &'static str {
    match code {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}

fn decode_ipv4_be(hex: &str) -> Option<String> {
    let bytes = u32::from_str_radix(hex, 16).ok()?.to_le_bytes();
    Some(format!("{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3]))
}

fn decode_hex_addr_port(field: &str) -> Option<(String, u16)> {
    let (addr_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let addr = if addr_hex.len() == 8 {
        decode_ipv4_be(addr_hex)?
    } else {
        // IPv6: rendered as the raw hex since the kernel's per-word byte
        // order makes a readable decode not worth the complexity here.
        addr_hex.to_string()
    };
    Some((addr, port))
}

fn parse_table(contents: &str, proto: &str) -> Vec<NetworkConnection> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let local_field = fields.next()?;
            let remote_field = fields.next()?;
            let state_field = fields.next()?;
            let uid_and_inode: Vec<&str> = fields.collect();
            let _ = uid_and_inode;

            let (local_ip, local_port) = decode_hex_addr_port(local_field)?;
            let (remote_ip, remote_port) = decode_hex_addr_port(remote_field)?;
            let state_code = u8::from_str_radix(state_field, 16).unwrap_or(0);

            Some(NetworkConnection {
                proto: proto.to_string(),
                local_addr: format!("{local_ip}:{local_port}"),
                remote_addr: format!("{remote_ip}:{remote_port}"),
                state: if proto == "udp" {
                    "STATELESS".to_string()
                } else {
                    tcp_state_name(state_code).to_string()
                },
                pid: None,
            })
        })
        .collect()
}

/// Read every supported `/proc/net` table. Missing files (non-Linux,
/// sandboxed containers without `/proc/net`) contribute nothing.
#[cfg(target_os = "linux")]
pub fn active_connections() -> Vec<NetworkConnection> {
    let mut connections = Vec::new();
    for (path, proto) in [
        ("/proc/net/tcp", "tcp"),
        ("/proc/net/tcp6", "tcp"),
        ("/proc/net/udp", "udp"),
        ("/proc/net/udp6", "udp"),
    ] {
        if let Ok(contents) = std::fs::read_to_string(path) {
            connections.extend(parse_table(&contents, proto));
        }
    }
    connections
}

#[cfg(not(target_os = "linux"))]
pub fn active_connections() -> Vec<NetworkConnection> {
    Vec::new()
}

/// Filter by exact state match and, unless `include_local` is set, drop
/// loopback-to-loopback connections.
pub fn filter_connections(
    connections: Vec<NetworkConnection>,
    state_filter: Option<&str>,
    include_local: bool,
) -> Vec<NetworkConnection> {
    connections
        .into_iter()
        .filter(|c| state_filter.is_none_or(|s| c.state.eq_ignore_ascii_case(s)))
        .filter(|c| include_local || !(c.local_addr.starts_with("127.") && c.remote_addr.starts_with("127.")))
        .collect()
}
