// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type condition evaluators driven by one timer each, plus the
//! dispatcher that spawns the right evaluator for a [`WatcherSpec`].

use std::net::TcpListener;

use fleet_core::{WatcherCondition, WatcherEvent, WatcherId, WatcherSpec, WatcherType};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::probe::PlatformProbe;

use super::file::FileEvaluator;

/// One tick's worth of condition evaluation for a single watcher.
/// Returns the `(condition, details)` pairs that fired since the
/// previous tick.
pub(super) trait ConditionEvaluator: Send {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)>;
}

struct ProcessEvaluator {
    process_name: Option<String>,
    pid: Option<u32>,
    conditions: Vec<WatcherCondition>,
    was_present: Option<bool>,
}

impl ConditionEvaluator for ProcessEvaluator {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)> {
        let present = process_is_running(self.process_name.as_deref(), self.pid);
        let mut fired = Vec::new();
        let label = || {
            self.process_name
                .clone()
                .or_else(|| self.pid.map(|p| p.to_string()))
                .unwrap_or_default()
        };
        match self.was_present {
            Some(false) | None if present => {
                if self.conditions.contains(&WatcherCondition::Created) {
                    fired.push((WatcherCondition::Created, label()));
                }
            }
            Some(true) if !present => {
                if self.conditions.contains(&WatcherCondition::Deleted) {
                    fired.push((WatcherCondition::Deleted, label()));
                }
            }
            _ => {}
        }
        self.was_present = Some(present);
        fired
    }
}

fn process_is_running(name: Option<&str>, pid: Option<u32>) -> bool {
    if let Some(pid) = pid {
        return std::path::Path::new("/proc").join(pid.to_string()).is_dir();
    }
    let Some(name) = name else {
        return false;
    };
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|e| {
        let Ok(pid) = e.file_name().to_string_lossy().parse::<u32>() else {
            return false;
        };
        std::fs::read_to_string(format!("/proc/{pid}/comm"))
            .map(|c| c.trim() == name)
            .unwrap_or(false)
    })
}

struct PortEvaluator {
    port: u16,
    conditions: Vec<WatcherCondition>,
    was_listening: Option<bool>,
}

impl ConditionEvaluator for PortEvaluator {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)> {
        let listening = port_is_listening(self.port);
        let mut fired = Vec::new();
        match self.was_listening {
            Some(false) | None if listening => {
                if self.conditions.contains(&WatcherCondition::Created) {
                    fired.push((WatcherCondition::Created, self.port.to_string()));
                }
            }
            Some(true) if !listening => {
                if self.conditions.contains(&WatcherCondition::Deleted) {
                    fired.push((WatcherCondition::Deleted, self.port.to_string()));
                }
            }
            _ => {}
        }
        self.was_listening = Some(listening);
        fired
    }
}

/// A successful bind means nobody is currently listening there; a
/// refusal means the port is already taken. Cheap and portable, at the
/// cost of a transient bind/unbind on every tick.
fn port_is_listening(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_err()
}

struct ServiceEvaluator {
    service_name: String,
    conditions: Vec<WatcherCondition>,
    was_active: Option<bool>,
}

impl ConditionEvaluator for ServiceEvaluator {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)> {
        let active = service_is_active(&self.service_name);
        let mut fired = Vec::new();
        match self.was_active {
            Some(false) | None if active => {
                if self.conditions.contains(&WatcherCondition::Created) {
                    fired.push((WatcherCondition::Created, self.service_name.clone()));
                }
            }
            Some(true) if !active => {
                if self.conditions.contains(&WatcherCondition::Deleted) {
                    fired.push((WatcherCondition::Deleted, self.service_name.clone()));
                }
            }
            _ => {}
        }
        self.was_active = Some(active);
        fired
    }
}

fn service_is_active(name: &str) -> bool {
    std::process::Command::new("systemctl")
        .args(["is-active", "--quiet", name])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

enum ResourceKind {
    Cpu,
    Memory,
    Disk { path: String },
}

struct ResourceEvaluator {
    kind: ResourceKind,
    threshold: f64,
    conditions: Vec<WatcherCondition>,
    probe: Box<dyn PlatformProbe>,
    was_above: Option<bool>,
}

impl ConditionEvaluator for ResourceEvaluator {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)> {
        let value = match &self.kind {
            ResourceKind::Cpu => self.probe.cpu_percent(),
            ResourceKind::Memory => self.probe.memory_info().used_percent(),
            ResourceKind::Disk { path } => self.probe.disk_usage(path).used_percent(),
        };
        let above = value >= self.threshold;
        let mut fired = Vec::new();
        match self.was_above {
            Some(false) if above => {
                if self.conditions.contains(&WatcherCondition::Above) {
                    fired.push((WatcherCondition::Above, format!("{value:.2}")));
                }
            }
            Some(true) if !above => {
                if self.conditions.contains(&WatcherCondition::Below) {
                    fired.push((WatcherCondition::Below, format!("{value:.2}")));
                }
            }
            _ => {}
        }
        self.was_above = Some(above);
        fired
    }
}

fn build_evaluator(spec: &WatcherSpec) -> Box<dyn ConditionEvaluator> {
    match spec.watcher_type.clone() {
        WatcherType::File {
            path,
            recursive,
            check_hash,
            pattern,
        }
        | WatcherType::Directory {
            path,
            recursive,
            check_hash,
            pattern,
        } => Box::new(FileEvaluator::new(
            path,
            recursive,
            check_hash,
            pattern,
            spec.conditions.clone(),
        )),
        WatcherType::Process { process_name, pid } => Box::new(ProcessEvaluator {
            process_name,
            pid,
            conditions: spec.conditions.clone(),
            was_present: None,
        }),
        WatcherType::Port { port, .. } => Box::new(PortEvaluator {
            port,
            conditions: spec.conditions.clone(),
            was_listening: None,
        }),
        WatcherType::Service { service_name } => Box::new(ServiceEvaluator {
            service_name,
            conditions: spec.conditions.clone(),
            was_active: None,
        }),
        WatcherType::Cpu { threshold } => Box::new(ResourceEvaluator {
            kind: ResourceKind::Cpu,
            threshold,
            conditions: spec.conditions.clone(),
            probe: crate::probe::native_probe(),
            was_above: None,
        }),
        WatcherType::Memory { threshold } => Box::new(ResourceEvaluator {
            kind: ResourceKind::Memory,
            threshold,
            conditions: spec.conditions.clone(),
            probe: crate::probe::native_probe(),
            was_above: None,
        }),
        WatcherType::Disk { path, threshold } => Box::new(ResourceEvaluator {
            kind: ResourceKind::Disk { path },
            threshold,
            conditions: spec.conditions.clone(),
            probe: crate::probe::native_probe(),
            was_above: None,
        }),
    }
}

fn notify_watch_for(spec: &WatcherSpec) -> Option<(RecommendedWatcher, mpsc::Receiver<()>)> {
    let path = match &spec.watcher_type {
        WatcherType::File { path, .. } | WatcherType::Directory { path, .. } => path.clone(),
        _ => return None,
    };
    let (tx, rx) = mpsc::channel(16);
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if res.is_ok() {
            let _ = tx.blocking_send(());
        }
    })
    .ok()?;
    watcher
        .watch(std::path::Path::new(&path), RecursiveMode::Recursive)
        .ok()?;
    Some((watcher, rx))
}

/// Spawn the task that owns a single watcher's timer, forwarding any
/// fired conditions onto `event_tx` until shutdown or removal. File and
/// directory watchers additionally wake on filesystem notifications, so
/// changes are observed between ticks, not just on them.
pub(super) fn spawn_watcher(
    spec: WatcherSpec,
    event_tx: mpsc::Sender<WatcherEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let watcher_id = spec.id.clone();
        let kind = spec.watcher_type.kind();
        let mut evaluator = build_evaluator(&spec);
        let mut ticker = interval(spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let notify_watch = notify_watch_for(&spec);
        let (mut notify_rx, _notify_guard) = match notify_watch {
            Some((w, rx)) => (Some(rx), Some(w)),
            None => (None, None),
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    emit_fired(&event_tx, &watcher_id, kind, evaluator.evaluate()).await;
                }

                Some(()) = async {
                    match notify_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    emit_fired(&event_tx, &watcher_id, kind, evaluator.evaluate()).await;
                }

                _ = &mut shutdown_rx => {
                    tracing::debug!(%watcher_id, "watcher shutdown requested");
                    break;
                }
            }
        }
    })
}

async fn emit_fired(
    event_tx: &mpsc::Sender<WatcherEvent>,
    watcher_id: &WatcherId,
    kind: &'static str,
    fired: Vec<(WatcherCondition, String)>,
) {
    for (condition, details) in fired {
        let event = WatcherEvent::new(watcher_id.clone(), kind, condition, now_secs(), details);
        let _ = event_tx.send(event).await;
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_evaluator_fires_created_then_deleted() {
        let mut eval = ProcessEvaluator {
            process_name: None,
            pid: Some(std::process::id()),
            conditions: vec![WatcherCondition::Created, WatcherCondition::Deleted],
            was_present: None,
        };
        let fired = eval.evaluate();
        assert_eq!(fired, vec![(WatcherCondition::Created, std::process::id().to_string())]);

        eval.was_present = Some(true);
        eval.pid = Some(0xFFFF_FFF0);
        let fired = eval.evaluate();
        assert_eq!(
            fired,
            vec![(WatcherCondition::Deleted, "4294967280".to_string())]
        );
    }

    #[test]
    fn resource_evaluator_is_edge_triggered_not_level_triggered() {
        struct FixedProbe(std::sync::atomic::AtomicU32);
        impl PlatformProbe for FixedProbe {
            fn cpu_percent(&self) -> f64 {
                self.0.load(std::sync::atomic::Ordering::SeqCst) as f64
            }
            fn memory_info(&self) -> fleet_core::Memory {
                fleet_core::Memory::default()
            }
            fn disk_usage(&self, _path: &str) -> fleet_core::Disk {
                fleet_core::Disk {
                    device: String::new(),
                    mountpoint: String::new(),
                    total: 0,
                    used: 0,
                    free: 0,
                }
            }
            fn load_average(&self) -> (f64, f64, f64) {
                (0.0, 0.0, 0.0)
            }
            fn process_count(&self) -> u64 {
                0
            }
            fn uptime_seconds(&self) -> u64 {
                0
            }
            fn processes(&self) -> Vec<fleet_core::ProcessInfo> {
                Vec::new()
            }
            fn network_interfaces(&self) -> Vec<fleet_core::NetworkInterface> {
                Vec::new()
            }
            fn disk_partitions(&self) -> Vec<fleet_core::Disk> {
                Vec::new()
            }
            fn network_totals(&self) -> (u64, u64) {
                (0, 0)
            }
        }

        let probe = FixedProbe(std::sync::atomic::AtomicU32::new(50));
        let mut eval = ResourceEvaluator {
            kind: ResourceKind::Cpu,
            threshold: 90.0,
            conditions: vec![WatcherCondition::Above],
            probe: Box::new(probe),
            was_above: None,
        };
        // Below threshold on first tick: no fire, just establishes baseline.
        assert!(eval.evaluate().is_empty());
        // Still below: no fire.
        assert!(eval.evaluate().is_empty());
    }
}
