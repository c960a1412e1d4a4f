// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps any [`PlatformProbe`], caching [`PlatformProbe::processes`] for
//! 10 seconds — the one probe call expensive enough to matter under a
//! fleet-wide scrape. Every other method reads its source fresh.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use fleet_core::{Disk, Memory, NetworkInterface, ProcessInfo};

use super::PlatformProbe;

const PROCESS_CACHE_TTL: Duration = Duration::from_secs(10);

pub struct ProcessCache<P> {
    inner: P,
    cache: RwLock<Option<(Instant, Vec<ProcessInfo>)>>,
}

impl<P: PlatformProbe> ProcessCache<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
        }
    }
}

impl<P: PlatformProbe> PlatformProbe for ProcessCache<P> {
    fn cpu_percent(&self) -> f64 {
        self.inner.cpu_percent()
    }

    fn memory_info(&self) -> Memory {
        self.inner.memory_info()
    }

    fn disk_usage(&self, path: &str) -> Disk {
        self.inner.disk_usage(path)
    }

    fn load_average(&self) -> (f64, f64, f64) {
        self.inner.load_average()
    }

    fn process_count(&self) -> u64 {
        self.inner.process_count()
    }

    fn uptime_seconds(&self) -> u64 {
        self.inner.uptime_seconds()
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        if let Some((fetched_at, cached)) = self.cache.read().as_ref() {
            if fetched_at.elapsed() < PROCESS_CACHE_TTL {
                return cached.clone();
            }
        }
        let fresh = self.inner.processes();
        *self.cache.write() = Some((Instant::now(), fresh.clone()));
        fresh
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        self.inner.network_interfaces()
    }

    fn disk_partitions(&self) -> Vec<Disk> {
        self.inner.disk_partitions()
    }

    fn network_totals(&self) -> (u64, u64) {
        self.inner.network_totals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingProbe {
        calls: Arc<AtomicU32>,
    }

    impl PlatformProbe for CountingProbe {
        fn cpu_percent(&self) -> f64 {
            0.0
        }
        fn memory_info(&self) -> Memory {
            Memory::default()
        }
        fn disk_usage(&self, _path: &str) -> Disk {
            Disk {
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
        fn processes(&self) -> Vec<ProcessInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![ProcessInfo::default()]
        }
        fn network_interfaces(&self) -> Vec<NetworkInterface> {
            Vec::new()
        }
        fn disk_partitions(&self) -> Vec<Disk> {
            Vec::new()
        }
        fn network_totals(&self) -> (u64, u64) {
            (0, 0)
        }
    }

    #[test]
    fn repeated_calls_within_ttl_hit_the_cache_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = ProcessCache::new(CountingProbe {
            calls: calls.clone(),
        });
        cache.processes();
        cache.processes();
        cache.processes();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_stale_cache_entry_triggers_a_fresh_read() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = ProcessCache::new(CountingProbe {
            calls: calls.clone(),
        });
        cache.processes();
        *cache.cache.write() = Some((
            Instant::now() - PROCESS_CACHE_TTL - Duration::from_secs(1),
            vec![],
        ));
        cache.processes();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
