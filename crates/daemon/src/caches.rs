// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-read-plus-async-refresh metric caches (§4.5, §5): a fleet-wide
//! scrape must never stall on an expensive probe. A cache miss computes
//! synchronously; a stale hit returns the old value immediately and
//! schedules at most one background refresh, guarded by an atomic flag
//! so concurrent stale reads never spawn more than one refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub const RESOURCE_USAGE_TTL: Duration = Duration::from_secs(60);
pub const NETWORK_INFO_TTL: Duration = Duration::from_secs(120);
pub const DISK_INFO_TTL: Duration = Duration::from_secs(300);

enum CacheRead<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

pub struct TtlCache<T> {
    ttl: Duration,
    state: RwLock<Option<(T, Instant)>>,
    refreshing: AtomicBool,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    fn read(&self) -> CacheRead<T> {
        match &*self.state.read() {
            Some((value, fetched_at)) if fetched_at.elapsed() < self.ttl => {
                CacheRead::Fresh(value.clone())
            }
            Some((value, _)) => CacheRead::Stale(value.clone()),
            None => CacheRead::Miss,
        }
    }

    fn store(&self, value: T) {
        *self.state.write() = Some((value, Instant::now()));
    }

    fn begin_refresh(&self) -> bool {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish_refresh(&self) {
        self.refreshing.store(false, Ordering::Release);
    }
}

/// Read `cache`, computing synchronously on a miss and scheduling at
/// most one background refresh on a stale hit.
pub fn cached_or_refresh<T, F>(cache: &Arc<TtlCache<T>>, compute: F) -> T
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    match cache.read() {
        CacheRead::Fresh(value) => value,
        CacheRead::Stale(value) => {
            if cache.begin_refresh() {
                let cache = Arc::clone(cache);
                tokio::task::spawn_blocking(move || {
                    let fresh = compute();
                    cache.store(fresh);
                    cache.finish_refresh();
                });
            }
            value
        }
        CacheRead::Miss => {
            let fresh = compute();
            cache.store(fresh.clone());
            fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn a_miss_computes_synchronously_exactly_once() {
        let cache = Arc::new(TtlCache::<u32>::new(Duration::from_millis(50)));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let value = cached_or_refresh(&cache, move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            7
        });
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_fresh_hit_never_calls_compute() {
        let cache = Arc::new(TtlCache::<u32>::new(Duration::from_secs(60)));
        cache.store(1);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let value = cached_or_refresh(&cache, move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            99
        });
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_stale_reads_schedule_at_most_one_refresh() {
        let cache = Arc::new(TtlCache::<u32>::new(Duration::from_millis(1)));
        cache.store(1);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let calls = Arc::new(AtomicU32::new(0));
        for _ in 0..5 {
            let calls_clone = Arc::clone(&calls);
            let value = cached_or_refresh(&cache, move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                2
            });
            assert_eq!(value, 1);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
