// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background performance sampler feeding `GetPerformanceHistory`.
//! Samples are taken on a fixed cadence by a dedicated task rather than
//! during the RPC itself — sampling `dataPoints` times spaced across a
//! caller-chosen `durationMinutes` would otherwise block the RPC for
//! the full requested duration, which is impractical for anything past
//! a couple of minutes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fleet_adapters::PlatformProbe;
use fleet_core::wire::agent::{PerformanceHistoryResponse, PerformanceSnapshot};
use parking_lot::Mutex;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(10);
const MAX_SAMPLES: usize = 8 * 60 * 6; // 8 hours at one sample per 10s

pub struct PerformanceHistory {
    samples: Mutex<VecDeque<PerformanceSnapshot>>,
    clock: fn() -> u64,
}

impl PerformanceHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(VecDeque::with_capacity(MAX_SAMPLES)),
            clock: now_secs,
        })
    }

    fn push(&self, snapshot: PerformanceSnapshot) {
        let mut guard = self.samples.lock();
        if guard.len() == MAX_SAMPLES {
            guard.pop_front();
        }
        guard.push_back(snapshot);
    }

    /// Samples within the last `duration_minutes`, downsampled to at
    /// most `data_points` entries (evenly spaced, newest included).
    pub fn query(&self, duration_minutes: u32, data_points: u32) -> PerformanceHistoryResponse {
        let now = (self.clock)();
        let window_start = now.saturating_sub(duration_minutes as u64 * 60);
        let guard = self.samples.lock();
        let in_window: Vec<PerformanceSnapshot> = guard
            .iter()
            .filter(|s| s.timestamp >= window_start)
            .cloned()
            .collect();

        let data_points = data_points.max(1) as usize;
        let snapshots = downsample(&in_window, data_points);

        if snapshots.is_empty() {
            return PerformanceHistoryResponse {
                snapshots,
                avg: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let cpu_values: Vec<f64> = snapshots.iter().map(|s| s.cpu_percent).collect();
        let avg = cpu_values.iter().sum::<f64>() / cpu_values.len() as f64;
        let min = cpu_values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = cpu_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        PerformanceHistoryResponse {
            snapshots,
            avg,
            min,
            max,
        }
    }
}

fn downsample(samples: &[PerformanceSnapshot], data_points: usize) -> Vec<PerformanceSnapshot> {
    if samples.len() <= data_points {
        return samples.to_vec();
    }
    let stride = samples.len() as f64 / data_points as f64;
    (0..data_points)
        .map(|i| samples[((i as f64 * stride) as usize).min(samples.len() - 1)].clone())
        .collect()
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Runs forever, sampling the probe onto `history` every
/// [`SAMPLE_INTERVAL`]. Intended to be `tokio::spawn`ed once at startup.
pub async fn run(history: Arc<PerformanceHistory>, probe: Arc<dyn PlatformProbe>) {
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    loop {
        ticker.tick().await;
        let memory = probe.memory_info();
        history.push(PerformanceSnapshot {
            timestamp: now_secs(),
            cpu_percent: probe.cpu_percent(),
            memory_used_percent: memory.used_percent(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_with_no_samples_returns_an_empty_response() {
        let history = PerformanceHistory::new();
        let response = history.query(60, 10);
        assert!(response.snapshots.is_empty());
        assert_eq!(response.avg, 0.0);
    }

    #[test]
    fn query_downsamples_to_the_requested_point_count() {
        let history = PerformanceHistory::new();
        let now = now_secs();
        for i in 0..100 {
            history.push(PerformanceSnapshot {
                timestamp: now - i,
                cpu_percent: i as f64,
                memory_used_percent: 50.0,
            });
        }
        let response = history.query(60, 10);
        assert_eq!(response.snapshots.len(), 10);
    }

    #[test]
    fn query_computes_min_avg_max_over_the_window() {
        let history = PerformanceHistory::new();
        let now = now_secs();
        history.push(PerformanceSnapshot {
            timestamp: now,
            cpu_percent: 10.0,
            memory_used_percent: 1.0,
        });
        history.push(PerformanceSnapshot {
            timestamp: now,
            cpu_percent: 90.0,
            memory_used_percent: 1.0,
        });
        let response = history.query(60, 10);
        assert_eq!(response.min, 10.0);
        assert_eq!(response.max, 90.0);
        assert_eq!(response.avg, 50.0);
    }
}
