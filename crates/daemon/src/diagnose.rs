// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DiagnoseHealth`: runs a fixed rule set over CPU, memory, disk,
//! load-ratio-vs-core-count, and (when `deepCheck` is set) the recent
//! error count, scoring with [`fleet_core::health::HealthScorer`].
//!
//! Thresholds are this crate's own judgment call — the surrounding
//! specification fixes the penalty amounts and score buckets but not
//! the trigger values, so they are picked here and not meant to be
//! load-bearing beyond "plausible defaults an operator can tune later".

use fleet_adapters::PlatformProbe;
use fleet_core::health::{HealthIssue, HealthReport, HealthScorer, HealthSeverity};

const CPU_WARNING_PERCENT: f64 = 75.0;
const CPU_CRITICAL_PERCENT: f64 = 90.0;
const MEMORY_WARNING_PERCENT: f64 = 80.0;
const MEMORY_CRITICAL_PERCENT: f64 = 90.0;
const DISK_WARNING_PERCENT: f64 = 80.0;
const DISK_CRITICAL_PERCENT: f64 = 90.0;
const LOAD_RATIO_WARNING: f64 = 1.0;
const LOAD_RATIO_CRITICAL: f64 = 2.0;
const ERROR_COUNT_WARNING: usize = 5;
const ERROR_COUNT_CRITICAL: usize = 20;

pub fn diagnose(probe: &dyn PlatformProbe, recent_error_count: Option<usize>) -> HealthReport {
    let mut scorer = HealthScorer::new();
    let mut triggered = 0usize;

    let cpu = probe.cpu_percent();
    if check_threshold(
        &mut scorer,
        "cpu",
        cpu,
        CPU_WARNING_PERCENT,
        CPU_CRITICAL_PERCENT,
        false,
        "investigate the top CPU-consuming processes or scale out",
    ) {
        triggered += 1;
    }

    let memory = probe.memory_info();
    if check_threshold(
        &mut scorer,
        "memory",
        memory.used_percent(),
        MEMORY_WARNING_PERCENT,
        MEMORY_CRITICAL_PERCENT,
        false,
        "free cached memory or add swap/RAM",
    ) {
        triggered += 1;
    }

    let disks = probe.disk_partitions();
    if let Some(fullest) = disks
        .iter()
        .max_by(|a, b| a.used_percent().total_cmp(&b.used_percent()))
    {
        if check_threshold(
            &mut scorer,
            &format!("disk:{}", fullest.mountpoint),
            fullest.used_percent(),
            DISK_WARNING_PERCENT,
            DISK_CRITICAL_PERCENT,
            false,
            "reclaim disk space or extend the volume",
        ) {
            triggered += 1;
        }
    }

    let (load1, _, _) = probe.load_average();
    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get() as f64)
        .unwrap_or(1.0);
    let load_ratio = load1 / cpu_count;
    if check_threshold(
        &mut scorer,
        "load",
        load_ratio,
        LOAD_RATIO_WARNING,
        LOAD_RATIO_CRITICAL,
        true,
        "reduce concurrent workload or add capacity",
    ) {
        triggered += 1;
    }

    if let Some(errors) = recent_error_count {
        if check_threshold(
            &mut scorer,
            "recent_errors",
            errors as f64,
            ERROR_COUNT_WARNING as f64,
            ERROR_COUNT_CRITICAL as f64,
            false,
            "inspect recent logs for a recurring failure",
        ) {
            triggered += 1;
        }
    }

    let summary = if triggered == 0 {
        "no issues detected".to_string()
    } else {
        format!("{triggered} issue(s) detected")
    };
    scorer.finish(summary)
}

#[allow(clippy::too_many_arguments)]
fn check_threshold(
    scorer: &mut HealthScorer,
    category: &str,
    value: f64,
    warning: f64,
    critical: f64,
    is_load_rule: bool,
    suggestion: &str,
) -> bool {
    if value >= critical {
        scorer.deduct(
            HealthIssue {
                category: category.to_string(),
                severity: HealthSeverity::Critical,
                current_value: value,
                threshold: critical,
                suggestion: suggestion.to_string(),
                auto_fixable: false,
            },
            is_load_rule,
        );
        true
    } else if value >= warning {
        scorer.deduct(
            HealthIssue {
                category: category.to_string(),
                severity: HealthSeverity::Warning,
                current_value: value,
                threshold: warning,
                suggestion: suggestion.to_string(),
                auto_fixable: false,
            },
            is_load_rule,
        );
        true
    } else {
        false
    }
}
