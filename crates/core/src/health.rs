// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `DiagnoseHealth` scoring model: a 0-100 score derived by deducting
//! penalties from 100, bucketed into healthy/degraded/unhealthy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        write!(f, "{s}")
    }
}

impl HealthStatus {
    /// Bucket a 0-100 score: `>=80` healthy, `50..80` degraded, else
    /// unhealthy.
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            HealthStatus::Healthy
        } else if score >= 50 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthSeverity {
    Warning,
    Critical,
}

impl HealthSeverity {
    /// Penalty deducted from the running score. Load-based rules deduct a
    /// different amount than resource rules per the spec's fixed table.
    pub fn penalty(&self, is_load_rule: bool) -> u32 {
        match (self, is_load_rule) {
            (HealthSeverity::Critical, false) => 20,
            (HealthSeverity::Warning, false) => 10,
            (HealthSeverity::Critical, true) => 15,
            (HealthSeverity::Warning, true) => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIssue {
    pub category: String,
    pub severity: HealthSeverity,
    pub current_value: f64,
    pub threshold: f64,
    pub suggestion: String,
    pub auto_fixable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub health_score: u32,
    pub issues: Vec<HealthIssue>,
    pub summary: String,
}

/// Accumulates penalties against a starting score of 100, clamped at 0.
#[derive(Debug, Default)]
pub struct HealthScorer {
    score: i32,
    issues: Vec<HealthIssue>,
}

impl HealthScorer {
    pub fn new() -> Self {
        Self {
            score: 100,
            issues: Vec::new(),
        }
    }

    pub fn deduct(&mut self, issue: HealthIssue, is_load_rule: bool) {
        self.score -= issue.severity.penalty(is_load_rule) as i32;
        self.issues.push(issue);
    }

    pub fn finish(self, summary: impl Into<String>) -> HealthReport {
        let score = self.score.clamp(0, 100) as u32;
        HealthReport {
            overall_status: HealthStatus::from_score(score),
            health_score: score,
            issues: self.issues,
            summary: summary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_buckets_match_the_documented_thresholds() {
        assert_eq!(HealthStatus::from_score(100), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(80), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_score(79), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_score(49), HealthStatus::Unhealthy);
        assert_eq!(HealthStatus::from_score(0), HealthStatus::Unhealthy);
    }

    #[test]
    fn scorer_clamps_at_zero_after_many_critical_deductions() {
        let mut scorer = HealthScorer::new();
        for _ in 0..10 {
            scorer.deduct(
                HealthIssue {
                    category: "cpu".into(),
                    severity: HealthSeverity::Critical,
                    current_value: 99.0,
                    threshold: 90.0,
                    suggestion: "scale out".into(),
                    auto_fixable: false,
                },
                false,
            );
        }
        let report = scorer.finish("overloaded");
        assert_eq!(report.health_score, 0);
        assert_eq!(report.overall_status, HealthStatus::Unhealthy);
    }

    #[test]
    fn load_rule_penalties_differ_from_resource_rule_penalties() {
        assert_eq!(HealthSeverity::Critical.penalty(false), 20);
        assert_eq!(HealthSeverity::Critical.penalty(true), 15);
        assert_eq!(HealthSeverity::Warning.penalty(false), 10);
        assert_eq!(HealthSeverity::Warning.penalty(true), 5);
    }
}
