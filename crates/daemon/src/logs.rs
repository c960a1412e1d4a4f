// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process log buffer feeding `GetRecentLogs`, `StreamLogs`, and
//! `GetSystemErrors`. A `tracing_subscriber::Layer` mirrors every event
//! the agent emits into a bounded ring buffer instead of shelling out to
//! `journalctl` — the host's actual journal is not guaranteed to exist
//! (containers, non-systemd hosts), and the agent's own structured logs
//! are a faithful log source for its own operational events.

use std::collections::VecDeque;
use std::sync::Arc;

use fleet_core::{LogEntry, LogLevel};
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const CAPACITY: usize = 2000;

pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    clock: fn() -> u64,
}

impl LogBuffer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(VecDeque::with_capacity(CAPACITY)),
            clock: now_secs,
        })
    }

    fn push(&self, entry: LogEntry) {
        let mut guard = self.entries.lock();
        if guard.len() == CAPACITY {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    /// Most recent `max_lines` entries, optionally filtered, newest last.
    pub fn recent(
        &self,
        max_lines: usize,
        level_filter: Option<LogLevel>,
        source_filter: Option<&str>,
        since_timestamp: Option<u64>,
    ) -> (Vec<LogEntry>, usize) {
        let guard = self.entries.lock();
        let filtered: Vec<LogEntry> = guard
            .iter()
            .filter(|e| level_filter.is_none_or(|lvl| e.level == lvl))
            .filter(|e| source_filter.is_none_or(|s| e.source.contains(s)))
            .filter(|e| since_timestamp.is_none_or(|since| e.timestamp >= since))
            .cloned()
            .collect();
        let total = filtered.len();
        let start = total.saturating_sub(max_lines);
        (filtered[start..].to_vec(), total)
    }

    pub fn errors_since(&self, since: Option<u64>, include_warnings: bool) -> Vec<LogEntry> {
        let guard = self.entries.lock();
        guard
            .iter()
            .filter(|e| {
                matches!(e.level, LogLevel::Error) || (include_warnings && matches!(e.level, LogLevel::Warning))
            })
            .filter(|e| since.is_none_or(|since| e.timestamp >= since))
            .cloned()
            .collect()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

pub struct LogBufferLayer {
    buffer: Arc<LogBuffer>,
}

impl LogBufferLayer {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<S: Subscriber> Layer<S> for LogBufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let level = match *event.metadata().level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warning,
            Level::DEBUG | Level::TRACE => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
        };

        self.buffer.push(LogEntry {
            timestamp: (self.buffer.clock)(),
            level,
            source: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_honors_the_max_lines_cap_and_keeps_newest_last() {
        let buffer = LogBuffer::new();
        for i in 0..5 {
            buffer.push(LogEntry {
                timestamp: i,
                level: LogLevel::Info,
                source: "test".into(),
                message: format!("entry {i}"),
            });
        }
        let (recent, total) = buffer.recent(2, None, None, None);
        assert_eq!(total, 5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].message, "entry 4");
    }

    #[test]
    fn level_filter_excludes_non_matching_entries() {
        let buffer = LogBuffer::new();
        buffer.push(LogEntry {
            timestamp: 1,
            level: LogLevel::Info,
            source: "a".into(),
            message: "info".into(),
        });
        buffer.push(LogEntry {
            timestamp: 2,
            level: LogLevel::Error,
            source: "a".into(),
            message: "bad".into(),
        });
        let (recent, total) = buffer.recent(10, Some(LogLevel::Error), None, None);
        assert_eq!(total, 1);
        assert_eq!(recent[0].message, "bad");
    }

    #[test]
    fn the_ring_buffer_drops_the_oldest_entry_once_full() {
        let buffer = LogBuffer::new();
        for i in 0..(CAPACITY + 10) {
            buffer.push(LogEntry {
                timestamp: i as u64,
                level: LogLevel::Info,
                source: "a".into(),
                message: format!("{i}"),
            });
        }
        let (recent, total) = buffer.recent(CAPACITY + 10, None, None, None);
        assert_eq!(total, CAPACITY);
        assert_eq!(recent[0].message, "10");
    }

    #[test]
    fn errors_since_includes_warnings_only_when_asked() {
        let buffer = LogBuffer::new();
        buffer.push(LogEntry {
            timestamp: 1,
            level: LogLevel::Warning,
            source: "a".into(),
            message: "warn".into(),
        });
        buffer.push(LogEntry {
            timestamp: 2,
            level: LogLevel::Error,
            source: "a".into(),
            message: "err".into(),
        });
        assert_eq!(buffer.errors_since(None, false).len(), 1);
        assert_eq!(buffer.errors_since(None, true).len(), 2);
    }
}
