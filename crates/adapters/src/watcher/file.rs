// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File/directory condition evaluation: hashing or mtime/size
//! stat-diffing on each tick, per the `file`/`directory` watcher
//! contract.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use fleet_core::WatcherCondition;

use super::poll::ConditionEvaluator;

#[derive(Debug, Clone, PartialEq)]
enum Fingerprint {
    Missing,
    Present { signature: String },
}

pub(super) struct FileEvaluator {
    path: PathBuf,
    recursive: bool,
    check_hash: bool,
    pattern: Option<glob::Pattern>,
    conditions: Vec<WatcherCondition>,
    last: Option<Fingerprint>,
}

impl FileEvaluator {
    pub(super) fn new(
        path: String,
        recursive: bool,
        check_hash: bool,
        pattern: Option<String>,
        conditions: Vec<WatcherCondition>,
    ) -> Self {
        let pattern = pattern.and_then(|p| glob::Pattern::new(&p).ok());
        Self {
            path: PathBuf::from(path),
            recursive,
            check_hash,
            pattern,
            conditions,
            last: None,
        }
    }

    fn matches_pattern(&self, path: &Path) -> bool {
        match &self.pattern {
            Some(p) => path
                .file_name()
                .map(|n| p.matches(&n.to_string_lossy()))
                .unwrap_or(false),
            None => true,
        }
    }

    fn collect_targets(&self) -> Vec<PathBuf> {
        if !self.recursive {
            return vec![self.path.clone()];
        }
        let mut out = Vec::new();
        let mut stack = vec![self.path.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if self.matches_pattern(&path) {
                    out.push(path);
                }
            }
        }
        out
    }

    fn fingerprint(&self) -> Fingerprint {
        let targets = self.collect_targets();
        let existing: Vec<&PathBuf> = targets.iter().filter(|p| p.exists()).collect();
        if existing.is_empty() {
            return Fingerprint::Missing;
        }
        if self.check_hash {
            let mut hasher = Sha256::new();
            for path in &existing {
                if let Ok(bytes) = fs::read(path) {
                    hasher.update(&bytes);
                }
            }
            Fingerprint::Present {
                signature: format!("{:x}", hasher.finalize()),
            }
        } else {
            let mut mtime_total: u128 = 0;
            let mut size_total: u64 = 0;
            for path in &existing {
                if let Ok(meta) = fs::metadata(path) {
                    size_total += meta.len();
                    if let Ok(modified) = meta.modified() {
                        mtime_total += modified
                            .duration_since(SystemTime::UNIX_EPOCH)
                            .map(|d| d.as_nanos())
                            .unwrap_or(0);
                    }
                }
            }
            Fingerprint::Present {
                signature: format!("{mtime_total}:{size_total}"),
            }
        }
    }
}

impl ConditionEvaluator for FileEvaluator {
    fn evaluate(&mut self) -> Vec<(WatcherCondition, String)> {
        let current = self.fingerprint();
        let mut fired = Vec::new();
        match (&self.last, &current) {
            (None, Fingerprint::Present { .. }) | (Some(Fingerprint::Missing), Fingerprint::Present { .. }) => {
                if self.conditions.contains(&WatcherCondition::Created) {
                    fired.push((WatcherCondition::Created, self.path.display().to_string()));
                }
            }
            (
                Some(Fingerprint::Present { signature: prev }),
                Fingerprint::Present { signature: now },
            ) if prev != now => {
                if self.conditions.contains(&WatcherCondition::Changed) {
                    fired.push((WatcherCondition::Changed, self.path.display().to_string()));
                }
            }
            (Some(Fingerprint::Present { .. }), Fingerprint::Missing) => {
                if self.conditions.contains(&WatcherCondition::Deleted) {
                    fired.push((WatcherCondition::Deleted, self.path.display().to_string()));
                }
            }
            _ => {}
        }
        self.last = Some(current);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_sighting_of_an_existing_file_fires_created() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t");
        fs::write(&file, b"x").unwrap();
        let mut eval = FileEvaluator::new(
            file.display().to_string(),
            false,
            false,
            None,
            vec![WatcherCondition::Created],
        );
        let fired = eval.evaluate();
        assert_eq!(fired, vec![(WatcherCondition::Created, file.display().to_string())]);
    }

    #[test]
    fn content_change_fires_changed_on_the_next_tick() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t");
        fs::write(&file, b"x").unwrap();
        let mut eval = FileEvaluator::new(
            file.display().to_string(),
            false,
            true,
            None,
            vec![WatcherCondition::Created, WatcherCondition::Changed],
        );
        eval.evaluate();
        fs::write(&file, b"y").unwrap();
        let fired = eval.evaluate();
        assert!(fired.iter().any(|(c, _)| *c == WatcherCondition::Changed));
    }

    #[test]
    fn deleting_a_previously_seen_file_fires_deleted() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t");
        fs::write(&file, b"x").unwrap();
        let mut eval = FileEvaluator::new(
            file.display().to_string(),
            false,
            false,
            None,
            vec![WatcherCondition::Deleted],
        );
        eval.evaluate();
        fs::remove_file(&file).unwrap();
        let fired = eval.evaluate();
        assert_eq!(
            fired,
            vec![(WatcherCondition::Deleted, file.display().to_string())]
        );
    }

    #[test]
    fn an_unrequested_condition_never_fires() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("t");
        fs::write(&file, b"x").unwrap();
        let mut eval = FileEvaluator::new(
            file.display().to_string(),
            false,
            false,
            None,
            vec![WatcherCondition::Deleted],
        );
        // Only "created" would fire here, and it wasn't requested.
        assert!(eval.evaluate().is_empty());
    }
}
