// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI-side local cache (§6.4): a key/value store mapping agent
//! name → last-known address, consulted with `--local` and as a
//! fallback when the master is unreachable.
//!
//! Writes go through the same temp-file-then-atomic-rename discipline
//! the teacher's checkpoint writer uses for snapshots: write the whole
//! map to a sibling `.tmp` file, `sync_all`, then `rename` over the
//! real path, so a crash mid-write never corrupts the cache.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentCacheError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt agent cache at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize agent cache for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    agents: HashMap<String, String>,
}

/// A file-backed `name -> address` cache. Each mutating call persists
/// immediately; there is no in-memory-only mode, since the whole point
/// of this store is surviving process restarts.
pub struct AgentCache {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl AgentCache {
    /// The conventional path: `~/.cache/fleet/agents.json`, or
    /// `$XDG_CACHE_HOME/fleet/agents.json` when set.
    pub fn default_path() -> PathBuf {
        if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            return PathBuf::from(xdg).join("fleet").join("agents.json");
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".cache")
            .join("fleet")
            .join("agents.json")
    }

    /// Load the cache at `path`, treating a missing file as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AgentCacheError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                serde_json::from_str::<CacheFile>(&raw)
                    .map_err(|source| AgentCacheError::Corrupt {
                        path: path.clone(),
                        source,
                    })?
                    .agents
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(AgentCacheError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Record or update `name`'s address and persist immediately.
    pub fn put(&mut self, name: &str, address: &str) -> Result<(), AgentCacheError> {
        self.entries.insert(name.to_string(), address.to_string());
        self.flush()
    }

    /// Remove `name` if present and persist immediately. Idempotent.
    pub fn remove(&mut self, name: &str) -> Result<(), AgentCacheError> {
        self.entries.remove(name);
        self.flush()
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    fn flush(&self) -> Result<(), AgentCacheError> {
        write_atomic(&self.path, &CacheFile {
            agents: self.entries.clone(),
        })
    }
}

fn write_atomic(path: &Path, contents: &CacheFile) -> Result<(), AgentCacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| AgentCacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("cache")
    ));
    let json = serde_json::to_vec_pretty(contents).map_err(|source| AgentCacheError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()
    })();
    write_result.map_err(|source| AgentCacheError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|source| AgentCacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_a_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AgentCache::load(dir.path().join("agents.json")).unwrap();
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn put_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.json");
        let mut cache = AgentCache::load(&path).unwrap();
        cache.put("a1", "10.0.0.1:9000").unwrap();

        let reloaded = AgentCache::load(&path).unwrap();
        assert_eq!(reloaded.get("a1"), Some("10.0.0.1:9000"));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = AgentCache::load(dir.path().join("agents.json")).unwrap();
        cache.remove("does-not-exist").unwrap();
        cache.put("a1", "10.0.0.1:9000").unwrap();
        cache.remove("a1").unwrap();
        cache.remove("a1").unwrap();
        assert!(cache.get("a1").is_none());
    }

    #[test]
    fn a_corrupt_file_surfaces_as_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            AgentCache::load(&path),
            Err(AgentCacheError::Corrupt { .. })
        ));
    }
}
