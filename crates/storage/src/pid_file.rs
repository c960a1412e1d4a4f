// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PID file an agent writes at `/tmp/fleet-agent-<name>.pid` (§6.4)
//! when daemonized, locked with `fs2` so a second agent started under
//! the same name refuses to start rather than silently taking over.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("another agent process already holds the lock at {0}")]
    AlreadyRunning(PathBuf),
}

/// An exclusively-locked PID file. Held open for the agent process's
/// lifetime; the lock (and, best-effort, the file) is released on drop.
pub struct PidFile {
    path: PathBuf,
    file: File,
}

impl PidFile {
    /// The conventional path for an agent named `name`.
    pub fn path_for(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fleet-agent-{name}.pid"))
    }

    /// Acquire the lock and write the current process id. Fails with
    /// [`PidFileError::AlreadyRunning`] if another live process holds
    /// the lock.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, PidFileError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| PidFileError::Io {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|_| PidFileError::AlreadyRunning(path.clone()))?;

        let mut file = file;
        file.set_len(0).map_err(|source| PidFileError::Io {
            path: path.clone(),
            source,
        })?;
        write!(file, "{}", std::process::id()).map_err(|source| PidFileError::Io {
            path: path.clone(),
            source,
        })?;
        file.flush().map_err(|source| PidFileError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the pid recorded in `path`, without acquiring the lock.
    /// Used by the CLI to report the pid of an already-running agent.
    pub fn read_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_writes_the_current_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a1.pid");
        let pid_file = PidFile::acquire(&path).unwrap();
        assert_eq!(PidFile::read_pid(&path), Some(std::process::id()));
        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn a_second_acquire_on_the_same_path_fails_while_the_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a1.pid");
        let _first = PidFile::acquire(&path).unwrap();
        let second = PidFile::acquire(&path);
        assert!(matches!(second, Err(PidFileError::AlreadyRunning(_))));
    }

    #[test]
    fn path_for_includes_the_agent_name() {
        let path = PidFile::path_for("a1");
        assert!(path.to_string_lossy().contains("fleet-agent-a1.pid"));
    }
}
