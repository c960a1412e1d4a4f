// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive PTY allocation for the shell RPC. `portable-pty`'s I/O
//! handles are blocking, so each direction is pumped on its own
//! `spawn_blocking` task and bridged to the async world through
//! channels, the same "blocking source, async channel bridge" shape
//! used for filesystem-change notifications in [`crate::watcher`].

use std::io::{Read, Write};

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to allocate a pty: {0}")]
    Allocate(String),
    #[error("failed to spawn shell: {0}")]
    Spawn(String),
    #[error("failed to resize pty: {0}")]
    Resize(String),
}

/// A live interactive shell session. Output is delivered on
/// [`PtySession::take_output`]'s receiver; input is written through
/// [`PtySession::write`]. Dropping the session kills the child and
/// stops both pump tasks.
pub struct PtySession {
    master: Box<dyn portable_pty::MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    output_rx: Option<mpsc::Receiver<Vec<u8>>>,
    reader_task: Option<JoinHandle<()>>,
}

impl PtySession {
    /// Spawn `shell` (falling back to `/bin/sh` when `None`) attached to
    /// a fresh PTY of the given size. Reading begins immediately on a
    /// background thread; bytes are available from the channel returned
    /// by [`take_output`](Self::take_output).
    pub fn spawn(shell: Option<&str>, cols: u16, rows: u16) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Allocate(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell.unwrap_or("/bin/sh"));
        cmd.cwd(std::env::current_dir().unwrap_or_else(|_| ".".into()));

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel(256);
        let reader_task = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            master: pair.master,
            writer,
            child,
            output_rx: Some(output_rx),
            reader_task: Some(reader_task),
        })
    }

    /// Takes ownership of the output channel. Can only be called once;
    /// later calls return `None`.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.output_rx.take()
    }

    /// Write keystrokes into the PTY's input side. Blocking, since
    /// `portable-pty`'s writer is a plain `Write`; callers on the async
    /// path should route this through `spawn_blocking` if write volume
    /// ever becomes large enough to matter.
    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(unix)]
    async fn spawned_shell_echoes_input_back() {
        let mut session = PtySession::spawn(Some("/bin/sh"), 80, 24).expect("spawn pty");
        let mut rx = session.take_output().expect("output channel");
        session.write(b"echo hi\n").expect("write to pty");

        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(std::time::Duration::from_millis(500), rx.recv()).await {
                Ok(Some(chunk)) => {
                    collected.extend_from_slice(&chunk);
                    if String::from_utf8_lossy(&collected).contains("hi") {
                        break;
                    }
                }
                _ => continue,
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hi"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn resizing_a_live_session_succeeds() {
        let session = PtySession::spawn(Some("/bin/sh"), 80, 24).expect("spawn pty");
        assert!(session.resize(100, 40).is_ok());
    }
}
