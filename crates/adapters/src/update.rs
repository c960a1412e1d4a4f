// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-update: download a new agent binary, verify it, and swap it in
//! under the running process. The swap follows the same copy-then-
//! atomic-rename discipline used elsewhere for on-disk state: write to
//! a temp file in the same directory as the target, `sync_all`, then
//! `rename` over it so a crash mid-download never leaves a half-written
//! binary in place.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervisor {
    Systemd,
    Init,
    Other,
    None,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Walk `/proc/self/status` for `PPid`, then read `/proc/<ppid>/comm`
/// to classify the parent. Fails soft to `Supervisor::None` on any read
/// error, since an update attempt should never be blocked on supervisor
/// detection.
pub fn detect_supervisor() -> Supervisor {
    let Some(ppid) = read_ppid() else {
        return Supervisor::None;
    };
    let comm = std::fs::read_to_string(format!("/proc/{ppid}/comm"))
        .unwrap_or_default()
        .trim()
        .to_string();
    match comm.as_str() {
        "systemd" => Supervisor::Systemd,
        "init" => Supervisor::Init,
        "" => Supervisor::None,
        _ => Supervisor::Other,
    }
}

fn read_ppid() -> Option<u32> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status.lines().find_map(|line| {
        line.strip_prefix("PPid:")
            .and_then(|rest| rest.trim().parse().ok())
    })
}

/// Download `url` to a temp file, verify against `expected_sha256` when
/// given, then atomically replace `target` (typically
/// `std::env::current_exe()`). On any failure after the backup is taken,
/// the original binary is restored before returning the error.
pub async fn apply_update(
    url: &str,
    target: &Path,
    expected_sha256: Option<&str>,
) -> Result<(), UpdateError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let download_path = dir.join(".fleet-update.download");
    let backup_path = dir.join(".fleet-update.backup");

    download_to_file(url, &download_path).await?;

    if let Some(expected) = expected_sha256 {
        let actual = sha256_of(&download_path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            let _ = std::fs::remove_file(&download_path);
            return Err(UpdateError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
    }

    if target.exists() {
        std::fs::copy(target, &backup_path)?;
    }

    match replace_binary(&download_path, target) {
        Ok(()) => {
            let _ = std::fs::remove_file(&backup_path);
            Ok(())
        }
        Err(e) => {
            if backup_path.exists() {
                let _ = std::fs::rename(&backup_path, target);
            }
            Err(e)
        }
    }
}

async fn download_to_file(url: &str, dest: &Path) -> Result<(), UpdateError> {
    use futures_util::StreamExt as _;

    let response = reqwest::get(url).await?.error_for_status()?;
    let mut stream = response.bytes_stream();
    let mut file = std::fs::File::create(dest)?;
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?)?;
    }
    file.sync_all()?;
    Ok(())
}

fn sha256_of(path: &Path) -> Result<String, UpdateError> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn replace_binary(download_path: &Path, target: &Path) -> Result<(), UpdateError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(download_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(download_path, perms)?;
    }
    std::fs::rename(download_path, target)?;
    if let Some(dir) = target.parent() {
        let _ = std::fs::File::open(dir).and_then(|f| f.sync_all());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_supervisor_never_panics() {
        let _ = detect_supervisor();
    }

    #[test]
    fn sha256_of_matches_a_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"").unwrap();
        let digest = sha256_of(&path).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn apply_update_restores_backup_on_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fleetd");
        std::fs::write(&target, b"original").unwrap();

        let server = httpmock_stub_server().await;
        let url = format!("{server}/fleetd");

        let result = apply_update(&url, &target, Some("0000000000000000000000000000000000000000000000000000000000000000")).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"original");
    }

    async fn httpmock_stub_server() -> String {
        // Minimal local server stub: binds a loopback listener and
        // serves one fixed response via a background task.
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let body = b"new-binary-contents";
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(body).await;
            }
        });
        format!("http://{addr}")
    }
}
