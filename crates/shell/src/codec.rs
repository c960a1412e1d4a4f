// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pack/unpack a directory tree as a gzip-compressed tar stream.
//!
//! The archive preserves file modes and relative paths; missing
//! intermediate directories named by an entry are created on unpack.
//! Destination directories must already exist before unpacking into them.

use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use fleet_core::WorkspaceArchive;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("destination directory does not exist: {0}")]
    DestinationMissing(String),
}

/// Pack `directory`'s contents (recursively) into a gzip tar archive.
/// Paths inside the archive are relative to `directory`.
pub fn pack(directory: &Path) -> Result<WorkspaceArchive, CodecError> {
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", directory)?;
    let gz = builder.into_inner()?;
    let bytes = gz.finish()?;
    Ok(WorkspaceArchive::from_bytes(bytes))
}

/// Unpack a gzip tar archive into `directory`, which must already exist.
/// Intermediate directories named by entries are created as needed.
pub fn unpack(archive: &WorkspaceArchive, directory: &Path) -> Result<(), CodecError> {
    if !directory.is_dir() {
        return Err(CodecError::DestinationMissing(
            directory.display().to_string(),
        ));
    }
    let decoder = GzDecoder::new(archive.as_bytes());
    let mut tar = tar::Archive::new(decoder);
    tar.set_preserve_permissions(true);
    tar.unpack(directory)?;
    Ok(())
}

/// Convenience used by the self-update engine: extract a plain (non-tar)
/// gzip stream to a single file, used for platforms that ship a bare
/// gzip-compressed binary rather than a tar.
pub fn gunzip_to(bytes: &[u8], dest: &mut impl Write) -> Result<u64, CodecError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    dest.write_all(&buf)?;
    Ok(buf.len() as u64)
}
