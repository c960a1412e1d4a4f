// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workspace wire envelope: a directory tree shipped as an opaque byte
//! archive. `fleet-shell` owns the actual pack/unpack codec; this crate
//! only defines the envelope that crosses RPC boundaries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceArchive(pub Vec<u8>);

impl WorkspaceArchive {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_archive_has_zero_length() {
        assert!(WorkspaceArchive::empty().is_empty());
        assert_eq!(WorkspaceArchive::empty().len(), 0);
    }
}
