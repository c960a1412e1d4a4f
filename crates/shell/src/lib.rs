// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Workspace archive codec and subprocess execution helpers.
//!
//! This crate owns the two pieces of "talk to the local filesystem/OS"
//! machinery shared by the task executor and the command-execution RPC:
//! packing/unpacking a directory tree as a streaming archive ([`codec`]),
//! and running a subprocess with a timeout ([`subprocess`]).

pub mod codec;
pub mod subprocess;

pub use codec::{pack, unpack, CodecError};
pub use subprocess::{run_with_timeout, SubprocessError};

#[cfg(test)]
#[path = "codec_tests.rs"]
mod codec_tests;
