// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The task executor (C4): composes `fleet-runbook` (script parsing),
//! `fleet-shell` (workspace codec and subprocess execution) and
//! `fleet-adapters` (the watcher manager) into the `ExecuteTask` RPC's
//! behavior.

mod task_executor;

pub use task_executor::{TaskExecuteError, TaskExecutor};
