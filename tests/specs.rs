//! Behavioral specifications for the fleet control plane.
//!
//! These tests are black-box: they spawn real `fleet-registry` and
//! `fleetd` processes on loopback ports and drive them through the
//! `fleetctl` binary, verifying stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// registry/
#[path = "specs/registry/lifecycle.rs"]
mod registry_lifecycle;
