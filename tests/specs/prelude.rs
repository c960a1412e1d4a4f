//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for black-box `fleetctl` testing against a
//! real `fleet-registry` and `fleetd` pair on loopback ports.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Returns the path to a binary in the workspace's debug target dir,
/// falling back to resolving relative to the running test binary when
/// `CARGO_MANIFEST_DIR` points at a removed worktree sharing a target dir.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn fleetctl_binary() -> PathBuf {
    binary_path("fleetctl")
}

fn fleet_registry_binary() -> PathBuf {
    binary_path("fleet-registry")
}

fn fleetd_binary() -> PathBuf {
    binary_path("fleetd")
}

/// Build a `fleetctl` command against a given master address.
pub fn fleetctl(master: &str) -> CliBuilder {
    CliBuilder::new(master)
}

/// High-level CLI builder for fluent test assertions.
pub struct CliBuilder {
    args: Vec<String>,
    master: String,
}

impl CliBuilder {
    fn new(master: &str) -> Self {
        Self {
            args: Vec::new(),
            master: master.to_string(),
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(fleetctl_binary());
        cmd.arg("--master").arg(&self.master);
        cmd.args(&self.args);
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("fleetctl should run");
        assert!(
            output.status.success(),
            "expected fleetctl to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("fleetctl should run");
        assert!(
            !output.status.success(),
            "expected fleetctl to fail, but it passed\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

/// Result of a CLI run for chaining assertions.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }
}

/// Poll a condition until it returns true or the timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn free_local_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind an ephemeral port");
    listener.local_addr().expect("read local addr").to_string()
}

/// A running `fleet-registry` process, torn down on drop.
pub struct RunningRegistry {
    pub address: String,
    child: Child,
}

impl RunningRegistry {
    pub fn start() -> Self {
        let address = free_local_address();
        let child = Command::new(fleet_registry_binary())
            .env("FLEET_REGISTRY_BIND_ADDRESS", &address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("fleet-registry should start");
        let registry = Self { address, child };
        wait_for(2000, || {
            std::net::TcpStream::connect(&registry.address).is_ok()
        });
        registry
    }
}

impl Drop for RunningRegistry {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A running `fleetd` agent registered against a [`RunningRegistry`],
/// torn down on drop.
pub struct RunningAgent {
    pub name: String,
    pub bind_address: String,
    child: Child,
}

impl RunningAgent {
    pub fn start(name: &str, registry: &RunningRegistry) -> Self {
        let bind_address = free_local_address();
        let child = Command::new(fleetd_binary())
            .env("FLEETD_NAME", name)
            .env("FLEETD_MASTER_ADDRESS", &registry.address)
            .env("FLEETD_LISTEN_ADDRESS", &bind_address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("fleetd should start");
        let agent = Self {
            name: name.to_string(),
            bind_address,
            child,
        };
        wait_for(2000, || {
            std::net::TcpStream::connect(&agent.bind_address).is_ok()
        });
        agent
    }
}

impl Drop for RunningAgent {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
