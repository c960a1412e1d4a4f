// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entrypoint for the `fleetd` binary: loads configuration (C11), wires
//! up tracing to a rotating file plus the in-process log buffer (C12),
//! acquires the agent's PID file (§6.4), then runs the RPC server (C5),
//! the master connection manager (C6), the watcher manager's event
//! drain (C3), and the performance sampler (§4.5) side by side until
//! killed.

use std::sync::Arc;
use std::time::Instant;

use fleetd::caches::{TtlCache, DISK_INFO_TTL, NETWORK_INFO_TTL, RESOURCE_USAGE_TTL};
use fleetd::logs::{LogBuffer, LogBufferLayer};
use fleetd::master_connection::ConnectionState;
use fleetd::perf_history::PerformanceHistory;
use fleetd::rpc_server::AgentContext;
use fleetd::FleetdConfig;
use fleet_adapters::native_probe;
use fleet_engine::TaskExecutor;
use fleet_registry::RegistryClient;
use fleet_storage::PidFile;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("fleetd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("fleetd {}", env!("CARGO_PKG_VERSION"));
                println!("Agent daemon for the fleet task-execution control plane.");
                println!();
                println!("Configuration is read from FLEETD_* environment variables or");
                println!("~/.config/fleet/fleetd.toml (override with FLEETD_CONFIG).");
                println!("Required: FLEETD_NAME, FLEETD_MASTER_ADDRESS.");
                return Ok(());
            }
            _ => {}
        }
    }

    let config = FleetdConfig::load()?;
    let log_buffer = LogBuffer::new();
    let _guard = setup_logging(&config, Arc::clone(&log_buffer))?;

    info!(name = %config.name, listen_address = %config.listen_address, "starting fleetd");

    let pid_path = PidFile::path_for(&config.name);
    let _pid_file = match PidFile::acquire(&pid_path) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            warn!(error = %e, path = ?pid_path, "continuing without a pid file");
            None
        }
    };

    let probe = Arc::from(native_probe());
    let (watcher_events_tx, mut watcher_events_rx) = tokio::sync::mpsc::channel(256);
    let watchers = Arc::new(fleet_adapters::WatcherManager::new(watcher_events_tx));
    let task_executor = Arc::new(TaskExecutor::new(Arc::clone(&watchers)));
    let perf_history = PerformanceHistory::new();

    let ctx = Arc::new(AgentContext {
        name: config.name.clone(),
        version: config.version.clone(),
        started_at: Instant::now(),
        shell: config.shell.clone(),
        current_exe: std::env::current_exe().unwrap_or_else(|_| "fleetd".into()),
        update_url_template: config.update_url_template.clone(),
        probe: Arc::clone(&probe),
        task_executor,
        watchers,
        log_buffer: Arc::clone(&log_buffer),
        perf_history: Arc::clone(&perf_history),
        resource_cache: Arc::new(TtlCache::new(RESOURCE_USAGE_TTL)),
        network_cache: Arc::new(TtlCache::new(NETWORK_INFO_TTL)),
        disk_cache: Arc::new(TtlCache::new(DISK_INFO_TTL)),
    });

    // Watcher conditions fire onto a single bounded channel (§4.3); this
    // agent has no unsolicited push path into the registry's
    // request/response protocol, so fired events join the same log
    // buffer `GetRecentLogs`/`StreamLogs` already expose. An operator
    // watching logs sees watcher transitions the same way they see
    // every other agent-local event.
    tokio::spawn(async move {
        while let Some(event) = watcher_events_rx.recv().await {
            info!(
                watcher_id = %event.watcher_id.as_str(),
                kind = %event.kind,
                condition = ?event.condition,
                details = %event.details,
                "watcher event"
            );
        }
    });

    tokio::spawn(fleetd::perf_history::run(
        Arc::clone(&perf_history),
        Arc::clone(&probe),
    ));

    let connection_state = ConnectionState::new();
    let registry_client = RegistryClient::new(config.master_address.clone());
    tokio::spawn(fleetd::master_connection::run(
        connection_state,
        registry_client,
        config.name.clone(),
        config.report_address.clone(),
        config.version.clone(),
        {
            let probe = Arc::clone(&probe);
            move || {
                serde_json::to_string(&fleetd::snapshot::collect_system_info(probe.as_ref()))
                    .unwrap_or_default()
            }
        },
    ));

    if let Err(e) = fleetd::serve(&config.listen_address, ctx).await {
        error!(error = %e, "fleetd rpc server exited with an error");
        return Err(e.into());
    }

    Ok(())
}

fn setup_logging(
    config: &FleetdConfig,
    log_buffer: Arc<LogBuffer>,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config
        .log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log path has no file name: {:?}", config.log_path))?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(LogBufferLayer::new(log_buffer))
        .init();

    Ok(guard)
}
