// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entrypoint for the `fleet-registry` binary: load config (C11), set
//! up tracing to a rotating file (C12), then run the accept loop until
//! killed.

use fleet_registry::RegistryConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RegistryConfig::load()?;
    let _guard = setup_logging(&config)?;

    info!(bind_address = %config.bind_address, "starting fleet-registry");

    if let Err(e) = fleet_registry::serve(&config.bind_address).await {
        error!(error = %e, "fleet-registry exited with an error");
        return Err(e.into());
    }

    Ok(())
}

fn setup_logging(
    config: &RegistryConfig,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let dir = config
        .log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
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
        .init();

    Ok(guard)
}
