// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetctl agent ...` (§6.3): the whole CLI surface lives under this
//! one subcommand tree. Every variant that talks to a live agent first
//! resolves its name through [`crate::resolve::resolve_agent_address`],
//! then dials it with [`crate::rpc_client::AgentClient`]; variants that
//! only need the registry (`list`, `get`, `stop`, `delete`) go straight
//! through `fleet_registry::RegistryClient`.

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use fleet_core::wire::agent::AgentRequest;
use fleet_core::wire::registry::AgentInfo;
use fleet_core::{WatcherCondition, WatcherId, WatcherSpec, WatcherType};
use fleet_registry::RegistryClient;
use fleet_storage::AgentCache;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::color;
use crate::daemon_process;
use crate::exit_error::ExitError;
use crate::output::{format_time_ago, OutputFormat};
use crate::poll::{Poller, Tick};
use crate::resolve::resolve_agent_address;
use crate::rpc_client::AgentClient;
use crate::table::{Column, Table};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Start an agent locally, registering it with the master once its
    /// RPC server is listening.
    Start {
        name: String,
        /// Address fleetd binds its RPC server to.
        #[arg(long, default_value = "0.0.0.0:9300")]
        bind_address: String,
        /// Address advertised to the master (defaults to `bind_address`).
        #[arg(long)]
        report_address: Option<String>,
        /// Detach and return immediately instead of running in the foreground.
        #[arg(long)]
        daemon: bool,
    },
    /// Request a running agent shut down.
    Stop { name: String },
    /// List every agent the master knows about.
    List,
    /// Show one agent's registry record.
    Get { name: String },
    /// Run a shell command on an agent and stream its output back.
    Exec {
        name: String,
        command: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Print the Lua bindings a task script can use on this agent.
    Modules,
    #[command(subcommand)]
    Metrics(MetricsCommand),
    /// Replace the agent's binary and restart it.
    Update {
        name: String,
        #[arg(long, default_value = "latest")]
        version: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        skip_restart: bool,
    },
    /// Install (start as a daemon) and remember the agent locally.
    Install {
        name: String,
        #[arg(long, default_value = "0.0.0.0:9300")]
        bind_address: String,
        #[arg(long)]
        report_address: Option<String>,
    },
    /// Stop the agent and forget it, at both the master and the local cache.
    Delete { name: String },
    /// Open an interactive shell on the agent.
    Shell { name: String },
    #[command(subcommand)]
    Watcher(WatcherCommand),
}

#[derive(Subcommand)]
pub enum MetricsCommand {
    /// Render the agent's current metrics in Prometheus text exposition format.
    Prom { name: String },
    /// Continuously refresh a metrics summary in the terminal.
    Dashboard {
        name: String,
        #[arg(long, default_value = "2")]
        interval: u64,
    },
}

#[derive(Subcommand)]
pub enum WatcherCommand {
    List { name: String },
    Get { name: String, watcher_id: String },
    Create {
        name: String,
        #[command(flatten)]
        spec: WatcherCreateArgs,
    },
    Delete { name: String, watcher_id: String },
}

#[derive(Args)]
pub struct WatcherCreateArgs {
    pub id: String,
    #[arg(value_enum)]
    pub kind: WatcherKindArg,
    #[arg(long, default_value = "60")]
    pub interval_secs: u64,
    #[arg(long, value_enum, value_delimiter = ',')]
    pub conditions: Vec<WatcherConditionArg>,
    #[arg(long)]
    pub path: Option<String>,
    #[arg(long)]
    pub recursive: bool,
    #[arg(long)]
    pub check_hash: bool,
    #[arg(long)]
    pub pattern: Option<String>,
    #[arg(long)]
    pub process_name: Option<String>,
    #[arg(long)]
    pub pid: Option<u32>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, default_value = "tcp")]
    pub protocol: String,
    #[arg(long)]
    pub service_name: Option<String>,
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum WatcherKindArg {
    File,
    Directory,
    Process,
    Port,
    Service,
    Cpu,
    Memory,
    Disk,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum WatcherConditionArg {
    Created,
    Changed,
    Deleted,
    Above,
    Below,
}

impl From<WatcherConditionArg> for WatcherCondition {
    fn from(value: WatcherConditionArg) -> Self {
        match value {
            WatcherConditionArg::Created => WatcherCondition::Created,
            WatcherConditionArg::Changed => WatcherCondition::Changed,
            WatcherConditionArg::Deleted => WatcherCondition::Deleted,
            WatcherConditionArg::Above => WatcherCondition::Above,
            WatcherConditionArg::Below => WatcherCondition::Below,
        }
    }
}

impl WatcherCreateArgs {
    fn into_spec(self) -> Result<WatcherSpec> {
        let require_path = || self.path.clone().context("--path is required for this watcher type");
        let require_threshold = || self.threshold.context("--threshold is required for this watcher type");

        let watcher_type = match self.kind {
            WatcherKindArg::File => WatcherType::File {
                path: require_path()?,
                recursive: self.recursive,
                check_hash: self.check_hash,
                pattern: self.pattern,
            },
            WatcherKindArg::Directory => WatcherType::Directory {
                path: require_path()?,
                recursive: self.recursive,
                check_hash: self.check_hash,
                pattern: self.pattern,
            },
            WatcherKindArg::Process => WatcherType::Process {
                process_name: self.process_name,
                pid: self.pid,
            },
            WatcherKindArg::Port => WatcherType::Port {
                port: self.port.context("--port is required for a port watcher")?,
                protocol: self.protocol,
            },
            WatcherKindArg::Service => WatcherType::Service {
                service_name: self
                    .service_name
                    .context("--service-name is required for a service watcher")?,
            },
            WatcherKindArg::Cpu => WatcherType::Cpu {
                threshold: require_threshold()?,
            },
            WatcherKindArg::Memory => WatcherType::Memory {
                threshold: require_threshold()?,
            },
            WatcherKindArg::Disk => WatcherType::Disk {
                path: require_path()?,
                threshold: require_threshold()?,
            },
        };

        let spec = WatcherSpec {
            id: WatcherId::new(self.id),
            watcher_type,
            interval: Duration::from_secs(self.interval_secs),
            conditions: self.conditions.into_iter().map(Into::into).collect(),
        };
        spec.validate().context("invalid watcher configuration")?;
        Ok(spec)
    }
}

pub async fn run(args: AgentArgs, master: &str, local: bool, output: OutputFormat) -> Result<()> {
    match args.command {
        AgentCommand::Start {
            name,
            bind_address,
            report_address,
            daemon,
        } => start(&name, master, &bind_address, report_address.as_deref(), daemon).await,
        AgentCommand::Stop { name } => stop(&name, master).await,
        AgentCommand::List => list(master, output).await,
        AgentCommand::Get { name } => get(&name, master, output).await,
        AgentCommand::Exec { name, command, user } => exec(&name, master, local, command, user).await,
        AgentCommand::Modules => modules(),
        AgentCommand::Metrics(cmd) => metrics(cmd, master, local).await,
        AgentCommand::Update {
            name,
            version,
            force,
            skip_restart,
        } => update(&name, master, local, &version, force, skip_restart).await,
        AgentCommand::Install {
            name,
            bind_address,
            report_address,
        } => install(&name, master, &bind_address, report_address.as_deref()).await,
        AgentCommand::Delete { name } => delete(&name, master).await,
        AgentCommand::Shell { name } => shell(&name, master, local).await,
        AgentCommand::Watcher(cmd) => watcher(cmd, master, local).await,
    }
}

async fn start(
    name: &str,
    master: &str,
    bind_address: &str,
    report_address: Option<&str>,
    daemon: bool,
) -> Result<()> {
    if daemon {
        let child = daemon_process::spawn_fleetd(name, master, bind_address)
            .with_context(|| format!("failed to spawn fleetd for agent '{name}'"))?;
        println!("started agent '{name}' (pid {})", child.id());
        return Ok(());
    }

    let mut cmd = std::process::Command::new(fleetd_path());
    cmd.env("FLEETD_NAME", name)
        .env("FLEETD_MASTER_ADDRESS", master)
        .env("FLEETD_LISTEN_ADDRESS", bind_address);
    if let Some(report_address) = report_address {
        cmd.env("FLEETD_REPORT_ADDRESS", report_address);
    }
    let status = cmd
        .status()
        .with_context(|| format!("failed to run fleetd for agent '{name}'"))?;
    if !status.success() {
        bail!(ExitError::new(status.code().unwrap_or(1), "fleetd exited with an error"));
    }
    Ok(())
}

fn fleetd_path() -> std::path::PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("fleetd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    std::path::PathBuf::from("fleetd")
}

async fn stop(name: &str, master: &str) -> Result<()> {
    let client = RegistryClient::new(master.to_string());
    let (success, message) = client
        .stop_agent(name)
        .await
        .with_context(|| format!("could not reach master at '{master}'"))?;
    if !success {
        bail!(ExitError::new(1, message));
    }
    println!("{}", message);
    Ok(())
}

async fn list(master: &str, output: OutputFormat) -> Result<()> {
    let client = RegistryClient::new(master.to_string());
    let agents = client
        .list_agents()
        .await
        .with_context(|| format!("could not reach master at '{master}'"))?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&agents)?),
        OutputFormat::Text => {
            let mut table = Table::new(vec![
                Column::left("NAME"),
                Column::left("ADDRESS"),
                Column::status("STATUS"),
                Column::left("VERSION"),
                Column::muted("LAST HEARTBEAT"),
            ]);
            for agent in &agents {
                table.row(vec![
                    agent.name.clone(),
                    agent.address.clone(),
                    agent.status.to_string(),
                    agent.version.clone(),
                    format_time_ago(agent.last_heartbeat * 1000),
                ]);
            }
            if agents.is_empty() {
                println!("no agents registered");
            } else {
                table.render(&mut std::io::stdout());
            }
        }
    }
    Ok(())
}

async fn get(name: &str, master: &str, output: OutputFormat) -> Result<()> {
    let client = RegistryClient::new(master.to_string());
    let (success, info, message) = client
        .get_agent_info(name)
        .await
        .with_context(|| format!("could not reach master at '{master}'"))?;
    if !success {
        bail!(ExitError::new(1, message));
    }
    let Some(info) = info else {
        bail!(ExitError::new(1, format!("agent '{name}' not found")));
    };
    print_agent_info(&info, output)
}

fn print_agent_info(info: &AgentInfo, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        OutputFormat::Text => {
            println!("{}: {}", color::header("name"), info.name);
            println!("{}: {}", color::header("address"), info.address);
            println!("{}: {}", color::header("status"), color::status(&info.status.to_string()));
            println!("{}: {}", color::header("version"), info.version);
            println!(
                "{}: {}",
                color::header("last heartbeat"),
                format_time_ago(info.last_heartbeat * 1000)
            );
            if !info.system_info_json.is_empty() {
                println!("{}:", color::header("system info"));
                println!("{}", info.system_info_json);
            }
        }
    }
    Ok(())
}

async fn exec(name: &str, master: &str, local: bool, command: String, user: Option<String>) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let mut exit_code = 0;
    let mut failed = false;
    client
        .run_command(command, user, |frame| {
            if !frame.stdout_chunk.is_empty() {
                print!("{}", frame.stdout_chunk);
            }
            if !frame.stderr_chunk.is_empty() {
                eprint!("{}", frame.stderr_chunk);
            }
            if let Some(error) = &frame.error {
                eprintln!("error: {error}");
                failed = true;
            }
            if frame.finished {
                exit_code = frame.exit_code.unwrap_or(1);
            }
        })
        .await
        .with_context(|| format!("exec against '{name}' failed"))?;
    let _ = std::io::stdout().flush();
    if failed || exit_code != 0 {
        bail!(ExitError::new(exit_code.max(1), "command failed"));
    }
    Ok(())
}

fn modules() -> Result<()> {
    println!("Lua globals available to task scripts on this agent:");
    println!("  user      - the requesting user, when the task was submitted with one");
    println!("  watchers  - a table the script appends watcher specs to for registration");
    println!();
    println!("Standard Lua 5.4 libraries (base, string, table, math, os, io) are loaded");
    println!("unrestricted; there is no fleet-specific module registry beyond the above.");
    Ok(())
}

async fn metrics(cmd: MetricsCommand, master: &str, local: bool) -> Result<()> {
    match cmd {
        MetricsCommand::Prom { name } => metrics_prom(&name, master, local).await,
        MetricsCommand::Dashboard { name, interval } => metrics_dashboard(&name, master, local, interval).await,
    }
}

async fn metrics_prom(name: &str, master: &str, local: bool) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::GetDetailedMetrics)
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::DetailedMetrics(metrics) = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    let r = &metrics.resource;
    print!(
        concat!(
            "# HELP fleet_agent_cpu_percent Current CPU utilization percentage.\n",
            "# TYPE fleet_agent_cpu_percent gauge\n",
            "fleet_agent_cpu_percent{{agent=\"{name}\"}} {cpu}\n",
            "# HELP fleet_agent_memory_used_bytes Memory in use, in bytes.\n",
            "# TYPE fleet_agent_memory_used_bytes gauge\n",
            "fleet_agent_memory_used_bytes{{agent=\"{name}\"}} {mem_used}\n",
            "# HELP fleet_agent_memory_total_bytes Total addressable memory, in bytes.\n",
            "# TYPE fleet_agent_memory_total_bytes gauge\n",
            "fleet_agent_memory_total_bytes{{agent=\"{name}\"}} {mem_total}\n",
            "# HELP fleet_agent_disk_used_bytes Disk space in use across all partitions, in bytes.\n",
            "# TYPE fleet_agent_disk_used_bytes gauge\n",
            "fleet_agent_disk_used_bytes{{agent=\"{name}\"}} {disk_used}\n",
            "# HELP fleet_agent_disk_total_bytes Total disk space across all partitions, in bytes.\n",
            "# TYPE fleet_agent_disk_total_bytes gauge\n",
            "fleet_agent_disk_total_bytes{{agent=\"{name}\"}} {disk_total}\n",
            "# HELP fleet_agent_network_bytes_sent_total Cumulative bytes sent on all interfaces.\n",
            "# TYPE fleet_agent_network_bytes_sent_total counter\n",
            "fleet_agent_network_bytes_sent_total{{agent=\"{name}\"}} {net_sent}\n",
            "# HELP fleet_agent_network_bytes_recv_total Cumulative bytes received on all interfaces.\n",
            "# TYPE fleet_agent_network_bytes_recv_total counter\n",
            "fleet_agent_network_bytes_recv_total{{agent=\"{name}\"}} {net_recv}\n",
            "# HELP fleet_agent_uptime_seconds Seconds since the agent process started.\n",
            "# TYPE fleet_agent_uptime_seconds counter\n",
            "fleet_agent_uptime_seconds{{agent=\"{name}\"}} {uptime}\n",
        ),
        name = name,
        cpu = r.cpu_percent,
        mem_used = r.memory.used,
        mem_total = r.memory.total,
        disk_used = metrics.disk_used_bytes,
        disk_total = metrics.disk_total_bytes,
        net_sent = metrics.network_bytes_sent,
        net_recv = metrics.network_bytes_recv,
        uptime = r.uptime_seconds,
    );
    Ok(())
}

async fn metrics_dashboard(name: &str, master: &str, local: bool, interval: u64) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let mut poller = Poller::new(Duration::from_secs(interval), None);

    loop {
        let response = client
            .call(AgentRequest::GetResourceUsage)
            .await
            .with_context(|| format!("could not reach agent '{name}'"))?;
        let fleet_core::wire::agent::AgentResponse::ResourceUsage(usage) = response else {
            bail!(ExitError::new(1, "unexpected response from agent"));
        };
        print!("\x1b[2J\x1b[H");
        println!("{} — {}", color::header("fleet agent"), name);
        println!(
            "cpu: {:>5.1}%   mem: {:>5.1}%   load: {:.2} {:.2} {:.2}",
            usage.cpu_percent,
            if usage.memory.total == 0 {
                0.0
            } else {
                usage.memory.used as f64 / usage.memory.total as f64 * 100.0
            },
            usage.load_average[0],
            usage.load_average[1],
            usage.load_average[2],
        );
        let _ = std::io::stdout().flush();

        match poller.tick().await {
            Tick::Ready => continue,
            Tick::Timeout | Tick::Interrupted => return Ok(()),
        }
    }
}

async fn update(
    name: &str,
    master: &str,
    local: bool,
    version: &str,
    force: bool,
    skip_restart: bool,
) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::UpdateAgent {
            target_version: version.to_string(),
            force,
            skip_restart,
        })
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::UpdateAgent(result) = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    if !result.success {
        bail!(ExitError::new(1, result.message));
    }
    println!("{} ({} -> {})", result.message, result.old_version, result.new_version);
    Ok(())
}

async fn install(name: &str, master: &str, bind_address: &str, report_address: Option<&str>) -> Result<()> {
    let child = daemon_process::spawn_fleetd(name, master, bind_address)
        .with_context(|| format!("failed to spawn fleetd for agent '{name}'"))?;
    println!("installed agent '{name}' (pid {})", child.id());

    let _ = report_address;
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let (true, Some(info), _) = RegistryClient::new(master.to_string())
            .get_agent_info(name)
            .await
            .unwrap_or((false, None, String::new()))
        {
            let cache_path = AgentCache::default_path();
            let mut cache = AgentCache::load(&cache_path)?;
            let _ = cache.put(name, &info.address);
            break;
        }
        if std::time::Instant::now() >= deadline {
            eprintln!("warning: agent did not register with the master within 10s");
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

async fn delete(name: &str, master: &str) -> Result<()> {
    let client = RegistryClient::new(master.to_string());
    let _ = client.stop_agent(name).await;
    let _ = client.unregister_agent(name).await;

    if let Some(pid) = daemon_process::read_agent_pid(name) {
        daemon_process::terminate(pid);
        daemon_process::wait_for_exit(name, Duration::from_secs(5)).await;
    }

    let cache_path = AgentCache::default_path();
    let mut cache = AgentCache::load(&cache_path)?;
    let _ = cache.remove(name);

    println!("deleted agent '{name}'");
    Ok(())
}

/// Restores the local terminal to cooked mode on drop, so a panic or
/// early return out of the shell loop still leaves the caller's
/// terminal usable — never a bare `enable`/`disable` pair that a panic
/// could skip the second half of.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        crossterm::terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

async fn shell(name: &str, master: &str, local: bool) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let stream = client
        .open_shell(cols, rows)
        .await
        .with_context(|| format!("could not open a shell on '{name}'"))?;

    let guard = RawModeGuard::enable()?;
    let result = run_shell_loop(stream).await;
    drop(guard);
    result
}

async fn run_shell_loop(stream: tokio::net::TcpStream) -> Result<()> {
    use fleet_core::wire::agent::{ShellInput, ShellOutput};
    use fleet_core::wire::{self};

    let (mut reader, mut writer) = stream.into_split();
    let (input_tx, mut input_rx) = tokio::sync::mpsc::channel::<ShellInput>(64);

    let input_task = tokio::task::spawn_blocking(move || {
        use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
        loop {
            match event::read() {
                Ok(Event::Key(KeyEvent { code, modifiers, .. })) => {
                    let bytes = match (code, modifiers) {
                        // Ctrl+<letter> forwards the corresponding control byte
                        // (Ctrl+C -> 0x03, Ctrl+D -> 0x04, ...) verbatim, same as
                        // a local terminal in raw mode would.
                        (KeyCode::Char(c), m) if m.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() => {
                            vec![(c.to_ascii_lowercase() as u8) - b'a' + 1]
                        }
                        (KeyCode::Char(c), _) => c.to_string().into_bytes(),
                        (KeyCode::Enter, _) => vec![b'\r'],
                        (KeyCode::Backspace, _) => vec![0x7f],
                        (KeyCode::Tab, _) => vec![b'\t'],
                        (KeyCode::Esc, _) => vec![0x1b],
                        _ => continue,
                    };
                    if input_tx.blocking_send(ShellInput::Data { bytes }).is_err() {
                        break;
                    }
                }
                Ok(Event::Resize(cols, rows)) => {
                    if input_tx.blocking_send(ShellInput::Resize { rows, cols }).is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    });

    let pump_in = async {
        while let Some(input) = input_rx.recv().await {
            if wire::write_message(&mut writer, &input).await.is_err() {
                break;
            }
        }
    };

    let pump_out = async {
        loop {
            let frame: Result<fleet_core::wire::agent::AgentResponse, _> = wire::read_message(&mut reader).await;
            match frame {
                Ok(fleet_core::wire::agent::AgentResponse::ShellFrame(ShellOutput::Data { bytes })) => {
                    let mut stdout = tokio::io::stdout();
                    let _ = stdout.write_all(&bytes).await;
                    let _ = stdout.flush().await;
                }
                Ok(fleet_core::wire::agent::AgentResponse::ShellFrame(ShellOutput::Completed { .. }))
                | Ok(fleet_core::wire::agent::AgentResponse::ShellFrame(ShellOutput::Error { .. }))
                | Err(_) => break,
                _ => continue,
            }
        }
    };

    tokio::select! {
        _ = pump_in => {}
        _ = pump_out => {}
    }
    input_task.abort();
    let _ = reader.read_u8().await;
    Ok(())
}

async fn watcher(cmd: WatcherCommand, master: &str, local: bool) -> Result<()> {
    match cmd {
        WatcherCommand::List { name } => watcher_list(&name, master, local).await,
        WatcherCommand::Get { name, watcher_id } => watcher_get(&name, master, local, &watcher_id).await,
        WatcherCommand::Create { name, spec } => watcher_create(&name, master, local, spec).await,
        WatcherCommand::Delete { name, watcher_id } => watcher_delete(&name, master, local, &watcher_id).await,
    }
}

async fn watcher_list(name: &str, master: &str, local: bool) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::ListWatchers)
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::ListWatchers(result) = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    if result.watchers.is_empty() {
        println!("no watchers registered");
    } else {
        println!("{}", serde_json::to_string_pretty(&result.watchers)?);
    }
    Ok(())
}

async fn watcher_get(name: &str, master: &str, local: bool, watcher_id: &str) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::ListWatchers)
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::ListWatchers(result) = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    let found = result
        .watchers
        .into_iter()
        .find(|w| w.get("id").and_then(|v| v.as_str()) == Some(watcher_id));
    match found {
        Some(w) => {
            println!("{}", serde_json::to_string_pretty(&w)?);
            Ok(())
        }
        None => bail!(ExitError::new(1, format!("no such watcher '{watcher_id}'"))),
    }
}

async fn watcher_create(name: &str, master: &str, local: bool, args: WatcherCreateArgs) -> Result<()> {
    let spec = args.into_spec()?;
    let config = serde_json::to_value(&spec)?;
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::RegisterWatcher { config })
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::RegisterWatcher(result) = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    if !result.success {
        bail!(ExitError::new(1, result.message));
    }
    println!("{}", result.message);
    Ok(())
}

async fn watcher_delete(name: &str, master: &str, local: bool, watcher_id: &str) -> Result<()> {
    let address = resolve_agent_address(name, master, local).await?;
    let client = AgentClient::new(address);
    let response = client
        .call(AgentRequest::RemoveWatcher {
            watcher_id: watcher_id.to_string(),
        })
        .await
        .with_context(|| format!("could not reach agent '{name}'"))?;
    let fleet_core::wire::agent::AgentResponse::RemoveWatcher { success, message } = response else {
        bail!(ExitError::new(1, "unexpected response from agent"));
    };
    if !success {
        bail!(ExitError::new(1, message));
    }
    println!("{message}");
    Ok(())
}
