mod driver;
mod server;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ouro_core::time::now_unix_millis;
use ouro_core::{
    FusionService, GovernorSignal, ModeGovernor, SectorState, advise, assess_threat, bio,
    default_stations, nearest, occupancy,
};
use ouro_link::{GeoLocator, LinkConfig, SnapshotClient, WeatherClient};
use rmcp::{ServiceExt, transport::stdio};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::driver::{Driver, SharedFusion};

#[derive(Parser)]
#[command(
    name = "ouro",
    about = "Ouroboros telemetry fusion: CLI and MCP server",
    allow_negative_numbers = true
)]
struct Cli {
    /// Config file (default: $OURO_CONFIG or <data dir>/ouroboros.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport, with live intake
    Serve,

    /// Fetch once from the configured feeds and print the read model
    Snapshot {
        /// Skip the weather scan
        #[arg(long)]
        skip_weather: bool,
    },

    /// Parse a biometric advisory (JSON or prose) into metrics
    Bio {
        /// File holding the advisory; reads --text when absent
        file: Option<PathBuf>,

        /// Advisory text given inline
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Print metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show sector occupancy for a backlog count
    Sectors {
        backlog: u64,

        #[arg(long, default_value_t = ouro_core::constants::SECTOR_CAPACITY)]
        capacity: u64,

        #[arg(long, default_value_t = ouro_core::constants::TOTAL_SECTORS)]
        sectors: usize,
    },

    /// Print weather directives for a temperature and condition code
    Advise {
        temperature: f64,
        code: i64,

        /// Use combat wording
        #[arg(long)]
        combat: bool,
    },

    /// Resolve the nearest weather station
    Nearest { lat: f64, lon: f64 },

    /// Fold governor signals in order and print the resulting mode
    Governor {
        /// Signals: a color, a code, or a JSON payload such as '{"code":4}'
        #[arg(required = true)]
        signals: Vec<String>,

        /// Also assess the threat counter for this backlog
        #[arg(long)]
        backlog: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<LinkConfig> {
    LinkConfig::load(cli.config.as_deref()).context("failed to load config")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Snapshot { skip_weather } => cmd_snapshot(&cli, *skip_weather).await,
        Commands::Bio { file, text, json } => cmd_bio(file.as_deref(), text.as_deref(), *json),
        Commands::Sectors {
            backlog,
            capacity,
            sectors,
        } => cmd_sectors(*backlog, *capacity, *sectors),
        Commands::Advise {
            temperature,
            code,
            combat,
        } => cmd_advise(*temperature, *code, *combat),
        Commands::Nearest { lat, lon } => cmd_nearest(*lat, *lon),
        Commands::Governor { signals, backlog } => cmd_governor(signals, *backlog),
    }
}

// ---------------------------------------------------------------------------
// Advisory pidfile for observability
// ---------------------------------------------------------------------------

fn pidfile_path() -> PathBuf {
    ouro_link::data_dir().join("ouro-serve.pid")
}

/// Check for an existing pidfile and log accordingly, then write our own.
fn acquire_pidfile() -> Option<PathBuf> {
    let path = pidfile_path();
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another ouro serve (PID {pid}) is running");
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

fn release_pidfile(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let state: SharedFusion = Arc::new(Mutex::new(FusionService::new(config.grid())));
    let rescan = Arc::new(Notify::new());

    let driver = Driver::new(
        state.clone(),
        config,
        rescan.clone(),
        CancellationToken::new(),
    );
    driver.start().context("failed to start intake")?;
    let pidfile = acquire_pidfile();
    tracing::info!("starting MCP server");

    let server = server::OuroServer::new(state, rescan);
    let outcome = match server.serve(stdio()).await {
        Ok(service) => {
            tokio::select! {
                res = service.waiting() => res.map(|_| false).context("MCP server failed"),
                _ = shutdown_signal() => Ok(true),
            }
        }
        Err(e) => {
            tracing::info!("MCP session closed before initialization: {e}");
            Ok(false)
        }
    };

    driver.shutdown().await;
    if let Some(path) = pidfile {
        release_pidfile(&path);
    }

    if matches!(outcome, Ok(true)) {
        // The stdin reader thread would hold up runtime teardown.
        std::process::exit(0);
    }
    outcome.map(|_| ())
}

async fn cmd_snapshot(cli: &Cli, skip_weather: bool) -> Result<()> {
    let config = load_config(cli)?;
    let state: SharedFusion = Arc::new(Mutex::new(FusionService::new(config.grid())));
    let timeout = Duration::from_secs(config.request_timeout_secs);

    if let Some(url) = &config.snapshot_url {
        let client = SnapshotClient::new(url, timeout).context("failed to build snapshot client")?;
        driver::bulk_load(&state, &client).await;
    }

    if !skip_weather {
        let weather =
            WeatherClient::new(&config.weather_url, timeout).context("failed to build weather client")?;
        let geo = GeoLocator::new(
            config.position,
            config.position_url.clone(),
            Duration::from_millis(config.geoposition_timeout_ms),
        )
        .context("failed to build position client")?;
        driver::scan_weather(&state, &weather, &geo).await;
    }

    let model = state.lock().await.snapshot_at(now_unix_millis());
    println!(
        "{}",
        serde_json::to_string_pretty(&model).context("failed to serialize read model")?
    );
    Ok(())
}

fn cmd_bio(file: Option<&Path>, text: Option<&str>, json: bool) -> Result<()> {
    let content = match (file, text) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(text)) => text.to_string(),
        (None, None) => anyhow::bail!("give a file or --text"),
    };

    let raw = serde_json::from_str::<serde_json::Value>(&content)
        .unwrap_or(serde_json::Value::String(content));
    let metrics = bio::parse(bio::advisory_payload(&raw));

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?
        );
    } else {
        for m in &metrics {
            let category = serde_json::to_value(m.category)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            println!("{:<10} {:<10} {}", m.label, category, m.value);
        }
    }
    Ok(())
}

fn cmd_sectors(backlog: u64, capacity: u64, sectors: usize) -> Result<()> {
    let occ = occupancy(backlog, capacity, sectors);
    println!("occupied:   {}/{}", occ.occupied_count, occ.total_sectors);
    match occ.active_sector() {
        Some(active) => println!(
            "active:     {} ({} of {} items, fill {:.1}%)",
            active, occ.items_in_active_sector, occ.sector_capacity, occ.active_sector_fill_percent
        ),
        None => println!("active:     none"),
    }

    let cells: String = occ
        .sectors()
        .iter()
        .map(|s| match s {
            SectorState::ClearedBehind => '#',
            SectorState::Active => '>',
            SectorState::Untouched => '.',
        })
        .collect();
    let columns = ouro_core::constants::GRID_COLS;
    for row in cells.as_bytes().chunks(columns) {
        println!("{}", String::from_utf8_lossy(row));
    }
    Ok(())
}

fn cmd_advise(temperature: f64, code: i64, combat: bool) -> Result<()> {
    for tip in advise(temperature, code, combat) {
        println!("{tip}");
    }
    Ok(())
}

fn cmd_nearest(lat: f64, lon: f64) -> Result<()> {
    println!("{}", nearest(lat, lon, &default_stations()));
    Ok(())
}

fn cmd_governor(signals: &[String], backlog: Option<u64>) -> Result<()> {
    let mut governor = ModeGovernor::new();
    for raw in signals {
        let value = serde_json::from_str::<serde_json::Value>(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
        let signal = GovernorSignal::from_value(&value);
        let mode = governor.fold(&signal);
        println!("{raw} -> {mode}");
    }
    println!("mode:       {}", governor.mode());

    if let Some(backlog) = backlog {
        let threat = assess_threat(Some(backlog));
        let status = serde_json::to_value(threat.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("threat:     {}/{} {}", threat.count, threat.max, status);
    }
    Ok(())
}
