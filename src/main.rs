mod audio_monitor;
mod commands;
mod config;
mod dashboard;
mod error;
mod export;
mod motion_monitor;
mod runtime_clock;
mod signal;
mod store;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};

use crate::audio_monitor::AudioMonitor;
use crate::config::{Command, Config};
use crate::dashboard::Dashboard;
use crate::motion_monitor::MotionMonitor;
use crate::store::{EventLog, FileStore, KeyValueStore, MemoryStore};
use crate::types::LogFilter;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialise logger")?;

    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;

    match cli.command {
        Command::Monitor { .. } => monitor(config).await,
        Command::Export { filter } => export_log(&config, filter),
        Command::List { filter } => list_log(&config, filter),
    }
}

fn open_log(config: &Config) -> Result<EventLog> {
    let store: Box<dyn KeyValueStore> = if config.ephemeral {
        info!("Ephemeral session, log will not be persisted");
        Box::new(MemoryStore::default())
    } else {
        let store = FileStore::open(&config.storage_dir)
            .with_context(|| format!("Failed to open log storage: {:?}", config.storage_dir))?;
        Box::new(store)
    };

    let mut log = EventLog::new(store);
    let restored = log.restore();
    info!("Restored {} log entries", restored);
    Ok(log)
}

async fn monitor(config: Config) -> Result<()> {
    info!("Starting sitescope monitor");
    let started = Instant::now();

    let log = Arc::new(Mutex::new(open_log(&config)?));
    let dashboard = Arc::new(Mutex::new(Dashboard::default()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn noise monitoring task
    let audio_handle = {
        let monitor = AudioMonitor::new(Arc::clone(&log), Arc::clone(&dashboard));
        tokio::spawn(audio_monitor::run(config.clone(), monitor, shutdown_rx.clone()))
    };

    // Spawn vibration monitoring task
    let motion_handle = {
        let monitor = MotionMonitor::new(Arc::clone(&log), Arc::clone(&dashboard));
        tokio::spawn(motion_monitor::run(config.clone(), monitor, shutdown_rx.clone()))
    };

    let clock_handle = tokio::spawn(runtime_clock::run(
        started,
        Arc::clone(&dashboard),
        shutdown_rx.clone(),
    ));

    let control_handle = if config.uses_stdin() {
        warn!("Stdin carries sensor data, control commands are disabled");
        None
    } else {
        info!("Control commands: filter <all|noise|vibration>, export, list, quit");
        Some(tokio::spawn(commands::run(
            config.clone(),
            Arc::clone(&log),
            shutdown_tx.clone(),
            shutdown_rx.clone(),
        )))
    };

    info!("All tasks started successfully");

    let mut shutdown = shutdown_rx.clone();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for interrupt: {}", e);
            }
            info!("Interrupt received");
        }
        _ = shutdown.changed() => {}
    }

    shutdown_tx.send_replace(true);

    for (name, handle) in [
        ("noise monitor", audio_handle),
        ("vibration monitor", motion_handle),
        ("runtime clock", clock_handle),
    ] {
        if let Err(e) = handle.await {
            error!("{} task failed: {}", name, e);
        }
    }
    if let Some(handle) = control_handle {
        if let Err(e) = handle.await {
            error!("control task failed: {}", e);
        }
    }

    let entries = log.lock().await.len();
    info!("Monitoring stopped, {} entries in log", entries);
    Ok(())
}

fn export_log(config: &Config, filter: LogFilter) -> Result<()> {
    let mut log = open_log(config)?;
    log.apply_filter(filter);

    let path = export::export_visible(&log, &config.export_dir)?;
    println!("Saved {}", path.display());
    Ok(())
}

fn list_log(config: &Config, filter: LogFilter) -> Result<()> {
    let mut log = open_log(config)?;
    log.apply_filter(filter);

    for entry in log.list_visible() {
        println!("{}", entry);
    }
    Ok(())
}
