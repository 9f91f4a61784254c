use crate::config::Config;
use crate::error::MonitorError;
use crate::export;
use crate::store::EventLog;
use crate::types::LogFilter;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// Commands accepted on stdin while monitoring.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Filter(LogFilter),
    Export,
    List,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<ControlCommand>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let cmd = match command.to_lowercase().as_str() {
        "filter" => {
            let value = words.next().context("Missing filter value")?;
            let filter = value.parse::<LogFilter>().map_err(anyhow::Error::msg)?;
            ControlCommand::Filter(filter)
        }
        "export" => ControlCommand::Export,
        "list" => ControlCommand::List,
        "quit" | "exit" => ControlCommand::Quit,
        other => anyhow::bail!("Unknown command: {}", other),
    };

    Ok(Some(cmd))
}

pub async fn execute_command(
    cmd: ControlCommand,
    config: &Config,
    log: &Arc<Mutex<EventLog>>,
    shutdown: &watch::Sender<bool>,
) -> Result<()> {
    info!("Executing command: {:?}", cmd);

    match cmd {
        ControlCommand::Filter(filter) => {
            let mut log = log.lock().await;
            log.apply_filter(filter);
            info!(
                "Log filter set to: {} ({} of {} entries visible)",
                filter,
                log.list_visible().len(),
                log.len()
            );
        }

        ControlCommand::Export => {
            let log = log.lock().await;
            match export::export_visible(&log, &config.export_dir) {
                Ok(path) => println!("Saved {}", path.display()),
                Err(MonitorError::NothingToExport) => {
                    warn!("Export requested with no visible entries");
                    println!("{}", MonitorError::NothingToExport);
                }
                Err(e) => return Err(e).context("Failed to export log"),
            }
        }

        ControlCommand::List => {
            let log = log.lock().await;
            for entry in log.list_visible() {
                println!("{}", entry);
            }
        }

        ControlCommand::Quit => {
            info!("Quit requested");
            shutdown.send_replace(true);
        }
    }

    Ok(())
}

/// Reads control commands from stdin until EOF or shutdown.
///
/// Stdin is read on a plain thread: a pending read cannot be cancelled and
/// must not hold up runtime shutdown.
pub async fn run(
    config: Config,
    log: Arc<Mutex<EventLog>>,
    shutdown_tx: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (line_tx, mut lines) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read control input: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    let result = match parse_command(&line) {
                        Ok(Some(cmd)) => execute_command(cmd, &config, &log, &shutdown_tx).await,
                        Ok(None) => Ok(()),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        error!("{:#}", e);
                    }
                }
                None => {
                    info!("Control input closed");
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}
