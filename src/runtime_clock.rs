use crate::dashboard::Dashboard;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::interval;

const TICK: Duration = Duration::from_millis(1000);

/// `minutes:seconds` with zero-padded seconds; minutes are not capped.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{}:{:02}", minutes, seconds)
}

/// Refreshes the runtime readout once a second and prints the status line.
pub async fn run(
    started: Instant,
    dashboard: Arc<Mutex<Dashboard>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(TICK);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = {
                    let mut board = dashboard.lock().await;
                    board.runtime = format!("Monitoring for: {}", format_elapsed(started.elapsed()));
                    board.to_string()
                };
                println!("{}", line);
            }
            _ = shutdown.changed() => {
                info!("Runtime clock stopped after {}", format_elapsed(started.elapsed()));
                break;
            }
        }
    }
}
