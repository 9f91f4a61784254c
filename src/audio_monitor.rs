//! Audio channel: capture stream -> analyser window -> per-frame loudness.

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::MonitorError;
use crate::signal;
use crate::store::EventLog;
use crate::types::{Category, LogEntry};
use log::{error, info, trace};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Readings strictly above this are logged.
pub const NOISE_THRESHOLD_DB: i32 = 85;

const READ_CHUNK: usize = 4096;

type AudioInput = Box<dyn AsyncRead + Send + Unpin>;

/// Rolling window over the most recent `fft_size` samples.
///
/// Starts out as silence (all samples at the 128 zero line).
pub struct Analyser {
    window: VecDeque<u8>,
    fft_size: usize,
}

impl Analyser {
    pub fn new(fft_size: usize) -> Self {
        Self {
            window: std::iter::repeat(128u8).take(fft_size).collect(),
            fft_size,
        }
    }

    pub fn feed(&mut self, samples: &[u8]) {
        // only the tail can survive
        let start = samples.len().saturating_sub(self.fft_size);
        self.window.extend(&samples[start..]);
        while self.window.len() > self.fft_size {
            self.window.pop_front();
        }
    }

    /// Copies the current window into `out`, replacing its contents.
    pub fn snapshot(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(self.window.iter().copied());
    }
}

/// Opens the configured capture stream; `-` selects stdin.
pub async fn open_input(device: Option<&str>) -> Result<AudioInput, MonitorError> {
    match device {
        None => Err(MonitorError::MicUnavailable(
            "no audio device configured".to_string(),
        )),
        Some("-") => Ok(Box::new(tokio::io::stdin())),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| MonitorError::MicUnavailable(format!("{}: {}", path, e)))?;
            Ok(Box::new(file))
        }
    }
}

/// Per-frame reaction to a waveform snapshot.
#[derive(Clone)]
pub struct AudioMonitor {
    log: Arc<Mutex<EventLog>>,
    dashboard: Arc<Mutex<Dashboard>>,
}

impl AudioMonitor {
    pub fn new(log: Arc<Mutex<EventLog>>, dashboard: Arc<Mutex<Dashboard>>) -> Self {
        Self { log, dashboard }
    }

    /// Converts one snapshot; silent windows are skipped entirely.
    pub async fn on_frame(&self, samples: &[u8]) -> Option<i32> {
        let db = signal::decibels(samples)?;
        self.report(db).await;
        Some(db)
    }

    /// Shows a finite reading and logs it when above the threshold.
    ///
    /// Returns whether an entry was appended.
    pub async fn report(&self, db: i32) -> bool {
        trace!("Noise reading: {} dB", db);
        self.dashboard.lock().await.noise = format!("{} dB", db);

        if db <= NOISE_THRESHOLD_DB {
            return false;
        }

        let message = format!("⚠️ High noise: {} dB", db);
        info!("{}", message);
        self.log
            .lock()
            .await
            .append(LogEntry::now(Category::Noise, message));
        true
    }
}

pub async fn run(config: Config, monitor: AudioMonitor, mut shutdown: watch::Receiver<bool>) {
    let input = match open_input(config.audio_device.as_deref()).await {
        Ok(input) => input,
        Err(e) => {
            error!("Microphone error: {}", e);
            monitor.dashboard.lock().await.noise = "Mic access denied".to_string();
            return;
        }
    };

    info!(
        "Noise monitoring started: fft_size={}, {} frames/s",
        config.fft_size, config.frame_rate_hz
    );

    let analyser = Arc::new(Mutex::new(Analyser::new(config.fft_size)));
    let reader = tokio::spawn(read_samples(input, Arc::clone(&analyser)));

    let frame = Duration::from_secs_f64(1.0 / f64::from(config.frame_rate_hz));
    let mut ticker = interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut samples = Vec::with_capacity(config.fft_size);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                analyser.lock().await.snapshot(&mut samples);
                monitor.on_frame(&samples).await;
            }
            _ = shutdown.changed() => {
                info!("Noise monitoring stopped");
                break;
            }
        }
    }

    reader.abort();
}

async fn read_samples(mut input: AudioInput, analyser: Arc<Mutex<Analyser>>) {
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match input.read(&mut buf).await {
            Ok(0) => {
                info!("Audio stream ended, holding last window");
                break;
            }
            Ok(n) => analyser.lock().await.feed(&buf[..n]),
            Err(e) => {
                error!("Audio stream read failed: {}", e);
                break;
            }
        }
    }
}
