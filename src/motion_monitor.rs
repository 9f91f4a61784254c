//! Motion channel: capability probe, optional permission gate, then one
//! handler invocation per reading with debounced logging.

use crate::config::Config;
use crate::dashboard::{Dashboard, WAITING};
use crate::error::MonitorError;
use crate::signal::{format_magnitude, Magnitude};
use crate::store::EventLog;
use crate::types::{Acceleration, Category, LogEntry};
use log::{error, info, trace, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{watch, Mutex};
use tokio_serial::SerialPortBuilderExt;

/// Magnitudes strictly above this (m/s², after rounding) are logged.
pub const VIBRATION_THRESHOLD: f64 = 15.0;

/// Minimum spacing between two logged vibration events.
pub const DEBOUNCE: Duration = Duration::from_millis(3000);

type MotionInput = Box<dyn AsyncRead + Send + Unpin>;

/// How motion readings can be obtained, decided once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCapability {
    Unsupported,
    /// A serial accelerometer; opening the port is the permission request.
    RequiresPermission { port: String, baud: u32 },
    /// A readable stream that needs no grant (`-` is stdin).
    Supported { path: String },
}

impl MotionCapability {
    pub fn probe(config: &Config) -> Self {
        if let Some(ref port) = config.motion_port {
            MotionCapability::RequiresPermission {
                port: port.clone(),
                baud: config.motion_baud,
            }
        } else if let Some(ref path) = config.motion_file {
            MotionCapability::Supported { path: path.clone() }
        } else {
            MotionCapability::Unsupported
        }
    }
}

fn request_permission(port: &str, baud: u32) -> Result<MotionInput, MonitorError> {
    match tokio_serial::new(port, baud).open_native_async() {
        Ok(stream) => Ok(Box::new(stream)),
        Err(e) => Err(classify_open_error(port, e)),
    }
}

/// A refused open is a denial; any other open failure is a request error.
fn classify_open_error(port: &str, e: tokio_serial::Error) -> MonitorError {
    match e.kind {
        tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            MonitorError::PermissionDenied(format!("{}: {}", port, e))
        }
        _ => MonitorError::PermissionError(format!("{}: {}", port, e)),
    }
}

/// Vibration readout shown when the channel cannot start.
fn unavailable_status(e: &MonitorError) -> &'static str {
    match e {
        MonitorError::PermissionDenied(_) => "Permission denied",
        MonitorError::PermissionError(_) => "Permission error",
        _ => "Not supported",
    }
}

async fn open_stream(path: &str) -> Result<MotionInput, MonitorError> {
    if path == "-" {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path).await?;
    Ok(Box::new(file))
}

/// Parses one `x,y,z` line (commas or whitespace).
///
/// Blank lines yield `None`. An axis written as empty, `-` or `null` is
/// treated as not reported.
pub fn parse_reading(line: &str) -> Result<Option<Acceleration>, MonitorError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = if line.contains(',') {
        line.split(',').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    };

    if fields.len() != 3 {
        return Err(MonitorError::Sensor(format!(
            "expected 3 axes, got {}: {:?}",
            fields.len(),
            line
        )));
    }

    let axis = |field: &str| -> Result<Option<f64>, MonitorError> {
        match field {
            "" | "-" | "null" => Ok(None),
            value => value
                .parse::<f64>()
                .map(Some)
                .map_err(|e| MonitorError::Sensor(format!("bad axis value {:?}: {}", value, e))),
        }
    };

    Ok(Some(Acceleration {
        x: axis(fields[0])?,
        y: axis(fields[1])?,
        z: axis(fields[2])?,
    }))
}

pub struct MotionMonitor {
    log: Arc<Mutex<EventLog>>,
    dashboard: Arc<Mutex<Dashboard>>,
    last_logged: Option<Instant>,
}

impl MotionMonitor {
    pub fn new(log: Arc<Mutex<EventLog>>, dashboard: Arc<Mutex<Dashboard>>) -> Self {
        Self {
            log,
            dashboard,
            last_logged: None,
        }
    }

    /// Handles one raw line from the sensor stream.
    pub async fn on_line(&mut self, line: &str, now: Instant) {
        match parse_reading(line) {
            Ok(Some(acc)) => {
                self.on_motion(&acc, now).await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("{}", e);
                self.show("Sensor error".to_string()).await;
            }
        }
    }

    /// Validates, displays and possibly logs one reading.
    ///
    /// Returns whether an entry was appended.
    pub async fn on_motion(&mut self, acc: &Acceleration, now: Instant) -> bool {
        let magnitude = match Magnitude::of(acc) {
            Magnitude::Waiting => {
                self.show(WAITING.to_string()).await;
                return false;
            }
            Magnitude::Invalid => {
                self.show("Invalid data".to_string()).await;
                return false;
            }
            Magnitude::Value(v) => v,
        };

        let formatted = format_magnitude(magnitude);
        trace!("Vibration reading: {} m/s²", formatted);
        self.show(format!("{} m/s²", formatted)).await;

        if magnitude <= VIBRATION_THRESHOLD {
            return false;
        }

        if let Some(last) = self.last_logged {
            if now.saturating_duration_since(last) < DEBOUNCE {
                return false;
            }
        }

        let message = format!("⚠️ High vibration: {} m/s²", formatted);
        info!("{}", message);
        self.log
            .lock()
            .await
            .append(LogEntry::now(Category::Vibration, message));
        self.last_logged = Some(now);
        true
    }

    async fn show(&self, text: String) {
        self.dashboard.lock().await.vibration = text;
    }
}

/// Resolves a capability to a readable stream, requesting permission first
/// where the source needs it.
pub async fn open_input(capability: MotionCapability) -> Result<MotionInput, MonitorError> {
    match capability {
        MotionCapability::Unsupported => Err(MonitorError::MotionUnsupported),
        MotionCapability::RequiresPermission { port, baud } => {
            info!("Requesting motion sensor access: {} @ {}", port, baud);
            request_permission(&port, baud)
        }
        MotionCapability::Supported { path } => open_stream(&path).await,
    }
}

pub async fn run(config: Config, mut monitor: MotionMonitor, mut shutdown: watch::Receiver<bool>) {
    let input = match open_input(MotionCapability::probe(&config)).await {
        Ok(input) => input,
        Err(e) => {
            let status = unavailable_status(&e);
            warn!("Vibration monitoring unavailable: {}", e);
            monitor.show(status.to_string()).await;
            return;
        }
    };

    info!("Vibration monitoring started");
    let mut lines = BufReader::new(input).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => monitor.on_line(&line, Instant::now()).await,
                Ok(None) => {
                    info!("Motion stream ended");
                    break;
                }
                Err(e) => {
                    error!("Motion stream read failed: {}", e);
                    monitor.show("Sensor error".to_string()).await;
                    break;
                }
            },
            _ = shutdown.changed() => {
                info!("Vibration monitoring stopped");
                break;
            }
        }
    }
}
