use std::fmt;

pub const WAITING: &str = "Waiting for data...";

/// Live readouts. Every field is overwritten on each sample, never persisted.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub noise: String,
    pub vibration: String,
    pub runtime: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            noise: WAITING.to_string(),
            vibration: WAITING.to_string(),
            runtime: "Monitoring for: 0:00".to_string(),
        }
    }
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Noise: {} | Vibration: {} | {}",
            self.noise.trim(),
            self.vibration.trim(),
            self.runtime
        )
    }
}
