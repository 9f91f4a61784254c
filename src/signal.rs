//! Sample-level conversions for both monitoring channels.
//!
//! Audio arrives as unsigned 8-bit time-domain samples where 128 is the
//! zero line. Motion arrives as an acceleration vector that still
//! contains gravity, so a device at rest reads about 9.81 m/s².

use crate::types::Acceleration;

/// Zero line of unsigned 8-bit PCM.
const MID_SCALE: f64 = 128.0;

/// Root-mean-square of a waveform, each sample normalised to [-1, 1].
///
/// An empty window has no energy and yields 0.
pub fn rms(samples: &[u8]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = (s as f64 - MID_SCALE) / MID_SCALE;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt()
}

/// `round(20 * log10(rms))`. Silence maps to negative infinity.
pub fn rms_to_db(rms: f64) -> f64 {
    (20.0 * rms.log10()).round()
}

/// Loudness of a waveform window in whole decibels.
///
/// Returns `None` for a silent or degenerate window, where the logarithm
/// is not finite and the sample must be skipped.
pub fn decibels(samples: &[u8]) -> Option<i32> {
    let db = rms_to_db(rms(samples));
    if db.is_finite() {
        Some(db as i32)
    } else {
        None
    }
}

/// Result of validating one motion reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Magnitude {
    /// At least one axis was not reported.
    Waiting,
    /// All axes present but the magnitude is not a number.
    Invalid,
    /// Euclidean norm rounded to two decimal places.
    Value(f64),
}

impl Magnitude {
    pub fn of(acc: &Acceleration) -> Self {
        let (x, y, z) = match (acc.x, acc.y, acc.z) {
            (Some(x), Some(y), Some(z)) => (x, y, z),
            _ => return Magnitude::Waiting,
        };

        let total = (x * x + y * y + z * z).sqrt();
        if total.is_nan() {
            return Magnitude::Invalid;
        }

        Magnitude::Value((total * 100.0).round() / 100.0)
    }
}

/// Two-decimal display form, e.g. `16.23`.
pub fn format_magnitude(value: f64) -> String {
    format!("{:.2}", value)
}
