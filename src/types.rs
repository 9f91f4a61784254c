use chrono::Local;
use std::fmt;
use std::str::FromStr;

/// What kind of reading produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Noise,
    Vibration,
    /// Restored entries whose message names neither channel.
    Other,
}

impl Category {
    /// Recovers the category of a persisted entry from its message text.
    ///
    /// Matching is on the lowercase words only. A message naming both
    /// channels is filed under noise.
    pub fn infer(message: &str) -> Self {
        if message.contains("noise") {
            Category::Noise
        } else if message.contains("vibration") {
            Category::Vibration
        } else {
            Category::Other
        }
    }
}

/// A single threshold-crossing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Wall-clock time in the `10:00:05 AM` form
    pub timestamp: String,
    pub category: Category,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: String, category: Category, message: String) -> Self {
        Self {
            timestamp,
            category,
            message,
        }
    }

    /// Stamps a new entry with the current local time.
    pub fn now(category: Category, message: String) -> Self {
        Self::new(locale_time(), category, message)
    }

    /// Parses the persisted `[time] message` form.
    ///
    /// The split happens at the first `"] "`; a line without it is all
    /// timestamp and no message.
    pub fn parse_line(line: &str) -> Self {
        let (time, message) = line.split_once("] ").unwrap_or((line, ""));
        let timestamp = time.replacen('[', "", 1);
        let message = message.to_string();
        let category = Category::infer(&message);
        Self::new(timestamp, category, message)
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// Visibility predicate applied to the rendered log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    #[default]
    All,
    Noise,
    Vibration,
}

impl LogFilter {
    pub fn shows(&self, category: Category) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Noise => category == Category::Noise,
            LogFilter::Vibration => category == Category::Vibration,
        }
    }
}

impl FromStr for LogFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(LogFilter::All),
            "noise" => Ok(LogFilter::Noise),
            "vibration" => Ok(LogFilter::Vibration),
            other => Err(format!(
                "unknown filter '{}', expected all, noise or vibration",
                other
            )),
        }
    }
}

impl fmt::Display for LogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFilter::All => "all",
            LogFilter::Noise => "Noise",
            LogFilter::Vibration => "Vibration",
        };
        f.write_str(name)
    }
}

/// One accelerometer reading including gravity, in m/s².
///
/// Axes are optional because sensors may report a partial vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

pub fn locale_time() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_splits_at_first_delimiter() {
        let entry = LogEntry::parse_line("[10:00:05 AM] ⚠️ High vibration: 16.23 m/s²");
        assert_eq!(entry.timestamp, "10:00:05 AM");
        assert_eq!(entry.message, "⚠️ High vibration: 16.23 m/s²");
        assert_eq!(entry.category, Category::Vibration);

        let nested = LogEntry::parse_line("[1:02:03 PM] a] b");
        assert_eq!(nested.timestamp, "1:02:03 PM");
        assert_eq!(nested.message, "a] b");
    }

    #[test]
    fn test_parse_line_without_delimiter() {
        let entry = LogEntry::parse_line("[10:00:00 AM noise");
        assert_eq!(entry.timestamp, "10:00:00 AM noise");
        assert_eq!(entry.message, "");
        assert_eq!(entry.category, Category::Other);
    }

    #[test]
    fn test_category_inference_is_case_sensitive() {
        assert_eq!(Category::infer("⚠️ High noise: 90 dB"), Category::Noise);
        assert_eq!(Category::infer("⚠️ High vibration: 16.23 m/s²"), Category::Vibration);
        assert_eq!(Category::infer("NOISE complaint"), Category::Other);
        assert_eq!(Category::infer("noise from vibration"), Category::Noise);
    }

    #[test]
    fn test_line_form_survives_parse() {
        let entry = LogEntry::new(
            "10:00:00 AM".to_string(),
            Category::Noise,
            "⚠️ High noise: 90 dB".to_string(),
        );
        assert_eq!(entry.to_line(), "[10:00:00 AM] ⚠️ High noise: 90 dB");
        assert_eq!(LogEntry::parse_line(&entry.to_line()), entry);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("all".parse::<LogFilter>().unwrap(), LogFilter::All);
        assert_eq!("Noise".parse::<LogFilter>().unwrap(), LogFilter::Noise);
        assert_eq!("VIBRATION".parse::<LogFilter>().unwrap(), LogFilter::Vibration);
        assert!("motion".parse::<LogFilter>().is_err());
    }

    #[test]
    fn test_other_category_only_shown_by_all() {
        assert!(LogFilter::All.shows(Category::Other));
        assert!(!LogFilter::Noise.shows(Category::Other));
        assert!(!LogFilter::Vibration.shows(Category::Other));
    }
}
