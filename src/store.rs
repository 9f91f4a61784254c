use crate::error::MonitorError;
use crate::types::{LogEntry, LogFilter};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Key under which the serialized log lives.
pub const LOG_KEY: &str = "sitescopeLogs";

/// Origin-scoped persistence of named text blobs.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, MonitorError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), MonitorError>;
}

/// Keeps each key as one file under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MonitorError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(MonitorError::Storage(format!("invalid key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, MonitorError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), MonitorError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Non-persistent store, for sessions that should leave no trace.
#[derive(Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, MonitorError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), MonitorError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// An entry in the rendered list together with its visibility.
#[derive(Debug, Clone)]
pub struct RenderedEntry {
    pub entry: LogEntry,
    pub visible: bool,
}

/// Append-only event log: the rendered list plus its persisted mirror.
///
/// Both lists are newest-first. Every append rewrites the persisted list
/// in full, so after each call the two agree.
pub struct EventLog {
    store: Box<dyn KeyValueStore>,
    rendered: Vec<RenderedEntry>,
    filter: LogFilter,
    /// Set once the rendered list mirrors the whole persisted list.
    restored: bool,
}

impl EventLog {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            rendered: Vec::new(),
            filter: LogFilter::All,
            restored: false,
        }
    }

    /// Prepends `entry` to the rendered list and to the persisted list.
    ///
    /// If the persisted list cannot be read, the rendered list is written
    /// in its place when it is known to mirror storage; otherwise the write
    /// is skipped so stored history is never replaced. A failed write is
    /// logged; the rendered entry stays.
    pub fn append(&mut self, entry: LogEntry) {
        let line = entry.to_line();
        let visible = self.filter.shows(entry.category);
        self.rendered.insert(0, RenderedEntry { entry, visible });

        let persisted = match self.read_persisted() {
            Ok(mut lines) => {
                lines.insert(0, line);
                lines
            }
            Err(e) if self.restored => {
                warn!("Failed to read persisted log, rewriting from rendered list: {}", e);
                self.rendered.iter().map(|item| item.entry.to_line()).collect()
            }
            Err(e) => {
                error!("Failed to read persisted log, entry not persisted: {}", e);
                return;
            }
        };

        if let Err(e) = self.save_persisted(&persisted) {
            error!("Failed to persist log: {}", e);
        }
    }

    /// Rebuilds the rendered list from storage, newest first.
    ///
    /// Returns the number of entries restored.
    pub fn restore(&mut self) -> usize {
        let persisted = match self.read_persisted() {
            Ok(lines) => lines,
            Err(e) => {
                error!("Failed to read persisted log: {}", e);
                return 0;
            }
        };

        for line in &persisted {
            let entry = LogEntry::parse_line(line);
            let visible = self.filter.shows(entry.category);
            self.rendered.push(RenderedEntry { entry, visible });
        }
        self.restored = true;
        debug!("Restored {} log entries", persisted.len());
        persisted.len()
    }

    /// Toggles visibility of every rendered entry.
    pub fn apply_filter(&mut self, filter: LogFilter) {
        self.filter = filter;
        for item in &mut self.rendered {
            item.visible = filter.shows(item.entry.category);
        }
    }

    pub fn list_visible(&self) -> Vec<LogEntry> {
        self.rendered
            .iter()
            .filter(|item| item.visible)
            .map(|item| item.entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    /// Reads the persisted list. Absent or malformed data counts as empty;
    /// a failing store is an error.
    fn read_persisted(&self) -> Result<Vec<String>, MonitorError> {
        let raw = match self.store.get(LOG_KEY)? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(lines) => Ok(lines),
            Err(e) => {
                warn!("Persisted log is malformed, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn save_persisted(&mut self, lines: &[String]) -> Result<(), MonitorError> {
        let raw = serde_json::to_string(lines)?;
        self.store.set(LOG_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn entry(time: &str, category: Category, message: &str) -> LogEntry {
        LogEntry::new(time.to_string(), category, message.to_string())
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sitescope-{}-{}-{}",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_append_prepends_to_both_lists() {
        let mut log = EventLog::new(Box::new(MemoryStore::default()));
        log.append(entry("10:00:00 AM", Category::Noise, "⚠️ High noise: 90 dB"));
        log.append(entry("10:00:05 AM", Category::Vibration, "⚠️ High vibration: 16.23 m/s²"));

        let visible = log.list_visible();
        assert_eq!(visible[0].timestamp, "10:00:05 AM");
        assert_eq!(visible[1].timestamp, "10:00:00 AM");

        let persisted = log.read_persisted().unwrap();
        assert_eq!(
            persisted,
            vec![
                "[10:00:05 AM] ⚠️ High vibration: 16.23 m/s²".to_string(),
                "[10:00:00 AM] ⚠️ High noise: 90 dB".to_string(),
            ]
        );
    }

    #[test]
    fn test_restore_round_trip_newest_first() {
        let dir = temp_dir("roundtrip");
        {
            let mut log = EventLog::new(Box::new(FileStore::open(&dir).unwrap()));
            for i in 0..5 {
                log.append(entry(&format!("10:00:0{} AM", i), Category::Noise, &format!("⚠️ High noise: {} dB", 86 + i)));
            }
        }

        let mut restored = EventLog::new(Box::new(FileStore::open(&dir).unwrap()));
        assert_eq!(restored.restore(), 5);
        let visible = restored.list_visible();
        assert_eq!(visible.len(), 5);
        assert_eq!(visible[0].message, "⚠️ High noise: 90 dB");
        assert_eq!(visible[4].message, "⚠️ High noise: 86 dB");
        assert!(visible.iter().all(|e| e.category == Category::Noise));

        // a live append after restore still lands on top
        restored.append(entry("10:01:00 AM", Category::Vibration, "⚠️ High vibration: 20.00 m/s²"));
        assert_eq!(restored.list_visible()[0].timestamp, "10:01:00 AM");
        assert_eq!(restored.read_persisted().unwrap().len(), 6);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_restore_without_data_is_empty() {
        let mut log = EventLog::new(Box::new(MemoryStore::default()));
        assert_eq!(log.restore(), 0);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn test_malformed_persisted_log_is_treated_as_absent() {
        let mut store = MemoryStore::default();
        store.set(LOG_KEY, "{not json").unwrap();
        let mut log = EventLog::new(Box::new(store));
        assert_eq!(log.restore(), 0);

        log.append(entry("9:00:00 AM", Category::Noise, "⚠️ High noise: 99 dB"));
        assert_eq!(log.read_persisted().unwrap(), vec!["[9:00:00 AM] ⚠️ High noise: 99 dB".to_string()]);
    }

    #[test]
    fn test_filter_all_restores_visibility() {
        let mut log = EventLog::new(Box::new(MemoryStore::default()));
        log.append(entry("1:00:00 PM", Category::Noise, "⚠️ High noise: 90 dB"));
        log.append(entry("1:00:01 PM", Category::Vibration, "⚠️ High vibration: 16.00 m/s²"));
        log.append(entry("1:00:02 PM", Category::Noise, "⚠️ High noise: 91 dB"));

        log.apply_filter(LogFilter::Vibration);
        assert_eq!(log.list_visible().len(), 1);
        log.apply_filter(LogFilter::Noise);
        assert_eq!(log.list_visible().len(), 2);

        log.apply_filter(LogFilter::All);
        assert_eq!(log.list_visible().len(), log.len());
    }

    #[test]
    fn test_append_respects_active_filter() {
        let mut log = EventLog::new(Box::new(MemoryStore::default()));
        log.apply_filter(LogFilter::Noise);
        log.append(entry("1:00:01 PM", Category::Vibration, "⚠️ High vibration: 16.00 m/s²"));
        assert!(log.list_visible().is_empty());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = temp_dir("keys");
        let mut store = FileStore::open(&dir).unwrap();
        assert!(matches!(store.set("../escape", "x"), Err(MonitorError::Storage(_))));
        assert_eq!(store.get(LOG_KEY).unwrap(), None);
        store.set(LOG_KEY, "[]").unwrap();
        assert_eq!(store.get(LOG_KEY).unwrap().as_deref(), Some("[]"));
        let _ = fs::remove_dir_all(&dir);
    }

    /// Store whose next `get` fails when the shared flag is armed.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_get: Arc<AtomicBool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, MonitorError> {
            if self.fail_next_get.swap(false, Ordering::SeqCst) {
                return Err(MonitorError::Storage("read failed".to_string()));
            }
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), MonitorError> {
            self.inner.set(key, value)
        }
    }

    fn flaky_with_two_entries() -> (FlakyStore, Arc<AtomicBool>) {
        let mut store = FlakyStore::default();
        store
            .set(
                LOG_KEY,
                r#"["[10:00:05 AM] ⚠️ High vibration: 16.23 m/s²","[10:00:00 AM] ⚠️ High noise: 90 dB"]"#,
            )
            .unwrap();
        let flag = Arc::clone(&store.fail_next_get);
        (store, flag)
    }

    #[test]
    fn test_failed_read_after_restore_keeps_lists_in_sync() {
        let (store, fail_next_get) = flaky_with_two_entries();
        let mut log = EventLog::new(Box::new(store));
        assert_eq!(log.restore(), 2);

        fail_next_get.store(true, Ordering::SeqCst);
        log.append(entry("10:00:10 AM", Category::Noise, "⚠️ High noise: 91 dB"));

        assert_eq!(log.len(), 3);
        assert_eq!(
            log.read_persisted().unwrap(),
            vec![
                "[10:00:10 AM] ⚠️ High noise: 91 dB".to_string(),
                "[10:00:05 AM] ⚠️ High vibration: 16.23 m/s²".to_string(),
                "[10:00:00 AM] ⚠️ High noise: 90 dB".to_string(),
            ]
        );
    }

    #[test]
    fn test_failed_read_without_restore_never_overwrites_history() {
        let (store, fail_next_get) = flaky_with_two_entries();
        let mut log = EventLog::new(Box::new(store));

        fail_next_get.store(true, Ordering::SeqCst);
        log.append(entry("10:00:10 AM", Category::Noise, "⚠️ High noise: 91 dB"));

        assert_eq!(log.len(), 1);
        assert_eq!(log.read_persisted().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_restore_is_not_treated_as_empty_history() {
        let (store, fail_next_get) = flaky_with_two_entries();
        let mut log = EventLog::new(Box::new(store));

        fail_next_get.store(true, Ordering::SeqCst);
        assert_eq!(log.restore(), 0);

        fail_next_get.store(true, Ordering::SeqCst);
        log.append(entry("10:00:10 AM", Category::Noise, "⚠️ High noise: 91 dB"));
        assert_eq!(log.read_persisted().unwrap().len(), 2);
    }
}
