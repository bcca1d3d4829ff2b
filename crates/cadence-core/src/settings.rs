//! Best-effort settings persistence.
//!
//! The store is a key/value bag of JSON values. Reads and writes never fail
//! from the caller's point of view: an absent or broken store behaves like an
//! empty one, and I/O problems are logged and swallowed.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde_json::Value;

/// Key/value settings storage.
pub trait SettingsStore: Send + Sync {
    /// Read a previously stored value, or `None` if it was never written.
    fn read(&self, key: &str) -> Option<Value>;

    /// Store a value. Best-effort; failures are not reported.
    fn write(&self, key: &str, value: &Value);
}

/// Store that remembers nothing. The valid "no storage available" state.
pub struct NoopStore;

impl SettingsStore for NoopStore {
    fn read(&self, _key: &str) -> Option<Value> {
        None
    }

    fn write(&self, _key: &str, _value: &Value) {}
}

/// In-memory store, mostly useful for embedding hosts and tests.
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn write(&self, key: &str, value: &Value) {
        self.values.lock().insert(key.to_string(), value.clone());
    }
}

/// Store backed by a single JSON object on disk.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> HashMap<String, Value> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(map) => map,
            Err(err) => {
                log::warn!("cadence: ignoring malformed settings file {}: {}", self.path.display(), err);
                HashMap::new()
            }
        }
    }
}

impl SettingsStore for FileStore {
    fn read(&self, key: &str) -> Option<Value> {
        self.load().remove(key)
    }

    fn write(&self, key: &str, value: &Value) {
        let mut map = self.load();
        map.insert(key.to_string(), value.clone());

        if let Some(dir) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                log::warn!("cadence: cannot create settings dir {}: {}", dir.display(), err);
                return;
            }
        }
        let serialized = match serde_json::to_vec_pretty(&map) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("cadence: cannot serialize settings: {}", err);
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, serialized) {
            log::warn!("cadence: cannot write settings file {}: {}", self.path.display(), err);
        }
    }
}
