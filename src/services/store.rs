//! Best-effort persistent key-value store.
//!
//! Each logical key is one JSON blob on disk, written in full after every
//! in-memory mutation. Reads fall back to the type's default on any
//! failure and writes are absorbed with a warning: the client must keep
//! functioning for the session even if persistence is unavailable, losing
//! only durability.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{DealwatchError, Result};

/// Logical key names, one JSON file each.
pub mod keys {
    pub const UNREAD_DEALS: &str = "unread_deals";
    pub const CHAT_LAST_SEEN_AT: &str = "chat_last_seen_at";
    pub const CHAT_UNREAD_COUNTS: &str = "chat_unread_counts";
    pub const PENDING_READ: &str = "pending_read";
    pub const DEAL_STATUS_MAP: &str = "deal_status_map";
    pub const COMPLETED_NOTIFIED: &str = "completed_notified";
    pub const DISPUTE_RESOLVED_NOTIFIED: &str = "dispute_resolved_notified";
    pub const NOTIFICATION_QUEUE: &str = "notification_queue";
    pub const CONFIG: &str = "config";
}

/// Store rooted at a data directory. Cloning shares the same directory.
#[derive(Clone)]
pub struct KvStore {
    base_dir: PathBuf,
}

impl KvStore {
    pub fn new(base_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(base_dir) {
            log::warn!("Create store dir {:?}: {}", base_dir, e);
        }
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Read a key, treating a missing, unreadable, or corrupt blob as the
    /// type's default. Never errors.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.path_for(key);
        if !path.exists() {
            return T::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Corrupt blob for key '{}', using default: {}", key, e);
                    T::default()
                }
            },
            Err(e) => {
                log::warn!("Read key '{}': {}", key, e);
                T::default()
            }
        }
    }

    /// Best-effort write of the full structure. Failures are logged and
    /// absorbed; durability is simply lost for that key.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_save(key, value) {
            log::warn!("Persist key '{}': {}", key, e);
        }
    }

    /// The `Result`-returning write underneath [`KvStore::save`].
    pub fn try_save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string_pretty(value)
            .map_err(|e| DealwatchError::Storage(format!("Serialize key '{}': {}", key, e)))?;
        std::fs::write(self.path_for(key), data)
            .map_err(|e| DealwatchError::Storage(format!("Write key '{}': {}", key, e)))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }
}

/// Platform data directory for the client, with a relative fallback.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("dealwatch"))
        .unwrap_or_else(|| PathBuf::from(".dealwatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_yields_default() {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        let map: HashMap<i64, u32> = store.load("nothing_here");
        assert!(map.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        let mut map = HashMap::new();
        map.insert(42i64, 3u32);
        store.save(keys::CHAT_UNREAD_COUNTS, &map);

        let loaded: HashMap<i64, u32> = store.load(keys::CHAT_UNREAD_COUNTS);
        assert_eq!(loaded.get(&42), Some(&3));
    }

    #[test]
    fn test_corrupt_blob_yields_default() {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        std::fs::write(tmp.path().join("unread_deals.json"), "{not valid json").unwrap();

        let set: std::collections::HashSet<i64> = store.load(keys::UNREAD_DEALS);
        assert!(set.is_empty());
    }

    #[test]
    fn test_save_to_unwritable_dir_is_absorbed() {
        let store = KvStore::new(Path::new("/proc/no-such-dir/dealwatch"));
        // Must not panic or error out to the caller.
        store.save("anything", &vec![1, 2, 3]);
    }
}
