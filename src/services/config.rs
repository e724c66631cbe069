use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::store::{keys, KvStore};

/// Poll periods and API endpoint. Loaded from the same store as every
/// other persisted key; absence or corruption falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealwatchConfig {
    pub api_base_url: String,
    /// Live sync: deal list + balance + open-view refresh.
    pub live_sync_secs: u64,
    /// Active-deal detail refresh while its view is open.
    pub deal_refresh_secs: u64,
    /// Active-dispute refresh while its detail view is open.
    pub dispute_refresh_secs: u64,
    /// HTTP request timeout.
    pub request_timeout_secs: u64,
}

impl Default for DealwatchConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            live_sync_secs: 5,
            deal_refresh_secs: 3,
            dispute_refresh_secs: 10,
            request_timeout_secs: 15,
        }
    }
}

impl DealwatchConfig {
    pub fn load(store: &KvStore) -> Self {
        store.load(keys::CONFIG)
    }

    pub fn persist(&self, store: &KvStore) {
        store.save(keys::CONFIG, self);
    }

    pub fn live_sync_period(&self) -> Duration {
        Duration::from_secs(self.live_sync_secs.max(1))
    }

    pub fn deal_refresh_period(&self) -> Duration {
        Duration::from_secs(self.deal_refresh_secs.max(1))
    }

    pub fn dispute_refresh_period(&self) -> Duration {
        Duration::from_secs(self.dispute_refresh_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_on_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        let config = DealwatchConfig::load(&store);
        assert_eq!(config.live_sync_secs, 5);
        assert_eq!(config.dispute_refresh_secs, 10);
    }

    #[test]
    fn test_persist_and_reload() {
        let tmp = TempDir::new().unwrap();
        let store = KvStore::new(tmp.path());
        let config = DealwatchConfig {
            live_sync_secs: 2,
            ..Default::default()
        };
        config.persist(&store);

        let reloaded = DealwatchConfig::load(&store);
        assert_eq!(reloaded.live_sync_secs, 2);
    }

    #[test]
    fn test_zero_period_clamped() {
        let config = DealwatchConfig {
            live_sync_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.live_sync_period(), Duration::from_secs(1));
    }
}
