//! Durable key/value cache backing both the HTML response cache and the
//! resolved details/stream caches.
//!
//! Entries are `(expires_at, value)` pairs persisted to a single JSON file.
//! Expiry is lazy: a read past `expires_at` deletes the entry and reports a
//! miss. No background sweep is required for correctness.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    expires_at: i64,
    value: Value,
}

pub struct PersistentCache {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl PersistentCache {
    /// Open (or create) a cache file. A broken or missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(map) => {
                    info!("loaded {} cache entries from {}", map.len(), path.display());
                    map
                }
                Err(err) => {
                    warn!("discarding unreadable cache {}: {err}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// Purely in-memory cache, used by tests and short-lived tools.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(key)?;

        if Utc::now().timestamp() >= entry.expires_at {
            entries.remove(key);
            self.save(&entries);
            return None;
        }

        Some(entry.value.clone())
    }

    /// Typed read for callers that know what they stored.
    pub async fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    pub async fn set(&self, key: &str, value: Value, ttl_seconds: u64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                expires_at: Utc::now().timestamp() + ttl_seconds as i64,
                value,
            },
        );
        self.save(&entries);
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl_seconds).await,
            Err(err) => error!("cache value for {key} is not serializable: {err}"),
        }
    }

    pub async fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.save(&entries);
        }
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.save(&entries);
        info!("cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Atomic save: write a temp file then rename over the target, so a crash
    /// mid-write never corrupts the cache.
    fn save(&self, entries: &HashMap<String, CacheEntry>) {
        let Some(path) = &self.path else { return };

        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let tmp = path.with_extension("json.tmp");
        let result = serde_json::to_string(entries)
            .map_err(anyhow::Error::from)
            .and_then(|raw| {
                std::fs::write(&tmp, raw)?;
                std::fs::rename(&tmp, path)?;
                Ok(())
            });

        if let Err(err) = result {
            error!("failed to save cache {}: {err}", path.display());
        }
    }
}

/// One cache file per process, shared between suppliers and the extractor
/// engine. Opened on first use at the configured path.
pub fn shared() -> &'static Arc<PersistentCache> {
    static SHARED: OnceLock<Arc<PersistentCache>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(PersistentCache::open(&crate::settings::settings().cache_file)))
}

/// Key namespaces; every consumer prefixes its keys so one file can back all
/// of them.
pub fn html_key(url: &str) -> String {
    format!("html_{url}")
}

pub fn details_key(id: &str) -> String {
    format!("details_{id}")
}
