//! Cache: content-addressed store wrapping Extractor, Evidence, and Similarity
//! results by content hash (spec §4.7, §6.2).

use crate::core::error::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A read-through content-addressed cache. Every method must tolerate the
/// cache being entirely absent: callers always have a path to recompute a
/// value from raw inputs.
pub trait CacheStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>>;
    fn put_raw(&self, key: &str, value: &[u8], ttl_secs: u64);
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: u64,
    payload: serde_json::Value,
}

/// Hex-encoded SHA-256 of the key's component parts, joined by `\0` (spec §6.2).
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Key for a Unit's extracted features: file content hash + extractor version.
pub fn unit_key(file_content_hash: &str, extractor_version: &str) -> String {
    cache_key(&["unit", file_content_hash, extractor_version])
}

/// Key for a Unit's Evidence: repo commit SHA + file path + unit span hash.
pub fn evidence_key(commit: &str, path: &str, span_hash: &str) -> String {
    cache_key(&["evidence", commit, path, span_hash])
}

/// Key for a Unit's similarity shingles/signature: unit id + normalizer version.
pub fn similarity_key(unit_id: &str, normalizer_version: &str) -> String {
    cache_key(&["similarity", unit_id, normalizer_version])
}

/// Key for a repository's last-known full unit/evidence/cluster snapshot, used
/// to merge incremental scans with the prior ScanReport's state (spec §4.6/§4.8).
pub fn snapshot_key(repo_name: &str) -> String {
    cache_key(&["snapshot", repo_name])
}

fn get<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    let envelope: Envelope = serde_json::from_slice(&raw).ok()?;
    if envelope.expires_at < now_secs() {
        return None;
    }
    serde_json::from_value(envelope.payload).ok()
}

fn put<T: Serialize>(store: &dyn CacheStore, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
    let envelope = Envelope {
        expires_at: now_secs() + ttl_secs,
        payload: serde_json::to_value(value)?,
    };
    let raw = serde_json::to_vec(&envelope)?;
    store.put_raw(key, &raw, ttl_secs);
    Ok(())
}

/// Typed convenience wrapper over a `CacheStore`.
pub struct Cache<'a> {
    store: &'a dyn CacheStore,
}

impl<'a> Cache<'a> {
    pub fn new(store: &'a dyn CacheStore) -> Self {
        Self { store }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        get(self.store, key)
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        put(self.store, key, value, ttl_secs)
    }
}

/// On-disk cache under the config-resolved cache home. Values are written
/// atomically: a `.tmp` sibling is written then renamed into place, so a
/// reader never observes a partially-written entry.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Remove every entry in the cache directory.
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let _ = std::fs::remove_file(entry.path());
        }
        Ok(())
    }

    /// Count entries currently on disk (expired or not).
    pub fn entry_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(&self.dir)?.flatten().count())
    }
}

impl CacheStore for DiskCache {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path_for(key)).ok()
    }

    fn put_raw(&self, key: &str, value: &[u8], _ttl_secs: u64) {
        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!("{key}.tmp"));
        if std::fs::write(&tmp_path, value).is_ok() {
            let _ = std::fs::rename(&tmp_path, &final_path);
        }
    }
}

/// In-memory `CacheStore` used by tests in place of a real disk cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCache {
    fn get_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put_raw(&self, key: &str, value: &[u8], _ttl_secs: u64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_vec());
        }
    }
}

pub fn cache_error(message: impl Into<String>) -> Error {
    Error::Cache {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_roundtrips_value() {
        let store = MemoryCache::new();
        let cache = Cache::new(&store);
        cache.put("k1", &42u32, 3600).unwrap();
        let value: Option<u32> = cache.get("k1");
        assert_eq!(value, Some(42));
    }

    #[test]
    fn expired_entries_are_treated_as_misses() {
        let store = MemoryCache::new();
        let cache = Cache::new(&store);
        cache.put("k1", &"value", 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let value: Option<String> = cache.get("k1");
        assert_eq!(value, None);
    }

    #[test]
    fn disk_cache_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let disk = DiskCache::new(tmp.path().to_path_buf()).unwrap();
            let cache = Cache::new(&disk);
            cache.put("k1", &vec![1, 2, 3], 3600).unwrap();
        }
        let disk = DiskCache::new(tmp.path().to_path_buf()).unwrap();
        let cache = Cache::new(&disk);
        let value: Option<Vec<i32>> = cache.get("k1");
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn cache_keys_are_stable_and_distinct() {
        let a = unit_key("abc123", "v1");
        let b = unit_key("abc123", "v1");
        let c = unit_key("abc123", "v2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
