//! Generic JSON-backed key-value store with oldest-first eviction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode store {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Slot<V> {
    seq: u64,
    value: V,
}

#[derive(Debug, Serialize, Deserialize)]
struct Persisted<V> {
    next_seq: u64,
    entries: BTreeMap<String, Slot<V>>,
}

impl<V> Default for Persisted<V> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            entries: BTreeMap::new(),
        }
    }
}

/// A durable map persisted as a single JSON file. The whole store is
/// rewritten after each mutation; at this scale (hundreds to a few thousand
/// entries) a bounded blocking write is acceptable.
///
/// A corrupt or unreadable store file is treated as empty rather than
/// fatal, so a damaged cache never blocks the pipeline from starting.
pub struct KvStore<V> {
    path: PathBuf,
    cap: usize,
    inner: Persisted<V>,
}

impl<V: Serialize + DeserializeOwned> KvStore<V> {
    pub fn open(path: &Path, cap: usize) -> Result<Self, StoreError> {
        let inner = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file corrupt, starting empty");
                    Persisted::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Persisted::default(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            cap,
            inner,
        })
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.entries.get(key).map(|s| &s.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.entries.values().map(|s| &s.value)
    }

    /// Inserts or replaces an entry, evicts past the cap, and rewrites the
    /// backing file.
    pub fn insert(&mut self, key: String, value: V) -> Result<(), StoreError> {
        let seq = self.inner.next_seq;
        self.inner.next_seq += 1;
        self.inner.entries.insert(key, Slot { seq, value });
        self.prune();
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<V>, StoreError> {
        let removed = self.inner.entries.remove(key).map(|s| s.value);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    fn prune(&mut self) {
        while self.inner.entries.len() > self.cap {
            let oldest = self
                .inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.seq)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    self.inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.inner).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;
        // Write to a sibling temp file then rename so a crash mid-write
        // never leaves a truncated store behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store: KvStore<String> = KvStore::open(&path, 10).unwrap();
        store.insert("a".into(), "alpha".into()).unwrap();
        store.insert("b".into(), "beta".into()).unwrap();
        drop(store);

        let store: KvStore<String> = KvStore::open(&path, 10).unwrap();
        assert_eq!(store.get("a").map(String::as_str), Some("alpha"));
        assert_eq!(store.get("b").map(String::as_str), Some("beta"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evicts_oldest_past_cap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store: KvStore<u32> = KvStore::open(&path, 3).unwrap();
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store.insert((*key).into(), i as u32).unwrap();
        }
        assert_eq!(store.len(), 3);
        assert!(!store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.contains("c"));
        assert!(store.contains("e"));
    }

    #[test]
    fn reinsert_refreshes_age() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut store: KvStore<u32> = KvStore::open(&path, 2).unwrap();
        store.insert("a".into(), 1).unwrap();
        store.insert("b".into(), 2).unwrap();
        store.insert("a".into(), 3).unwrap();
        store.insert("c".into(), 4).unwrap();
        // "b" is now the oldest and should have been evicted.
        assert!(store.contains("a"));
        assert!(store.contains("c"));
        assert!(!store.contains("b"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store: KvStore<String> = KvStore::open(&path, 10).unwrap();
        assert!(store.is_empty());
    }
}
