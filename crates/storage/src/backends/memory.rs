//! In-memory storage backend for tests and offline runs.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-local object store. Also keeps a put counter so tests can assert
/// on how many writes actually happened (deduplication laws).
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, Bytes>>,
    puts: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an object, bypassing the put counter.
    pub fn seed(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .expect("memory store lock poisoned")
            .insert(key.into(), data.into());
    }

    /// Fetch stored bytes, if present.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .expect("memory store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Number of `put` calls since construction.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .expect("memory store lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .lock()
            .expect("memory store lock poisoned")
            .contains_key(key))
    }

    async fn put(&self, key: &str, data: Bytes, _opts: PutOptions) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .expect("memory store lock poisoned")
            .insert(key.to_string(), data);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
