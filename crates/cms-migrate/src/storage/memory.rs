//! In-process object store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::ObjectStore;
use crate::error::Result;

/// A stored object with its headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Body.
    pub bytes: Vec<u8>,
    /// `Content-Type` it was written with.
    pub content_type: String,
    /// `Cache-Control` it was written with.
    pub cache_control: String,
}

/// Keeps objects in memory, keyed by path. Used by tests and embedders
/// that want to inspect what a run would have written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Object at `key`.
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(key).cloned()
    }

    /// Stored keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        cache_control: &str,
    ) -> Result<()> {
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                cache_control: cache_control.to_string(),
            },
        );
        Ok(())
    }
}
