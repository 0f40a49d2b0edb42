// In-memory object storage
//
// Backs tests and local runs without an S3 endpoint. Faults can be injected
// per key so callers can exercise their error paths.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::ObjectStorage;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

#[derive(Default)]
struct Faults {
    list: bool,
    exists: HashSet<String>,
    delete: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    faults: Arc<RwLock<Faults>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, in lexical order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    #[must_use]
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|o| o.content_type.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Make `list` fail until cleared
    pub fn fail_list(&self, fail: bool) {
        self.faults.write().list = fail;
    }

    /// Make `exists` fail for one key
    pub fn fail_exists_for(&self, key: impl Into<String>) {
        self.faults.write().exists.insert(key.into());
    }

    /// Make `delete` fail for one key
    pub fn fail_delete_for(&self, key: impl Into<String>) {
        self.faults.write().delete.insert(key.into());
    }

    fn injected(op: &str, key: &str) -> Error {
        Error::Internal(format!("injected {op} failure for {key:?}"))
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.faults.read().delete.contains(key) {
            return Err(Self::injected("delete", key));
        }
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<BoxStream<'static, Result<String>>> {
        if self.faults.read().list {
            return Err(Self::injected("list", prefix));
        }
        let keys: Vec<String> = self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self.faults.read().exists.contains(key) {
            return Err(Self::injected("exists", key));
        }
        Ok(self.objects.read().contains_key(key))
    }
}
