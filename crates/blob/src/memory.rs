use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use {async_trait::async_trait, bytes::Bytes};

use crate::{BlobStore, Error, Result, check_object_name};

#[derive(Default)]
struct Buckets {
    names: HashSet<String>,
    objects: HashMap<(String, String), Bytes>,
}

/// A [`BlobStore`] that keeps objects in process memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<Buckets>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored bytes of an object, if present.
    #[must_use]
    pub fn object(&self, bucket: &str, object_name: &str) -> Option<Bytes> {
        let inner = self.inner.lock().ok()?;
        inner
            .objects
            .get(&(bucket.to_string(), object_name.to_string()))
            .cloned()
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.inner.lock().map(|i| i.objects.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>> {
        self.inner
            .lock()
            .map_err(|_| Error::storage("memory store", "lock poisoned"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        self.lock()?.names.insert(bucket.to_string());
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        data: Bytes,
        length: u64,
    ) -> Result<()> {
        check_object_name(object_name)?;
        if data.len() as u64 != length {
            return Err(Error::invalid_input(format!(
                "declared length {length} does not match {} bytes of data",
                data.len()
            )));
        }
        let mut inner = self.lock()?;
        if !inner.names.contains(bucket) {
            return Err(Error::storage(
                format!("put {bucket}/{object_name}"),
                "no such bucket",
            ));
        }
        inner
            .objects
            .insert((bucket.to_string(), object_name.to_string()), data);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_replaces_objects() {
        let store = MemoryBlobStore::new();
        store.ensure_bucket("bucket").await.unwrap();
        store.ensure_bucket("bucket").await.unwrap();

        store
            .upload("bucket", "y.png", Bytes::from_static(b"one"), 3)
            .await
            .unwrap();
        store
            .upload("bucket", "y.png", Bytes::from_static(b"two!"), 4)
            .await
            .unwrap();

        assert_eq!(store.object("bucket", "y.png").unwrap(), "two!");
        assert_eq!(store.object_count(), 1);
        assert!(store.object("bucket", "z.png").is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_bucket() {
        let store = MemoryBlobStore::new();
        let err = store
            .upload("nope", "y.png", Bytes::from_static(b"x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }
}
