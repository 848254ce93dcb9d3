//! In-memory [`BlobStore`] for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::{BlobStore, StorageError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    put_log: Mutex<Vec<String>>,
    failing_keys: Mutex<HashSet<String>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "video/mp4".to_string(),
            },
        );
    }

    /// Every `put` to `key` fails with a backend error.
    pub fn fail_puts_to(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Cancel `token` once `puts` uploads have been attempted.
    pub fn cancel_after_puts(&self, puts: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((puts, token));
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys of every attempted `put`, in call order.
    pub fn put_log(&self) -> Vec<String> {
        self.put_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<ByteStream, StorageError> {
        let object = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ByteStream::from(object.data))
    }

    async fn put(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let attempted = {
            let mut log = self.put_log.lock().unwrap();
            log.push(key.to_string());
            log.len()
        };
        if let Some((limit, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if attempted >= *limit {
                token.cancel();
            }
        }

        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(StorageError::Backend(format!("injected failure for {key}")));
        }

        let data = body
            .collect()
            .await
            .map_err(|e| StorageError::Body(e.to_string()))?
            .into_bytes();

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
