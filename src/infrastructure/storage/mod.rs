//! Blob-store boundary.
//!
//! The pipeline only needs streamed reads of the source object and streamed
//! writes of generated artifacts. [`s3::StorageService`] is the production
//! implementation.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod s3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("failed to read object body: {0}")]
    Body(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a streamed read of `key`.
    async fn get(&self, key: &str) -> Result<ByteStream, StorageError>;

    /// Write `body` to `key` with the given content type.
    async fn put(&self, key: &str, body: ByteStream, content_type: &str)
        -> Result<(), StorageError>;
}
