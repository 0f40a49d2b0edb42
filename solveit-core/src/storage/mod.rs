//! Object storage abstraction
//!
//! Backends:
//! - `S3Storage`: any S3-compatible bucket through OpenDAL
//! - `MemoryStorage`: in-process map, used by tests and local runs

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::Result;

/// Flat key-value object store.
///
/// Keys are the same strings persisted in the file tables, so a key listed
/// here can be compared directly against a stored file path.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Stream every object key under `prefix`. An empty prefix lists the
    /// whole bucket. Backends page through the listing lazily.
    async fn list(&self, prefix: &str) -> Result<BoxStream<'static, Result<String>>>;

    /// Definitive existence probe. `Err` means the answer is unknown.
    async fn exists(&self, key: &str) -> Result<bool>;
}

pub use memory::MemoryStorage;
pub use s3::S3Storage;
