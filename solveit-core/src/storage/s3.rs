use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use opendal::{services::S3, Operator};

use super::ObjectStorage;
use crate::config::StorageConfig;
use crate::{Error, Result};

/// S3-compatible storage backed by OpenDAL
#[derive(Clone, Debug)]
pub struct S3Storage {
    operator: Operator,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        tracing::info!(
            bucket = %config.bucket,
            endpoint = %config.endpoint,
            "Initializing S3 storage"
        );

        let mut builder = S3::default()
            .bucket(&config.bucket)
            .region(&config.region)
            .root(&config.root)
            .access_key_id(&config.access_key_id)
            .secret_access_key(&config.secret_access_key);

        if !config.endpoint.is_empty() {
            builder = builder.endpoint(&config.endpoint);
        }

        let operator = Operator::new(builder)?.finish();

        Ok(Self {
            operator,
            bucket: config.bucket.clone(),
        })
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        self.operator
            .write_with(key, data)
            .content_type(content_type)
            .await?;

        tracing::trace!(key, size, "Wrote object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.operator.delete(key).await?;
        tracing::trace!(key, "Deleted object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<BoxStream<'static, Result<String>>> {
        let path = if prefix.is_empty() { "/" } else { prefix };
        let lister = self.operator.lister_with(path).recursive(true).await?;

        let keys = lister
            .map_err(Error::from)
            .try_filter_map(|entry| async move {
                if entry.metadata().is_dir() {
                    Ok(None)
                } else {
                    Ok(Some(entry.path().to_string()))
                }
            })
            .boxed();

        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.operator.exists(key).await?)
    }
}
