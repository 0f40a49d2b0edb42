//! Object storage initialization

use anyhow::Result;
use std::sync::Arc;

use crate::storage::{ObjectStorage, S3Storage};
use crate::Config;

/// Build the S3 operator from configuration
pub fn init_storage(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    let storage = S3Storage::new(&config.storage)
        .map_err(|e| anyhow::anyhow!("Object storage initialization failed: {e}"))?;
    Ok(Arc::new(storage))
}
