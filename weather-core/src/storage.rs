use crate::config::{StorageBackend, StorageConfig};
use crate::storage::{local::LocalStore, s3::S3Store};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod local;
pub mod s3;

/// Put-only view of an object store. Snapshots are append-only, so nothing else is needed.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()>;
}

/// Construct the configured store backend.
pub async fn store_from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::S3 => Arc::new(S3Store::from_config(config).await?),
        StorageBackend::Local => Arc::new(LocalStore::new(config.local_root.clone())),
    };

    Ok(store)
}
