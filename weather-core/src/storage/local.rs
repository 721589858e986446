use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::ObjectStore;

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.object_path(bucket, key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write object file: {}", path.display()))?;

        Ok(())
    }
}
