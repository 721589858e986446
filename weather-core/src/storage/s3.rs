use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{
        Builder, Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
        retry::RetryConfig,
    },
    error::DisplayErrorContext,
    primitives::ByteStream,
};

use crate::config::StorageConfig;

use super::ObjectStore;

/// S3 (or S3-compatible) backend.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Static keys from the config win; without them the SDK default chain is used.
    ///
    /// SDK retries are off: a failed upload fails the task and the pipeline's policy decides.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let static_credentials = config.credentials()?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let mut builder = Builder::from(&shared);

        if let Some(creds) = static_credentials {
            builder = builder.credentials_provider(Credentials::new(
                creds.access_key_id,
                creds.secret_access_key,
                None,
                None,
                "weather-etl-config",
            ));
        }

        if let Some(endpoint) = &config.endpoint_url {
            // S3-compatible stores often reject aws-chunked bodies with trailing checksums.
            builder = builder
                .endpoint_url(endpoint)
                .force_path_style(true)
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
                .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
        }

        Ok(Self::new(Client::from_conf(builder.build())))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("S3 PutObject failed: {}", DisplayErrorContext(&e)))?;

        Ok(())
    }
}
