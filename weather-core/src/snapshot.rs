//! CSV serialization of a snapshot record and its upload to object storage.

use anyhow::{Context, anyhow};
use chrono::{Local, NaiveDateTime};
use std::{fmt::Debug, sync::Arc};

use crate::{error::EtlError, model::SnapshotRecord, storage::ObjectStore};

pub const KEY_PREFIX: &str = "current_weather_data";
pub const KEY_TIME_FORMAT: &str = "%d%m%Y%H%M%S";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Source of the wall-clock time used in object keys.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Host-local wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    clock: Arc<dyn Clock>,
}

impl SnapshotWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            clock,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload `record` as a new object and return its key. Store failures are not retried here.
    pub async fn write(&self, record: &SnapshotRecord) -> Result<String, EtlError> {
        let key = object_key(&record.city, self.clock.now());

        let body = to_csv(record).map_err(|source| EtlError::StorageWrite {
            bucket: self.bucket.clone(),
            key: key.clone(),
            source,
        })?;

        self.store
            .put(&self.bucket, &key, body, CSV_CONTENT_TYPE)
            .await
            .map_err(|source| EtlError::StorageWrite {
                bucket: self.bucket.clone(),
                key: key.clone(),
                source,
            })?;

        tracing::info!(bucket = %self.bucket, key = %key, "snapshot written");
        Ok(key)
    }
}

/// Header row plus one data row.
pub fn to_csv(record: &SnapshotRecord) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .serialize(record)
        .context("Failed to serialize snapshot record to CSV")?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush snapshot CSV: {}", e.error()))
}

/// `current_weather_data_<city-slug>_<DDMMYYYYHHMMSS>`
pub fn object_key(city: &str, now: NaiveDateTime) -> String {
    format!(
        "{KEY_PREFIX}_{}_{}",
        city_slug(city),
        now.format(KEY_TIME_FORMAT)
    )
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes one `_`.
pub fn city_slug(city: &str) -> String {
    let mut slug = String::with_capacity(city.len());
    for c in city.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
