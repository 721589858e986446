//! The three-task run: readiness check, fetch, transform-and-load.
//!
//! Tasks are an explicit, ordered list. Each one is retried as a whole according
//! to a flat [`RetryPolicy`]; there is no backoff, no jitter and no partial recovery.

use serde_json::Value;
use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    config::SensorConfig, error::EtlError, model::SnapshotRecord, provider::WeatherProvider,
    sensor::wait_until_ready, snapshot::SnapshotWriter, transform::transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    IsWeatherApiReady,
    ExtractWeatherData,
    TransformLoadWeatherData,
}

impl TaskId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskId::IsWeatherApiReady => "is_weather_api_ready",
            TaskId::ExtractWeatherData => "extract_weather_data",
            TaskId::TransformLoadWeatherData => "transform_load_weather_data",
        }
    }

    /// Every task, upstream first.
    pub const fn all() -> &'static [TaskId] {
        &[
            TaskId::IsWeatherApiReady,
            TaskId::ExtractWeatherData,
            TaskId::TransformLoadWeatherData,
        ]
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Task '{task}' failed after {attempts} attempt(s): {source}")]
pub struct PipelineError {
    pub task: TaskId,
    pub attempts: u32,
    #[source]
    pub source: EtlError,
}

/// Outcome of one successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub key: String,
    pub record: SnapshotRecord,
    /// Attempts used per task, in [`TaskId::all`] order.
    pub attempts: Vec<(TaskId, u32)>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    provider: Arc<dyn WeatherProvider>,
    writer: SnapshotWriter,
    sensor: SensorConfig,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        writer: SnapshotWriter,
        sensor: SensorConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            writer,
            sensor,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run every task once, in order. The first task that exhausts its retries ends the run.
    pub async fn run_once(&self) -> Result<RunReport, PipelineError> {
        let mut attempts = Vec::with_capacity(TaskId::all().len());

        let ((), used) = self
            .run_task(TaskId::IsWeatherApiReady, || {
                wait_until_ready(self.provider.as_ref(), &self.sensor)
            })
            .await?;
        attempts.push((TaskId::IsWeatherApiReady, used));

        let (document, used): (Value, u32) = self
            .run_task(TaskId::ExtractWeatherData, || self.provider.fetch_current())
            .await?;
        attempts.push((TaskId::ExtractWeatherData, used));

        let ((key, record), used) = self
            .run_task(TaskId::TransformLoadWeatherData, || {
                self.transform_load(&document)
            })
            .await?;
        attempts.push((TaskId::TransformLoadWeatherData, used));

        Ok(RunReport {
            key,
            record,
            attempts,
        })
    }

    async fn transform_load(
        &self,
        document: &Value,
    ) -> Result<(String, SnapshotRecord), EtlError> {
        let record = transform(document)?;
        let key = self.writer.write(&record).await?;
        Ok((key, record))
    }

    async fn run_task<T, F, Fut>(
        &self,
        task: TaskId,
        mut attempt: F,
    ) -> Result<(T, u32), PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EtlError>>,
    {
        let max_attempts = self.retry.max_attempts();
        let mut tries = 0;

        loop {
            tries += 1;
            tracing::info!(task = %task, attempt = tries, max_attempts, "starting task");

            match attempt().await {
                Ok(value) => {
                    tracing::info!(task = %task, attempt = tries, "task succeeded");
                    return Ok((value, tries));
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(
                        task = %task,
                        error = %e,
                        "task failed on bad input data, not retrying"
                    );
                    return Err(PipelineError {
                        task,
                        attempts: tries,
                        source: e,
                    });
                }
                Err(e) if tries >= max_attempts => {
                    tracing::error!(
                        task = %task,
                        attempts = tries,
                        error = %e,
                        "task failed, retries exhausted"
                    );
                    return Err(PipelineError {
                        task,
                        attempts: tries,
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        task = %task,
                        attempt = tries,
                        error = %e,
                        delay_secs = self.retry.retry_delay.as_secs(),
                        "task failed, will retry"
                    );
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
            }
        }
    }
}
