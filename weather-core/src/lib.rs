//! Core library for the `weather-etl` job.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather provider and its readiness sensor
//! - Kelvin to Fahrenheit conversion and the flat snapshot record
//! - CSV snapshots written to S3 or a local directory
//! - The three-task pipeline and its daily scheduler
//!
//! It is used by `weather-etl`, but the pipeline can be embedded by any other binary.

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod scheduler;
pub mod sensor;
pub mod snapshot;
pub mod storage;
pub mod transform;

pub use config::{ApiConfig, Config, ScheduleConfig, SensorConfig, StorageBackend, StorageConfig};
pub use convert::kelvin_to_fahrenheit;
pub use error::EtlError;
pub use model::{RawObservation, SnapshotRecord};
pub use pipeline::{Pipeline, PipelineError, RetryPolicy, RunReport, TaskId};
pub use provider::WeatherProvider;
pub use scheduler::Scheduler;
pub use snapshot::{Clock, FixedClock, SnapshotWriter, SystemClock};
pub use storage::ObjectStore;
pub use transform::transform;
