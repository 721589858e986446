use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use std::{path::PathBuf, sync::Arc};
use weather_etl_core::{
    Config, Pipeline, Scheduler, SnapshotWriter, StorageBackend, SystemClock,
    provider::provider_from_config, storage::store_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-etl", version, about = "Daily weather snapshot to object storage")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively write API and storage settings to the config file.
    Configure,

    /// Run the pipeline once, now.
    Run,

    /// Run the pipeline on its schedule until interrupted.
    Schedule,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(self.config),
            Command::Run => {
                let config = load_config(self.config.as_deref())?;
                let pipeline = build_pipeline(&config).await?;

                let report = pipeline.run_once().await?;
                println!("Snapshot saved: {}/{}", config.storage.bucket, report.key);
                println!(
                    "{}: {}, {:.2} °F (feels like {:.2} °F), humidity {}%",
                    report.record.city,
                    report.record.description,
                    report.record.temperature_f,
                    report.record.feels_like_f,
                    report.record.humidity,
                );
                Ok(())
            }
            Command::Schedule => {
                let config = load_config(self.config.as_deref())?;
                let pipeline = build_pipeline(&config).await?;
                let scheduler = Scheduler::from_config(&config.schedule)?;

                scheduler
                    .run(&pipeline, async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            tracing::error!(error = %e, "failed to listen for Ctrl-C");
                        }
                    })
                    .await
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_process_env();
    config.validate()?;
    Ok(config)
}

async fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let provider = provider_from_config(&config.api)?;
    let store = store_from_config(&config.storage).await?;
    let writer = SnapshotWriter::new(store, config.storage.bucket.clone(), Arc::new(SystemClock));

    tracing::info!(
        city = %config.api.city,
        bucket = %config.storage.bucket,
        backend = ?config.storage.backend,
        "pipeline configured"
    );

    Ok(Pipeline::new(
        provider,
        writer,
        config.sensor.clone(),
        config.schedule.retry_policy(),
    ))
}

fn configure(path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = match &path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    config.api.city = Text::new("City:").with_default(&config.api.city).prompt()?;
    config.api.api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let backends = vec!["s3", "local"];
    let backend = Select::new("Storage backend:", backends).prompt()?;
    config.storage.backend = match backend {
        "local" => StorageBackend::Local,
        _ => StorageBackend::S3,
    };
    config.storage.bucket = Text::new("Bucket:")
        .with_default(&config.storage.bucket)
        .prompt()?;

    match config.storage.backend {
        StorageBackend::S3 => {
            config.storage.region = Text::new("Region:")
                .with_default(&config.storage.region)
                .prompt()?;

            let access_key =
                Text::new("Access key id (empty to use the default AWS chain):").prompt()?;
            if access_key.trim().is_empty() {
                config.storage.access_key_id = None;
                config.storage.secret_access_key = None;
            } else {
                config.storage.access_key_id = Some(access_key.trim().to_string());
                config.storage.secret_access_key = Some(
                    Password::new("Secret access key:")
                        .without_confirmation()
                        .prompt()?,
                );
            }
        }
        StorageBackend::Local => {
            let root = Text::new("Local root directory:")
                .with_default(&config.storage.local_root.to_string_lossy())
                .prompt()?;
            config.storage.local_root = PathBuf::from(root);
        }
    }

    config.validate()?;

    let saved_to = match path {
        Some(path) => {
            config.save_to(&path)?;
            path
        }
        None => config.save()?,
    };
    println!("Configuration saved to {}", saved_to.display());

    Ok(())
}
