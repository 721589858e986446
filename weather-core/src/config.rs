use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::pipeline::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_CITY: &str = "Pune";
pub const DEFAULT_BUCKET: &str = "weatherapiairflowproject-yml";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Weather API endpoint and credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub city: String,
    pub api_key: String,
    /// Per-request limit, connect through body.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            city: DEFAULT_CITY.to_string(),
            api_key: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("city", &self.city)
            .field("api_key", &redacted(!self.api_key.is_empty()))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Local,
}

/// Where snapshots go.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack, ...).
    pub endpoint_url: Option<String>,
    /// Root directory for `backend = "local"`.
    pub local_root: PathBuf,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            local_root: PathBuf::from("snapshots"),
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("local_root", &self.local_root)
            .field("access_key_id", &redacted(self.access_key_id.is_some()))
            .field("secret_access_key", &redacted(self.secret_access_key.is_some()))
            .finish()
    }
}

/// A static access key pair for the storage client.
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StorageConfig {
    /// Both keys or neither: a lone key is a configuration mistake.
    pub fn credentials(&self) -> Result<Option<StaticCredentials>> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Ok(Some(StaticCredentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "Storage credentials are incomplete: \
                 set both access_key_id and secret_access_key, or neither.\n\
                 Hint: run `weather-etl configure` \
                 or set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY."
            )),
        }
    }
}

/// Readiness polling of the weather API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub poke_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            poke_interval_secs: 60,
            timeout_secs: 60 * 60 * 24 * 7,
        }
    }
}

impl SensorConfig {
    pub fn poke_interval(&self) -> Duration {
        Duration::from_secs(self.poke_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Scheduling and retry settings of the daily run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron expression; `@daily` runs at midnight UTC.
    pub schedule: String,
    pub catchup: bool,
    pub email_on_failure: bool,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub start_date: Option<NaiveDate>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            schedule: "@daily".to_string(),
            catchup: false,
            email_on_failure: false,
            retries: 2,
            retry_delay_secs: 120,
            start_date: None,
        }
    }
}

impl ScheduleConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [api]
/// city = "Pune"
/// api_key = "..."
///
/// [storage]
/// bucket = "..."
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub sensor: SensorConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-etl", "weather-etl")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENWEATHER_API_KEY") {
            self.api.api_key = v;
        }
        if let Some(v) = get("WEATHER_ETL_CITY") {
            self.api.city = v;
        }
        if let Some(v) = get("WEATHER_ETL_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("AWS_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(v);
        }
    }

    /// Reject configurations a run could never succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            bail!(
                "No OpenWeather API key configured.\n\
                 Hint: run `weather-etl configure` or set OPENWEATHER_API_KEY."
            );
        }
        if self.api.city.trim().is_empty() {
            bail!("No city configured.\nHint: set [api].city in the config file.");
        }
        if self.storage.bucket.trim().is_empty() {
            bail!("No bucket configured.\nHint: set [storage].bucket in the config file.");
        }
        if self.schedule.catchup {
            bail!("catchup = true is not supported: missed runs are never replayed.");
        }
        crate::scheduler::parse_schedule(&self.schedule.schedule)?;
        self.storage.credentials()?;

        Ok(())
    }
}

fn redacted(present: bool) -> &'static str {
    if present { "<redacted>" } else { "<unset>" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> Config {
        let mut cfg = Config::default();
        cfg.api.api_key = "OPEN_KEY".into();
        cfg
    }

    #[test]
    fn defaults_match_daily_schedule() {
        let cfg = Config::default();

        assert_eq!(cfg.api.city, "Pune");
        assert_eq!(cfg.schedule.schedule, "@daily");
        assert!(!cfg.schedule.catchup);
        assert!(!cfg.schedule.email_on_failure);

        let policy = cfg.schedule.retry_policy();
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_secs(120));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [api]
            api_key = "abc"

            [storage]
            backend = "local"
            local_root = "/tmp/snapshots"

            [schedule]
            start_date = "2024-05-20"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.api.api_key, "abc");
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.storage.backend, StorageBackend::Local);
        assert_eq!(cfg.storage.bucket, DEFAULT_BUCKET);
        assert_eq!(
            cfg.schedule.start_date,
            NaiveDate::from_ymd_opt(2024, 5, 20)
        );
        assert_eq!(cfg.sensor.poke_interval(), Duration::from_secs(60));
        assert_eq!(cfg.api.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = configured();
        cfg.storage.bucket = "my-bucket".into();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api.api_key, "OPEN_KEY");
        assert_eq!(loaded.storage.bucket, "my-bucket");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.api.api_key.is_empty());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENWEATHER_API_KEY", "ENV_KEY"),
            ("WEATHER_ETL_CITY", "Mumbai"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "SECRET"),
            ("AWS_REGION", ""),
        ]);

        let mut cfg = configured();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.api.api_key, "ENV_KEY");
        assert_eq!(cfg.api.city, "Mumbai");
        assert_eq!(cfg.storage.region, DEFAULT_REGION);
        assert!(cfg.storage.credentials().unwrap().is_some());
    }

    #[test]
    fn validate_requires_api_key() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("No OpenWeather API key configured"));
        assert!(err.to_string().contains("Hint: run `weather-etl configure`"));
    }

    #[test]
    fn validate_rejects_catchup() {
        let mut cfg = configured();
        cfg.schedule.catchup = true;
        assert!(cfg.validate().unwrap_err().to_string().contains("catchup"));
    }

    #[test]
    fn validate_rejects_half_credentials() {
        let mut cfg = configured();
        cfg.storage.access_key_id = Some("AKIA".into());

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("incomplete"));
    }

    #[test]
    fn validate_rejects_bad_cron() {
        let mut cfg = configured();
        cfg.schedule.schedule = "every day please".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_configured_defaults() {
        configured().validate().unwrap();
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut cfg = configured();
        cfg.storage.access_key_id = Some("AKIAEXAMPLE".into());
        cfg.storage.secret_access_key = Some("TOPSECRET".into());

        let dump = format!("{cfg:?}");
        assert!(!dump.contains("OPEN_KEY"));
        assert!(!dump.contains("AKIAEXAMPLE"));
        assert!(!dump.contains("TOPSECRET"));
        assert!(dump.contains("<redacted>"));
    }
}
