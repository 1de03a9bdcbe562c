use serde::Deserialize;
use std::time::Duration;

const DEFAULT_WORKER_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Directory where uploaded photos wait for the worker
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Number of concurrent photo workers per process
    #[serde(default = "default_worker_count")]
    pub worker_count: i64,

    /// Delay between claim attempts, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single image store call, in seconds
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// How many times a worker tries to record a successful upload
    #[serde(default = "default_ready_update_attempts")]
    pub ready_update_attempts: u32,

    /// Prometheus listener for the worker process
    pub worker_metrics_addr: Option<String>,

    /// R2 bucket name
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    /// Public base URL the bucket is served from
    pub r2_public_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upload_dir() -> String {
    "storage/tmp".to_string()
}

fn default_worker_count() -> i64 {
    DEFAULT_WORKER_COUNT as i64
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_upload_timeout_secs() -> u64 {
    60
}

fn default_ready_update_attempts() -> u32 {
    3
}

/// Image store credentials, all optional so the service can boot without
/// them. A missing value surfaces when a worker builds its processor.
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_url: Option<String>,
}

/// Tuning for the dispatcher and its worker pool.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub upload_timeout: Duration,
    pub ready_update_attempts: u32,
    pub ready_update_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            upload_timeout: Duration::from_secs(default_upload_timeout_secs()),
            ready_update_attempts: default_ready_update_attempts(),
            ready_update_backoff: Duration::from_millis(200),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        let worker_count = if self.worker_count <= 0 {
            DEFAULT_WORKER_COUNT
        } else {
            self.worker_count as usize
        };

        WorkerSettings {
            worker_count,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            upload_timeout: Duration::from_secs(self.upload_timeout_secs.max(1)),
            ready_update_attempts: self.ready_update_attempts.max(1),
            ..WorkerSettings::default()
        }
    }

    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            bucket: self.r2_bucket.clone(),
            endpoint: self.r2_endpoint.clone(),
            access_key: self.r2_access_key.clone(),
            secret_key: self.r2_secret_key.clone(),
            public_url: self.r2_public_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        envy::from_iter(vars).unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/reports")]);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.upload_dir, "storage/tmp");
        assert!(config.r2_bucket.is_none());

        let settings = config.worker_settings();
        assert_eq!(settings.worker_count, 5);
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.upload_timeout, Duration::from_secs(60));
        assert_eq!(settings.ready_update_attempts, 3);
    }

    #[test]
    fn test_non_positive_worker_count_falls_back() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/reports"),
            ("WORKER_COUNT", "0"),
        ]);
        assert_eq!(config.worker_settings().worker_count, 5);

        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/reports"),
            ("WORKER_COUNT", "-2"),
        ]);
        assert_eq!(config.worker_settings().worker_count, 5);
    }

    #[test]
    fn test_worker_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/reports"),
            ("WORKER_COUNT", "8"),
            ("POLL_INTERVAL_MS", "250"),
            ("UPLOAD_TIMEOUT_SECS", "15"),
            ("READY_UPDATE_ATTEMPTS", "5"),
        ]);
        let settings = config.worker_settings();
        assert_eq!(settings.worker_count, 8);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.upload_timeout, Duration::from_secs(15));
        assert_eq!(settings.ready_update_attempts, 5);
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        let vars: Vec<(String, String)> = Vec::new();
        assert!(envy::from_iter::<_, AppConfig>(vars).is_err());
    }
}
