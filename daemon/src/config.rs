use std::time::Duration;

use worker::types::ProcessorConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Listen address for the admin API.
    pub http_listen_addr: String,

    // =========================
    // Processor configuration
    // =========================
    /// Hard deadline for a single work-item execution.
    ///
    /// Long enough for a full broker sync, short enough that a wedged
    /// handler cannot block the worker forever.
    pub work_timeout: Duration,

    /// Maximum retries per work item; the initial attempt is not counted.
    pub max_retries: u32,

    /// Failsafe wake cadence. Interval-based work (rates, maintenance)
    /// runs off this tick even when no event arrives.
    pub periodic_trigger_interval: Duration,

    /// Minimum gap between JobProgress events per running item.
    pub progress_throttle: Duration,

    // =========================
    // Catalog configuration
    // =========================
    /// How often to look for a newer deployed version. The only work-type
    /// interval that is configuration-sourced; everything else is fixed in
    /// the catalog.
    pub deployment_check_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://portfolio_dev.db".to_string());

        let http_listen_addr =
            std::env::var("HTTP_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string());

        Self {
            database_url,
            http_listen_addr,

            work_timeout: Duration::from_secs(env_u64("WORK_TIMEOUT_SECS", 7 * 60)),
            max_retries: env_u64("WORK_MAX_RETRIES", 10) as u32,
            periodic_trigger_interval: Duration::from_secs(env_u64(
                "PERIODIC_TRIGGER_SECS",
                60,
            )),
            progress_throttle: Duration::from_millis(env_u64("PROGRESS_THROTTLE_MS", 250)),

            deployment_check_interval: Duration::from_secs(env_u64(
                "DEPLOYMENT_CHECK_SECS",
                5 * 60,
            )),
        }
    }

    pub fn processor(&self) -> ProcessorConfig {
        ProcessorConfig {
            work_timeout: self.work_timeout,
            max_retries: self.max_retries,
            periodic_trigger_interval: self.periodic_trigger_interval,
            progress_throttle: self.progress_throttle,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
