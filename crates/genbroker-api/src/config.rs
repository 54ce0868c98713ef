//! API configuration.

use std::fmt;
use std::time::Duration;

use genbroker_models::DEFAULT_JOB_TTL_SECS;

/// API server configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second per client IP
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max request body size (base images travel inline)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Shared secret for the `auth` action
    pub master_password: Option<String>,
    /// TTL for Job and Status entries
    pub job_ttl_secs: u64,
    /// Publish submitted jobs to the Redis Streams queue
    pub queue_enabled: bool,
    /// How long shutdown waits for background record-sink writes
    pub shutdown_drain_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_body_size: 20 * 1024 * 1024, // 20MB
            environment: "development".to_string(),
            master_password: None,
            job_ttl_secs: DEFAULT_JOB_TTL_SECS,
            queue_enabled: false,
            shutdown_drain_timeout: Duration::from_secs(10),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: parse_env("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: parse_env("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: parse_env("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            max_body_size: parse_env("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            master_password: std::env::var("MASTER_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            job_ttl_secs: parse_env("JOB_TTL_SECS")
                .filter(|ttl: &u64| *ttl > 0)
                .unwrap_or(defaults.job_ttl_secs),
            queue_enabled: std::env::var("QUEUE_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            shutdown_drain_timeout: parse_env("SHUTDOWN_DRAIN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_drain_timeout),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("environment", &self.environment)
            .field("master_password", &self.master_password.as_ref().map(|_| "<redacted>"))
            .field("job_ttl_secs", &self.job_ttl_secs)
            .field("queue_enabled", &self.queue_enabled)
            .finish_non_exhaustive()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
