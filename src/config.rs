//! Configuration module for the submission pipeline
//!
//! Handles configuration loading from TOML files and environment, and maps
//! the file layout onto the component-level config types.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::connection::PoolConfig;
use crate::pipeline::PipelineOptions;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Submission endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Priority fee bounds
    #[serde(default)]
    pub fees: FeeConfig,

    /// Signing pool
    #[serde(default)]
    pub signing: SigningConfig,

    /// Result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-submission behavior
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Static list of endpoint URLs
    pub urls: Vec<String>,

    /// Per-request transport timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Background health probe interval in seconds
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Consecutive failures before an endpoint is evicted from rotation
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    /// Initial reconnect cooldown in milliseconds
    #[serde(default = "default_reconnect_initial_backoff")]
    pub reconnect_initial_backoff_ms: u64,

    /// Reconnect cooldown ceiling in milliseconds
    #[serde(default = "default_reconnect_max_backoff")]
    pub reconnect_max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_min_fee")]
    pub min_fee: u64,

    #[serde(default = "default_max_fee")]
    pub max_fee: u64,

    /// Linear scale applied to the congestion signal
    #[serde(default = "default_congestion_multiplier")]
    pub congestion_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Path to keypair file (raw 32/64 bytes or JSON array)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,

    /// Number of signing worker threads
    #[serde(default = "default_signing_workers")]
    pub workers: usize,

    /// Pending jobs accepted before the pool sheds load
    #[serde(default = "default_signing_queue_depth")]
    pub queue_depth: usize,

    /// Deadline for one signing round-trip in milliseconds
    #[serde(default = "default_sign_timeout")]
    pub sign_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries retained before least-recently-touched eviction kicks in
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Submit attempts before transient failures give up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_backoff")]
    pub retry_initial_backoff_ms: u64,

    #[serde(default = "default_retry_max_backoff")]
    pub retry_max_backoff_ms: u64,

    /// Aggregation threshold for the critical-path pass
    #[serde(default = "default_aggregate_threshold")]
    pub aggregate_threshold: u64,

    /// Congestion level used when no live signal source is wired in
    #[serde(default = "default_static_congestion")]
    pub static_congestion: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_request_timeout() -> u64 {
    10
}
fn default_health_check_interval() -> u64 {
    30
}
fn default_failure_threshold() -> u64 {
    3
}
fn default_reconnect_initial_backoff() -> u64 {
    500
}
fn default_reconnect_max_backoff() -> u64 {
    30_000
}
fn default_min_fee() -> u64 {
    crate::fee::DEFAULT_MIN_FEE
}
fn default_max_fee() -> u64 {
    crate::fee::DEFAULT_MAX_FEE
}
fn default_congestion_multiplier() -> f64 {
    crate::fee::DEFAULT_CONGESTION_MULTIPLIER
}
fn default_keypair_path() -> String {
    "keys/signer.json".to_string()
}
fn default_signing_workers() -> usize {
    4
}
fn default_signing_queue_depth() -> usize {
    64
}
fn default_sign_timeout() -> u64 {
    2_000
}
fn default_cache_capacity() -> usize {
    1_024
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_initial_backoff() -> u64 {
    100
}
fn default_retry_max_backoff() -> u64 {
    5_000
}
fn default_aggregate_threshold() -> u64 {
    crate::aggregator::DEFAULT_SAMPLE_THRESHOLD
}
fn default_static_congestion() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9_090
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:8080".to_string()],
            request_timeout_secs: default_request_timeout(),
            health_check_interval_secs: default_health_check_interval(),
            failure_threshold: default_failure_threshold(),
            reconnect_initial_backoff_ms: default_reconnect_initial_backoff(),
            reconnect_max_backoff_ms: default_reconnect_max_backoff(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            min_fee: default_min_fee(),
            max_fee: default_max_fee(),
            congestion_multiplier: default_congestion_multiplier(),
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
            workers: default_signing_workers(),
            queue_depth: default_signing_queue_depth(),
            sign_timeout_ms: default_sign_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_initial_backoff_ms: default_retry_initial_backoff(),
            retry_max_backoff_ms: default_retry_max_backoff(),
            aggregate_threshold: default_aggregate_threshold(),
            static_congestion: default_static_congestion(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointsConfig::default(),
            fees: FeeConfig::default(),
            signing: SigningConfig::default(),
            cache: CacheConfig::default(),
            submission: SubmissionConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Reject configurations no component could run with
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.urls.is_empty() {
            anyhow::bail!("endpoints.urls must not be empty");
        }
        if self.endpoints.urls.iter().any(|u| u.trim().is_empty()) {
            anyhow::bail!("endpoints.urls must not contain blank entries");
        }
        if self.fees.min_fee > self.fees.max_fee {
            anyhow::bail!(
                "fees.min_fee {} exceeds fees.max_fee {}",
                self.fees.min_fee,
                self.fees.max_fee
            );
        }
        if !self.fees.congestion_multiplier.is_finite() || self.fees.congestion_multiplier < 0.0 {
            anyhow::bail!(
                "fees.congestion_multiplier {} must be finite and non-negative",
                self.fees.congestion_multiplier
            );
        }
        if self.signing.workers == 0 {
            anyhow::bail!("signing.workers must be at least 1");
        }
        if self.signing.queue_depth == 0 {
            anyhow::bail!("signing.queue_depth must be at least 1");
        }
        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be at least 1");
        }
        if self.submission.max_attempts == 0 {
            anyhow::bail!("submission.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            failure_threshold: self.endpoints.failure_threshold,
            health_check_interval: Duration::from_secs(self.endpoints.health_check_interval_secs),
            reconnect_initial_backoff_ms: self.endpoints.reconnect_initial_backoff_ms,
            reconnect_max_backoff_ms: self.endpoints.reconnect_max_backoff_ms,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            sign_timeout: Duration::from_millis(self.signing.sign_timeout_ms),
            max_submit_attempts: self.submission.max_attempts,
            retry_initial_backoff_ms: self.submission.retry_initial_backoff_ms,
            retry_max_backoff_ms: self.submission.retry_max_backoff_ms,
        }
    }
}
