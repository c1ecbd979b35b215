use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::imaging::params::CropStrategy;
use crate::logging::LogFormat;

/// Largest accepted input file.
pub const MAX_IMAGE_SIZE: u64 = 50 * 1024 * 1024;

/// Largest accepted number of files per job.
pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the remote processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per call, the first one included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_pool_size() -> usize {
    10
}

fn default_health_check_interval_ms() -> u64 {
    30_000
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            pool_size: default_pool_size(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Minimum long side of an output image, in pixels.
    #[serde(default = "default_min_output_size")]
    pub min_output_size: u32,
    #[serde(default = "default_max_upscale_factor")]
    pub max_upscale_factor: f64,
    #[serde(default)]
    pub crop_strategy: CropStrategy,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./processed")
}

fn default_min_output_size() -> u32 {
    1200
}

fn default_max_upscale_factor() -> f64 {
    2.0
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_output_size: default_min_output_size(),
            max_upscale_factor: default_max_upscale_factor(),
            crop_strategy: CropStrategy::default(),
            jpeg_quality: default_jpeg_quality(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_per_image_concurrency")]
    pub per_image_concurrency: usize,
    #[serde(default = "default_per_image_timeout_ms")]
    pub per_image_timeout_ms: u64,
}

fn default_max_concurrent_jobs() -> usize {
    3
}

fn default_per_image_concurrency() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_per_image_timeout_ms() -> u64 {
    120_000
}

impl QueueConfig {
    pub fn per_image_timeout(&self) -> Duration {
        Duration::from_millis(self.per_image_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            per_image_concurrency: default_per_image_concurrency(),
            per_image_timeout_ms: default_per_image_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_sheet_dir")]
    pub output_dir: PathBuf,
}

fn default_sheet_dir() -> PathBuf {
    PathBuf::from("./sheets")
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            output_dir: default_sheet_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
