use std::path::Path;

use crate::config::schema::{ServiceConfig, MAX_BATCH_SIZE};
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = serde_json::from_str(content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

/// Applies `REFRAME_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("REFRAME_REMOTE_URL") {
        config.remote.base_url = url;
    }

    if let Some(value) = lookup("REFRAME_MAX_CONCURRENT_JOBS") {
        config.queue.max_concurrent_jobs =
            value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "REFRAME_MAX_CONCURRENT_JOBS".to_string(),
                value: value.clone(),
            })?;
    }

    if let Some(level) = lookup("REFRAME_LOG_LEVEL") {
        config.logging.level = level;
    }

    Ok(())
}

fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    let remote = &config.remote;
    if !remote.base_url.starts_with("http://") && !remote.base_url.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!("remote.base_url must be an http(s) URL: {}", remote.base_url),
        });
    }

    if remote.max_retries == 0 {
        return Err(ConfigError::Validation {
            message: "remote.max_retries must be at least 1".to_string(),
        });
    }

    if remote.timeout_ms == 0 || remote.health_check_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "remote timeouts and intervals must be greater than zero".to_string(),
        });
    }

    if remote.pool_size == 0 {
        return Err(ConfigError::Validation {
            message: "remote.pool_size must be at least 1".to_string(),
        });
    }

    let conversion = &config.conversion;
    if conversion.max_upscale_factor.is_nan() || conversion.max_upscale_factor < 1.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "conversion.max_upscale_factor must be >= 1.0, got {}",
                conversion.max_upscale_factor
            ),
        });
    }

    if !(1..=100).contains(&conversion.jpeg_quality) {
        return Err(ConfigError::Validation {
            message: format!(
                "conversion.jpeg_quality must be within 1..=100, got {}",
                conversion.jpeg_quality
            ),
        });
    }

    if !(0.0..=1.0).contains(&conversion.confidence_threshold) {
        return Err(ConfigError::Validation {
            message: "conversion.confidence_threshold must be within 0..=1".to_string(),
        });
    }

    let queue = &config.queue;
    if queue.max_concurrent_jobs == 0 || queue.per_image_concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "queue concurrency limits must be at least 1".to_string(),
        });
    }

    if queue.per_image_concurrency > MAX_BATCH_SIZE {
        return Err(ConfigError::Validation {
            message: format!(
                "queue.per_image_concurrency cannot exceed the batch limit of {}",
                MAX_BATCH_SIZE
            ),
        });
    }

    if queue.per_image_timeout_ms == 0 {
        return Err(ConfigError::Validation {
            message: "queue.per_image_timeout_ms must be greater than zero".to_string(),
        });
    }

    Ok(())
}
