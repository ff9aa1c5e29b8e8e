//! Configuration validation utilities and rules

use crate::{
    error::{AppError, Result},
    models::Config,
    servers::ServerCatalog,
};
use colored::Colorize;

/// Configuration validator for settings that are legal but questionable
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration and collect warnings for risky settings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_server(config)?);
        warnings.extend(Self::validate_endpoints(config)?);
        warnings.extend(Self::validate_transfer_settings(config));
        warnings.extend(Self::validate_latency_settings(config));
        Ok(warnings)
    }

    /// The named server must exist unless both endpoints are overridden
    fn validate_server(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();
        let catalog = ServerCatalog::builtin();
        let overridden = config.download_url.is_some() && config.upload_url.is_some();

        match catalog.find(&config.server) {
            Some(server) => {
                if !server.has_upload() && config.upload_url.is_none() {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!(
                            "Server '{}' has no upload endpoint; uploads go to {}",
                            server.name,
                            crate::defaults::DEFAULT_UPLOAD_URL
                        ),
                    ));
                }
            }
            None if overridden => {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Server '{}' is not built in; using the endpoint overrides", config.server),
                ));
            }
            None => {
                catalog.get(&config.server)?;
            }
        }

        Ok(warnings)
    }

    /// Check endpoint overrides for conditions that distort measurements
    fn validate_endpoints(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        for url in [&config.download_url, &config.upload_url].into_iter().flatten() {
            let parsed = url::Url::parse(url)
                .map_err(|e| AppError::config(format!("Invalid URL '{}': {}", url, e)))?;

            if parsed.scheme() == "http" {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("URL '{}' uses HTTP; proxies on the path may cache or compress transfers", url),
                ));
            }

            let local = match parsed.host() {
                Some(url::Host::Ipv4(ip)) => ip.is_private() || ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                Some(url::Host::Domain(domain)) => domain == "localhost",
                None => false,
            };
            if local {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("URL '{}' targets a private/local network; results will not reflect the internet link", url),
                ));
            }
        }

        Ok(warnings)
    }

    fn validate_transfer_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.concurrent_streams == 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "A single stream rarely saturates a fast link (recommended: >= 4)".to_string(),
            ));
        } else if config.concurrent_streams > 16 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} streams may be throttled by the server", config.concurrent_streams),
            ));
        }

        if config.download_bytes_per_stream < 1_000_000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Download of {} bytes per stream is too short for TCP to ramp up",
                    config.download_bytes_per_stream
                ),
            ));
        }

        let total = config.probe_config().expected_download_bytes();
        if total > 1_000_000_000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Download phase will transfer {} MB", total / 1_000_000),
            ));
        }

        if config.tick_interval_ms < 20 || config.upload_tick_interval_ms < 20 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Sampling faster than every 20ms produces noisy throughput history".to_string(),
            ));
        }

        if config.min_upload_duration_ms < 1000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Minimum upload duration of {}ms may not produce a stable upload figure",
                    config.min_upload_duration_ms
                ),
            ));
        }

        warnings
    }

    fn validate_latency_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        match config.latency_sample_count {
            0 => warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "No latency probes configured; ping, jitter and packet loss will be missing".to_string(),
            )),
            1 => warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Jitter needs at least 2 latency probes".to_string(),
            )),
            2..=4 => warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "{} latency probes give a coarse packet loss figure",
                    config.latency_sample_count
                ),
            )),
            _ => {}
        }

        if config.timeout_seconds < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Timeout of {}s may cut off slow transfers", config.timeout_seconds),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            let tag = match self.level {
                ValidationLevel::Info => tag.blue(),
                ValidationLevel::Warning => tag.yellow(),
            };
            format!("{} {}", tag, self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
