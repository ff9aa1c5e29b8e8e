//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; existing variables win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Speed Probe Configuration
#
# Values specified here are used as defaults and can be overridden by
# command-line arguments.

# Built-in server: Cloudflare, Hetzner or OVH
# SPEED_SERVER=Cloudflare

# Endpoint overrides (the download endpoint must honour ?bytes=N)
# DOWNLOAD_URL=https://speed.cloudflare.com/__down
# UPLOAD_URL=https://speed.cloudflare.com/__up

# Simultaneous streams per transfer phase (1-32)
# CONCURRENT_STREAMS=4

# Bytes requested by each download stream
# DOWNLOAD_BYTES_PER_STREAM=25000000

# Size of every upload chunk in bytes (at most 52428800)
# UPLOAD_CHUNK_BYTES=1048576

# Download and upload sampling intervals in milliseconds
# TICK_INTERVAL_MS=60
# UPLOAD_TICK_INTERVAL_MS=50

# Upload runs until both minimums are reached
# MIN_UPLOAD_DURATION_MS=3000
# MIN_UPLOAD_BYTES=5242880

# Latency probes after the warm-up (0-100) and the pause between them
# LATENCY_SAMPLE_COUNT=10
# LATENCY_DELAY_MS=50

# Request timeout in seconds (1-300)
# TIMEOUT_SECONDS=30

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example: quick check on a slow link
# CONCURRENT_STREAMS=2
# DOWNLOAD_BYTES_PER_STREAM=5000000
# MIN_UPLOAD_DURATION_MS=1500
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;
        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "SPEED_SERVER" => {
                if value.is_empty() {
                    return Err(AppError::config("SPEED_SERVER cannot be empty"));
                }
            }
            "DOWNLOAD_URL" | "UPLOAD_URL" => {
                let parsed = url::Url::parse(value)
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
                }
            }
            "CONCURRENT_STREAMS" => {
                Self::check_range::<u32>(key, value, 1, 32)?;
            }
            "LATENCY_SAMPLE_COUNT" => {
                Self::check_range::<u32>(key, value, 0, 100)?;
            }
            "UPLOAD_CHUNK_BYTES" => {
                Self::check_range::<u64>(key, value, 1, crate::defaults::MAX_UPLOAD_CHUNK_BYTES)?;
            }
            "DOWNLOAD_BYTES_PER_STREAM" | "TICK_INTERVAL_MS" | "UPLOAD_TICK_INTERVAL_MS" => {
                Self::check_range::<u64>(key, value, 1, u64::MAX)?;
            }
            "MIN_UPLOAD_DURATION_MS" | "MIN_UPLOAD_BYTES" | "LATENCY_DELAY_MS" => {
                Self::check_range::<u64>(key, value, 0, u64::MAX)?;
            }
            "TIMEOUT_SECONDS" => {
                Self::check_range::<u64>(key, value, 1, 300)?;
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    fn check_range<T>(key: &str, value: &str, min: T, max: T) -> Result<()>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let parsed: T = value
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
        if parsed < min || parsed > max {
            return Err(AppError::config(format!(
                "{} must be between {} and {}, got: {}",
                key, min, max, parsed
            )));
        }
        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SPEED_SERVER", "Built-in server name", "Cloudflare"),
            ("DOWNLOAD_URL", "Download endpoint override", "https://speed.cloudflare.com/__down"),
            ("UPLOAD_URL", "Upload endpoint override", "https://speed.cloudflare.com/__up"),
            ("CONCURRENT_STREAMS", "Streams per transfer phase (1-32)", "4"),
            ("DOWNLOAD_BYTES_PER_STREAM", "Bytes requested per download stream", "25000000"),
            ("UPLOAD_CHUNK_BYTES", "Upload chunk size in bytes", "1048576"),
            ("TICK_INTERVAL_MS", "Download sampling interval", "60"),
            ("UPLOAD_TICK_INTERVAL_MS", "Upload sampling interval", "50"),
            ("MIN_UPLOAD_DURATION_MS", "Minimum upload duration", "3000"),
            ("MIN_UPLOAD_BYTES", "Minimum upload volume", "5242880"),
            ("LATENCY_SAMPLE_COUNT", "Latency probes (0-100)", "10"),
            ("LATENCY_DELAY_MS", "Pause between latency probes", "50"),
            ("TIMEOUT_SECONDS", "Request timeout in seconds (1-300)", "30"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the lines of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}
