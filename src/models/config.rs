//! Configuration data model and validation

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the built-in speed test server to use
    #[serde(default = "default_server")]
    pub server: String,

    /// Download endpoint override; the `bytes` query parameter is appended per stream
    #[serde(default)]
    pub download_url: Option<String>,

    /// Upload endpoint override
    #[serde(default)]
    pub upload_url: Option<String>,

    /// Number of simultaneous transfer streams per phase
    #[serde(default = "default_concurrent_streams")]
    pub concurrent_streams: u32,

    /// Bytes requested by each download stream
    #[serde(default = "default_download_bytes_per_stream")]
    pub download_bytes_per_stream: u64,

    /// Size of every upload chunk
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: u64,

    /// Download sampling interval in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upload sampling interval in milliseconds
    #[serde(default = "default_upload_tick_interval_ms")]
    pub upload_tick_interval_ms: u64,

    /// Upload keeps running at least this long
    #[serde(default = "default_min_upload_duration_ms")]
    pub min_upload_duration_ms: u64,

    /// Upload keeps running until at least this many bytes were sent
    #[serde(default = "default_min_upload_bytes")]
    pub min_upload_bytes: u64,

    /// Number of latency probes after the warm-up
    #[serde(default = "default_latency_sample_count")]
    pub latency_sample_count: u32,

    /// Delay between consecutive latency probes in milliseconds
    #[serde(default = "default_latency_delay_ms")]
    pub latency_delay_ms: u64,

    /// Request timeout duration
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            download_url: None,
            upload_url: None,
            concurrent_streams: default_concurrent_streams(),
            download_bytes_per_stream: default_download_bytes_per_stream(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            tick_interval_ms: default_tick_interval_ms(),
            upload_tick_interval_ms: default_upload_tick_interval_ms(),
            min_upload_duration_ms: default_min_upload_duration_ms(),
            min_upload_bytes: default_min_upload_bytes(),
            latency_sample_count: default_latency_sample_count(),
            latency_delay_ms: default_latency_delay_ms(),
            timeout_seconds: default_timeout_secs(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(AppError::config("Server name cannot be empty"));
        }

        for (label, url) in [("download", &self.download_url), ("upload", &self.upload_url)] {
            if let Some(url) = url {
                match url::Url::parse(url) {
                    Ok(parsed) => {
                        if parsed.scheme() != "http" && parsed.scheme() != "https" {
                            return Err(AppError::config(format!(
                                "The {} URL must use http or https: {}",
                                label, url
                            )));
                        }
                    }
                    Err(e) => {
                        return Err(AppError::config(format!("Invalid {} URL '{}': {}", label, url, e)));
                    }
                }
            }
        }

        if self.concurrent_streams > 32 {
            return Err(AppError::config("Concurrent streams cannot exceed 32"));
        }

        if self.latency_sample_count > 100 {
            return Err(AppError::config("Latency sample count cannot exceed 100"));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > 300 {
            return Err(AppError::config("Timeout cannot exceed 300 seconds"));
        }

        self.probe_config().validate()
    }

    /// Session configuration derived from these settings
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::from(self)
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server) = std::env::var("SPEED_SERVER") {
            if !server.trim().is_empty() {
                self.server = server.trim().to_string();
            }
        }

        if let Ok(url) = std::env::var("DOWNLOAD_URL") {
            if !url.trim().is_empty() {
                self.download_url = Some(url.trim().to_string());
            }
        }

        if let Ok(url) = std::env::var("UPLOAD_URL") {
            if !url.trim().is_empty() {
                self.upload_url = Some(url.trim().to_string());
            }
        }

        merge_number("CONCURRENT_STREAMS", &mut self.concurrent_streams)?;
        merge_number("DOWNLOAD_BYTES_PER_STREAM", &mut self.download_bytes_per_stream)?;
        merge_number("UPLOAD_CHUNK_BYTES", &mut self.upload_chunk_bytes)?;
        merge_number("TICK_INTERVAL_MS", &mut self.tick_interval_ms)?;
        merge_number("UPLOAD_TICK_INTERVAL_MS", &mut self.upload_tick_interval_ms)?;
        merge_number("MIN_UPLOAD_DURATION_MS", &mut self.min_upload_duration_ms)?;
        merge_number("MIN_UPLOAD_BYTES", &mut self.min_upload_bytes)?;
        merge_number("LATENCY_SAMPLE_COUNT", &mut self.latency_sample_count)?;
        merge_number("LATENCY_DELAY_MS", &mut self.latency_delay_ms)?;
        merge_number("TIMEOUT_SECONDS", &mut self.timeout_seconds)?;

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

fn merge_number<T>(name: &str, target: &mut T) -> Result<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value.trim().parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", name, value, e)))?;
    }
    Ok(())
}

/// Configuration of a single probe session
///
/// All durations are already converted from their millisecond settings. A session
/// validates its configuration before the first phase starts; an invalid value is a
/// scheduler fault and no transfer is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Number of simultaneous streams per transfer phase
    pub concurrent_streams: u32,
    /// Bytes requested by each download stream
    pub download_bytes_per_stream: u64,
    /// Fixed size of every upload chunk
    pub upload_chunk_bytes: u64,
    /// Download sampling interval
    pub tick_interval: Duration,
    /// Upload sampling interval
    pub upload_tick_interval: Duration,
    /// Upload runs at least this long
    pub min_upload_duration: Duration,
    /// Upload runs until at least this many bytes were sent
    pub min_upload_bytes: u64,
    /// Latency probes after the warm-up
    pub latency_sample_count: u32,
    /// Pause between latency probes
    pub latency_delay: Duration,
    /// Per-request timeout applied by the transport
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::from(&Config::default())
    }
}

impl From<&Config> for ProbeConfig {
    fn from(config: &Config) -> Self {
        Self {
            concurrent_streams: config.concurrent_streams,
            download_bytes_per_stream: config.download_bytes_per_stream,
            upload_chunk_bytes: config.upload_chunk_bytes,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            upload_tick_interval: Duration::from_millis(config.upload_tick_interval_ms),
            min_upload_duration: Duration::from_millis(config.min_upload_duration_ms),
            min_upload_bytes: config.min_upload_bytes,
            latency_sample_count: config.latency_sample_count,
            latency_delay: Duration::from_millis(config.latency_delay_ms),
            request_timeout: config.timeout(),
        }
    }
}

impl ProbeConfig {
    /// Check the values a session cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.concurrent_streams == 0 {
            return Err(AppError::config("Concurrent streams must be greater than 0"));
        }

        if self.download_bytes_per_stream == 0 {
            return Err(AppError::config("Download bytes per stream must be greater than 0"));
        }

        if self.upload_chunk_bytes == 0 {
            return Err(AppError::config("Upload chunk size must be greater than 0"));
        }

        if self.upload_chunk_bytes > crate::defaults::MAX_UPLOAD_CHUNK_BYTES {
            return Err(AppError::config(format!(
                "Upload chunk size cannot exceed {} bytes",
                crate::defaults::MAX_UPLOAD_CHUNK_BYTES
            )));
        }

        if self.tick_interval.is_zero() || self.upload_tick_interval.is_zero() {
            return Err(AppError::config("Tick interval must be greater than 0"));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::config("Request timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Bytes the download phase expects in total across all streams
    pub fn expected_download_bytes(&self) -> u64 {
        self.download_bytes_per_stream
            .saturating_mul(self.concurrent_streams as u64)
    }
}

// Default value functions for serde
fn default_server() -> String {
    crate::defaults::DEFAULT_SERVER.to_string()
}

fn default_concurrent_streams() -> u32 {
    crate::defaults::DEFAULT_CONCURRENT_STREAMS
}

fn default_download_bytes_per_stream() -> u64 {
    crate::defaults::DEFAULT_DOWNLOAD_BYTES_PER_STREAM
}

fn default_upload_chunk_bytes() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_CHUNK_BYTES
}

fn default_tick_interval_ms() -> u64 {
    crate::defaults::DEFAULT_TICK_INTERVAL_MS
}

fn default_upload_tick_interval_ms() -> u64 {
    crate::defaults::DEFAULT_UPLOAD_TICK_INTERVAL_MS
}

fn default_min_upload_duration_ms() -> u64 {
    crate::defaults::DEFAULT_MIN_UPLOAD_DURATION_MS
}

fn default_min_upload_bytes() -> u64 {
    crate::defaults::DEFAULT_MIN_UPLOAD_BYTES
}

fn default_latency_sample_count() -> u32 {
    crate::defaults::DEFAULT_LATENCY_SAMPLE_COUNT
}

fn default_latency_delay_ms() -> u64 {
    crate::defaults::DEFAULT_LATENCY_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
