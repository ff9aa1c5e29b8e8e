//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Build the configuration: defaults, then `.env`, then environment, then flags
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(ref server) = cli.server {
            config.server = server.clone();
        }
        if let Some(ref url) = cli.download_url {
            config.download_url = Some(url.clone());
        }
        if let Some(ref url) = cli.upload_url {
            config.upload_url = Some(url.clone());
        }
        if let Some(streams) = cli.streams {
            config.concurrent_streams = streams;
        }
        if let Some(bytes) = cli.download_bytes {
            config.download_bytes_per_stream = bytes;
        }
        if let Some(bytes) = cli.upload_chunk {
            config.upload_chunk_bytes = bytes;
        }
        if let Some(samples) = cli.samples {
            config.latency_sample_count = samples;
        }
        if let Some(delay) = cli.latency_delay {
            config.latency_delay_ms = delay;
        }
        if let Some(tick) = cli.tick {
            config.tick_interval_ms = tick;
        }
        if let Some(tick) = cli.upload_tick {
            config.upload_tick_interval_ms = tick;
        }
        if let Some(duration) = cli.min_upload_duration {
            config.min_upload_duration_ms = duration;
        }
        if let Some(bytes) = cli.min_upload_bytes {
            config.min_upload_bytes = bytes;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }

        if cli.color {
            config.enable_color = true;
        } else if cli.no_color || cli.json {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!(
                "Final config: server={}, streams={}, samples={}, timeout={}s",
                config.server, config.concurrent_streams, config.latency_sample_count, config.timeout_seconds
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Server: {}", config.server));
    if let Some(ref url) = config.download_url {
        summary.push(format!("Download URL: {}", url));
    }
    if let Some(ref url) = config.upload_url {
        summary.push(format!("Upload URL: {}", url));
    }
    summary.push(format!("Streams: {}", config.concurrent_streams));
    summary.push(format!("Download per stream: {} bytes", config.download_bytes_per_stream));
    summary.push(format!("Upload chunk: {} bytes", config.upload_chunk_bytes));
    summary.push(format!(
        "Upload minimum: {}ms / {} bytes",
        config.min_upload_duration_ms, config.min_upload_bytes
    ));
    summary.push(format!(
        "Latency probes: {} ({}ms apart)",
        config.latency_sample_count, config.latency_delay_ms
    ));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
