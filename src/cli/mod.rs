//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// Speed Probe - measure latency, jitter, packet loss and bandwidth
#[derive(Parser, Debug, Clone)]
#[command(name = "speedprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Built-in server to test against (see --list-servers)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Download endpoint override; `bytes=N` is appended per stream
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// Upload endpoint override
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,

    /// Number of simultaneous streams per transfer phase
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub streams: Option<u32>,

    /// Bytes requested by each download stream
    #[arg(long, value_name = "BYTES", value_parser = parse_positive_u64)]
    pub download_bytes: Option<u64>,

    /// Size of every upload chunk in bytes
    #[arg(long, value_name = "BYTES", value_parser = parse_positive_u64)]
    pub upload_chunk: Option<u64>,

    /// Number of latency probes after the warm-up
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub samples: Option<u32>,

    /// Delay between latency probes in milliseconds
    #[arg(long, value_name = "MS")]
    pub latency_delay: Option<u64>,

    /// Download sampling interval in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_positive_u64)]
    pub tick: Option<u64>,

    /// Upload sampling interval in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_positive_u64)]
    pub upload_tick: Option<u64>,

    /// Minimum upload duration in milliseconds
    #[arg(long, value_name = "MS")]
    pub min_upload_duration: Option<u64>,

    /// Minimum number of bytes to upload
    #[arg(long, value_name = "BYTES")]
    pub min_upload_bytes: Option<u64>,

    /// Request timeout in seconds
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Probe every built-in server once and rank them by latency
    #[arg(long)]
    pub list_servers: bool,

    /// Print the session result as JSON
    #[arg(long)]
    pub json: bool,

    /// Write an SVG summary card of the finished session
    #[arg(long, value_name = "PATH")]
    pub share_card: Option<PathBuf>,

    /// Write an example .env file and exit
    #[arg(long, value_name = "PATH")]
    pub write_env_example: Option<PathBuf>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

/// What a single invocation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Probe,
    ListServers,
    WriteEnvExample(PathBuf),
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.list_servers && self.write_env_example.is_some() {
            return Err("Cannot combine --list-servers with --write-env-example".to_string());
        }

        if self.share_card.is_some() && self.run_mode() != RunMode::Probe {
            return Err("--share-card requires a probe run".to_string());
        }

        for (flag, url) in [("--download-url", &self.download_url), ("--upload-url", &self.upload_url)] {
            if let Some(url) = url {
                if let Err(e) = url::Url::parse(url) {
                    return Err(format!("Invalid {} '{}': {}", flag, url, e));
                }
            }
        }

        Ok(())
    }

    pub fn run_mode(&self) -> RunMode {
        if let Some(path) = &self.write_env_example {
            RunMode::WriteEnvExample(path.clone())
        } else if self.list_servers {
            RunMode::ListServers
        } else {
            RunMode::Probe
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color || self.json {
            false
        } else {
            supports_color()
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Command-line overrides:\n");
        if let Some(ref server) = self.server {
            summary.push_str(&format!("  Server: {}\n", server));
        }
        if let Some(ref url) = self.download_url {
            summary.push_str(&format!("  Download URL: {}\n", url));
        }
        if let Some(ref url) = self.upload_url {
            summary.push_str(&format!("  Upload URL: {}\n", url));
        }
        if let Some(streams) = self.streams {
            summary.push_str(&format!("  Streams: {}\n", streams));
        }
        if let Some(samples) = self.samples {
            summary.push_str(&format!("  Latency samples: {}\n", samples));
        }
        if let Some(timeout) = self.timeout {
            summary.push_str(&format!("  Timeout: {}s\n", timeout));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Duration cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(value) => Ok(value),
        Err(_) => Err(format!("Invalid number: {}", s)),
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
