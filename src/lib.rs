//! Speed Probe
//!
//! A concurrent bandwidth-probe and network-quality-assessment engine. A probe
//! session measures latency with sequential round trips, then drives several
//! simultaneous download and upload streams, aggregates their byte counters into
//! throughput samples and classifies the outcome into quality tiers for streaming,
//! gaming and video conferencing.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod servers;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use client::{HttpTransport, Transport};
pub use executor::{NullObserver, ProbeScheduler, SessionObserver};
pub use models::{Config, ProbeConfig, SessionResult};
pub use stats::{StatisticsEngine, LatencyStatistics, QualityClassifier};
pub use types::{QualityTier, SessionPhase, UseCase};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata set by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SERVER: &str = "Cloudflare";
    pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down";
    pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";

    pub const DEFAULT_CONCURRENT_STREAMS: u32 = 4;
    pub const DEFAULT_DOWNLOAD_BYTES_PER_STREAM: u64 = 25_000_000;
    pub const DEFAULT_UPLOAD_CHUNK_BYTES: u64 = 1024 * 1024;
    pub const MAX_UPLOAD_CHUNK_BYTES: u64 = 50 * 1024 * 1024;

    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 60;
    pub const DEFAULT_UPLOAD_TICK_INTERVAL_MS: u64 = 50;
    pub const UPLOAD_MIN_SAMPLE_AGE: Duration = Duration::from_millis(200);

    pub const DEFAULT_MIN_UPLOAD_DURATION_MS: u64 = 3000;
    pub const DEFAULT_MIN_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

    pub const DEFAULT_LATENCY_SAMPLE_COUNT: u32 = 10;
    pub const DEFAULT_LATENCY_DELAY_MS: u64 = 50;

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const SERVER_PING_TIMEOUT: Duration = Duration::from_secs(3);
    /// Longest a single download stream may run before it is cut short
    pub const DOWNLOAD_STREAM_CAP: Duration = Duration::from_secs(60);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
