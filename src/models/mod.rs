//! Data models and structures for the speed probe

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, ProbeConfig};
pub use metrics::{
    LatencySample, LatencySummary, PhaseReport, QualityReport, QualityVerdict, SessionResult,
    StreamReport, ThroughputSample,
};
