//! Samples, phase reports and session results

use crate::types::{QualityTier, TransferDirection, UseCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One latency probe outcome, recorded only during the latency phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySample {
    /// When the probe completed
    pub timestamp: DateTime<Utc>,

    /// Round-trip time in milliseconds, `0.0` for a lost probe
    pub rtt_ms: f64,

    /// Whether the probe got a response
    pub succeeded: bool,
}

impl LatencySample {
    /// A probe that completed after `rtt`
    pub fn success(rtt: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            rtt_ms: rtt.as_secs_f64() * 1000.0,
            succeeded: true,
        }
    }

    /// A probe that failed or timed out
    pub fn lost() -> Self {
        Self {
            timestamp: Utc::now(),
            rtt_ms: 0.0,
            succeeded: false,
        }
    }
}

/// Instantaneous aggregate throughput at one aggregator tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputSample {
    /// Milliseconds since the phase started
    pub elapsed_ms: u64,
    /// Aggregate rate across all streams in megabits per second
    pub mbps: f64,
}

impl ThroughputSample {
    pub fn new(elapsed: Duration, mbps: f64) -> Self {
        Self {
            elapsed_ms: elapsed.as_millis() as u64,
            mbps,
        }
    }
}

/// Final state of one stream slot after its phase joined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReport {
    pub index: usize,
    pub bytes: u64,
    /// Last transfer error recorded by the worker, if any
    pub error: Option<String>,
}

impl StreamReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of one transfer phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub direction: TransferDirection,

    /// Bytes moved by all streams together
    pub total_bytes: u64,

    /// Wall-clock duration from phase start to worker-pool join
    pub duration_ms: f64,

    /// Authoritative throughput; `None` when no byte was transferred
    pub mbps: Option<f64>,

    pub streams: Vec<StreamReport>,

    /// Tick-by-tick throughput history
    pub history: Vec<ThroughputSample>,
}

impl PhaseReport {
    /// Report for a phase that never ran
    pub fn empty(direction: TransferDirection) -> Self {
        Self {
            direction,
            total_bytes: 0,
            duration_ms: 0.0,
            mbps: None,
            streams: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Number of streams that ended with an error
    pub fn failed_streams(&self) -> usize {
        self.streams.iter().filter(|s| s.failed()).count()
    }

    /// Whether every stream of the phase failed
    pub fn all_streams_failed(&self) -> bool {
        !self.streams.is_empty() && self.failed_streams() == self.streams.len()
    }

    /// Highest tick estimate seen during the phase
    pub fn peak_mbps(&self) -> Option<f64> {
        self.history
            .iter()
            .map(|s| s.mbps)
            .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
    }
}

/// Headline latency figures over successful probes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Quality tier for one use case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityVerdict {
    pub use_case: UseCase,
    pub tier: QualityTier,
}

/// Tiers for all use cases of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub streaming: QualityTier,
    pub gaming: QualityTier,
    pub conferencing: QualityTier,
}

impl QualityReport {
    pub fn tier(&self, use_case: UseCase) -> QualityTier {
        match use_case {
            UseCase::Streaming => self.streaming,
            UseCase::Gaming => self.gaming,
            UseCase::Conferencing => self.conferencing,
        }
    }

    pub fn verdicts(&self) -> Vec<QualityVerdict> {
        UseCase::ALL
            .iter()
            .map(|&use_case| QualityVerdict { use_case, tier: self.tier(use_case) })
            .collect()
    }
}

/// Everything a finished probe session produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    /// Correlation id of the session
    pub session_id: String,

    /// Server the session ran against, when known
    pub server: Option<String>,

    /// Mean/min/max round-trip time in milliseconds
    pub latency: LatencySummary,

    pub jitter_ms: Option<f64>,

    pub packet_loss_pct: f64,

    pub download_mbps: Option<f64>,

    pub upload_mbps: Option<f64>,

    pub quality: QualityReport,

    pub latency_samples: Vec<LatencySample>,

    pub download: PhaseReport,

    pub upload: PhaseReport,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl SessionResult {
    /// Headline latency shown to users: the fastest successful probe
    pub fn ping_ms(&self) -> Option<f64> {
        self.latency.min
    }

    /// Total session duration
    pub fn duration(&self) -> Duration {
        (self.completed_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Attach the name of the server the session ran against
    pub fn with_server<S: Into<String>>(mut self, server: S) -> Self {
        self.server = Some(server.into());
        self
    }
}
