//! Quality tier classification for streaming, gaming and conferencing

use crate::models::metrics::QualityReport;
use crate::types::QualityTier;
use serde::{Deserialize, Serialize};

/// Limits one tier has to meet for every use case
///
/// Throughput limits are inclusive minimums, latency/jitter/loss limits are
/// exclusive maximums.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub streaming_download_mbps: f64,
    pub streaming_latency_ms: f64,
    pub gaming_latency_ms: f64,
    pub gaming_jitter_ms: f64,
    pub gaming_packet_loss_pct: f64,
    pub conferencing_upload_mbps: f64,
    pub conferencing_download_mbps: f64,
    pub conferencing_latency_ms: f64,
}

/// Good and Fair limits together
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub good: TierThresholds,
    pub fair: TierThresholds,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            good: TierThresholds {
                streaming_download_mbps: 25.0,
                streaming_latency_ms: 100.0,
                gaming_latency_ms: 50.0,
                gaming_jitter_ms: 20.0,
                gaming_packet_loss_pct: 1.0,
                conferencing_upload_mbps: 5.0,
                conferencing_download_mbps: 5.0,
                conferencing_latency_ms: 150.0,
            },
            fair: TierThresholds {
                streaming_download_mbps: 10.0,
                streaming_latency_ms: 150.0,
                gaming_latency_ms: 100.0,
                gaming_jitter_ms: 30.0,
                gaming_packet_loss_pct: 2.0,
                conferencing_upload_mbps: 2.5,
                conferencing_download_mbps: 2.5,
                conferencing_latency_ms: 200.0,
            },
        }
    }
}

/// Metrics a verdict is derived from
///
/// A missing value fails every threshold that mentions it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityInputs {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_pct: f64,
}

/// Maps session metrics onto Good/Fair/Poor per use case
#[derive(Debug, Clone, Default)]
pub struct QualityClassifier {
    thresholds: QualityThresholds,
}

impl QualityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Classify all use cases at once
    pub fn classify(
        &self,
        download_mbps: Option<f64>,
        upload_mbps: Option<f64>,
        latency_ms: Option<f64>,
        jitter_ms: Option<f64>,
        packet_loss_pct: f64,
    ) -> QualityReport {
        self.classify_inputs(&QualityInputs {
            download_mbps,
            upload_mbps,
            latency_ms,
            jitter_ms,
            packet_loss_pct,
        })
    }

    pub fn classify_inputs(&self, inputs: &QualityInputs) -> QualityReport {
        QualityReport {
            streaming: self.tier(inputs, streaming_meets),
            gaming: self.tier(inputs, gaming_meets),
            conferencing: self.tier(inputs, conferencing_meets),
        }
    }

    fn tier(
        &self,
        inputs: &QualityInputs,
        meets: fn(&QualityInputs, &TierThresholds) -> bool,
    ) -> QualityTier {
        if meets(inputs, &self.thresholds.good) {
            QualityTier::Good
        } else if meets(inputs, &self.thresholds.fair) {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

fn at_least(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v >= limit)
}

fn below(value: Option<f64>, limit: f64) -> bool {
    value.is_some_and(|v| v < limit)
}

fn streaming_meets(inputs: &QualityInputs, limits: &TierThresholds) -> bool {
    at_least(inputs.download_mbps, limits.streaming_download_mbps)
        && below(inputs.latency_ms, limits.streaming_latency_ms)
}

fn gaming_meets(inputs: &QualityInputs, limits: &TierThresholds) -> bool {
    below(inputs.latency_ms, limits.gaming_latency_ms)
        && below(inputs.jitter_ms, limits.gaming_jitter_ms)
        && inputs.packet_loss_pct < limits.gaming_packet_loss_pct
}

fn conferencing_meets(inputs: &QualityInputs, limits: &TierThresholds) -> bool {
    at_least(inputs.upload_mbps, limits.conferencing_upload_mbps)
        && at_least(inputs.download_mbps, limits.conferencing_download_mbps)
        && below(inputs.latency_ms, limits.conferencing_latency_ms)
}
