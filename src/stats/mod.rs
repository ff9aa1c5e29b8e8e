//! Statistical calculations over latency samples and transfer counters
//!
//! Everything here is a pure function of its inputs. The engine keeps no state
//! between calls, so the scheduler can call it once the phases have joined and
//! hand the immutable snapshot to the result.

pub mod quality;

pub use quality::{QualityClassifier, QualityThresholds, TierThresholds};

use crate::models::metrics::{LatencySample, LatencySummary};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bits per byte, for converting byte counters into bit rates
const BITS_PER_BYTE: f64 = 8.0;

/// Bits in one megabit (decimal)
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Latency figures derived from one latency phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStatistics {
    /// Mean RTT of successful probes in milliseconds
    pub mean_ms: Option<f64>,
    /// Fastest successful probe
    pub min_ms: Option<f64>,
    /// Slowest successful probe
    pub max_ms: Option<f64>,
    /// Population standard deviation of successful RTTs
    pub jitter_ms: Option<f64>,
    /// Share of lost probes, rounded to one decimal
    pub packet_loss_pct: f64,
    /// Probes attempted, warm-up excluded
    pub attempted: usize,
    /// Probes that got a response
    pub succeeded: usize,
}

impl LatencyStatistics {
    /// Mean/min/max as they appear in a session result
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            mean: self.mean_ms,
            min: self.min_ms,
            max: self.max_ms,
        }
    }

    /// Headline latency: the fastest successful probe
    pub fn headline_ms(&self) -> Option<f64> {
        self.min_ms
    }
}

/// Stateless statistics over RTT samples and byte counters
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsEngine;

impl StatisticsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Arithmetic mean, `None` for an empty set
    pub fn mean(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Smallest value, `None` for an empty set
    pub fn min(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::min)
    }

    /// Largest value, `None` for an empty set
    pub fn max(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::max)
    }

    /// Population standard deviation (divides by N), `None` for fewer than two values
    pub fn jitter(&self, values: &[f64]) -> Option<f64> {
        if values.len() < 2 {
            return None;
        }
        let mean = self.mean(values)?;
        let variance = values
            .iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f64>()
            / values.len() as f64;
        Some(variance.sqrt())
    }

    /// Percentage of lost probes rounded to one decimal place
    ///
    /// Returns `0.0` when nothing was attempted. `succeeded` above `attempted` is
    /// treated as no loss.
    pub fn packet_loss(&self, attempted: usize, succeeded: usize) -> f64 {
        if attempted == 0 {
            return 0.0;
        }
        let lost = attempted.saturating_sub(succeeded);
        round_to_tenth(lost as f64 / attempted as f64 * 100.0)
    }

    /// Megabits per second for `total_bytes` moved in `elapsed`
    ///
    /// `None` when nothing was moved or no time elapsed, so a phase that lost every
    /// stream never reports a rate.
    pub fn throughput_mbps(&self, total_bytes: u64, elapsed: Duration) -> Option<f64> {
        let seconds = elapsed.as_secs_f64();
        if total_bytes == 0 || seconds <= 0.0 {
            return None;
        }
        Some(mbps(total_bytes, seconds))
    }

    /// Instantaneous tick estimate; unlike [`throughput_mbps`](Self::throughput_mbps)
    /// an idle tick reports `0.0` instead of `None`
    pub fn instantaneous_mbps(&self, total_bytes: u64, elapsed: Duration) -> f64 {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return 0.0;
        }
        mbps(total_bytes, seconds)
    }

    /// Summarize the samples of one latency phase
    ///
    /// Only successful samples contribute RTTs. `attempted` is taken from the
    /// sample count, so every lost probe must have been recorded.
    pub fn summarize(&self, samples: &[LatencySample]) -> LatencyStatistics {
        let rtts: Vec<f64> = samples
            .iter()
            .filter(|s| s.succeeded)
            .map(|s| s.rtt_ms)
            .collect();

        LatencyStatistics {
            mean_ms: self.mean(&rtts),
            min_ms: self.min(&rtts),
            max_ms: self.max(&rtts),
            jitter_ms: self.jitter(&rtts),
            packet_loss_pct: self.packet_loss(samples.len(), rtts.len()),
            attempted: samples.len(),
            succeeded: rtts.len(),
        }
    }
}

fn mbps(total_bytes: u64, seconds: f64) -> f64 {
    total_bytes as f64 * BITS_PER_BYTE / BITS_PER_MEGABIT / seconds
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StatisticsEngine {
        StatisticsEngine::new()
    }

    fn samples(rtts: &[Option<f64>]) -> Vec<LatencySample> {
        rtts.iter()
            .map(|rtt| match rtt {
                Some(ms) => LatencySample::success(Duration::from_secs_f64(ms / 1000.0)),
                None => LatencySample::lost(),
            })
            .collect()
    }

    #[test]
    fn test_jitter_needs_two_samples() {
        assert_eq!(engine().jitter(&[]), None);
        assert_eq!(engine().jitter(&[42.0]), None);
    }

    #[test]
    fn test_jitter_is_population_standard_deviation() {
        assert_eq!(engine().jitter(&[10.0, 20.0]), Some(5.0));
        // 2,4,4,4,5,5,7,9 has population sd 2 and sample sd ~2.14
        let jitter = engine().jitter(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((jitter - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_packet_loss() {
        assert_eq!(engine().packet_loss(10, 7), 30.0);
        assert_eq!(engine().packet_loss(10, 10), 0.0);
        assert_eq!(engine().packet_loss(3, 2), 33.3);
        assert_eq!(engine().packet_loss(3, 1), 66.7);
        assert_eq!(engine().packet_loss(0, 0), 0.0);
        assert_eq!(engine().packet_loss(4, 9), 0.0);
    }

    #[test]
    fn test_throughput() {
        let mbps = engine().throughput_mbps(100_000_000, Duration::from_secs(8));
        assert_eq!(mbps, Some(100.0));
        assert_eq!(engine().throughput_mbps(0, Duration::from_secs(8)), None);
        assert_eq!(engine().throughput_mbps(1_000, Duration::ZERO), None);
    }

    #[test]
    fn test_instantaneous_throughput() {
        assert_eq!(engine().instantaneous_mbps(0, Duration::from_millis(60)), 0.0);
        assert_eq!(engine().instantaneous_mbps(500, Duration::ZERO), 0.0);
        let tick = engine().instantaneous_mbps(750_000, Duration::from_millis(500));
        assert!((tick - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_ignores_lost_probes() {
        let stats = engine().summarize(&samples(&[
            Some(10.0),
            None,
            Some(20.0),
            None,
            Some(30.0),
        ]));
        assert_eq!(stats.attempted, 5);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.packet_loss_pct, 40.0);
        assert!((stats.mean_ms.unwrap() - 20.0).abs() < 1e-9);
        assert!((stats.min_ms.unwrap() - 10.0).abs() < 1e-9);
        assert!((stats.max_ms.unwrap() - 30.0).abs() < 1e-9);
        assert_eq!(stats.headline_ms(), stats.min_ms);
        assert!(stats.jitter_ms.is_some());
    }

    #[test]
    fn test_summarize_all_lost() {
        let stats = engine().summarize(&samples(&[None, None, None]));
        assert_eq!(stats.mean_ms, None);
        assert_eq!(stats.min_ms, None);
        assert_eq!(stats.jitter_ms, None);
        assert_eq!(stats.packet_loss_pct, 100.0);
        assert_eq!(stats.summary(), LatencySummary::default());
    }

    #[test]
    fn test_summarize_nothing_attempted() {
        let stats = engine().summarize(&[]);
        assert_eq!(stats.packet_loss_pct, 0.0);
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.headline_ms(), None);
    }
}
