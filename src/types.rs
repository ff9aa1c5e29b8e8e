//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Lifecycle phase of a probe session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No session has run yet, or the scheduler is waiting for one
    Idle,
    /// Sequential round-trip probes
    Latency,
    /// Concurrent download streams
    Downloading,
    /// Concurrent upload streams
    Uploading,
    /// Finished with a result
    Complete,
    /// Ended by a scheduler fault or cancellation
    Failed,
}

impl SessionPhase {
    /// Stable lowercase name used in logs and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Latency => "latency",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Overall progress band `(start, end)` in percent covered by this phase
    pub fn progress_range(&self) -> (f64, f64) {
        match self {
            Self::Idle => (0.0, 0.0),
            Self::Latency => (0.0, 15.0),
            Self::Downloading => (15.0, 55.0),
            Self::Uploading => (55.0, 95.0),
            Self::Complete => (95.0, 100.0),
            Self::Failed => (0.0, 0.0),
        }
    }

    /// Map a phase-local fraction (clamped to 0..=1) into overall session progress
    pub fn progress_at(&self, fraction: f64) -> f64 {
        let (start, end) = self.progress_range();
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        start + (end - start) * fraction
    }

    /// Whether the session has reached a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a transfer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

impl TransferDirection {
    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Download => SessionPhase::Downloading,
            Self::Upload => SessionPhase::Uploading,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application class a quality verdict is given for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Streaming,
    Gaming,
    Conferencing,
}

impl UseCase {
    /// All use cases in display order
    pub const ALL: [UseCase; 3] = [Self::Streaming, Self::Gaming, Self::Conferencing];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Streaming => "Video Streaming",
            Self::Gaming => "Online Gaming",
            Self::Conferencing => "Video Conferencing",
        }
    }
}

/// Quality tier derived from the session metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    /// Meets the strict thresholds for the use case
    Good,
    /// Meets only the relaxed thresholds
    Fair,
    /// Meets neither
    Poor,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
