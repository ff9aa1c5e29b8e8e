//! Session observer interface

use crate::models::metrics::ThroughputSample;
use crate::types::SessionPhase;

/// Receives progress notifications from a running probe session
///
/// Callbacks run inline on the scheduler and aggregator tasks and must return
/// quickly; an observer never influences control flow.
pub trait SessionObserver: Send + Sync {
    /// Overall session progress in percent
    fn on_progress(&self, _phase: SessionPhase, _percent: f64) {}

    /// A new throughput sample; `history` includes `sample` as its last element
    fn on_sample(&self, _phase: SessionPhase, _sample: &ThroughputSample, _history: &[ThroughputSample]) {}

    /// The session entered `phase`
    fn on_phase_change(&self, _phase: SessionPhase) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}
