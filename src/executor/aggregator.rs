//! Periodic sampling of the shared slot array during a transfer phase

use super::observer::SessionObserver;
use super::worker::StreamSlots;
use crate::models::metrics::ThroughputSample;
use crate::stats::StatisticsEngine;
use crate::types::SessionPhase;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Turns slot counters into a throughput history on a fixed tick
pub struct SampleAggregator {
    phase: SessionPhase,
    interval: Duration,
    min_sample_age: Duration,
    observer: Arc<dyn SessionObserver>,
    engine: StatisticsEngine,
}

impl SampleAggregator {
    pub fn new(phase: SessionPhase, interval: Duration, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            phase,
            interval,
            min_sample_age: Duration::ZERO,
            observer,
            engine: StatisticsEngine::new(),
        }
    }

    /// Skip ticks until the phase is older than `age`
    pub fn with_min_sample_age(mut self, age: Duration) -> Self {
        self.min_sample_age = age;
        self
    }

    /// Start ticking against `slots`; the first tick fires one interval after `phase_start`
    pub fn start(self, phase_start: Instant, slots: Arc<StreamSlots>) -> AggregatorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let stopped = Arc::new(AtomicBool::new(false));
        let task_stopped = stopped.clone();

        let task = tokio::spawn(async move {
            let mut history: Vec<ThroughputSample> = Vec::new();
            let mut ticker = tokio::time::interval_at(phase_start + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if task_stopped.load(Ordering::Relaxed) {
                            break;
                        }
                        let elapsed = phase_start.elapsed();
                        if elapsed <= self.min_sample_age {
                            continue;
                        }
                        let mbps = self.engine.instantaneous_mbps(slots.total_bytes(), elapsed);
                        let sample = ThroughputSample::new(elapsed, mbps);
                        history.push(sample);
                        self.observer.on_sample(self.phase, &sample, &history);
                    }
                }
            }

            history
        });

        AggregatorHandle {
            stop_tx: Some(stop_tx),
            stopped,
            task,
        }
    }
}

/// Running aggregator task
pub struct AggregatorHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<Vec<ThroughputSample>>,
}

impl AggregatorHandle {
    /// Stop ticking and return the collected history
    ///
    /// No sample is appended once this returns. A panicking observer loses the
    /// history but never the phase.
    pub async fn stop(mut self) -> Vec<ThroughputSample> {
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        (&mut self.task).await.unwrap_or_default()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

impl Drop for AggregatorHandle {
    fn drop(&mut self) {
        if self.stop_tx.is_some() {
            self.task.abort();
        }
    }
}
