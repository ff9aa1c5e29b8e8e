//! Probe session execution engine
//!
//! This module contains the components that run a probe session:
//! - `ProbeScheduler`, which owns the phase order and the one-session-at-a-time rule
//! - `StreamWorker` tasks writing into a shared per-phase slot array
//! - `SampleAggregator`, which turns slot counters into throughput samples
//! - the `SessionObserver` interface for progress reporting

pub mod aggregator;
pub mod observer;
pub mod worker;

pub use aggregator::{AggregatorHandle, SampleAggregator};
pub use observer::{NullObserver, SessionObserver};
pub use worker::{build_upload_payload, CancelSignal, StreamSlot, StreamSlots, StreamWorker};

use crate::{
    client::Transport,
    error::{AppError, Result},
    logging::{LoggerFactory, TransferLogger},
    models::{
        metrics::{LatencySample, PhaseReport, SessionResult, ThroughputSample},
        ProbeConfig,
    },
    stats::{QualityClassifier, StatisticsEngine},
    types::{SessionPhase, TransferDirection},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Lock-free holder for a session phase
#[derive(Debug)]
struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new(phase: SessionPhase) -> Self {
        Self(AtomicU8::new(Self::encode(phase)))
    }

    fn get(&self) -> SessionPhase {
        match self.0.load(Ordering::Acquire) {
            1 => SessionPhase::Latency,
            2 => SessionPhase::Downloading,
            3 => SessionPhase::Uploading,
            4 => SessionPhase::Complete,
            5 => SessionPhase::Failed,
            _ => SessionPhase::Idle,
        }
    }

    fn set(&self, phase: SessionPhase) {
        self.0.store(Self::encode(phase), Ordering::Release);
    }

    fn encode(phase: SessionPhase) -> u8 {
        match phase {
            SessionPhase::Idle => 0,
            SessionPhase::Latency => 1,
            SessionPhase::Downloading => 2,
            SessionPhase::Uploading => 3,
            SessionPhase::Complete => 4,
            SessionPhase::Failed => 5,
        }
    }
}

/// The one mutable handle of a running session
///
/// Owns the session configuration, its phase and the cancellation signal
/// shared with every worker the session spawns.
pub struct ProbeSession {
    id: String,
    config: ProbeConfig,
    started_at: DateTime<Utc>,
    phase: PhaseCell,
    cancel: CancelSignal,
    observer: Arc<dyn SessionObserver>,
}

impl ProbeSession {
    fn new(config: ProbeConfig, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            started_at: Utc::now(),
            phase: PhaseCell::new(SessionPhase::Idle),
            cancel: CancelSignal::new(),
            observer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop every loop of the session, interrupting any await in progress
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(self.cancelled_error())
        } else {
            Ok(())
        }
    }

    fn cancelled_error(&self) -> AppError {
        AppError::cancelled(format!("session {} was cancelled", self.id))
    }

    fn enter(&self, phase: SessionPhase) {
        self.phase.set(phase);
        self.observer.on_phase_change(phase);
    }

    fn progress(&self, phase: SessionPhase, fraction: f64) {
        self.observer.on_progress(phase, phase.progress_at(fraction));
    }
}

/// Runs probe sessions against one transport, one session at a time
///
/// A second `run_session` while a session is active is rejected with
/// [`AppError::Busy`]; nothing is queued.
pub struct ProbeScheduler {
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SessionObserver>,
    loggers: LoggerFactory,
    stats: StatisticsEngine,
    classifier: QualityClassifier,
    current: Mutex<Option<Arc<ProbeSession>>>,
    last_phase: PhaseCell,
}

impl ProbeScheduler {
    /// Create a scheduler with no observer and silent loggers
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            observer: Arc::new(NullObserver),
            loggers: LoggerFactory::quiet(),
            stats: StatisticsEngine::new(),
            classifier: QualityClassifier::new(),
            current: Mutex::new(None),
            last_phase: PhaseCell::new(SessionPhase::Idle),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_loggers(mut self, loggers: LoggerFactory) -> Self {
        self.loggers = loggers;
        self
    }

    pub fn with_classifier(mut self, classifier: QualityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Phase of the active session, or the final phase of the last one
    pub fn phase(&self) -> SessionPhase {
        match self.current_session() {
            Some(session) => session.phase(),
            None => self.last_phase.get(),
        }
    }

    pub fn current_session(&self) -> Option<Arc<ProbeSession>> {
        self.lock_current().clone()
    }

    /// Cancel the active session; returns whether there was one
    ///
    /// Probes, reads and upload chunks in flight are abandoned immediately.
    pub fn cancel(&self) -> bool {
        match self.current_session() {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Run latency, download and upload phases and classify the result
    pub async fn run_session(&self, config: ProbeConfig) -> Result<SessionResult> {
        let session = self.begin(config)?;
        let _active = ActiveSession {
            scheduler: self,
            session: session.clone(),
        };

        match self.drive(&session).await {
            Ok(result) => {
                session.enter(SessionPhase::Complete);
                session.progress(SessionPhase::Complete, 1.0);
                self.loggers
                    .create_phase_logger()
                    .log_session_complete(&result)
                    .await;
                Ok(result)
            }
            Err(error) => {
                session.enter(SessionPhase::Failed);
                self.loggers
                    .create_error_logger()
                    .log_error(&error, Some("Probe session failed"), Some(session.id()))
                    .await;
                Err(error)
            }
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Arc<ProbeSession>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, config: ProbeConfig) -> Result<Arc<ProbeSession>> {
        let mut current = self.lock_current();
        if let Some(active) = current.as_ref() {
            return Err(AppError::busy(format!(
                "session {} is still {}",
                active.id(),
                active.phase()
            )));
        }
        let session = Arc::new(ProbeSession::new(config, self.observer.clone()));
        *current = Some(session.clone());
        Ok(session)
    }

    async fn drive(&self, session: &ProbeSession) -> Result<SessionResult> {
        session.config().validate()?;

        let mut phase_logger = self.loggers.create_phase_logger();
        let transfer_logger = self.loggers.create_transfer_logger();

        session.enter(SessionPhase::Latency);
        phase_logger.start_phase(SessionPhase::Latency, session.id()).await;
        let samples = self.run_latency_phase(session, &transfer_logger).await?;
        phase_logger.end_phase(SessionPhase::Latency, session.id()).await;
        session.check_cancelled()?;

        session.enter(SessionPhase::Downloading);
        phase_logger.start_phase(SessionPhase::Downloading, session.id()).await;
        let download = self.run_download_phase(session).await;
        self.log_phase(&download, &transfer_logger, session).await;
        phase_logger.end_phase(SessionPhase::Downloading, session.id()).await;
        session.check_cancelled()?;

        session.enter(SessionPhase::Uploading);
        phase_logger.start_phase(SessionPhase::Uploading, session.id()).await;
        let upload = self.run_upload_phase(session).await;
        self.log_phase(&upload, &transfer_logger, session).await;
        phase_logger.end_phase(SessionPhase::Uploading, session.id()).await;
        session.check_cancelled()?;

        let latency = self.stats.summarize(&samples);
        let quality = self.classifier.classify(
            download.mbps,
            upload.mbps,
            latency.headline_ms(),
            latency.jitter_ms,
            latency.packet_loss_pct,
        );

        Ok(SessionResult {
            session_id: session.id().to_string(),
            server: None,
            latency: latency.summary(),
            jitter_ms: latency.jitter_ms,
            packet_loss_pct: latency.packet_loss_pct,
            download_mbps: download.mbps,
            upload_mbps: upload.mbps,
            quality,
            latency_samples: samples,
            download,
            upload,
            started_at: session.started_at(),
            completed_at: Utc::now(),
        })
    }

    async fn run_latency_phase(
        &self,
        session: &ProbeSession,
        logger: &TransferLogger,
    ) -> Result<Vec<LatencySample>> {
        let config = session.config();
        session.progress(SessionPhase::Latency, 0.0);

        // Warm-up round trip opens the connection; its result is discarded
        let _ = self.probe_unless_cancelled(session).await;

        let count = config.latency_sample_count;
        let mut samples = Vec::with_capacity(count as usize);
        for attempt in 1..=count {
            session.check_cancelled()?;
            match self.probe_unless_cancelled(session).await {
                Some(Ok(rtt)) => samples.push(LatencySample::success(rtt)),
                Some(Err(error)) => {
                    logger.log_probe_failure(attempt, &error, session.id()).await;
                    samples.push(LatencySample::lost());
                }
                None => return Err(session.cancelled_error()),
            }
            session.progress(SessionPhase::Latency, attempt as f64 / count as f64);
            if attempt < count {
                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return Err(session.cancelled_error()),
                    _ = tokio::time::sleep(config.latency_delay) => {}
                }
            }
        }

        session.progress(SessionPhase::Latency, 1.0);
        Ok(samples)
    }

    /// One timed probe, or `None` when the session is cancelled first
    async fn probe_unless_cancelled(&self, session: &ProbeSession) -> Option<Result<Duration>> {
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => None,
            outcome = self.timed_probe(session.config().request_timeout) => Some(outcome),
        }
    }

    async fn timed_probe(&self, timeout: Duration) -> Result<Duration> {
        match tokio::time::timeout(timeout, self.transport.probe()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::probe(format!(
                "no response within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn run_download_phase(&self, session: &ProbeSession) -> PhaseReport {
        let config = session.config();
        let direction = TransferDirection::Download;
        session.progress(direction.phase(), 0.0);

        let slots = Arc::new(StreamSlots::new(config.concurrent_streams as usize));
        let phase_start = Instant::now();
        let aggregator = SampleAggregator::new(direction.phase(), config.tick_interval, self.observer.clone())
            .start(phase_start, slots.clone());

        let workers: Vec<JoinHandle<u64>> = (0..slots.len())
            .map(|index| {
                let worker = self.worker(index, &slots, session);
                tokio::spawn(worker.run_download(config.download_bytes_per_stream))
            })
            .collect();

        let expected = config.expected_download_bytes() as f64;
        let joined = supervise(workers, config.tick_interval, || {
            session.progress(direction.phase(), slots.total_bytes() as f64 / expected);
        })
        .await;

        let history = aggregator.stop().await;
        let report = self.phase_report(direction, &slots, phase_start.elapsed(), history, joined);
        session.progress(direction.phase(), 1.0);
        report
    }

    async fn run_upload_phase(&self, session: &ProbeSession) -> PhaseReport {
        let config = session.config();
        let direction = TransferDirection::Upload;
        session.progress(direction.phase(), 0.0);

        let payload = build_upload_payload(config.upload_chunk_bytes as usize);
        let keep_going = Arc::new(AtomicBool::new(true));
        let slots = Arc::new(StreamSlots::new(config.concurrent_streams as usize));
        let phase_start = Instant::now();
        let aggregator = SampleAggregator::new(direction.phase(), config.upload_tick_interval, self.observer.clone())
            .with_min_sample_age(crate::defaults::UPLOAD_MIN_SAMPLE_AGE)
            .start(phase_start, slots.clone());

        let workers: Vec<JoinHandle<u64>> = (0..slots.len())
            .map(|index| {
                let worker = self.worker(index, &slots, session);
                tokio::spawn(worker.run_upload(payload.clone(), keep_going.clone()))
            })
            .collect();

        let joined = supervise(workers, config.upload_tick_interval, || {
            let elapsed = phase_start.elapsed();
            if upload_target_reached(config, elapsed, slots.total_bytes()) || session.is_cancelled() {
                keep_going.store(false, Ordering::Relaxed);
            }
            session.progress(direction.phase(), time_fraction(elapsed, config.min_upload_duration));
        })
        .await;

        let history = aggregator.stop().await;
        let report = self.phase_report(direction, &slots, phase_start.elapsed(), history, joined);
        session.progress(direction.phase(), 1.0);
        report
    }

    fn worker(&self, index: usize, slots: &Arc<StreamSlots>, session: &ProbeSession) -> StreamWorker {
        StreamWorker::new(
            index,
            self.transport.clone(),
            slots.clone(),
            session.cancel.clone(),
        )
    }

    fn phase_report(
        &self,
        direction: TransferDirection,
        slots: &StreamSlots,
        elapsed: Duration,
        history: Vec<ThroughputSample>,
        joined: Vec<std::result::Result<u64, JoinError>>,
    ) -> PhaseReport {
        let mut streams = slots.reports();
        for (stream, outcome) in streams.iter_mut().zip(joined) {
            if let Err(join_error) = outcome {
                if stream.error.is_none() {
                    stream.error = Some(AppError::from(join_error).to_string());
                }
            }
        }

        let total_bytes = slots.total_bytes();
        PhaseReport {
            direction,
            total_bytes,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            mbps: self.stats.throughput_mbps(total_bytes, elapsed),
            streams,
            history,
        }
    }

    async fn log_phase(&self, report: &PhaseReport, logger: &TransferLogger, session: &ProbeSession) {
        for stream in report.streams.iter().filter(|s| s.failed()) {
            let error = stream.error.as_deref().unwrap_or_default();
            logger
                .log_stream_failure(report.direction, stream.index, stream.bytes, error, session.id())
                .await;
        }
        for sample in &report.history {
            logger.log_sample(report.direction, sample, session.id()).await;
        }
        logger.log_phase_summary(report, session.id()).await;
    }
}

/// Clears the scheduler's active slot however `run_session` ends
struct ActiveSession<'a> {
    scheduler: &'a ProbeScheduler,
    session: Arc<ProbeSession>,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        if !self.session.phase().is_terminal() {
            // The run_session future was dropped mid-phase
            self.session.cancel();
            self.session.phase.set(SessionPhase::Failed);
        }
        self.scheduler.last_phase.set(self.session.phase());
        *self.scheduler.lock_current() = None;
    }
}

/// Wait for every worker while calling `on_tick` at a fixed interval
///
/// A worker that panics shows up as a `JoinError` in its position; it never
/// stops the wait for its siblings.
async fn supervise<F>(
    workers: Vec<JoinHandle<u64>>,
    tick: Duration,
    mut on_tick: F,
) -> Vec<std::result::Result<u64, JoinError>>
where
    F: FnMut(),
{
    let joined = join_all(workers);
    tokio::pin!(joined);
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            results = &mut joined => return results,
            _ = ticker.tick() => on_tick(),
        }
    }
}

/// Upload stops once both the minimum duration and the minimum volume are met
fn upload_target_reached(config: &ProbeConfig, elapsed: Duration, total_bytes: u64) -> bool {
    elapsed >= config.min_upload_duration && total_bytes >= config.min_upload_bytes
}

fn time_fraction(elapsed: Duration, target: Duration) -> f64 {
    if target.is_zero() {
        1.0
    } else {
        elapsed.as_secs_f64() / target.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::observer::recording::RecordingObserver;
    use super::*;
    use crate::client::ChunkStream;
    use crate::types::QualityTier;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    const MB: usize = 1_000_000;

    /// How one download stream behaves
    #[derive(Clone, Copy)]
    enum DownloadScript {
        /// Yield `total` bytes in `chunk`-sized pieces
        Complete { total: usize, chunk: usize },
        /// Yield `before` bytes, then fail
        FailAfter { before: usize, chunk: usize },
        /// Yield `before` bytes, then never answer again
        Stall { before: usize, chunk: usize },
        /// Refuse to open
        Refuse,
        /// Panic inside the worker task
        Panic,
    }

    /// Transport driven by per-call scripts, pausing between chunks
    struct ScriptedTransport {
        probes: Mutex<VecDeque<Option<u64>>>,
        default_rtt_ms: u64,
        downloads: Mutex<VecDeque<DownloadScript>>,
        default_download: DownloadScript,
        chunk_delay: Duration,
        upload_delay: Duration,
        upload_fails: bool,
        probe_calls: AtomicUsize,
        download_calls: AtomicUsize,
        upload_calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                probes: Mutex::new(VecDeque::new()),
                default_rtt_ms: 20,
                downloads: Mutex::new(VecDeque::new()),
                default_download: DownloadScript::Complete { total: 5 * MB, chunk: MB },
                chunk_delay: Duration::from_millis(10),
                upload_delay: Duration::from_millis(20),
                upload_fails: false,
                probe_calls: AtomicUsize::new(0),
                download_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
            }
        }

        /// RTTs for the probes after warm-up; `None` is a lost probe
        fn with_probes(self, rtts: &[Option<u64>]) -> Self {
            {
                let mut probes = self.probes.lock().unwrap();
                probes.push_back(Some(self.default_rtt_ms));
                probes.extend(rtts.iter().copied());
            }
            self
        }

        fn with_downloads(self, scripts: &[DownloadScript]) -> Self {
            self.downloads.lock().unwrap().extend(scripts.iter().copied());
            self
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn probe(&self) -> Result<Duration> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.probes.lock().unwrap().pop_front();
            match next.unwrap_or(Some(self.default_rtt_ms)) {
                Some(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(Duration::from_millis(ms))
                }
                None => Err(AppError::probe("no response")),
            }
        }

        async fn open_download(&self, _byte_count: u64) -> Result<ChunkStream> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            let script = self
                .downloads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.default_download);
            let (good, chunk, fail, stall) = match script {
                DownloadScript::Complete { total, chunk } => (total, chunk, false, false),
                DownloadScript::FailAfter { before, chunk } => (before, chunk, true, false),
                DownloadScript::Stall { before, chunk } => (before, chunk, false, true),
                DownloadScript::Refuse => return Err(AppError::http_request("refused")),
                DownloadScript::Panic => panic!("scripted worker panic"),
            };
            let mut items: Vec<Result<Bytes>> = (0..good / chunk)
                .map(|_| Ok(Bytes::from(vec![0u8; chunk])))
                .collect();
            if fail {
                items.push(Err(AppError::transfer("connection reset")));
            }
            let delay = self.chunk_delay;
            let chunks = stream::iter(items).then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            });
            if stall {
                Ok(chunks.chain(stream::pending()).boxed())
            } else {
                Ok(chunks.boxed())
            }
        }

        async fn send_upload_chunk(&self, _payload: Bytes) -> Result<()> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.upload_delay).await;
            if self.upload_fails {
                Err(AppError::http_request("upload rejected"))
            } else {
                Ok(())
            }
        }
    }

    fn small_config() -> ProbeConfig {
        ProbeConfig {
            concurrent_streams: 4,
            download_bytes_per_stream: 5 * MB as u64,
            upload_chunk_bytes: 64 * 1024,
            tick_interval: Duration::from_millis(60),
            upload_tick_interval: Duration::from_millis(50),
            min_upload_duration: Duration::from_millis(500),
            min_upload_bytes: 1024 * 1024,
            latency_sample_count: 10,
            latency_delay: Duration::from_millis(50),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session() {
        let transport = Arc::new(ScriptedTransport::new().with_probes(&[
            Some(30), Some(10), Some(20), Some(40), Some(25),
            Some(15), Some(35), Some(20), Some(30), Some(25),
        ]));
        let observer = Arc::new(RecordingObserver::default());
        let scheduler = ProbeScheduler::new(transport.clone()).with_observer(observer.clone());
        assert_eq!(scheduler.phase(), SessionPhase::Idle);

        let result = scheduler.run_session(small_config()).await.unwrap();

        assert_eq!(scheduler.phase(), SessionPhase::Complete);
        assert!(scheduler.current_session().is_none());
        // Warm-up plus ten samples
        assert_eq!(transport.probe_calls.load(Ordering::SeqCst), 11);
        assert_eq!(result.latency_samples.len(), 10);
        assert_eq!(result.latency.min, Some(10.0));
        assert_eq!(result.latency.max, Some(40.0));
        assert_eq!(result.packet_loss_pct, 0.0);
        assert!(result.jitter_ms.is_some());

        assert_eq!(result.download.total_bytes, 20 * MB as u64);
        assert_eq!(result.download.failed_streams(), 0);
        assert!(result.download_mbps.is_some());

        // Both stop conditions hold once upload ends
        assert!(result.upload.duration_ms >= 500.0);
        assert!(result.upload.total_bytes >= 1024 * 1024);
        assert_eq!(result.upload.total_bytes % (64 * 1024), 0);
        assert!(result.upload_mbps.is_some());
        assert!(result.upload.history.iter().all(|s| s.elapsed_ms > 200));

        let phases = observer.phases.lock().unwrap().clone();
        assert_eq!(
            phases,
            vec![
                SessionPhase::Latency,
                SessionPhase::Downloading,
                SessionPhase::Uploading,
                SessionPhase::Complete,
            ]
        );

        let progress = observer.progress.lock().unwrap();
        assert!(progress.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(progress.last().map(|p| p.1), Some(100.0));
        assert!(progress
            .iter()
            .filter(|(phase, _)| *phase == SessionPhase::Downloading)
            .all(|(_, pct)| (15.0..=55.0).contains(pct)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_download_failure_counts_every_byte() {
        let transport = Arc::new(ScriptedTransport::new().with_downloads(&[
            DownloadScript::FailAfter { before: MB, chunk: MB / 4 },
            DownloadScript::Complete { total: 5 * MB, chunk: MB },
            DownloadScript::Complete { total: 5 * MB, chunk: MB },
            DownloadScript::Complete { total: 5 * MB, chunk: MB },
        ]));
        let scheduler = ProbeScheduler::new(transport);

        let result = scheduler.run_session(small_config()).await.unwrap();

        let download = &result.download;
        assert_eq!(download.total_bytes, 16 * MB as u64);
        assert_eq!(download.failed_streams(), 1);
        let expected = 16.0 * 8.0 / (download.duration_ms / 1000.0);
        assert!((download.mbps.unwrap() - expected).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_worker_does_not_block_siblings() {
        let transport = Arc::new(ScriptedTransport::new().with_downloads(&[
            DownloadScript::Panic,
            DownloadScript::Complete { total: 2 * MB, chunk: MB },
        ]));
        let mut config = small_config();
        config.concurrent_streams = 2;
        let scheduler = ProbeScheduler::new(transport);

        let result = scheduler.run_session(config).await.unwrap();

        assert_eq!(result.download.total_bytes, 2 * MB as u64);
        assert_eq!(result.download.failed_streams(), 1);
        let fault = result.download.streams.iter().find_map(|s| s.error.as_deref()).unwrap();
        assert!(fault.starts_with("Scheduler fault"), "{}", fault);
        assert_eq!(scheduler.phase(), SessionPhase::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_streams_lost_reports_no_throughput() {
        let mut transport = ScriptedTransport::new().with_downloads(&[DownloadScript::Refuse; 4]);
        transport.upload_fails = true;
        let scheduler = ProbeScheduler::new(Arc::new(transport));

        let result = scheduler.run_session(small_config()).await.unwrap();

        assert_eq!(result.download_mbps, None);
        assert_eq!(result.upload_mbps, None);
        assert!(result.download.all_streams_failed());
        assert!(result.upload.all_streams_failed());
        assert_eq!(result.quality.streaming, QualityTier::Poor);
        assert_eq!(result.quality.conferencing, QualityTier::Poor);
        assert_eq!(scheduler.phase(), SessionPhase::Complete);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["downloadMbps"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_probes_count_as_packet_loss() {
        let transport = Arc::new(ScriptedTransport::new().with_probes(&[
            Some(20), None, Some(20), Some(20), None,
            Some(20), Some(20), None, Some(20), Some(20),
        ]));
        let scheduler = ProbeScheduler::new(transport);

        let result = scheduler.run_session(small_config()).await.unwrap();

        assert_eq!(result.packet_loss_pct, 30.0);
        assert_eq!(result.latency_samples.iter().filter(|s| s.succeeded).count(), 7);
        assert_eq!(result.jitter_ms, Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_lost_still_runs_transfers() {
        let transport = Arc::new(ScriptedTransport::new().with_probes(&[None; 10]));
        let scheduler = ProbeScheduler::new(transport.clone());

        let result = scheduler.run_session(small_config()).await.unwrap();

        assert_eq!(result.latency.min, None);
        assert_eq!(result.packet_loss_pct, 100.0);
        assert_eq!(result.quality.gaming, QualityTier::Poor);
        assert!(result.download_mbps.is_some());
        assert_eq!(transport.download_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out_as_loss() {
        let transport = Arc::new(ScriptedTransport::new().with_probes(&[
            Some(20), Some(20), Some(10_000),
        ]));
        let mut config = small_config();
        config.latency_sample_count = 3;
        config.request_timeout = Duration::from_secs(1);
        let scheduler = ProbeScheduler::new(transport);

        let result = scheduler.run_session(config).await.unwrap();
        assert_eq!(result.packet_loss_pct, 33.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_fails_before_any_transfer() {
        let transport = Arc::new(ScriptedTransport::new());
        let observer = Arc::new(RecordingObserver::default());
        let scheduler = ProbeScheduler::new(transport.clone()).with_observer(observer.clone());
        let mut config = small_config();
        config.concurrent_streams = 0;

        let err = scheduler.run_session(config).await.unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(scheduler.phase(), SessionPhase::Failed);
        assert_eq!(transport.probe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.download_calls.load(Ordering::SeqCst), 0);
        assert_eq!(*observer.phases.lock().unwrap(), vec![SessionPhase::Failed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_session_is_rejected_while_busy() {
        let transport = Arc::new(ScriptedTransport::new());
        let scheduler = Arc::new(ProbeScheduler::new(transport));

        let running = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_session(small_config()).await })
        };
        while scheduler.phase() != SessionPhase::Downloading {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = scheduler.run_session(small_config()).await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
        assert_eq!(scheduler.phase(), SessionPhase::Downloading);

        assert!(scheduler.cancel());
        let first = running.await.unwrap();
        assert!(matches!(first, Err(AppError::Cancelled(_))));
        assert_eq!(scheduler.phase(), SessionPhase::Failed);
        assert!(!scheduler.cancel());

        // The scheduler accepts a new session afterwards
        assert!(scheduler.run_session(small_config()).await.is_ok());
    }

    async fn wait_for_phase(scheduler: &ProbeScheduler, phase: SessionPhase) {
        while scheduler.phase() != phase {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_download() {
        let transport = Arc::new(
            ScriptedTransport::new().with_downloads(&[DownloadScript::Stall { before: MB, chunk: MB }; 4]),
        );
        let mut config = small_config();
        config.latency_sample_count = 2;
        config.latency_delay = Duration::from_millis(10);
        let scheduler = Arc::new(ProbeScheduler::new(transport));

        let running = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_session(config).await })
        };
        wait_for_phase(&scheduler, SessionPhase::Downloading).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.cancel());

        let outcome = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("session kept waiting on a stalled stream")
            .unwrap();
        assert!(matches!(outcome, Err(AppError::Cancelled(_))));
        assert_eq!(scheduler.phase(), SessionPhase::Failed);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_probe() {
        let transport = Arc::new(ScriptedTransport::new().with_probes(&[Some(20_000)]));
        let mut config = small_config();
        config.request_timeout = Duration::from_secs(30);
        let scheduler = Arc::new(ProbeScheduler::new(transport.clone()));

        let running = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_session(config).await })
        };
        wait_for_phase(&scheduler, SessionPhase::Latency).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.cancel());

        let outcome = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("session kept waiting on a slow probe")
            .unwrap();
        assert!(matches!(outcome, Err(AppError::Cancelled(_))));
        assert_eq!(transport.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_runs_until_byte_target() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut config = small_config();
        config.concurrent_streams = 1;
        config.min_upload_duration = Duration::from_millis(100);
        // 20 ms per 64 KiB chunk on one stream: about 1.3 s for 4 MiB
        config.min_upload_bytes = 4 * 1024 * 1024;
        let scheduler = ProbeScheduler::new(transport);

        let result = scheduler.run_session(config).await.unwrap();

        assert!(result.upload.total_bytes >= 4 * 1024 * 1024);
        assert!(result.upload.duration_ms >= 1000.0);
    }

    #[test]
    fn test_upload_target_needs_both_conditions() {
        let config = small_config();
        assert!(!upload_target_reached(&config, Duration::from_millis(400), 10 * 1024 * 1024));
        assert!(!upload_target_reached(&config, Duration::from_secs(5), 1024));
        assert!(upload_target_reached(&config, Duration::from_millis(500), 1024 * 1024));
    }

    #[test]
    fn test_time_fraction() {
        assert_eq!(time_fraction(Duration::from_millis(250), Duration::from_millis(500)), 0.5);
        assert_eq!(time_fraction(Duration::from_millis(250), Duration::ZERO), 1.0);
    }

    #[test]
    fn test_phase_cell_round_trip() {
        let cell = PhaseCell::new(SessionPhase::Idle);
        for phase in [
            SessionPhase::Latency,
            SessionPhase::Downloading,
            SessionPhase::Uploading,
            SessionPhase::Complete,
            SessionPhase::Failed,
            SessionPhase::Idle,
        ] {
            cell.set(phase);
            assert_eq!(cell.get(), phase);
        }
    }
}
