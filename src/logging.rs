//! Structured logging for probe sessions
//!
//! Loggers write one line per event to stderr, either as readable console
//! text or, in debug mode, as JSON. Every event of a session carries the
//! session id as its correlation id.

use crate::error::AppError;
use crate::models::{Config, PhaseReport, SessionResult, ThroughputSample};
use crate::types::{SessionPhase, TransferDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Per-tick detail, only shown with `--debug`
    Debug = 1,
    /// Phase and session milestones
    Info = 2,
    /// Lost probes and failed streams
    Warn = 3,
    /// Session failures
    Error = 4,
    /// Nothing a probe run emits; used to silence a logger
    Fatal = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[32m",     // Green
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

/// One structured log event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that emitted the event
    pub logger: String,
    /// Session id the event belongs to
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// One JSON object per line
    Json,
}

/// Named logger with a level filter
///
/// All output goes to stderr so that `--json` results on stdout stay parseable.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name,
        }
    }

    /// Level and format follow the `--debug` and `--verbose` flags
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
        }
    }

    /// Logger that drops everything below `Fatal`
    pub fn quiet(name: String) -> Self {
        let mut logger = Self::new(name);
        logger.set_level(LogLevel::Fatal);
        logger
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }
        let _ = writeln!(io::stderr(), "{}", self.render(&entry));
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}", entry.message),
        }
    }
}

/// Builder for a single log event
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field; values that fail to serialize are skipped
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn sample(self, sample: &ThroughputSample) -> Self {
        self.field("elapsed_ms", sample.elapsed_ms)
            .field("mbps", sample.mbps)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Phase timing logger for probe sessions
pub struct PhaseLogger {
    logger: Logger,
    start_times: HashMap<SessionPhase, DateTime<Utc>>,
}

impl PhaseLogger {
    fn from_logger(logger: Logger) -> Self {
        Self {
            logger,
            start_times: HashMap::new(),
        }
    }

    /// Record the start of a phase
    pub async fn start_phase(&mut self, phase: SessionPhase, session_id: &str) {
        let start_time = Utc::now();
        self.start_times.insert(phase, start_time);

        self.logger.debug(&format!("Started phase: {}", phase))
            .correlation_id(session_id)
            .field("phase", phase)
            .field("start_time", start_time)
            .log()
            .await;
    }

    /// Record the end of a phase and log how long it took
    pub async fn end_phase(&mut self, phase: SessionPhase, session_id: &str) -> Option<chrono::Duration> {
        if let Some(start_time) = self.start_times.remove(&phase) {
            let end_time = Utc::now();
            let duration = end_time - start_time;

            self.logger.info(&format!("Completed phase: {} in {}ms", phase, duration.num_milliseconds()))
                .correlation_id(session_id)
                .field("phase", phase)
                .field("duration_ms", duration.num_milliseconds())
                .log()
                .await;

            Some(duration)
        } else {
            self.logger.warn(&format!("Attempted to end unknown phase: {}", phase))
                .field("phase", phase)
                .log()
                .await;
            None
        }
    }

    /// Phases started but not yet ended
    pub fn open_phases(&self) -> usize {
        self.start_times.len()
    }

    /// Log the headline figures of a finished session
    pub async fn log_session_complete(&self, result: &SessionResult) {
        self.logger.info("Probe session complete")
            .correlation_id(&result.session_id)
            .field("ping_ms", result.ping_ms())
            .field("jitter_ms", result.jitter_ms)
            .field("packet_loss_pct", result.packet_loss_pct)
            .field("download_mbps", result.download_mbps)
            .field("upload_mbps", result.upload_mbps)
            .field("quality", result.quality)
            .log()
            .await;
    }
}

/// Logger for stream and probe level failures
pub struct TransferLogger {
    logger: Logger,
}

impl TransferLogger {
    fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log a latency probe that got no response
    pub async fn log_probe_failure(&self, attempt: u32, error: &AppError, session_id: &str) {
        self.logger.warn(&format!("Latency probe {} lost: {}", attempt, error))
            .correlation_id(session_id)
            .field("attempt", attempt)
            .error_info(error)
            .log()
            .await;
    }

    /// Log a stream that ended with an error
    pub async fn log_stream_failure(
        &self,
        direction: TransferDirection,
        index: usize,
        bytes: u64,
        error: &str,
        session_id: &str,
    ) {
        self.logger.warn(&format!("{} stream {} failed after {} bytes: {}", direction, index, bytes, error))
            .correlation_id(session_id)
            .field("direction", direction)
            .field("stream", index)
            .field("bytes", bytes)
            .field("error", error)
            .log()
            .await;
    }

    /// Log the outcome of a transfer phase
    pub async fn log_phase_summary(&self, report: &PhaseReport, session_id: &str) {
        let level = if report.mbps.is_none() { LogLevel::Warn } else { LogLevel::Info };
        self.logger.log(level, &format!("{} phase finished", report.direction))
            .correlation_id(session_id)
            .field("direction", report.direction)
            .field("total_bytes", report.total_bytes)
            .field("duration_ms", report.duration_ms)
            .field("mbps", report.mbps)
            .field("failed_streams", report.failed_streams())
            .field("samples", report.history.len())
            .log()
            .await;
    }

    /// Log one aggregator tick of a finished phase
    pub async fn log_sample(&self, direction: TransferDirection, sample: &ThroughputSample, session_id: &str) {
        if !self.logger.would_log(LogLevel::Debug) {
            return;
        }
        self.logger.debug("Throughput sample")
            .correlation_id(session_id)
            .field("direction", direction)
            .sample(sample)
            .log()
            .await;
    }
}

/// Error event logger with enhanced context
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>, correlation_id: Option<&str>) {
        let message = if let Some(ctx) = context {
            format!("{}: {}", ctx, error)
        } else {
            error.to_string()
        };

        let mut builder = self.logger.error(&message)
            .error_info(error);

        if let Some(id) = correlation_id {
            builder = builder.correlation_id(id);
        }

        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }
}

/// Creates the loggers a probe run needs from one configuration
#[derive(Clone)]
pub struct LoggerFactory {
    config: Config,
    quiet: bool,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self { config, quiet: false }
    }

    /// Factory whose loggers drop every event a session emits
    pub fn quiet() -> Self {
        Self {
            config: Config::default(),
            quiet: true,
        }
    }

    fn logger(&self, name: &str) -> Logger {
        if self.quiet {
            Logger::quiet(name.to_string())
        } else {
            Logger::with_config(name.to_string(), &self.config)
        }
    }

    pub fn create_phase_logger(&self) -> PhaseLogger {
        PhaseLogger::from_logger(self.logger("PHASE"))
    }

    pub fn create_transfer_logger(&self) -> TransferLogger {
        TransferLogger::from_logger(self.logger("XFER"))
    }

    pub fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::from_logger(self.logger("ERR"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
    }

    #[test]
    fn test_logger_with_config() {
        let config = Config {
            debug: true,
            verbose: true,
            enable_color: false,
            ..Default::default()
        };

        let logger = Logger::with_config("TEST".to_string(), &config);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(!logger.use_color);

        let verbose = Logger::with_config("TEST".to_string(), &Config { verbose: true, ..Default::default() });
        assert_eq!(verbose.min_level, LogLevel::Info);
        assert_eq!(verbose.format, LogFormat::Console);

        let default_logger = Logger::with_config("TEST".to_string(), &Config::default());
        assert_eq!(default_logger.min_level, LogLevel::Warn);
    }

    #[test]
    fn test_would_log() {
        let mut logger = Logger::new("TEST".to_string());
        logger.set_level(LogLevel::Warn);

        assert!(!logger.would_log(LogLevel::Debug));
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));
        assert!(logger.would_log(LogLevel::Fatal));

        assert!(!Logger::quiet("Q".to_string()).would_log(LogLevel::Error));
    }

    #[test]
    fn test_console_format_short_correlation_id() {
        let logger = Logger::with_config(
            "TEST".to_string(),
            &Config { enable_color: false, ..Default::default() },
        );
        let builder = logger.warn("stream failed")
            .correlation_id("abcdef0123456789")
            .field("stream", 2);
        let output = logger.render(&builder.entry);
        assert!(output.contains(" WARN [TEST] stream failed [abcdef01]"));
        assert!(output.contains("{stream=2}"));
    }

    #[test]
    fn test_json_sample_entry() {
        let logger = Logger::with_config("XFER".to_string(), &Config { debug: true, ..Default::default() });
        let sample = ThroughputSample::new(Duration::from_millis(120), 42.5);
        let builder = logger.debug("Throughput sample")
            .correlation_id("session")
            .field("direction", TransferDirection::Download)
            .sample(&sample);
        let output = logger.render(&builder.entry);
        let parsed: LogEntry = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.level, LogLevel::Debug);
        assert_eq!(parsed.correlation_id.as_deref(), Some("session"));
        assert_eq!(parsed.fields["elapsed_ms"], 120);
        assert_eq!(parsed.fields["mbps"], 42.5);
    }

    #[test]
    fn test_error_fields() {
        let logger = Logger::new("ERR".to_string());
        let builder = logger.error("failed").error_info(&AppError::cancelled("ctrl-c"));
        assert_eq!(builder.entry.fields["error_category"], "CANCELLED");
        assert_eq!(builder.entry.fields["error_exit_code"], 130);
        assert_eq!(builder.entry.fields["error_recoverable"], false);
    }

    #[tokio::test]
    async fn test_phase_timing() {
        let mut phase_logger = PhaseLogger::from_logger(Logger::quiet("PHASE".to_string()));
        phase_logger.start_phase(SessionPhase::Latency, "session").await;
        assert_eq!(phase_logger.open_phases(), 1);

        let duration = phase_logger.end_phase(SessionPhase::Latency, "session").await;
        assert!(duration.is_some());
        assert_eq!(phase_logger.open_phases(), 0);

        assert!(phase_logger.end_phase(SessionPhase::Uploading, "session").await.is_none());
    }

    #[tokio::test]
    async fn test_sample_logging_needs_debug() {
        let sample = ThroughputSample::new(Duration::from_millis(60), 10.0);
        let quiet = LoggerFactory::quiet().create_transfer_logger();
        assert!(!quiet.logger.would_log(LogLevel::Debug));
        quiet.log_sample(TransferDirection::Upload, &sample, "session").await;

        let debug = LoggerFactory::new(Config { debug: true, ..Default::default() }).create_transfer_logger();
        assert!(debug.logger.would_log(LogLevel::Debug));
        debug.log_sample(TransferDirection::Upload, &sample, "session").await;
    }

    #[tokio::test]
    async fn test_logger_factory() {
        let factory = LoggerFactory::new(Config::default());

        assert_eq!(factory.create_phase_logger().logger.name(), "PHASE");
        assert_eq!(factory.create_transfer_logger().logger.name(), "XFER");
        assert_eq!(factory.create_error_logger().logger.name(), "ERR");
        assert!(factory.create_error_logger().logger.would_log(LogLevel::Error));

        let quiet = LoggerFactory::quiet();
        assert!(!quiet.create_transfer_logger().logger.would_log(LogLevel::Error));

        let error = AppError::scheduler("worker task panicked");
        quiet.create_error_logger().log_error(&error, Some("starting session"), Some("abc")).await;
    }
}
