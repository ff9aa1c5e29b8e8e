//! Verbose mode output with per-stream and per-probe detail

use super::formatter::{
    align_text, fmt_err, format_bytes, format_duration, format_mbps, format_ms, phase_title, Alignment,
};
use crate::{
    error::Result,
    logging::Logger,
    models::{
        metrics::{PhaseReport, SessionResult},
        Config,
    },
    stats::{QualityClassifier, TierThresholds},
    types::UseCase,
};
use colored::Colorize;
use std::fmt::Write as _;

/// Detailed session output formatter
pub struct VerboseFormatter {
    logger: Logger,
    classifier: QualityClassifier,
    use_color: bool,
}

impl VerboseFormatter {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("VERBOSE_OUTPUT".to_string(), config),
            classifier: QualityClassifier::new(),
            use_color: config.enable_color,
        }
    }

    /// Format complete verbose output for a finished session
    pub async fn format_verbose_results(&self, result: &SessionResult) -> Result<String> {
        self.logger
            .debug("Rendering verbose session output")
            .correlation_id(&result.session_id)
            .field("latency_samples", result.latency_samples.len())
            .log()
            .await;

        let mut output = String::new();
        output.push_str(&self.format_verbose_header(result)?);
        output.push_str("\n\n");
        output.push_str(&self.format_latency_samples(result)?);
        output.push_str("\n\n");
        output.push_str(&self.format_stream_breakdown(&result.download)?);
        output.push_str("\n\n");
        output.push_str(&self.format_stream_breakdown(&result.upload)?);
        output.push_str("\n\n");
        output.push_str(&self.format_threshold_check(result)?);

        Ok(output)
    }

    fn heading(&self, title: &str) -> String {
        if self.use_color {
            title.bold().cyan().to_string()
        } else {
            title.to_string()
        }
    }

    fn format_verbose_header(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.heading("DETAILED SESSION ANALYSIS")).map_err(fmt_err)?;
        writeln!(output, "{}", "=".repeat(60)).map_err(fmt_err)?;
        writeln!(output, "Session:     {}", result.session_id).map_err(fmt_err)?;
        writeln!(output, "Server:      {}", result.server.as_deref().unwrap_or("custom endpoints"))
            .map_err(fmt_err)?;
        writeln!(output, "Started:     {}", result.started_at.format("%Y-%m-%d %H:%M:%S UTC")).map_err(fmt_err)?;
        write!(
            output,
            "Duration:    {}",
            format_duration(result.duration().as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_latency_samples(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.heading("LATENCY PROBES")).map_err(fmt_err)?;
        writeln!(output, "{}", "-".repeat(40)).map_err(fmt_err)?;

        if result.latency_samples.is_empty() {
            write!(output, "No latency probes were sent").map_err(fmt_err)?;
            return Ok(output);
        }

        writeln!(output, "{:>4}  {:>12}  {}", "#", "RTT", "Status").map_err(fmt_err)?;
        for (i, sample) in result.latency_samples.iter().enumerate() {
            let (rtt, status) = if sample.succeeded {
                (format!("{:.3} ms", sample.rtt_ms), "OK".to_string())
            } else {
                ("-".to_string(), self.failure("LOST"))
            };
            writeln!(output, "{:>4}  {:>12}  {}", i + 1, rtt, status).map_err(fmt_err)?;
        }

        write!(
            output,
            "Mean {} | Min {} | Max {} | Jitter {} | Loss {:.1}%",
            format_ms(result.latency.mean),
            format_ms(result.latency.min),
            format_ms(result.latency.max),
            format_ms(result.jitter_ms),
            result.packet_loss_pct
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    fn format_stream_breakdown(&self, report: &PhaseReport) -> Result<String> {
        let mut output = String::new();
        let title = format!("{} STREAMS", phase_title(report).to_uppercase());

        writeln!(output, "{}", self.heading(&title)).map_err(fmt_err)?;
        writeln!(output, "{}", "-".repeat(40)).map_err(fmt_err)?;

        for stream in &report.streams {
            let share = if report.total_bytes > 0 {
                stream.bytes as f64 * 100.0 / report.total_bytes as f64
            } else {
                0.0
            };
            let status = match &stream.error {
                Some(error) => self.failure(&format!("FAILED: {}", error)),
                None => "OK".to_string(),
            };
            writeln!(
                output,
                "  #{:<3} {} {:>6.1}%  {}",
                stream.index,
                align_text(&format_bytes(stream.bytes), 10, Alignment::Right),
                share,
                status
            )
            .map_err(fmt_err)?;
        }

        write!(
            output,
            "Total {} in {} = {} (peak tick {}, {} samples)",
            format_bytes(report.total_bytes),
            format_duration(report.duration_ms),
            format_mbps(report.mbps),
            format_mbps(report.peak_mbps()),
            report.history.len()
        )
        .map_err(fmt_err)?;

        Ok(output)
    }

    /// Verdict per use case next to the Good and Fair limits it was checked against
    fn format_threshold_check(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();
        let thresholds = self.classifier.thresholds();

        write!(output, "{}", self.heading("QUALITY THRESHOLDS")).map_err(fmt_err)?;
        for use_case in UseCase::ALL {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  {:<20} {:<5} (Good: {}; Fair: {})",
                use_case.label(),
                result.quality.tier(use_case).as_str(),
                describe_limits(use_case, &thresholds.good),
                describe_limits(use_case, &thresholds.fair)
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn failure(&self, text: &str) -> String {
        if self.use_color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }
}

fn describe_limits(use_case: UseCase, limits: &TierThresholds) -> String {
    match use_case {
        UseCase::Streaming => format!(
            "≥{} Mbps down, <{} ms",
            limits.streaming_download_mbps, limits.streaming_latency_ms
        ),
        UseCase::Gaming => format!(
            "<{} ms, <{} ms jitter, <{}% loss",
            limits.gaming_latency_ms, limits.gaming_jitter_ms, limits.gaming_packet_loss_pct
        ),
        UseCase::Conferencing => format!(
            "≥{} Mbps up, ≥{} Mbps down, <{} ms",
            limits.conferencing_upload_mbps, limits.conferencing_download_mbps, limits.conferencing_latency_ms
        ),
    }
}
