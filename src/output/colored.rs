//! Colored formatter implementation with terminal color support
//!
//! Tiers are colour coded green/yellow/red; throughput and latency figures are
//! tinted by how they compare with the quality thresholds.

use super::formatter::{
    fmt_err, format_bytes, format_duration, format_mbps, format_ms, phase_title, FormattingOptions,
    OutputFormatter, PlainFormatter,
};
use super::sparkline;
use crate::{
    error::Result,
    models::metrics::{PhaseReport, QualityReport, SessionResult},
    servers::ServerRanking,
    types::{QualityTier, UseCase},
};
use colored::*;
use std::fmt::Write as _;

/// Colour for a quality tier
pub fn tier_color(tier: QualityTier) -> Color {
    match tier {
        QualityTier::Good => Color::Green,
        QualityTier::Fair => Color::Yellow,
        QualityTier::Poor => Color::Red,
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Bold and coloured, or untouched without colour
    fn emphasis(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.bold().color(color)
        } else {
            text.normal()
        }
    }

    fn section_header(&self, title: &str) -> String {
        self.emphasis(title, self.color_scheme.header).to_string()
    }

    fn latency_colored(&self, ms: Option<f64>) -> ColoredString {
        let text = format_ms(ms);
        let color = match ms {
            Some(value) if value < 50.0 => self.color_scheme.success,
            Some(value) if value < 100.0 => self.color_scheme.warning,
            Some(_) => self.color_scheme.error,
            None => self.color_scheme.muted,
        };
        self.colorize(&text, color)
    }

    fn loss_colored(&self, pct: f64) -> ColoredString {
        let text = format!("{:.1}%", pct);
        let color = if pct == 0.0 {
            self.color_scheme.success
        } else if pct < 2.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&text, color)
    }

    fn tier_colored(&self, tier: QualityTier) -> ColoredString {
        let text = format!("{:<5}", tier.as_str());
        if self.options.enable_color {
            text.color(tier_color(tier)).bold()
        } else {
            text.normal()
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        writeln!(output, "  {}  ", self.emphasis(title, self.color_scheme.header)).map_err(fmt_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_latency(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.section_header("Latency")).map_err(fmt_err)?;
        writeln!(output, "  Ping:         {}", self.latency_colored(result.ping_ms())).map_err(fmt_err)?;
        writeln!(output, "  Jitter:       {}", self.latency_colored(result.jitter_ms)).map_err(fmt_err)?;
        write!(output, "  Packet Loss:  {}", self.loss_colored(result.packet_loss_pct)).map_err(fmt_err)?;

        if self.options.verbose_mode {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  Mean/Max:     {} / {}",
                self.colorize(&format_ms(result.latency.mean), self.color_scheme.muted),
                self.colorize(&format_ms(result.latency.max), self.color_scheme.muted)
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_throughput(&self, report: &PhaseReport) -> Result<String> {
        let mut output = String::new();

        let speed = match report.mbps {
            Some(_) => self.emphasis(&format_mbps(report.mbps), self.color_scheme.info),
            None => self.colorize("N/A", self.color_scheme.error),
        };

        writeln!(output, "{}", self.section_header(phase_title(report))).map_err(fmt_err)?;
        writeln!(output, "  Speed:        {}", speed).map_err(fmt_err)?;
        write!(
            output,
            "  Transferred:  {}",
            self.colorize(
                &format!("{} in {}", format_bytes(report.total_bytes), format_duration(report.duration_ms)),
                self.color_scheme.muted
            )
        )
        .map_err(fmt_err)?;

        let failed = report.failed_streams();
        if failed > 0 {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  Streams:      {}",
                self.colorize(
                    &format!("{} of {} failed", failed, report.streams.len()),
                    self.color_scheme.warning
                )
            )
            .map_err(fmt_err)?;
        }

        if !report.history.is_empty() {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  History:      {}",
                self.colorize(
                    &sparkline::render(&report.history, self.options.sparkline_width),
                    self.color_scheme.info
                )
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_quality(&self, quality: &QualityReport) -> Result<String> {
        let mut output = String::new();

        write!(output, "{}", self.section_header("Quality Assessment")).map_err(fmt_err)?;
        for use_case in UseCase::ALL {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  {:<20} {}",
                use_case.label(),
                self.tier_colored(quality.tier(use_case))
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_quick_summary(&self, result: &SessionResult) -> Result<String> {
        Ok(format!(
            "↓ {} | ↑ {} | Ping {} | Jitter {} | Loss {}",
            self.bold(&format_mbps(result.download_mbps)),
            self.bold(&format_mbps(result.upload_mbps)),
            self.latency_colored(result.ping_ms()),
            self.latency_colored(result.jitter_ms),
            self.loss_colored(result.packet_loss_pct)
        ))
    }

    fn format_server_ranking(&self, ranking: &ServerRanking) -> Result<String> {
        let mut output = String::new();
        let recommended = ranking.recommended().map(|s| s.server.name.clone());

        write!(output, "{}", self.section_header("Speed Test Servers")).map_err(fmt_err)?;
        for status in &ranking.servers {
            let latency = match status.latency_ms {
                Some(ms) => self.colorize(&format!("{:>6} ms", ms), self.color_scheme.success),
                None => self.colorize("unreachable", self.color_scheme.error),
            };
            let marker = if recommended.as_deref() == Some(status.server.name.as_str()) {
                self.colorize("★ recommended", self.color_scheme.warning).to_string()
            } else {
                String::new()
            };

            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  {:<12} {:<12} {}  {}",
                status.server.name, status.server.location, latency, marker
            )
            .map_err(fmt_err)?;
        }

        if ranking.available_count() == 0 {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "  {}",
                self.plain_formatter.format_warning("No server answered within the timeout")?
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("⚠", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✓", self.color_scheme.success), message))
    }
}

impl ColoredFormatter {
    /// Check if the terminal supports colors
    pub fn supports_color() -> bool {
        colored::control::SHOULD_COLORIZE.should_colorize()
    }

    pub fn set_colors_enabled(&mut self, enabled: bool) {
        self.options.enable_color = enabled;
    }
}
