//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use super::sparkline;
use crate::{
    error::{AppError, Result},
    models::metrics::{PhaseReport, QualityReport, SessionResult},
    servers::ServerRanking,
    types::UseCase,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Ping, jitter and packet loss
    fn format_latency(&self, result: &SessionResult) -> Result<String>;

    /// Throughput figure and history of one transfer phase
    fn format_throughput(&self, report: &PhaseReport) -> Result<String>;

    /// Quality tier per use case
    fn format_quality(&self, quality: &QualityReport) -> Result<String>;

    /// Single-line summary of a finished session
    fn format_quick_summary(&self, result: &SessionResult) -> Result<String>;

    /// Servers ranked by probe latency
    fn format_server_ranking(&self, ranking: &ServerRanking) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Enable verbose mode with detailed information
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Width of throughput sparklines in characters
    pub sparkline_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            sparkline_width: 40,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// `123.45 Mbps`, or `N/A` when the phase moved no data
pub fn format_mbps(mbps: Option<f64>) -> String {
    match mbps {
        Some(value) if value >= 100.0 => format!("{:.0} Mbps", value),
        Some(value) => format!("{:.2} Mbps", value),
        None => "N/A".to_string(),
    }
}

/// Round-trip time in milliseconds, or `N/A`
pub fn format_ms(ms: Option<f64>) -> String {
    match ms {
        Some(value) => format!("{:.1} ms", value),
        None => "N/A".to_string(),
    }
}

/// Human-readable byte count with decimal units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.0}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Title of a transfer phase
pub(crate) fn phase_title(report: &PhaseReport) -> &'static str {
    match report.direction {
        crate::types::TransferDirection::Download => "Download",
        crate::types::TransferDirection::Upload => "Upload",
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &widths, format));
            output.push('\n');
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&widths));
        }

        output
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        format
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let content = rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                content
                    .max(column.min_width)
                    .max(column.header.len())
                    .min(column.max_width)
            })
            .collect()
    }

    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format
                .columns
                .get(idx)
                .map(|c| c.alignment)
                .unwrap_or(Alignment::Left);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(padding - left_pad))
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_latency(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Latency:").map_err(fmt_err)?;
        writeln!(output, "--------").map_err(fmt_err)?;
        writeln!(output, "Ping:         {}", format_ms(result.ping_ms())).map_err(fmt_err)?;
        writeln!(output, "Jitter:       {}", format_ms(result.jitter_ms)).map_err(fmt_err)?;
        write!(output, "Packet Loss:  {:.1}%", result.packet_loss_pct).map_err(fmt_err)?;

        if self.options.verbose_mode {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "Mean/Max:     {} / {}",
                format_ms(result.latency.mean),
                format_ms(result.latency.max)
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_throughput(&self, report: &PhaseReport) -> Result<String> {
        let mut output = String::new();
        let title = phase_title(report);

        writeln!(output, "{}:", title).map_err(fmt_err)?;
        writeln!(output, "{}", "-".repeat(title.len() + 1)).map_err(fmt_err)?;
        writeln!(output, "Speed:        {}", format_mbps(report.mbps)).map_err(fmt_err)?;
        write!(
            output,
            "Transferred:  {} in {}",
            format_bytes(report.total_bytes),
            format_duration(report.duration_ms)
        )
        .map_err(fmt_err)?;

        let failed = report.failed_streams();
        if failed > 0 {
            writeln!(output).map_err(fmt_err)?;
            write!(output, "Streams:      {} of {} failed", failed, report.streams.len()).map_err(fmt_err)?;
        }

        if !report.history.is_empty() {
            writeln!(output).map_err(fmt_err)?;
            write!(
                output,
                "History:      {}",
                sparkline::render(&report.history, self.options.sparkline_width)
            )
            .map_err(fmt_err)?;
        }

        Ok(output)
    }

    fn format_quality(&self, quality: &QualityReport) -> Result<String> {
        let format = TableFormat {
            columns: vec![
                Column::new("Use Case", Alignment::Left, 18, 30),
                Column::new("Quality", Alignment::Center, 8, 10),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        };

        let rows: Vec<RowData> = UseCase::ALL
            .iter()
            .map(|&use_case| vec![use_case.label().to_string(), quality.tier(use_case).to_string()])
            .collect();

        Ok(format!("Quality Assessment:\n{}", self.create_table(&format, &rows)))
    }

    fn format_quick_summary(&self, result: &SessionResult) -> Result<String> {
        Ok(format!(
            "Download: {} | Upload: {} | Ping: {} | Jitter: {} | Loss: {:.1}%",
            format_mbps(result.download_mbps),
            format_mbps(result.upload_mbps),
            format_ms(result.ping_ms()),
            format_ms(result.jitter_ms),
            result.packet_loss_pct
        ))
    }

    fn format_server_ranking(&self, ranking: &ServerRanking) -> Result<String> {
        let format = TableFormat {
            columns: vec![
                Column::new("Server", Alignment::Left, 10, 20),
                Column::new("Location", Alignment::Left, 10, 20),
                Column::new("Latency", Alignment::Right, 8, 12),
                Column::new("Upload", Alignment::Center, 6, 8),
                Column::new("", Alignment::Left, 0, 14),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        };

        let recommended = ranking.recommended().map(|s| s.server.name.clone());
        let rows: Vec<RowData> = ranking
            .servers
            .iter()
            .map(|status| {
                vec![
                    status.server.name.clone(),
                    status.server.location.clone(),
                    status
                        .latency_ms
                        .map(|ms| format!("{} ms", ms))
                        .unwrap_or_else(|| "unreachable".to_string()),
                    if status.server.has_upload() { "yes" } else { "no" }.to_string(),
                    if recommended.as_deref() == Some(status.server.name.as_str()) {
                        "recommended".to_string()
                    } else {
                        String::new()
                    },
                ]
            })
            .collect();

        Ok(self.create_table(&format, &rows))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
