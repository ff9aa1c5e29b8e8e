//! Output formatting and display system
//!
//! Session results can be rendered as plain text, colored text, a verbose
//! breakdown or JSON. Live progress goes to stderr so stdout stays parseable.

mod colored;
mod formatter;
pub mod progress;
pub mod share_card;
pub mod sparkline;
mod verbose;

pub use colored::{tier_color, ColorScheme, ColoredFormatter};
pub use formatter::{
    format_bytes, format_duration, format_mbps, format_ms, Alignment, Column, FormattingOptions, OutputFormatter,
    PlainFormatter, RowData, TableFormat,
};
pub use progress::ConsoleProgress;
pub use share_card::ShareCard;
pub use verbose::VerboseFormatter;

use crate::{
    error::{AppError, Result},
    models::{metrics::SessionResult, Config},
    servers::ServerRanking,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    verbose_formatter: Option<VerboseFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self {
            formatter,
            verbose_formatter: None,
        }
    }

    /// Coordinator that appends the verbose breakdown when `config.verbose` is set
    pub fn from_config(config: &Config) -> Self {
        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
        Self {
            formatter,
            verbose_formatter: config.verbose.then(|| VerboseFormatter::new(config)),
        }
    }

    /// Render a finished session
    pub async fn display_results(&self, result: &SessionResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Speed Probe Results")?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_latency(result)?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_throughput(&result.download)?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_throughput(&result.upload)?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_quality(&result.quality)?);

        if let Some(verbose_formatter) = &self.verbose_formatter {
            output.push_str("\n\n");
            output.push_str(&verbose_formatter.format_verbose_results(result).await?);
        }

        Ok(output)
    }

    pub fn display_quick_summary(&self, result: &SessionResult) -> Result<String> {
        self.formatter.format_quick_summary(result)
    }

    pub fn display_server_ranking(&self, ranking: &ServerRanking) -> Result<String> {
        self.formatter.format_server_ranking(ranking)
    }

    pub fn display_error(&self, error: &str) -> Result<String> {
        self.formatter.format_error(error)
    }

    pub fn display_warning(&self, warning: &str) -> Result<String> {
        self.formatter.format_warning(warning)
    }

    pub fn display_success(&self, message: &str) -> Result<String> {
        self.formatter.format_success(message)
    }

    /// Pretty-printed JSON document for `--json`
    pub fn to_json(result: &SessionResult) -> Result<String> {
        serde_json::to_string_pretty(result)
            .map_err(|e| AppError::parse(format!("Failed to serialize session result: {}", e)))
    }
}
