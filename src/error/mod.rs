//! Error handling for the speed probe

use thiserror::Error;

/// Custom error types for the speed probe
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (URLs, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// A single download or upload stream failed
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// A latency probe round trip failed
    #[error("Probe failure: {0}")]
    Probe(String),

    /// Fault in the session scheduler's own control logic
    #[error("Scheduler fault: {0}")]
    Scheduler(String),

    /// A session is already running on this scheduler
    #[error("Scheduler busy: {0}")]
    Busy(String),

    /// The session was cancelled by its caller
    #[error("Session cancelled: {0}")]
    Cancelled(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new transfer error
    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::Transfer(message.into())
    }

    /// Create a new probe failure
    pub fn probe<S: Into<String>>(message: S) -> Self {
        Self::Probe(message.into())
    }

    /// Create a new scheduler fault
    pub fn scheduler<S: Into<String>>(message: S) -> Self {
        Self::Scheduler(message.into())
    }

    /// Create a new busy error
    pub fn busy<S: Into<String>>(message: S) -> Self {
        Self::Busy(message.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Transfer(_) => "TRANSFER",
            Self::Probe(_) => "PROBE",
            Self::Scheduler(_) => "SCHEDULER",
            Self::Busy(_) => "BUSY",
            Self::Cancelled(_) => "CANCELLED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) => true,
            Self::Transfer(_) | Self::Probe(_) | Self::Busy(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => false,
            Self::Io(_) | Self::Scheduler(_) | Self::Cancelled(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Network(msg) => {
                format!("Network connectivity issue: {}\n\nSuggestion: Check your internet connection and try again.", msg)
            }
            Self::HttpRequest(msg) => {
                format!("HTTP request failed: {}\n\nSuggestion: The speed test server may be down or rejecting requests. Try another server with --server.", msg)
            }
            Self::Timeout(msg) => {
                format!("Request timed out: {}\n\nSuggestion: Increase the timeout value using --timeout or reduce --download-bytes.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Check the format of your URLs and numeric options.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Transfer(msg) => {
                format!("A transfer stream failed: {}\n\nSuggestion: Remaining streams still count; retry if results look low.", msg)
            }
            Self::Probe(msg) => {
                format!("A latency probe failed: {}\n\nSuggestion: Lost probes are reported as packet loss.", msg)
            }
            Self::Scheduler(msg) => {
                format!("The speed test could not run: {}\n\nSuggestion: Check the probe settings and try again.", msg)
            }
            Self::Busy(msg) => {
                format!("A speed test is already running: {}\n\nSuggestion: Wait for it to finish or cancel it first.", msg)
            }
            Self::Cancelled(msg) => {
                format!("The speed test was cancelled: {}", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::Network(_) | Self::HttpRequest(_) | Self::Transfer(_) | Self::Probe(_) => 2,  // Network issues
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::Scheduler(_) | Self::Busy(_) => 6,
            Self::Cancelled(_) => 130,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::HttpRequest(_) | Self::Transfer(_) | Self::Probe(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Busy(_) | Self::Cancelled(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) | Self::Scheduler(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            Self::scheduler(format!("worker task panicked: {}", error))
        } else {
            Self::cancelled(format!("Task aborted: {}", error))
        }
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error reporter for user-facing error output
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));

        if self.verbose {
            eprintln!();
            eprintln!("{}", error.user_friendly_message());

            if error.is_recoverable() {
                eprintln!();
                if self.use_color {
                    use colored::Colorize;
                    eprintln!("{}", "This error might be temporary. You can try running the command again.".green());
                } else {
                    eprintln!("This error might be temporary. You can try running the command again.");
                }
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
