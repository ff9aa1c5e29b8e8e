//! Speed Probe - Main CLI Application
//!
//! Measures latency, jitter, packet loss and multi-stream download/upload
//! throughput against a speed test server, then rates the connection for
//! streaming, gaming and video conferencing.

use clap::Parser;
use speed_probe::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    // Worker panics are contained by their session; only the main thread exits
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        if std::thread::current().name() == Some("main") {
            process::exit(99);
        }
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    let outcome = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (--write-env-example PATH writes a template)");
            eprintln!("  - Run --list-servers to see the built-in server names");
            eprintln!("  - Custom endpoints need both --download-url and --upload-url");
        }
        AppError::Network(_) | AppError::HttpRequest(_) | AppError::Transfer(_) | AppError::Probe(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Try another server with --server");
            eprintln!("  - Reduce parallel streams with --streams");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout help:");
            eprintln!("  - Increase the request timeout with --timeout");
            eprintln!("  - Request less data with --download-bytes");
        }
        _ => {}
    }
}
