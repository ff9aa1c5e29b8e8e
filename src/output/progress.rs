//! Live progress line on stderr while a session runs

use crate::executor::SessionObserver;
use crate::models::metrics::ThroughputSample;
use crate::types::SessionPhase;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

const BAR_WIDTH: usize = 30;

struct ProgressState {
    phase: SessionPhase,
    drawn_percent: Option<u32>,
    mbps: Option<f64>,
}

/// Session observer drawing a single self-overwriting progress line
pub struct ConsoleProgress {
    use_colors: bool,
    sink: Mutex<Box<dyn Write + Send>>,
    state: Mutex<ProgressState>,
}

impl ConsoleProgress {
    /// Draw to stderr
    pub fn stderr(use_colors: bool) -> Self {
        Self::with_writer(use_colors, Box::new(io::stderr()))
    }

    pub fn with_writer(use_colors: bool, sink: Box<dyn Write + Send>) -> Self {
        Self {
            use_colors,
            sink: Mutex::new(sink),
            state: Mutex::new(ProgressState {
                phase: SessionPhase::Idle,
                drawn_percent: None,
                mbps: None,
            }),
        }
    }

    /// Text of the progress line without the leading carriage return
    pub fn render_line(&self, phase: SessionPhase, percent: f64, mbps: Option<f64>) -> String {
        let percent = percent.clamp(0.0, 100.0);
        let filled = ((percent / 100.0) * BAR_WIDTH as f64).round() as usize;
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));

        let label = format!("{:<11}", phase.as_str());
        let rate = match (phase, mbps) {
            (SessionPhase::Downloading | SessionPhase::Uploading, Some(mbps)) => format!("  {:>8.2} Mbps", mbps),
            _ => String::new(),
        };

        if self.use_colors {
            format!("{} {} {:>3.0}%{}", label.cyan().bold(), bar.blue(), percent, rate)
        } else {
            format!("{} {} {:>3.0}%{}", label, bar, percent, rate)
        }
    }

    fn write(&self, text: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(|p| p.into_inner());
        sink.write_all(text.as_bytes()).unwrap_or(());
        sink.flush().unwrap_or(());
    }
}

impl SessionObserver for ConsoleProgress {
    fn on_progress(&self, phase: SessionPhase, percent: f64) {
        let line = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            let whole = percent.clamp(0.0, 100.0) as u32;
            if state.drawn_percent == Some(whole) && state.phase == phase {
                return;
            }
            state.drawn_percent = Some(whole);
            state.phase = phase;
            self.render_line(phase, percent, state.mbps)
        };
        self.write(&format!("\r{}", line));
    }

    fn on_sample(&self, _phase: SessionPhase, sample: &ThroughputSample, _history: &[ThroughputSample]) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.mbps = Some(sample.mbps);
    }

    fn on_phase_change(&self, phase: SessionPhase) {
        let finished_line = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            let had_line = state.drawn_percent.is_some();
            state.phase = phase;
            state.drawn_percent = None;
            state.mbps = None;
            had_line
        };

        if finished_line {
            self.write("\n");
        }
    }
}
