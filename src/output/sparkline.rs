//! Block-character sparklines for throughput history

use crate::models::metrics::ThroughputSample;

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render `history` into at most `width` characters
///
/// Longer histories are bucketed and each bucket shows its mean. The scale
/// runs from zero to the highest bucket.
pub fn render(history: &[ThroughputSample], width: usize) -> String {
    if history.is_empty() || width == 0 {
        return String::new();
    }

    let values = bucket(history, width);
    let peak = values.iter().cloned().fold(0.0_f64, f64::max);
    if peak <= 0.0 || !peak.is_finite() {
        return LEVELS[0].to_string().repeat(values.len());
    }

    values
        .iter()
        .map(|&value| {
            let ratio = (value / peak).clamp(0.0, 1.0);
            let index = (ratio * (LEVELS.len() - 1) as f64).round() as usize;
            LEVELS[index.min(LEVELS.len() - 1)]
        })
        .collect()
}

fn bucket(history: &[ThroughputSample], width: usize) -> Vec<f64> {
    if history.len() <= width {
        return history.iter().map(|s| s.mbps).collect();
    }

    (0..width)
        .map(|i| {
            let start = i * history.len() / width;
            let end = ((i + 1) * history.len() / width).max(start + 1);
            let slice = &history[start..end];
            slice.iter().map(|s| s.mbps).sum::<f64>() / slice.len() as f64
        })
        .collect()
}
