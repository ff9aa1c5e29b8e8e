//! SVG summary card of a finished session

use crate::error::{AppError, Result};
use crate::models::metrics::SessionResult;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

pub const CARD_WIDTH: u32 = 600;
pub const CARD_HEIGHT: u32 = 300;
pub const GENERATOR: &str = "MDI Network Diagnostics";

/// Values shown on the card
#[derive(Debug, Clone, PartialEq)]
pub struct ShareCard {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
    pub server: String,
    pub timestamp: DateTime<Utc>,
}

impl ShareCard {
    pub fn from_result(result: &SessionResult) -> Self {
        Self {
            download_mbps: result.download_mbps,
            upload_mbps: result.upload_mbps,
            ping_ms: result.ping_ms(),
            server: result.server.clone().unwrap_or_else(|| "Custom".to_string()),
            timestamp: result.completed_at,
        }
    }

    /// Render the SVG document
    pub fn render(&self) -> Result<String> {
        let mut svg = String::new();
        let fmt_err = |e: std::fmt::Error| AppError::internal(format!("SVG rendering failed: {}", e));

        writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#).map_err(fmt_err)?;
        writeln!(
            svg,
            r#"<svg width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">"#,
            w = CARD_WIDTH,
            h = CARD_HEIGHT
        )
        .map_err(fmt_err)?;
        svg.push_str(concat!(
            "  <defs>\n",
            "    <linearGradient id=\"bg\" x1=\"0%\" y1=\"0%\" x2=\"100%\" y2=\"100%\">\n",
            "      <stop offset=\"0%\" style=\"stop-color:#0f172a\"/>\n",
            "      <stop offset=\"100%\" style=\"stop-color:#1e3a5f\"/>\n",
            "    </linearGradient>\n",
            "  </defs>\n",
        ));
        writeln!(
            svg,
            r#"  <rect width="{}" height="{}" fill="url(#bg)"/>"#,
            CARD_WIDTH, CARD_HEIGHT
        )
        .map_err(fmt_err)?;
        writeln!(
            svg,
            r##"  <text x="300" y="40" text-anchor="middle" fill="#06b6d4" font-family="Arial" font-size="24" font-weight="bold">Network Speed Test</text>"##
        )
        .map_err(fmt_err)?;

        let tiles = [
            (30, "DOWNLOAD", self.download_mbps, "Mbps", "#06b6d4"),
            (220, "UPLOAD", self.upload_mbps, "Mbps", "#a855f7"),
            (410, "PING", self.ping_ms, "ms", "#22c55e"),
        ];
        for (x, label, value, unit, color) in tiles {
            let center = x + 80;
            let value = value.map_or_else(|| "--".to_string(), |v| format!("{:.2}", v));
            writeln!(svg, r##"  <rect x="{}" y="70" width="160" height="80" rx="10" fill="#1e293b"/>"##, x)
                .map_err(fmt_err)?;
            writeln!(
                svg,
                r##"  <text x="{}" y="100" text-anchor="middle" fill="#94a3b8" font-family="Arial" font-size="12">{}</text>"##,
                center, label
            )
            .map_err(fmt_err)?;
            writeln!(
                svg,
                r##"  <text x="{}" y="135" text-anchor="middle" fill="{}" font-family="Arial" font-size="28" font-weight="bold">{}</text>"##,
                center, color, value
            )
            .map_err(fmt_err)?;
            writeln!(
                svg,
                r##"  <text x="{}" y="150" text-anchor="middle" fill="#64748b" font-family="Arial" font-size="10">{}</text>"##,
                center, unit
            )
            .map_err(fmt_err)?;
        }

        writeln!(
            svg,
            r##"  <text x="30" y="215" fill="#64748b" font-family="Arial" font-size="12">Server: <tspan fill="#94a3b8">{}</tspan></text>"##,
            escape_xml(&self.server)
        )
        .map_err(fmt_err)?;
        writeln!(
            svg,
            r##"  <text x="30" y="235" fill="#64748b" font-family="Arial" font-size="12">Date: <tspan fill="#94a3b8">{}</tspan></text>"##,
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        )
        .map_err(fmt_err)?;
        writeln!(
            svg,
            r##"  <text x="300" y="280" text-anchor="middle" fill="#475569" font-family="Arial" font-size="10">{}</text>"##,
            GENERATOR
        )
        .map_err(fmt_err)?;
        svg.push_str("</svg>\n");

        Ok(svg)
    }

    /// Render and write the card to `path`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let svg = self.render()?;
        std::fs::write(path, svg)
            .map_err(|e| AppError::io(format!("Failed to write share card {}: {}", path.display(), e)))
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_result;
    use tempfile::TempDir;

    #[test]
    fn test_card_contains_headline_values() {
        let svg = ShareCard::from_result(&sample_result()).render().unwrap();

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(r#"width="600" height="300""#));
        assert!(svg.contains(">94.46<"));
        assert!(svg.contains(">41.20<"));
        assert!(svg.contains(">12.00<"));
        assert!(svg.contains("Cloudflare"));
        assert!(svg.contains("2026-03-14"));
        assert!(svg.contains(GENERATOR));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_missing_values_render_as_dashes() {
        let mut result = sample_result();
        result.upload_mbps = None;
        let svg = ShareCard::from_result(&result).render().unwrap();
        assert!(svg.contains(">--<"));
    }

    #[test]
    fn test_server_name_is_escaped() {
        let mut result = sample_result();
        result.server = Some("R&D <lab>".to_string());
        let svg = ShareCard::from_result(&result).render().unwrap();
        assert!(svg.contains("R&amp;D &lt;lab&gt;"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.svg");
        ShareCard::from_result(&sample_result()).write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("DOWNLOAD"));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("card.svg");
        let err = ShareCard::from_result(&sample_result()).write(&path).unwrap_err();
        assert!(err.to_string().contains("share card"));
    }
}
