use crate::scale::{Bucket, ThresholdScale};
use serde::Serialize;
use std::fmt::Write;

const SWATCH_WIDTH: f64 = 60.0;
const SWATCH_HEIGHT: f64 = 12.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    #[serde(flatten)]
    pub bucket: Bucket,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn new(scale: &ThresholdScale) -> Self {
        let entries = scale
            .buckets()
            .into_iter()
            .map(|bucket| LegendEntry {
                label: format!("{:.2}–{:.2}", bucket.lower, bucket.upper),
                bucket,
            })
            .collect();
        Self { entries }
    }

    /// Horizontal row of swatches with the bucket range under each one.
    pub fn to_svg(&self) -> String {
        let width = SWATCH_WIDTH * self.entries.len() as f64;
        let mut svg = format!(
            r##"<svg id="legend" width="{:.0}" height="40" viewBox="0 0 {:.0} 40">"##,
            width, width
        );
        for (i, entry) in self.entries.iter().enumerate() {
            let x = i as f64 * SWATCH_WIDTH;
            let _ = write!(
                svg,
                r##"<rect class="legend-swatch" x="{:.0}" y="0" width="{:.0}" height="{:.0}" fill="{}"/><text x="{:.0}" y="28" text-anchor="middle" font-size="9">{}</text>"##,
                x,
                SWATCH_WIDTH,
                SWATCH_HEIGHT,
                entry.bucket.color,
                x + SWATCH_WIDTH / 2.0,
                entry.label
            );
        }
        svg.push_str("</svg>");
        svg
    }
}
