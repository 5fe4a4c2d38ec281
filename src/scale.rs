//! Threshold color scale over the education percentages.

use crate::config::BUCKET_COUNT;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdScale {
    min: f64,
    max: f64,
    thresholds: Vec<f64>,
    colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub color: String,
}

/// Min and max of the finite values; `(0, 0)` when there are none.
pub fn extent(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((0.0, 0.0))
}

impl ThresholdScale {
    /// Splits `[min, max]` into `BUCKET_COUNT` equal-width buckets, one color
    /// each. `palette` must hold `BUCKET_COUNT` colors.
    pub fn new(min: f64, max: f64, palette: &[String]) -> Self {
        debug_assert_eq!(palette.len(), BUCKET_COUNT);
        let step = (max - min) / BUCKET_COUNT as f64;
        let thresholds = (1..BUCKET_COUNT).map(|i| min + step * i as f64).collect();
        Self {
            min,
            max,
            thresholds,
            colors: palette.to_vec(),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>, palette: &[String]) -> Self {
        let (min, max) = extent(values);
        Self::new(min, max, palette)
    }

    pub fn bucket_index(&self, value: f64) -> usize {
        self.thresholds.partition_point(|&t| t <= value)
    }

    pub fn color(&self, value: f64) -> &str {
        let index = self.bucket_index(value).min(self.colors.len().saturating_sub(1));
        self.colors.get(index).map(String::as_str).unwrap_or_default()
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn buckets(&self) -> Vec<Bucket> {
        let mut bounds = Vec::with_capacity(BUCKET_COUNT + 1);
        bounds.push(self.min);
        bounds.extend_from_slice(&self.thresholds);
        bounds.push(self.max);

        bounds
            .windows(2)
            .zip(&self.colors)
            .map(|(pair, color)| Bucket {
                lower: pair[0],
                upper: pair[1],
                color: color.clone(),
            })
            .collect()
    }
}
