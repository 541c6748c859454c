//! Window aggregation and descriptive statistics over a [`TrafficSeries`].
//!
//! Every spread figure here is a *population* standard deviation
//! (divide by `n`, no Bessel correction). A one-point window therefore has
//! `std_dev == 0`.

use crate::error::{AnalysisError, Result};
use crate::series::TrafficSeries;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Contiguous range `[start_index, end_index)` of a series with its aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub mean: f64,
    pub std_dev: f64,
    pub max: f64,
    pub count: usize,
    /// Trailing window shorter than the requested size.
    pub partial: bool,
}

impl Window {
    /// Time between the first and last observation in the window.
    pub fn span(&self) -> Duration { self.end_time - self.start_time }
}

/// Mean and spread used as the z-score reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Split `series` into non-overlapping windows of `window_size` points, left to right.
pub fn compute(series: &TrafficSeries, window_size: usize) -> Result<Vec<Window>> {
    if window_size == 0 || window_size > series.len() {
        return Err(AnalysisError::invalid(format!(
            "window_size must be in 1..={}, got {window_size}",
            series.len()
        )));
    }
    let points = series.points();
    let mut windows = Vec::with_capacity(points.len().div_ceil(window_size));
    let mut start = 0;
    while start < points.len() {
        let end = (start + window_size).min(points.len());
        let chunk = &points[start..end];
        let (mean, std_dev) = mean_std(chunk.iter().map(|p| p.value));
        let max = chunk.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        windows.push(Window {
            start_index: start,
            end_index: end,
            start_time: chunk[0].timestamp,
            end_time: chunk[chunk.len() - 1].timestamp,
            mean,
            std_dev,
            max,
            count: chunk.len(),
            partial: chunk.len() < window_size,
        });
        start = end;
    }
    Ok(windows)
}

/// Pool the raw points spanned by `windows` into one baseline.
pub fn pooled(series: &TrafficSeries, windows: &[Window]) -> Baseline {
    let values = windows.iter().flat_map(|w| series.slice(w).iter().map(|p| p.value));
    let count = windows.iter().map(|w| series.slice(w).len()).sum();
    let (mean, std_dev) = mean_std(values);
    Baseline { mean, std_dev, count }
}

/// Percentile with linear interpolation between closest ranks (`p` in `0..=100`).
pub fn percentile(values: &[f64], p: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(AnalysisError::invalid("percentile of an empty sample"));
    }
    if !(0.0..=100.0).contains(&p) {
        return Err(AnalysisError::invalid(format!("percentile must be in 0..=100, got {p}")));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub fn summarize(series: &TrafficSeries) -> Result<SeriesSummary> {
    if series.is_empty() {
        return Err(AnalysisError::invalid("cannot summarize an empty series"));
    }
    let mut sorted: Vec<f64> = series.values().collect();
    sorted.sort_by(f64::total_cmp);
    let (mean, std_dev) = mean_std(sorted.iter().copied());
    Ok(SeriesSummary {
        count: sorted.len(),
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p50: percentile_sorted(&sorted, 50.0),
        p95: percentile_sorted(&sorted, 95.0),
        p99: percentile_sorted(&sorted, 99.0),
    })
}

// Two-pass population mean / std; (0, 0) for an empty input.
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (sum, n) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}
