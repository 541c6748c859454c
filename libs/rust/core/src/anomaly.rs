//! Baseline z-score detection over fixed-size windows.
//!
//! The first `baseline_window_count` windows are pooled into the reference
//! baseline and reported as such; they are never scored against themselves.
//! Every later window is scored as
//!
//! ```text
//! z        = (window.mean - baseline.mean) / max(baseline.std_dev, epsilon)
//! severity = clamp(z / (3 * z_threshold), 0, 1)
//! ```

use crate::error::{AnalysisError, Result};
use crate::series::TrafficSeries;
use crate::stats::{self, Baseline, Window};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_WINDOW_SIZE: usize = 2;
pub const DEFAULT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnomalyLabel {
    Normal,
    Suspicious,
    Attack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub window: Window,
    pub severity: f64,
    pub z_score: f64,
    pub label: AnomalyLabel,
    /// Window belongs to the reference baseline.
    pub baseline: bool,
}

impl Anomaly {
    pub fn is_flagged(&self) -> bool { self.label != AnomalyLabel::Normal }
}

/// Maximal run of consecutive flagged windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackEpisode {
    pub first_window: usize,
    pub last_window: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub peak_severity: f64,
    pub peak_z_score: f64,
    pub label: AnomalyLabel,
}

impl AttackEpisode {
    pub fn duration(&self) -> Duration { self.end_time - self.start_time }
    pub fn window_count(&self) -> usize { self.last_window - self.first_window + 1 }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub window_size: usize,
    pub epsilon: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self { Self { window_size: MIN_WINDOW_SIZE, epsilon: DEFAULT_EPSILON } }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    cfg: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(cfg: DetectorConfig) -> Result<Self> {
        if cfg.window_size < MIN_WINDOW_SIZE {
            return Err(AnalysisError::invalid(format!("window_size must be at least {MIN_WINDOW_SIZE}, got {}", cfg.window_size)));
        }
        if !cfg.epsilon.is_finite() || cfg.epsilon <= 0.0 {
            return Err(AnalysisError::invalid(format!("epsilon must be positive, got {}", cfg.epsilon)));
        }
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DetectorConfig { &self.cfg }

    /// Score every window of `series`; output is one entry per window, in order.
    pub fn detect(&self, series: &TrafficSeries, baseline_window_count: usize, z_threshold: f64) -> Result<Vec<Anomaly>> {
        if !z_threshold.is_finite() || z_threshold <= 0.0 {
            return Err(AnalysisError::invalid(format!("z_threshold must be positive, got {z_threshold}")));
        }
        if baseline_window_count == 0 {
            return Err(AnalysisError::invalid("baseline_window_count must be at least 1"));
        }
        let size = self.cfg.window_size;
        let required = baseline_window_count.saturating_add(1);
        // Anything shorter cannot yield a window after the baseline.
        let min_points = baseline_window_count.checked_mul(size).and_then(|n| n.checked_add(1));
        if min_points.map_or(true, |n| series.len() < n) {
            return Err(AnalysisError::InsufficientData { required, available: series.len().div_ceil(size) });
        }
        let windows = stats::compute(series, size)?;
        if windows.len() < required {
            return Err(AnalysisError::InsufficientData { required, available: windows.len() });
        }

        let baseline = stats::pooled(series, &windows[..baseline_window_count]);
        Ok(windows
            .into_iter()
            .enumerate()
            .map(|(i, window)| {
                if i < baseline_window_count {
                    Anomaly { window, severity: 0.0, z_score: 0.0, label: AnomalyLabel::Normal, baseline: true }
                } else {
                    self.score(window, &baseline, z_threshold)
                }
            })
            .collect())
    }

    fn score(&self, window: Window, baseline: &Baseline, z_threshold: f64) -> Anomaly {
        let z_score = (window.mean - baseline.mean) / baseline.std_dev.max(self.cfg.epsilon);
        Anomaly { window, severity: severity(z_score, z_threshold), z_score, label: label(z_score, z_threshold), baseline: false }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self { Self { cfg: DetectorConfig::default() } }
}

pub fn label(z_score: f64, z_threshold: f64) -> AnomalyLabel {
    if z_score >= 2.0 * z_threshold {
        AnomalyLabel::Attack
    } else if z_score >= z_threshold {
        AnomalyLabel::Suspicious
    } else {
        AnomalyLabel::Normal
    }
}

pub fn severity(z_score: f64, z_threshold: f64) -> f64 { (z_score / (3.0 * z_threshold)).clamp(0.0, 1.0) }

/// Group consecutive flagged windows. Baseline windows never start an episode.
pub fn episodes(anomalies: &[Anomaly]) -> Vec<AttackEpisode> {
    let mut out: Vec<AttackEpisode> = Vec::new();
    let mut open = false;
    for (i, a) in anomalies.iter().enumerate() {
        if !a.is_flagged() {
            open = false;
            continue;
        }
        match out.last_mut() {
            Some(ep) if open => {
                ep.last_window = i;
                ep.end_time = a.window.end_time;
                ep.peak_severity = ep.peak_severity.max(a.severity);
                ep.peak_z_score = ep.peak_z_score.max(a.z_score);
                ep.label = ep.label.max(a.label);
            }
            _ => out.push(AttackEpisode {
                first_window: i,
                last_window: i,
                start_time: a.window.start_time,
                end_time: a.window.end_time,
                peak_severity: a.severity,
                peak_z_score: a.z_score,
                label: a.label,
            }),
        }
        open = true;
    }
    out
}
