//! Pre-detection sampling checks with a 0-100 quality score.

use crate::series::TrafficSeries;
use chrono::Duration;
use serde::Serialize;

pub const LARGE_GAP_MINUTES: i64 = 10;
const ISSUE_PENALTY: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_points: usize,
    /// Indices of points preceded by more than [`LARGE_GAP_MINUTES`] of silence.
    pub large_gaps: Vec<usize>,
    pub typical_interval_secs: Option<f64>,
    pub issues: Vec<String>,
    pub score: f64,
    pub recommendations: Vec<&'static str>,
}

pub fn assess_quality(series: &TrafficSeries) -> DataQuality {
    if series.is_empty() {
        return DataQuality {
            total_points: 0,
            large_gaps: Vec::new(),
            typical_interval_secs: None,
            issues: Vec::new(),
            score: 0.0,
            recommendations: vec!["No data provided for analysis"],
        };
    }
    let large_gaps = series.gaps(Duration::minutes(LARGE_GAP_MINUTES));
    let mut issues = Vec::new();
    if !large_gaps.is_empty() {
        issues.push(format!("Found {} large time gaps (>{LARGE_GAP_MINUTES} minutes)", large_gaps.len()));
    }
    let score = (100.0 - issues.len() as f64 * ISSUE_PENALTY).max(0.0);

    let mut recommendations = Vec::new();
    if score < 70.0 {
        recommendations.push("Data quality is below acceptable threshold");
    }
    if issues.len() > 3 {
        recommendations.push("Multiple data anomalies detected - review data source");
    }
    if score >= 90.0 {
        recommendations.push("Data quality is excellent - proceed with analysis");
    }
    DataQuality {
        total_points: series.len(),
        large_gaps,
        typical_interval_secs: series.typical_interval().map(|d| d.num_milliseconds() as f64 / 1000.0),
        issues,
        score,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TrafficPoint;
    use chrono::{TimeZone, Utc};

    #[test]
    fn gap_costs_five_points() {
        let t0 = Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap();
        let s = TrafficSeries::new(vec![
            TrafficPoint::new(t0, 5.0),
            TrafficPoint::new(t0 + Duration::minutes(1), 5.0),
            TrafficPoint::new(t0 + Duration::minutes(45), 5.0),
            TrafficPoint::new(t0 + Duration::minutes(46), 5.0),
        ])
        .unwrap();
        let q = assess_quality(&s);
        assert_eq!(q.large_gaps, vec![2]);
        assert_eq!(q.score, 95.0);
        assert_eq!(q.issues, vec!["Found 1 large time gaps (>10 minutes)".to_string()]);
        assert_eq!(q.typical_interval_secs, Some(60.0));
        assert_eq!(q.recommendations, vec!["Data quality is excellent - proceed with analysis"]);
    }

    #[test]
    fn regular_series_is_clean_and_empty_scores_zero() {
        let s = TrafficSeries::from_values(Utc::now(), Duration::seconds(60), &[1.0, 2.0, 3.0]).unwrap();
        let q = assess_quality(&s);
        assert!(q.issues.is_empty() && q.large_gaps.is_empty());
        assert_eq!(q.score, 100.0);

        let empty = assess_quality(&TrafficSeries::default());
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.recommendations, vec!["No data provided for analysis"]);
    }
}
