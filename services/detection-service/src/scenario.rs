//! Case-study input documents (YAML or JSON).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use flowguard_core::{AnalysisError, TopologySpec, TrafficPoint, TrafficSeries, VectorMetadata};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_INTERVAL_SECS: u32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("case {0:?} declares neither `points` nor `values`")]
    MissingSeries(String),
    #[error("case {0:?} declares both `points` and `values`")]
    ConflictingSeries(String),
    #[error("case {case:?}: interval_secs must be at least 1")]
    ZeroInterval { case: String },
    #[error("case {case:?}: {source}")]
    Analysis {
        case: String,
        #[source]
        source: AnalysisError,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub cases: Vec<CaseStudy>,
}

/// Revenue figures for the business-impact estimate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessProfile {
    pub hourly_revenue: f64,
    #[serde(default = "full_outage")]
    pub degradation_percent: f64,
    #[serde(default = "default_reputation_factor")]
    pub reputation_factor: f64,
}

fn full_outage() -> f64 { 100.0 }
fn default_reputation_factor() -> f64 { 0.3 }
fn one() -> u32 { 1 }

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseStudy {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Fully specified observations.
    #[serde(default)]
    pub points: Option<Vec<TrafficPoint>>,
    /// Evenly spaced values starting at `start` (default: the Unix epoch).
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval_secs: Option<u32>,
    #[serde(default)]
    pub metadata: VectorMetadata,
    #[serde(default)]
    pub baseline_window_count: Option<usize>,
    #[serde(default)]
    pub z_threshold: Option<f64>,
    /// Explicit flow topology; otherwise the preset for the detected category is used.
    #[serde(default)]
    pub topology: Option<TopologySpec>,
    #[serde(default)]
    pub preset_sources: Option<usize>,
    #[serde(default = "one")]
    pub affected_services: u32,
    #[serde(default)]
    pub business: Option<BusinessProfile>,
}

impl CaseStudy {
    pub fn series(&self) -> Result<TrafficSeries, ScenarioError> {
        let analysis = |source| ScenarioError::Analysis { case: self.name.clone(), source };
        match (&self.points, &self.values) {
            (Some(_), Some(_)) => Err(ScenarioError::ConflictingSeries(self.name.clone())),
            (None, None) => Err(ScenarioError::MissingSeries(self.name.clone())),
            (Some(points), None) => TrafficSeries::new(points.clone()).map_err(analysis),
            (None, Some(values)) => {
                let secs = self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS);
                if secs == 0 {
                    return Err(ScenarioError::ZeroInterval { case: self.name.clone() });
                }
                let start = self.start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                TrafficSeries::from_values(start, Duration::seconds(i64::from(secs)), values).map_err(analysis)
            }
        }
    }
}

pub fn parse_scenarios(doc: &str) -> Result<ScenarioFile> {
    serde_yaml::from_str(doc).context("parsing scenario document")
}

/// YAML is a superset of JSON, so either format is accepted.
pub fn load_scenarios(path: &Path) -> Result<ScenarioFile> {
    let doc = std::fs::read_to_string(path).with_context(|| format!("reading scenario file {}", path.display()))?;
    parse_scenarios(&doc).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowguard_core::ProtocolTag;

    #[test]
    fn values_form_uses_defaults() {
        let file = parse_scenarios("cases:\n  - name: flat\n    values: [1, 2, 3]\n").unwrap();
        let case = &file.cases[0];
        assert_eq!(case.affected_services, 1);
        let series = case.series().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.points()[1].timestamp - series.points()[0].timestamp, Duration::seconds(60));
    }

    #[test]
    fn points_form_carries_protocols() {
        let doc = r#"{"cases":[{"name":"p","points":[
            {"timestamp":"2020-01-01T00:00:00Z","value":1.0,"protocol":"udp"},
            {"timestamp":"2020-01-01T00:00:10Z","value":2.0}
        ],"metadata":{"source_count":12}}]}"#;
        let case = &parse_scenarios(doc).unwrap().cases[0];
        let series = case.series().unwrap();
        assert_eq!(series.points()[0].protocol, Some(ProtocolTag::Udp));
        assert_eq!(case.metadata.source_count(), Some(12));
    }

    #[test]
    fn malformed_cases_are_rejected() {
        assert!(parse_scenarios("cases:\n  - name: x\n    values: [1]\n    colour: red\n").is_err());
        assert!(parse_scenarios("cases:\n  - name: x\n    values: [1]\n    metadata: {protocol: smoke-signal}\n").is_err());

        let both = parse_scenarios(
            "cases:\n  - name: both\n    values: [1]\n    points: [{timestamp: '2020-01-01T00:00:00Z', value: 1}]\n",
        )
        .unwrap();
        assert!(matches!(both.cases[0].series(), Err(ScenarioError::ConflictingSeries(_))));

        let none = parse_scenarios("cases:\n  - name: none\n").unwrap();
        assert!(matches!(none.cases[0].series(), Err(ScenarioError::MissingSeries(_))));

        let zero = parse_scenarios("cases:\n  - name: z\n    values: [1, 2]\n    interval_secs: 0\n").unwrap();
        assert!(matches!(zero.cases[0].series(), Err(ScenarioError::ZeroInterval { .. })));

        let negative = parse_scenarios("cases:\n  - name: n\n    values: [1, -2]\n").unwrap();
        assert!(matches!(negative.cases[0].series(), Err(ScenarioError::Analysis { source: AnalysisError::InvalidValue { index: 1, .. }, .. })));
    }
}
