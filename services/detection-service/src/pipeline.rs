use crate::metrics;
use crate::scenario::{CaseStudy, ScenarioError};
use crate::settings::Settings;
use anyhow::Context;
use chrono::{DateTime, Utc};
use flowguard_core::impact::BusinessImpact;
use flowguard_core::stats::{self, Baseline, SeriesSummary};
use flowguard_core::{
    assess_quality, assess_severity, business_impact, episodes, mitigation_recommendations, preset_topology, AnalysisError, Anomaly,
    AnomalyDetector, AnomalyLabel, AttackEpisode, AttackFlowGraph, AttackVectorCategory, DataQuality, NodeLoad, PatternClassifier,
    SeverityAssessment, SeverityInputs,
};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl CaseError {
    /// Coarse failure class used in reports and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scenario(_) => "scenario",
            Self::Analysis(e) if e.is_topology_error() => "topology",
            Self::Analysis(_) => "analysis",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageLatencies {
    pub series_ms: f64,
    pub detect_ms: f64,
    pub classify_ms: f64,
    pub graph_ms: f64,
    pub impact_ms: f64,
    pub total_ms: f64,
}

impl StageLatencies {
    pub fn stages(&self) -> [(&'static str, f64); 6] {
        [
            ("series", self.series_ms),
            ("detect", self.detect_ms),
            ("classify", self.classify_ms),
            ("graph", self.graph_ms),
            ("impact", self.impact_ms),
            ("total", self.total_ms),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    #[serde(flatten)]
    pub anomaly: Anomaly,
    pub category: AttackVectorCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub summary: SeriesSummary,
    pub quality: DataQuality,
    pub baseline: Baseline,
    pub category: AttackVectorCategory,
    pub windows: Vec<WindowReport>,
    pub episodes: Vec<AttackEpisode>,
    /// Summed Attack-episode length, each episode counted through the end of its last sample.
    pub attack_duration_secs: f64,
    pub graph: AttackFlowGraph,
    pub load: Vec<NodeLoad>,
    pub severity: SeverityAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business: Option<BusinessImpact>,
    pub recommendations: Vec<&'static str>,
    pub latency_ms: StageLatencies,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseOutcome {
    Analyzed(Box<CaseReport>),
    Failed { name: String, kind: &'static str, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub cases: Vec<CaseOutcome>,
    pub analyzed: usize,
    pub failed: usize,
}

/// Stateless per case; one instance serves a whole batch across threads.
pub struct AnalysisPipeline {
    detector: AnomalyDetector,
    classifier: PatternClassifier,
    baseline_window_count: usize,
    z_threshold: f64,
    preset_sources: usize,
}

fn ms(since: Instant) -> f64 { since.elapsed().as_secs_f64() * 1000.0 }

impl AnalysisPipeline {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let detector = AnomalyDetector::new(settings.detector_config()).context("invalid detector settings")?;
        Ok(Self {
            detector,
            classifier: PatternClassifier::new(settings.classifier_config()?),
            baseline_window_count: settings.detector.baseline_window_count,
            z_threshold: settings.detector.z_threshold,
            preset_sources: settings.preset_sources,
        })
    }

    #[instrument(skip(self, case), fields(case = %case.name))]
    pub fn analyze(&self, case: &CaseStudy) -> Result<CaseReport, CaseError> {
        let started = Instant::now();
        let mut lat = StageLatencies::default();

        let s = Instant::now();
        let series = case.series()?;
        let summary = stats::summarize(&series)?;
        let quality = assess_quality(&series);
        if !quality.issues.is_empty() {
            warn!(issues = ?quality.issues, score = quality.score, "data quality issues");
        }
        lat.series_ms = ms(s);

        let s = Instant::now();
        let k = case.baseline_window_count.unwrap_or(self.baseline_window_count);
        let anomalies = self.detector.detect(&series, k, case.z_threshold.unwrap_or(self.z_threshold))?;
        let baseline_windows: Vec<_> = anomalies.iter().filter(|a| a.baseline).map(|a| a.window.clone()).collect();
        let baseline = stats::pooled(&series, &baseline_windows);
        lat.detect_ms = ms(s);

        let s = Instant::now();
        let windows: Vec<WindowReport> = anomalies
            .into_iter()
            .map(|anomaly| {
                let meta = case.metadata.clone().or_protocol(series.dominant_protocol(&anomaly.window));
                let category = self.classifier.classify(&anomaly, &meta);
                if anomaly.label == AnomalyLabel::Attack {
                    metrics::record_attack_window(category.as_str());
                    warn!(
                        start = %anomaly.window.start_time,
                        z = anomaly.z_score,
                        severity = anomaly.severity,
                        %category,
                        "attack window"
                    );
                }
                WindowReport { anomaly, category }
            })
            .collect();
        let category = dominant_category(&windows);
        let scored: Vec<Anomaly> = windows.iter().map(|w| w.anomaly.clone()).collect();
        let episodes = episodes(&scored);
        lat.classify_ms = ms(s);

        let s = Instant::now();
        let topology = match &case.topology {
            Some(spec) => spec.clone(),
            None => preset_topology(category, self.source_count(case)),
        };
        let graph = AttackFlowGraph::build(&topology)?;
        let load = graph.propagated_load();
        lat.graph_ms = ms(s);

        let s = Instant::now();
        // Episode bounds are sample timestamps; the last sample still covers one interval.
        let interval = series.typical_interval().and_then(|d| d.to_std().ok()).unwrap_or_default();
        let attack_duration: Duration = episodes
            .iter()
            .filter(|e| e.label == AnomalyLabel::Attack)
            .map(|e| e.duration().to_std().unwrap_or_default() + interval)
            .sum();
        let peak = windows.iter().filter(|w| !w.anomaly.baseline).map(|w| w.anomaly.window.mean).fold(baseline.mean, f64::max);
        let severity = assess_severity(&SeverityInputs {
            traffic_volume: peak,
            baseline_volume: baseline.mean,
            duration: attack_duration,
            affected_services: case.affected_services,
        });
        let business = case.business.as_ref().map(|b| {
            business_impact(b.hourly_revenue, attack_duration.as_secs_f64() / 3600.0, b.degradation_percent, b.reputation_factor)
        });
        lat.impact_ms = ms(s);
        lat.total_ms = ms(started);

        debug!(?lat, "stage latencies");
        metrics::record_stages(&lat);
        info!(%category, episodes = episodes.len(), level = ?severity.level, "case analyzed");

        Ok(CaseReport {
            name: case.name.clone(),
            description: case.description.clone(),
            summary,
            quality,
            baseline,
            category,
            windows,
            episodes,
            attack_duration_secs: attack_duration.as_secs_f64(),
            graph,
            load,
            severity,
            business,
            recommendations: mitigation_recommendations(category),
            latency_ms: lat,
        })
    }

    /// Analyze every case in parallel. A failing case is recorded and does not stop the rest.
    pub fn run_batch(&self, cases: &[CaseStudy]) -> BatchReport {
        let outcomes: Vec<CaseOutcome> = cases
            .par_iter()
            .map(|case| match self.analyze(case) {
                Ok(report) => {
                    metrics::record_case("analyzed");
                    CaseOutcome::Analyzed(Box::new(report))
                }
                Err(e) => {
                    let kind = e.kind();
                    error!(case = %case.name, kind, error = %e, "case study failed");
                    metrics::record_case(kind);
                    CaseOutcome::Failed { name: case.name.clone(), kind, error: e.to_string() }
                }
            })
            .collect();
        let failed = outcomes.iter().filter(|o| matches!(o, CaseOutcome::Failed { .. })).count();
        BatchReport { run_id: Uuid::new_v4(), generated_at: Utc::now(), analyzed: outcomes.len() - failed, failed, cases: outcomes }
    }

    fn source_count(&self, case: &CaseStudy) -> usize {
        case.preset_sources
            .or_else(|| case.metadata.source_count().map(|n| usize::try_from(n).unwrap_or(usize::MAX)))
            .unwrap_or(self.preset_sources)
    }
}

// Category of the most severe attack window; the earliest wins ties.
fn dominant_category(windows: &[WindowReport]) -> AttackVectorCategory {
    let mut best: Option<&WindowReport> = None;
    for w in windows.iter().filter(|w| w.anomaly.label == AnomalyLabel::Attack) {
        if best.map_or(true, |b| w.anomaly.severity > b.anomaly.severity) {
            best = Some(w);
        }
    }
    best.map_or(AttackVectorCategory::Unknown, |w| w.category)
}
