//! Step-scored impact metrics for a detected incident.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Critical
        } else if score >= 6.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score >= 2.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityInputs {
    pub traffic_volume: f64,
    pub baseline_volume: f64,
    pub duration: Duration,
    pub affected_services: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityAssessment {
    /// Sum of the three components, 0..=10.
    pub overall: f64,
    pub volume_impact: f64,
    pub duration_impact: f64,
    pub service_impact: f64,
    pub level: SeverityLevel,
}

pub fn assess_severity(inputs: &SeverityInputs) -> SeverityAssessment {
    let ratio = if inputs.baseline_volume > 0.0 { inputs.traffic_volume / inputs.baseline_volume } else { 1.0 };
    let volume_impact = match ratio {
        r if r > 10.0 => 4.0,
        r if r > 5.0 => 3.0,
        r if r > 2.0 => 2.0,
        r if r > 1.5 => 1.0,
        _ => 0.0,
    };
    let minutes = inputs.duration.as_secs_f64() / 60.0;
    let duration_impact = match minutes {
        m if m > 240.0 => 3.0,
        m if m > 60.0 => 2.0,
        m if m > 15.0 => 1.0,
        _ => 0.5,
    };
    let service_impact = match inputs.affected_services {
        s if s > 5 => 3.0,
        s if s > 2 => 2.0,
        s if s > 0 => 1.0,
        _ => 0.0,
    };
    let overall = volume_impact + duration_impact + service_impact;
    SeverityAssessment { overall, volume_impact, duration_impact, service_impact, level: SeverityLevel::from_score(overall) }
}

/// Service health at one point in time; absent metrics are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub traffic_volume: Option<f64>,
    pub response_time: Option<f64>,
    pub error_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MitigationEffectiveness {
    pub traffic_reduction: Option<f64>,
    pub response_time_improvement: Option<f64>,
    pub error_rate_reduction: Option<f64>,
    /// Mean of the available components.
    pub overall: Option<f64>,
}

/// Percentage improvement from `during` (attack, unmitigated) to `after`, each clamped to 0..=100.
pub fn mitigation_effectiveness(during: &HealthSnapshot, after: &HealthSnapshot) -> MitigationEffectiveness {
    fn reduction(before: Option<f64>, now: Option<f64>) -> Option<f64> {
        match (before, now) {
            (Some(b), Some(n)) if b > 0.0 => Some(((b - n) / b * 100.0).clamp(0.0, 100.0)),
            _ => None,
        }
    }
    let traffic_reduction = reduction(during.traffic_volume, after.traffic_volume);
    let response_time_improvement = reduction(during.response_time, after.response_time);
    let error_rate_reduction = reduction(during.error_rate, after.error_rate);
    let parts: Vec<f64> = [traffic_reduction, response_time_improvement, error_rate_reduction].into_iter().flatten().collect();
    let overall = (!parts.is_empty()).then(|| parts.iter().sum::<f64>() / parts.len() as f64);
    MitigationEffectiveness { traffic_reduction, response_time_improvement, error_rate_reduction, overall }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessImpact {
    pub direct_revenue_loss: f64,
    pub recovery_costs: f64,
    pub opportunity_cost: f64,
    pub reputation_damage: f64,
    pub total: f64,
    pub per_hour: f64,
}

const RECOVERY_SHARE: f64 = 0.15;
const OPPORTUNITY_SHARE: f64 = 0.25;

/// `degradation_percent` is clamped to `[0, 100]`: 100 or more counts as a
/// full outage, a negative value as no degradation at all.
pub fn business_impact(hourly_revenue: f64, outage_hours: f64, degradation_percent: f64, reputation_factor: f64) -> BusinessImpact {
    let factor = (degradation_percent / 100.0).clamp(0.0, 1.0);
    let direct_revenue_loss = hourly_revenue * outage_hours * factor;
    let recovery_costs = direct_revenue_loss * RECOVERY_SHARE;
    let opportunity_cost = direct_revenue_loss * OPPORTUNITY_SHARE;
    let reputation_damage = direct_revenue_loss * reputation_factor;
    let total = direct_revenue_loss + recovery_costs + opportunity_cost + reputation_damage;
    BusinessImpact { direct_revenue_loss, recovery_costs, opportunity_cost, reputation_damage, total, per_hour: total / outage_hours.max(0.1) }
}
