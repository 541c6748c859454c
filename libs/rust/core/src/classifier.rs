//! Maps a scored window plus structured hints onto an attack-vector category.

use crate::anomaly::{Anomaly, AnomalyLabel};
use crate::error::{AnalysisError, Result};
use crate::series::ProtocolTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttackVectorCategory {
    VolumetricFlood,
    ProtocolExhaustion,
    ApplicationLayer,
    Amplification,
    Unknown,
}

impl AttackVectorCategory {
    pub const ALL: [AttackVectorCategory; 5] =
        [Self::VolumetricFlood, Self::ProtocolExhaustion, Self::ApplicationLayer, Self::Amplification, Self::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VolumetricFlood => "volumetric_flood",
            Self::ProtocolExhaustion => "protocol_exhaustion",
            Self::ApplicationLayer => "application_layer",
            Self::Amplification => "amplification",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AttackVectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Wire form of [`VectorMetadata`]; unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_count: Option<u64>,
}

/// Optional hints supplied alongside a window. Only validated values can be held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata", into = "RawMetadata")]
pub struct VectorMetadata {
    protocol: Option<ProtocolTag>,
    duration: Option<Duration>,
    source_count: Option<u64>,
}

impl VectorMetadata {
    pub fn new() -> Self { Self::default() }

    pub fn with_protocol(mut self, protocol: ProtocolTag) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_duration_secs(self, secs: f64) -> Result<Self> {
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| AnalysisError::invalid(format!("duration_secs must be a representable non-negative number, got {secs}: {e}")))?;
        Ok(self.with_duration(duration))
    }

    pub fn with_source_count(mut self, count: u64) -> Result<Self> {
        if count == 0 {
            return Err(AnalysisError::invalid("source_count must be at least 1"));
        }
        self.source_count = Some(count);
        Ok(self)
    }

    pub fn protocol(&self) -> Option<ProtocolTag> { self.protocol }
    pub fn duration(&self) -> Option<Duration> { self.duration }
    pub fn source_count(&self) -> Option<u64> { self.source_count }

    /// Fill the protocol from `fallback` when none was supplied.
    pub fn or_protocol(mut self, fallback: Option<ProtocolTag>) -> Self {
        if self.protocol.is_none() {
            self.protocol = fallback;
        }
        self
    }
}

impl TryFrom<RawMetadata> for VectorMetadata {
    type Error = AnalysisError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        let mut meta = VectorMetadata { protocol: raw.protocol, ..Default::default() };
        if let Some(secs) = raw.duration_secs {
            meta = meta.with_duration_secs(secs)?;
        }
        if let Some(count) = raw.source_count {
            meta = meta.with_source_count(count)?;
        }
        Ok(meta)
    }
}

impl From<VectorMetadata> for RawMetadata {
    fn from(m: VectorMetadata) -> Self {
        RawMetadata { protocol: m.protocol, duration_secs: m.duration.map(|d| d.as_secs_f64()), source_count: m.source_count }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub amplification_min_severity: f64,
    pub long_duration: Duration,
    /// Inclusive lower bound of the "moderate" severity band.
    pub moderate_min_severity: f64,
    /// Exclusive upper bound of the "moderate" severity band.
    pub moderate_max_severity: f64,
    pub volumetric_min_severity: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            amplification_min_severity: 0.8,
            long_duration: Duration::from_secs(15 * 60),
            moderate_min_severity: 0.5,
            moderate_max_severity: 0.9,
            volumetric_min_severity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    cfg: ClassifierConfig,
}

impl PatternClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self { Self { cfg } }

    pub fn config(&self) -> &ClassifierConfig { &self.cfg }

    /// Rules are evaluated top to bottom and the first match wins. The order
    /// is the tie-break policy; do not reorder.
    pub fn classify(&self, anomaly: &Anomaly, metadata: &VectorMetadata) -> AttackVectorCategory {
        if anomaly.label != AnomalyLabel::Attack {
            return AttackVectorCategory::Unknown;
        }
        let severity = anomaly.severity;
        let protocol = metadata.protocol();

        if protocol.is_some_and(|p| p.is_amplification_capable()) && severity >= self.cfg.amplification_min_severity {
            return AttackVectorCategory::Amplification;
        }
        if self.effective_duration(anomaly, metadata) > self.cfg.long_duration && self.is_moderate(severity) {
            return AttackVectorCategory::ProtocolExhaustion;
        }
        if protocol.is_some_and(|p| p.is_application_layer()) {
            return AttackVectorCategory::ApplicationLayer;
        }
        if severity >= self.cfg.volumetric_min_severity {
            return AttackVectorCategory::VolumetricFlood;
        }
        AttackVectorCategory::Unknown
    }

    fn is_moderate(&self, severity: f64) -> bool {
        severity >= self.cfg.moderate_min_severity && severity < self.cfg.moderate_max_severity
    }

    // Declared duration wins over the window's own span.
    fn effective_duration(&self, anomaly: &Anomaly, metadata: &VectorMetadata) -> Duration {
        metadata.duration().unwrap_or_else(|| anomaly.window.span().to_std().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Window;
    use chrono::{TimeZone, Utc};

    fn anomaly(label: AnomalyLabel, severity: f64, span_secs: i64) -> Anomaly {
        let start = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        let window = Window {
            start_index: 0,
            end_index: 2,
            start_time: start,
            end_time: start + chrono::Duration::seconds(span_secs),
            mean: 1.0,
            std_dev: 0.0,
            max: 1.0,
            count: 2,
            partial: false,
        };
        Anomaly { window, severity, z_score: severity * 9.0, label, baseline: false }
    }

    fn meta(protocol: ProtocolTag) -> VectorMetadata { VectorMetadata::new().with_protocol(protocol) }

    #[test]
    fn non_attack_is_unknown_regardless_of_hints() {
        let c = PatternClassifier::default();
        for label in [AnomalyLabel::Normal, AnomalyLabel::Suspicious] {
            assert_eq!(c.classify(&anomaly(label, 1.0, 60), &meta(ProtocolTag::Reflection)), AttackVectorCategory::Unknown);
        }
    }

    #[test]
    fn amplification_needs_high_severity() {
        let c = PatternClassifier::default();
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 1.0, 60), &meta(ProtocolTag::Reflection)), AttackVectorCategory::Amplification);
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 0.8, 60), &meta(ProtocolTag::Memcached)), AttackVectorCategory::Amplification);
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 0.7, 60), &meta(ProtocolTag::Dns)), AttackVectorCategory::VolumetricFlood);
    }

    #[test]
    fn long_moderate_attack_is_protocol_exhaustion() {
        let c = PatternClassifier::default();
        let a = anomaly(AnomalyLabel::Attack, 0.7, 30 * 60);
        assert_eq!(c.classify(&a, &VectorMetadata::new()), AttackVectorCategory::ProtocolExhaustion);
        // outranks the application-layer hint
        assert_eq!(c.classify(&a, &meta(ProtocolTag::Http)), AttackVectorCategory::ProtocolExhaustion);
        // declared duration overrides the short window span
        let short = anomaly(AnomalyLabel::Attack, 0.7, 60);
        let declared = VectorMetadata::new().with_duration(Duration::from_secs(3600));
        assert_eq!(c.classify(&short, &declared), AttackVectorCategory::ProtocolExhaustion);
        // severe long attacks are floods
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 1.0, 3600), &VectorMetadata::new()), AttackVectorCategory::VolumetricFlood);
    }

    #[test]
    fn application_layer_then_volumetric_then_unknown() {
        let c = PatternClassifier::default();
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 1.0, 60), &meta(ProtocolTag::Https)), AttackVectorCategory::ApplicationLayer);
        assert_eq!(c.classify(&anomaly(AnomalyLabel::Attack, 0.9, 60), &meta(ProtocolTag::Udp)), AttackVectorCategory::VolumetricFlood);
        let strict = PatternClassifier::new(ClassifierConfig { volumetric_min_severity: 0.95, ..Default::default() });
        assert_eq!(strict.classify(&anomaly(AnomalyLabel::Attack, 0.9, 60), &VectorMetadata::new()), AttackVectorCategory::Unknown);
    }

    #[test]
    fn metadata_rejects_malformed_hints() {
        assert!(serde_json::from_str::<VectorMetadata>(r#"{"protocol":"reflection","vendor":"x"}"#).is_err());
        assert!(serde_json::from_str::<VectorMetadata>(r#"{"protocol":"carrier-pigeon"}"#).is_err());
        assert!(serde_json::from_str::<VectorMetadata>(r#"{"duration_secs":-5}"#).is_err());
        assert!(serde_json::from_str::<VectorMetadata>(r#"{"source_count":0}"#).is_err());
        assert!(serde_json::from_str::<VectorMetadata>(r#"{"duration_secs":1e30}"#).is_err());
        assert!(VectorMetadata::new().with_duration_secs(f64::INFINITY).is_err());
        let m: VectorMetadata = serde_json::from_str(r#"{"protocol":"NTP","duration_secs":600,"source_count":4000}"#).unwrap();
        assert_eq!(m.protocol(), Some(ProtocolTag::Ntp));
        assert_eq!(m.duration(), Some(Duration::from_secs(600)));
        assert_eq!(m.source_count(), Some(4000));
    }

    #[test]
    fn fallback_protocol_does_not_override() {
        let m = meta(ProtocolTag::Http).or_protocol(Some(ProtocolTag::Udp));
        assert_eq!(m.protocol(), Some(ProtocolTag::Http));
        assert_eq!(VectorMetadata::new().or_protocol(Some(ProtocolTag::Udp)).protocol(), Some(ProtocolTag::Udp));
    }
}
