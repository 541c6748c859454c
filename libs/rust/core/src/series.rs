//! Traffic observations and the validated series that owns them.

use crate::error::{AnalysisError, Result};
use crate::stats::Window;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol hints accepted on traffic points and in vector metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ProtocolTag {
    Reflection,
    Dns,
    Ntp,
    Memcached,
    Ssdp,
    Cldap,
    Chargen,
    Http,
    Https,
    Tcp,
    Syn,
    Udp,
    Icmp,
}

impl ProtocolTag {
    pub const ALL: [ProtocolTag; 13] = [
        Self::Reflection, Self::Dns, Self::Ntp, Self::Memcached, Self::Ssdp, Self::Cldap, Self::Chargen,
        Self::Http, Self::Https, Self::Tcp, Self::Syn, Self::Udp, Self::Icmp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reflection => "reflection",
            Self::Dns => "dns",
            Self::Ntp => "ntp",
            Self::Memcached => "memcached",
            Self::Ssdp => "ssdp",
            Self::Cldap => "cldap",
            Self::Chargen => "chargen",
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
            Self::Syn => "syn",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }

    /// Protocols whose small requests elicit large responses toward a spoofed victim.
    pub fn is_amplification_capable(&self) -> bool {
        matches!(self, Self::Reflection | Self::Dns | Self::Ntp | Self::Memcached | Self::Ssdp | Self::Cldap | Self::Chargen)
    }

    pub fn is_application_layer(&self) -> bool { matches!(self, Self::Http | Self::Https) }
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProtocolTag {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ProtocolTag::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| AnalysisError::UnknownProtocol(s.to_string()))
    }
}

impl TryFrom<String> for ProtocolTag {
    type Error = AnalysisError;
    fn try_from(s: String) -> Result<Self> { s.parse() }
}

/// A single rate observation (requests/sec, bytes/sec, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolTag>,
}

impl TrafficPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self { Self { timestamp, value, protocol: None } }

    pub fn with_protocol(mut self, protocol: ProtocolTag) -> Self {
        self.protocol = Some(protocol);
        self
    }
}

/// Time-ordered observations with strictly increasing timestamps and
/// finite non-negative values. Analysis only ever borrows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TrafficPoint>", into = "Vec<TrafficPoint>")]
pub struct TrafficSeries {
    points: Vec<TrafficPoint>,
}

impl TrafficSeries {
    pub fn new(points: Vec<TrafficPoint>) -> Result<Self> {
        for (index, p) in points.iter().enumerate() {
            if !p.value.is_finite() || p.value < 0.0 {
                return Err(AnalysisError::InvalidValue { index, value: p.value });
            }
            if index > 0 && p.timestamp <= points[index - 1].timestamp {
                return Err(AnalysisError::OutOfOrder { index });
            }
        }
        Ok(Self { points })
    }

    /// Evenly spaced series starting at `start`.
    pub fn from_values(start: DateTime<Utc>, interval: Duration, values: &[f64]) -> Result<Self> {
        if interval <= Duration::zero() {
            return Err(AnalysisError::invalid("sampling interval must be positive"));
        }
        let mut points = Vec::with_capacity(values.len());
        let mut ts = start;
        for &v in values {
            points.push(TrafficPoint::new(ts, v));
            ts += interval;
        }
        Self::new(points)
    }

    pub fn len(&self) -> usize { self.points.len() }
    pub fn is_empty(&self) -> bool { self.points.is_empty() }
    pub fn points(&self) -> &[TrafficPoint] { &self.points }
    pub fn get(&self, index: usize) -> Option<&TrafficPoint> { self.points.get(index) }
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ { self.points.iter().map(|p| p.value) }

    /// Points covered by `window`. Empty when the window does not belong to this series.
    pub fn slice(&self, window: &Window) -> &[TrafficPoint] {
        self.points.get(window.start_index..window.end_index).unwrap_or(&[])
    }

    /// Most frequent protocol tag inside `window`; ties go to the tag seen first.
    pub fn dominant_protocol(&self, window: &Window) -> Option<ProtocolTag> {
        let mut counts: Vec<(ProtocolTag, usize)> = Vec::new();
        for tag in self.slice(window).iter().filter_map(|p| p.protocol) {
            match counts.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag, 1)),
            }
        }
        let best = counts.iter().map(|(_, n)| *n).max()?;
        counts.into_iter().find(|(_, n)| *n == best).map(|(t, _)| t)
    }

    /// Median spacing between consecutive points; `None` below two points.
    pub fn typical_interval(&self) -> Option<Duration> {
        let mut diffs: Vec<Duration> = self.points.windows(2).map(|pair| pair[1].timestamp - pair[0].timestamp).collect();
        if diffs.is_empty() {
            return None;
        }
        diffs.sort();
        Some(diffs[diffs.len() / 2])
    }

    /// Indices whose distance to the previous point exceeds `max_gap`.
    pub fn gaps(&self, max_gap: Duration) -> Vec<usize> {
        self.points
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[1].timestamp - pair[0].timestamp > max_gap)
            .map(|(i, _)| i + 1)
            .collect()
    }
}

impl TryFrom<Vec<TrafficPoint>> for TrafficSeries {
    type Error = AnalysisError;
    fn try_from(points: Vec<TrafficPoint>) -> Result<Self> { Self::new(points) }
}

impl From<TrafficSeries> for Vec<TrafficPoint> {
    fn from(series: TrafficSeries) -> Self { series.points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2018, 2, 28, 17, 21, 0).unwrap() }

    #[test]
    fn rejects_out_of_order_and_duplicate_timestamps() {
        let a = TrafficPoint::new(t0(), 1.0);
        let b = TrafficPoint::new(t0(), 2.0);
        assert_eq!(TrafficSeries::new(vec![a.clone(), b]), Err(AnalysisError::OutOfOrder { index: 1 }));
        let early = TrafficPoint::new(t0() - Duration::seconds(5), 2.0);
        assert_eq!(TrafficSeries::new(vec![a, early]), Err(AnalysisError::OutOfOrder { index: 1 }));
    }

    #[test]
    fn rejects_negative_and_nan_values() {
        let err = TrafficSeries::from_values(t0(), Duration::seconds(1), &[1.0, -3.0]).unwrap_err();
        assert_eq!(err, AnalysisError::InvalidValue { index: 1, value: -3.0 });
        assert!(TrafficSeries::from_values(t0(), Duration::seconds(1), &[f64::NAN]).is_err());
    }

    #[test]
    fn protocol_tags_parse_case_insensitively() {
        assert_eq!("  Reflection ".parse::<ProtocolTag>().unwrap(), ProtocolTag::Reflection);
        assert_eq!("HTTP".parse::<ProtocolTag>().unwrap(), ProtocolTag::Http);
        assert!(matches!("gopher".parse::<ProtocolTag>(), Err(AnalysisError::UnknownProtocol(_))));
        assert!(ProtocolTag::Memcached.is_amplification_capable());
        assert!(!ProtocolTag::Syn.is_amplification_capable());
    }

    #[test]
    fn deserialization_validates_ordering() {
        let json = r#"[{"timestamp":"2018-02-28T17:21:00Z","value":1.0},{"timestamp":"2018-02-28T17:20:00Z","value":1.0}]"#;
        assert!(serde_json::from_str::<TrafficSeries>(json).is_err());
        let json = r#"[{"timestamp":"2018-02-28T17:21:00Z","value":1.0,"protocol":"udp"}]"#;
        let s: TrafficSeries = serde_json::from_str(json).unwrap();
        assert_eq!(s.points()[0].protocol, Some(ProtocolTag::Udp));
    }

    #[test]
    fn dominant_protocol_prefers_first_on_ties() {
        let pts = vec![
            TrafficPoint::new(t0(), 1.0).with_protocol(ProtocolTag::Udp),
            TrafficPoint::new(t0() + Duration::seconds(1), 1.0).with_protocol(ProtocolTag::Dns),
            TrafficPoint::new(t0() + Duration::seconds(2), 1.0),
        ];
        let s = TrafficSeries::new(pts).unwrap();
        let w = crate::stats::compute(&s, 3).unwrap().remove(0);
        assert_eq!(s.dominant_protocol(&w), Some(ProtocolTag::Udp));
    }

    #[test]
    fn gaps_report_index_after_silence() {
        let pts = vec![
            TrafficPoint::new(t0(), 1.0),
            TrafficPoint::new(t0() + Duration::minutes(1), 1.0),
            TrafficPoint::new(t0() + Duration::minutes(20), 1.0),
        ];
        let s = TrafficSeries::new(pts).unwrap();
        assert_eq!(s.gaps(Duration::minutes(10)), vec![2]);
        // median of 1 and 19 minutes
        assert_eq!(s.typical_interval(), Some(Duration::minutes(19)));
        let regular = TrafficSeries::from_values(t0(), Duration::seconds(30), &[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(regular.typical_interval(), Some(Duration::seconds(30)));
        assert_eq!(TrafficSeries::default().typical_interval(), None);
    }
}
