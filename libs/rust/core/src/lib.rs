//! Core analysis primitives for FlowGuard: traffic series, window statistics,
//! baseline z-score detection, attack-vector classification and attack flow
//! graphs.
//!
//! Everything here is synchronous and side-effect free. Callers own the
//! inputs; the detector and classifier only borrow them and return fresh
//! values, so a single instance can be shared across threads.

pub mod anomaly;
pub mod classifier;
pub mod error;
pub mod flow_graph;
pub mod impact;
pub mod presets;
pub mod quality;
pub mod series;
pub mod stats;

pub use anomaly::{episodes, Anomaly, AnomalyDetector, AnomalyLabel, AttackEpisode, DetectorConfig};
pub use classifier::{AttackVectorCategory, ClassifierConfig, PatternClassifier, VectorMetadata};
pub use error::{AnalysisError, Result};
pub use flow_graph::{AttackFlowGraph, EdgeSpec, FlowEdge, FlowNode, NodeLoad, NodeRole, NodeSpec, TopologySpec};
pub use impact::{assess_severity, business_impact, mitigation_effectiveness, SeverityAssessment, SeverityInputs, SeverityLevel};
pub use presets::{mitigation_recommendations, preset_topology};
pub use quality::{assess_quality, DataQuality};
pub use series::{ProtocolTag, TrafficPoint, TrafficSeries};
pub use stats::{Baseline, SeriesSummary, Window};
