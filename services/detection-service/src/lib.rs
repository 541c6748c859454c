//! Batch analysis of traffic case studies on top of `flowguard-core`.

pub mod metrics;
pub mod pipeline;
pub mod scenario;
pub mod settings;
pub mod telemetry;

pub use pipeline::{AnalysisPipeline, BatchReport, CaseOutcome, CaseReport, StageLatencies};
pub use scenario::{load_scenarios, parse_scenarios, CaseStudy, ScenarioError, ScenarioFile};
pub use settings::{load_settings, Settings};
pub use telemetry::init_tracing;
