//! Pipeline instruments on the global meter. Without an installed meter
//! provider every call is a no-op.

use crate::pipeline::StageLatencies;
use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{global, KeyValue};

pub const METER_NAME: &str = "flowguard_detection";

pub struct PipelineMetrics {
    pub stage_latency_ms: Histogram<f64>,
    pub attack_windows_total: Counter<u64>,
    pub cases_total: Counter<u64>,
}

static PIPELINE_METRICS: Lazy<PipelineMetrics> = Lazy::new(|| {
    let meter = global::meter(METER_NAME);
    PipelineMetrics {
        stage_latency_ms: meter
            .f64_histogram("flowguard_stage_latency_ms")
            .with_description("Latency per analysis pipeline stage (ms)")
            .with_unit("ms")
            .build(),
        attack_windows_total: meter
            .u64_counter("flowguard_attack_windows_total")
            .with_description("Windows labelled Attack, by attack-vector category")
            .build(),
        cases_total: meter
            .u64_counter("flowguard_cases_total")
            .with_description("Case studies processed, by outcome")
            .build(),
    }
});

pub fn pipeline_metrics() -> &'static PipelineMetrics { &PIPELINE_METRICS }

pub fn record_stages(lat: &StageLatencies) {
    let m = pipeline_metrics();
    for (stage, value) in lat.stages() {
        m.stage_latency_ms.record(value, &[KeyValue::new("stage", stage)]);
    }
}

pub fn record_attack_window(category: &'static str) {
    pipeline_metrics().attack_windows_total.add(1, &[KeyValue::new("category", category)]);
}

/// `outcome` is `analyzed` or the failure kind.
pub fn record_case(outcome: &'static str) {
    pipeline_metrics().cases_total.add(1, &[KeyValue::new("outcome", outcome)]);
}
