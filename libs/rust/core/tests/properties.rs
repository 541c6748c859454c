use chrono::{Duration, TimeZone, Utc};
use flowguard_core::anomaly::{label, severity};
use flowguard_core::stats::compute;
use flowguard_core::{
    preset_topology, AnalysisError, Anomaly, AnomalyDetector, AnomalyLabel, AttackFlowGraph, AttackVectorCategory, NodeRole,
    PatternClassifier, ProtocolTag, TopologySpec, TrafficSeries, VectorMetadata, Window,
};
use proptest::prelude::*;

fn series(values: &[f64]) -> TrafficSeries {
    TrafficSeries::from_values(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(), Duration::seconds(10), values).unwrap()
}

fn window() -> Window {
    let t = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    Window { start_index: 0, end_index: 4, start_time: t, end_time: t + Duration::minutes(3), mean: 1.0, std_dev: 0.5, max: 2.0, count: 4, partial: false }
}

// Sources feed amplifiers or the target; amplifier `j` only feeds later
// amplifiers or the target, so the result is acyclic and fully routed.
// Returns the spec and the ids that carry one explicit weight.
fn layered_topology(sources: usize, amplifiers: usize, picks: &[(u32, Option<f64>)]) -> (TopologySpec, Vec<String>) {
    let mut spec = TopologySpec::new("t");
    for j in 0..amplifiers {
        spec = spec.amplifier(format!("a{j}").as_str());
    }
    let mut weighted = Vec::new();
    for k in 0..sources + amplifiers {
        let (from, first_amp) = if k < sources { (format!("s{k}"), 0) } else { (format!("a{}", k - sources), k - sources + 1) };
        if k < sources {
            spec = spec.source(from.as_str());
        }
        let candidates: Vec<String> = (first_amp..amplifiers).map(|j| format!("a{j}")).chain(std::iter::once("t".to_string())).collect();
        let (mask, weight) = picks[k];
        let mut chosen: Vec<&String> =
            candidates.iter().enumerate().filter(|(i, _)| (mask >> (i % 32)) & 1 == 1).map(|(_, c)| c).collect();
        if k == 0 && amplifiers > 0 && !chosen.contains(&&candidates[0]) {
            chosen.insert(0, &candidates[0]);
        }
        if chosen.is_empty() {
            chosen.push(&candidates[candidates.len() - 1]);
        }
        for (i, to) in chosen.into_iter().enumerate() {
            spec = match weight {
                Some(w) if i == 0 => {
                    weighted.push(from.clone());
                    spec.weighted_edge(&from, to, w)
                }
                _ => spec.edge(&from, to),
            };
        }
    }
    (spec, weighted)
}

fn topology_strategy() -> impl Strategy<Value = (usize, usize, Vec<(u32, Option<f64>)>)> {
    (1usize..6, 0usize..6).prop_flat_map(|(s, a)| {
        (Just(s), Just(a), prop::collection::vec((any::<u32>(), prop::option::of(0.1f64..10.0)), s + a))
    })
}

fn label_strategy() -> impl Strategy<Value = AnomalyLabel> {
    prop_oneof![Just(AnomalyLabel::Normal), Just(AnomalyLabel::Suspicious), Just(AnomalyLabel::Attack)]
}

fn protocol_strategy() -> impl Strategy<Value = Option<ProtocolTag>> {
    prop_oneof![Just(None), (0..ProtocolTag::ALL.len()).prop_map(|i| Some(ProtocolTag::ALL[i]))]
}

proptest! {
    #[test]
    fn windows_partition_the_series(values in prop::collection::vec(0.0f64..1e6, 1..200), size in 1usize..50) {
        let size = size.min(values.len());
        let s = series(&values);
        let windows = compute(&s, size).unwrap();
        prop_assert_eq!(windows.len(), values.len().div_ceil(size));
        let mut next = 0;
        for (i, w) in windows.iter().enumerate() {
            prop_assert_eq!(w.start_index, next);
            prop_assert_eq!(w.count, w.end_index - w.start_index);
            prop_assert_eq!(w.partial, i + 1 == windows.len() && w.count < size);
            prop_assert!(w.std_dev >= 0.0);
            next = w.end_index;
        }
        prop_assert_eq!(next, values.len());
    }

    #[test]
    fn detect_scores_every_window(values in prop::collection::vec(0.0f64..1e4, 8..120), threshold in 0.1f64..10.0) {
        let s = series(&values);
        let out = AnomalyDetector::default().detect(&s, 2, threshold).unwrap();
        prop_assert_eq!(out.len(), values.len().div_ceil(2));
        for a in &out {
            prop_assert!((0.0..=1.0).contains(&a.severity));
            if !a.baseline {
                prop_assert_eq!(a.label, label(a.z_score, threshold));
            }
        }
        prop_assert!(out.iter().take(2).all(|a| a.baseline && a.label == AnomalyLabel::Normal));
    }

    #[test]
    fn severity_is_monotone_in_z(z1 in -50.0f64..50.0, z2 in -50.0f64..50.0, t in 0.1f64..10.0) {
        let (lo, hi) = if z1 <= z2 { (z1, z2) } else { (z2, z1) };
        prop_assert!(severity(lo, t) <= severity(hi, t));
        prop_assert!(label(lo, t) <= label(hi, t));
    }

    #[test]
    fn classification_is_deterministic(
        l in label_strategy(),
        sev in 0.0f64..=1.0,
        protocol in protocol_strategy(),
        duration_secs in prop::option::of(0u64..7200),
    ) {
        let anomaly = Anomaly { window: window(), severity: sev, z_score: sev * 9.0, label: l, baseline: false };
        let mut meta = VectorMetadata::new();
        if let Some(p) = protocol {
            meta = meta.with_protocol(p);
        }
        if let Some(d) = duration_secs {
            meta = meta.with_duration(std::time::Duration::from_secs(d));
        }
        let c = PatternClassifier::default();
        let first = c.classify(&anomaly, &meta);
        prop_assert_eq!(first, c.classify(&anomaly, &meta));
        if l != AnomalyLabel::Attack {
            prop_assert_eq!(first, AttackVectorCategory::Unknown);
        }
    }

    #[test]
    fn preset_out_weights_sum_to_one(idx in 0usize..5, n in 0usize..64) {
        let g = AttackFlowGraph::build(&preset_topology(AttackVectorCategory::ALL[idx], n)).unwrap();
        for node in g.nodes().iter().filter(|n| n.role != NodeRole::Target) {
            let sum: f64 = g.neighbors(&node.id).iter().map(|e| e.weight).sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }
        let order = g.topological_order();
        prop_assert_eq!(order.len(), g.nodes().len());
        prop_assert_eq!(*order.last().unwrap(), g.target().id.as_str());
    }

    #[test]
    fn layered_topologies_build_with_normalised_defaults((sources, amplifiers, picks) in topology_strategy()) {
        let (spec, weighted) = layered_topology(sources, amplifiers, &picks);
        let g = AttackFlowGraph::build(&spec).unwrap();
        prop_assert_eq!(g.nodes().len(), sources + amplifiers + 1);
        for node in g.nodes().iter().filter(|n| n.role != NodeRole::Target) {
            let out = g.neighbors(&node.id);
            prop_assert!(!out.is_empty());
            if !weighted.contains(&node.id) {
                let sum: f64 = out.iter().map(|e| e.weight).sum();
                prop_assert!((sum - 1.0).abs() < 1e-9, "{}: {}", node.id, sum);
            }
        }
        let target = g.propagated_load().into_iter().find(|l| l.role == NodeRole::Target).unwrap();
        prop_assert!(target.inbound > 0.0);
    }

    #[test]
    fn layered_topologies_reject_back_edges_and_orphans((sources, amplifiers, picks) in topology_strategy()) {
        let (spec, _) = layered_topology(sources, amplifiers, &picks);
        let orphaned = spec.clone().source("orphan");
        prop_assert_eq!(AttackFlowGraph::build(&orphaned).unwrap_err(), AnalysisError::DisconnectedNode("orphan".into()));
        if amplifiers > 0 {
            // s0 -> a0 always exists, so a0 -> s0 closes a loop
            let looped = spec.edge("a0", "s0");
            prop_assert!(matches!(AttackFlowGraph::build(&looped), Err(AnalysisError::CyclicTopology(_))));
        }
    }
}
