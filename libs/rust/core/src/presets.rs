//! Reference propagation structures and mitigation advice per attack category.

use crate::classifier::AttackVectorCategory;
use crate::flow_graph::{NodeSpec, TopologySpec, AMPLIFICATION_FACTOR_ATTR};

pub const MAX_PRESET_SOURCES: usize = 32;

// Bandwidth amplification factors published for common reflectors.
const REFLECTORS: [(&str, &str); 3] = [("dns-resolver", "54"), ("ntp-server", "556.9"), ("memcached-server", "51000")];

const GENERAL_ADVICE: [&str; 3] = [
    "Activate enhanced monitoring and alerting",
    "Consider enabling DDoS protection services",
    "Document incident for future analysis",
];

/// Topology for `category` with `source_count` attacking hosts (clamped to `1..=MAX_PRESET_SOURCES`).
pub fn preset_topology(category: AttackVectorCategory, source_count: usize) -> TopologySpec {
    let n = source_count.clamp(1, MAX_PRESET_SOURCES);
    match category {
        AttackVectorCategory::VolumetricFlood => {
            let spec = with_sources(TopologySpec::new(tier("target-server", "server")), "botnet", n, "internet");
            spec.amplifier(tier("internet", "network"))
                .amplifier(tier("firewall", "defense"))
                .amplifier(tier("load-balancer", "infrastructure"))
                .edge("internet", "firewall")
                .edge("firewall", "load-balancer")
                .edge("load-balancer", "target-server")
        }
        AttackVectorCategory::ProtocolExhaustion => {
            let spec = with_sources(
                TopologySpec::new(tier("target-server", "server").attr("exhausted_resource", "connection_table")),
                "attacker",
                n,
                "spoofed-ips",
            );
            spec.amplifier(tier("spoofed-ips", "resource"))
                .amplifier(tier("internet", "network"))
                .edge("spoofed-ips", "internet")
                .edge("internet", "target-server")
        }
        AttackVectorCategory::ApplicationLayer => {
            let spec = with_sources(
                TopologySpec::new(tier("web-server", "server").attr("exhausted_resource", "cpu_memory")),
                "attacker",
                n,
                "bot-network",
            );
            spec.amplifier(tier("bot-network", "resource"))
                .amplifier(tier("internet", "network"))
                .edge("bot-network", "internet")
                .edge("internet", "web-server")
        }
        AttackVectorCategory::Amplification => {
            let mut spec = TopologySpec::new(tier("target", "server"));
            for (id, factor) in REFLECTORS {
                spec = spec.amplifier(tier(id, "reflector").attr(AMPLIFICATION_FACTOR_ATTR, factor));
            }
            for i in 1..=n {
                let src = format!("attacker-{i}");
                spec = spec.source(tier(&src, "attacker").attr("spoofed_source", "target"));
                for (id, _) in REFLECTORS {
                    spec = spec.edge(&src, id);
                }
            }
            for (id, _) in REFLECTORS {
                spec = spec.edge(id, "target");
            }
            spec
        }
        AttackVectorCategory::Unknown => {
            let spec = with_sources(TopologySpec::new(tier("target", "server")), "attacker", n, "attack-vector");
            spec.amplifier(tier("attack-vector", "resource"))
                .amplifier(tier("network", "network"))
                .edge("attack-vector", "network")
                .edge("network", "target")
        }
    }
}

/// Category-specific countermeasures followed by the general incident advice.
pub fn mitigation_recommendations(category: AttackVectorCategory) -> Vec<&'static str> {
    let specific: &[&str] = match category {
        AttackVectorCategory::VolumetricFlood => &[
            "Implement UDP rate limiting",
            "Configure ingress filtering",
            "Enable UDP flood protection",
        ],
        AttackVectorCategory::ProtocolExhaustion => &[
            "Enable SYN cookies on servers",
            "Configure SYN flood protection on firewalls",
            "Implement connection rate limiting",
        ],
        AttackVectorCategory::ApplicationLayer => &[
            "Enable HTTP request rate limiting",
            "Deploy Web Application Firewall (WAF)",
            "Implement CAPTCHA challenges for suspicious sources",
        ],
        AttackVectorCategory::Amplification => &[
            "Implement BCP38 ingress filtering",
            "Configure response rate limiting on public services",
            "Monitor for source IP spoofing",
        ],
        AttackVectorCategory::Unknown => &["No specific attack pattern detected - continue normal monitoring"],
    };
    specific.iter().chain(GENERAL_ADVICE.iter()).copied().collect()
}

fn tier(id: &str, kind: &str) -> NodeSpec { NodeSpec::new(id).attr("kind", kind) }

// `n` sources named `{prefix}-{i}`, each with a single edge into `entry`.
fn with_sources(mut spec: TopologySpec, prefix: &str, n: usize, entry: &str) -> TopologySpec {
    for i in 1..=n {
        let id = format!("{prefix}-{i}");
        spec = spec.source(tier(&id, "attacker")).edge(&id, entry);
    }
    spec
}
