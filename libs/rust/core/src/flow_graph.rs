//! Weighted directed model of how attack traffic travels from its sources,
//! through intermediate infrastructure, to a single target.
//!
//! A graph is only obtainable through [`AttackFlowGraph::build`], which
//! guarantees: unique node ids, every edge between declared nodes, no edge
//! leaving the target, no cycles, and a path to the target from every other
//! node. After construction it is read-only and freely shareable across threads.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

pub const AMPLIFICATION_FACTOR_ATTR: &str = "amplification_factor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Source,
    Amplifier,
    Target,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Amplifier => "amplifier",
            Self::Target => "target",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    pub role: NodeRole,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeSpecRepr")]
pub struct NodeSpec {
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

// A node may be written as a bare id or as `{id, attributes}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NodeSpecRepr {
    Id(String),
    Full {
        id: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
    },
}

impl From<NodeSpecRepr> for NodeSpec {
    fn from(repr: NodeSpecRepr) -> Self {
        match repr {
            NodeSpecRepr::Id(id) => NodeSpec::new(id),
            NodeSpecRepr::Full { id, attributes } => NodeSpec { id, attributes },
        }
    }
}

impl NodeSpec {
    pub fn new(id: impl Into<String>) -> Self { Self { id: id.into(), attributes: BTreeMap::new() } }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for NodeSpec {
    fn from(id: &str) -> Self { NodeSpec::new(id) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    /// Relative contribution; `None` spreads evenly across the sender's edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Declarative description of a propagation structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologySpec {
    pub sources: Vec<NodeSpec>,
    #[serde(default)]
    pub amplifiers: Vec<NodeSpec>,
    pub target: NodeSpec,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl TopologySpec {
    pub fn new(target: impl Into<NodeSpec>) -> Self {
        Self { sources: Vec::new(), amplifiers: Vec::new(), target: target.into(), edges: Vec::new() }
    }

    pub fn source(mut self, node: impl Into<NodeSpec>) -> Self {
        self.sources.push(node.into());
        self
    }

    pub fn amplifier(mut self, node: impl Into<NodeSpec>) -> Self {
        self.amplifiers.push(node.into());
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push(EdgeSpec { from: from.into(), to: to.into(), weight: None });
        self
    }

    pub fn weighted_edge(mut self, from: &str, to: &str, weight: f64) -> Self {
        self.edges.push(EdgeSpec { from: from.into(), to: to.into(), weight: Some(weight) });
        self
    }
}

/// Traffic received and forwarded by one node under [`AttackFlowGraph::propagated_load`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLoad {
    pub id: String,
    pub role: NodeRole,
    pub inbound: f64,
    pub outbound: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttackFlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    endpoints: Vec<(usize, usize)>,
    #[serde(skip)]
    outgoing: Vec<Vec<usize>>,
    #[serde(skip)]
    incoming: Vec<Vec<usize>>,
    #[serde(skip)]
    order: Vec<usize>,
    #[serde(skip)]
    target: usize,
}

impl AttackFlowGraph {
    pub fn build(spec: &TopologySpec) -> Result<Self> {
        let mut nodes = Vec::with_capacity(spec.sources.len() + spec.amplifiers.len() + 1);
        let mut index = HashMap::new();
        let declared = spec
            .sources
            .iter()
            .map(|n| (n, NodeRole::Source))
            .chain(spec.amplifiers.iter().map(|n| (n, NodeRole::Amplifier)))
            .chain(std::iter::once((&spec.target, NodeRole::Target)));
        for (node, role) in declared {
            if index.insert(node.id.clone(), nodes.len()).is_some() {
                return Err(AnalysisError::DuplicateNode(node.id.clone()));
            }
            nodes.push(FlowNode { id: node.id.clone(), role, attributes: node.attributes.clone() });
        }
        for node in nodes.iter().filter(|n| n.role == NodeRole::Amplifier) {
            amplification_factor(node)?;
        }
        let target = nodes.len() - 1;

        let mut endpoints = Vec::with_capacity(spec.edges.len());
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut seen = HashSet::new();
        for (e, edge) in spec.edges.iter().enumerate() {
            let from = *index.get(&edge.from).ok_or_else(|| AnalysisError::UnknownNode(edge.from.clone()))?;
            let to = *index.get(&edge.to).ok_or_else(|| AnalysisError::UnknownNode(edge.to.clone()))?;
            if from == target {
                return Err(invalid_edge(edge, "the target cannot forward traffic"));
            }
            if from == to {
                return Err(AnalysisError::CyclicTopology(edge.from.clone()));
            }
            if !seen.insert((from, to)) {
                return Err(invalid_edge(edge, "edge declared more than once"));
            }
            if let Some(w) = edge.weight {
                if !w.is_finite() || w <= 0.0 {
                    return Err(AnalysisError::invalid(format!("edge {} -> {} weight must be positive, got {w}", edge.from, edge.to)));
                }
            }
            endpoints.push((from, to));
            outgoing[from].push(e);
            incoming[to].push(e);
        }

        let order = topological_order(&outgoing, &endpoints).map_err(|n| AnalysisError::CyclicTopology(nodes[n].id.clone()))?;
        if let Some(n) = unreachable_from(target, &incoming, &endpoints) {
            return Err(AnalysisError::DisconnectedNode(nodes[n].id.clone()));
        }

        let edges = spec
            .edges
            .iter()
            .zip(&endpoints)
            .map(|(edge, &(from, _))| FlowEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                weight: edge.weight.unwrap_or(1.0 / outgoing[from].len() as f64),
            })
            .collect();

        Ok(Self { nodes, edges, index, endpoints, outgoing, incoming, order, target })
    }

    /// Outgoing edges of `node_id` in declaration order; empty for unknown ids.
    pub fn neighbors(&self, node_id: &str) -> Vec<&FlowEdge> {
        self.index
            .get(node_id)
            .map(|&n| self.outgoing[n].iter().map(|&e| &self.edges[e]).collect())
            .unwrap_or_default()
    }

    /// Sum of the weights of edges ending at `node_id`; 0 for unknown ids.
    pub fn total_inbound_weight(&self, node_id: &str) -> f64 {
        self.index
            .get(node_id)
            .map(|&n| self.incoming[n].iter().map(|&e| self.edges[e].weight).sum())
            .unwrap_or(0.0)
    }

    pub fn node(&self, node_id: &str) -> Option<&FlowNode> { self.index.get(node_id).map(|&n| &self.nodes[n]) }
    pub fn nodes(&self) -> &[FlowNode] { &self.nodes }
    pub fn edges(&self) -> &[FlowEdge] { &self.edges }
    pub fn target(&self) -> &FlowNode { &self.nodes[self.target] }

    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    /// Node ids such that every edge points forward.
    pub fn topological_order(&self) -> Vec<&str> { self.order.iter().map(|&n| self.nodes[n].id.as_str()).collect() }

    /// Push one unit of traffic out of every source and follow it to the
    /// target. Each node splits what it emits across its outgoing edges in
    /// proportion to their weights; amplifiers first multiply it by their
    /// `amplification_factor` attribute (1 when absent).
    pub fn propagated_load(&self) -> Vec<NodeLoad> {
        let mut inbound = vec![0.0; self.nodes.len()];
        let mut outbound = vec![0.0; self.nodes.len()];
        for &n in &self.order {
            let node = &self.nodes[n];
            let emitted = match node.role {
                NodeRole::Source => inbound[n] + 1.0,
                NodeRole::Amplifier => inbound[n] * amplification_factor(node).unwrap_or(1.0),
                NodeRole::Target => 0.0,
            };
            outbound[n] = emitted;
            let total: f64 = self.outgoing[n].iter().map(|&e| self.edges[e].weight).sum();
            if total <= 0.0 {
                continue;
            }
            for &e in &self.outgoing[n] {
                inbound[self.endpoints[e].1] += emitted * self.edges[e].weight / total;
            }
        }
        self.nodes
            .iter()
            .enumerate()
            .map(|(n, node)| NodeLoad { id: node.id.clone(), role: node.role, inbound: inbound[n], outbound: outbound[n] })
            .collect()
    }
}

fn invalid_edge(edge: &EdgeSpec, reason: &str) -> AnalysisError {
    AnalysisError::InvalidEdge { from: edge.from.clone(), to: edge.to.clone(), reason: reason.into() }
}

fn amplification_factor(node: &FlowNode) -> Result<f64> {
    match node.attributes.get(AMPLIFICATION_FACTOR_ATTR) {
        None => Ok(1.0),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(f) if f.is_finite() && f > 0.0 => Ok(f),
            _ => Err(AnalysisError::invalid(format!("node {} has invalid {AMPLIFICATION_FACTOR_ATTR} {raw:?}", node.id))),
        },
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    New,
    Active,
    Done,
}

// Iterative DFS; Err carries a node that lies on a cycle.
fn topological_order(outgoing: &[Vec<usize>], endpoints: &[(usize, usize)]) -> std::result::Result<Vec<usize>, usize> {
    let mut mark = vec![Mark::New; outgoing.len()];
    let mut post = Vec::with_capacity(outgoing.len());
    for root in 0..outgoing.len() {
        if mark[root] != Mark::New {
            continue;
        }
        mark[root] = Mark::Active;
        let mut stack = vec![(root, 0usize)];
        while let Some(&(node, next)) = stack.last() {
            match outgoing[node].get(next) {
                Some(&e) => {
                    let top = stack.len() - 1;
                    stack[top].1 += 1;
                    let child = endpoints[e].1;
                    match mark[child] {
                        Mark::Active => return Err(child),
                        Mark::New => {
                            mark[child] = Mark::Active;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    mark[node] = Mark::Done;
                    post.push(node);
                    stack.pop();
                }
            }
        }
    }
    post.reverse();
    Ok(post)
}

// First node (in declaration order) that cannot reach `target`.
fn unreachable_from(target: usize, incoming: &[Vec<usize>], endpoints: &[(usize, usize)]) -> Option<usize> {
    let mut reached = vec![false; incoming.len()];
    reached[target] = true;
    let mut queue = VecDeque::from([target]);
    while let Some(n) = queue.pop_front() {
        for &e in &incoming[n] {
            let from = endpoints[e].0;
            if !reached[from] {
                reached[from] = true;
                queue.push_back(from);
            }
        }
    }
    reached.iter().position(|r| !r)
}
