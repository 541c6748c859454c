use thiserror::Error;

/// Failures reported by every analysis operation. None of them are retried:
/// the same input always produces the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("insufficient data: need {required} windows, have {available}")]
    InsufficientData { required: usize, available: usize },
    #[error("timestamp at index {index} does not advance past its predecessor")]
    OutOfOrder { index: usize },
    #[error("value {value} at index {index} is not a finite non-negative rate")]
    InvalidValue { index: usize, value: f64 },
    #[error("unknown protocol tag: {0}")]
    UnknownProtocol(String),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("node {0} has no path to the target")]
    DisconnectedNode(String),
    #[error("topology contains a cycle through node {0}")]
    CyclicTopology(String),
    #[error("edge references undeclared node: {0}")]
    UnknownNode(String),
    #[error("invalid edge {from} -> {to}: {reason}")]
    InvalidEdge { from: String, to: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self { Self::InvalidParameter(msg.into()) }

    /// True for the failures raised while validating a topology.
    pub fn is_topology_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateNode(_)
                | Self::DisconnectedNode(_)
                | Self::CyclicTopology(_)
                | Self::UnknownNode(_)
                | Self::InvalidEdge { .. }
        )
    }
}
