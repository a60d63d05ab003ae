//! Error kinds for the topology engine.

use topology_types::{NodeKind, NodeName};

/// Validation and terminal-failure errors the engine can raise.
///
/// A per-node action failure is deliberately absent as a variant here.
/// Action failures are recovered locally into a node's `error` field and
/// never surface as a bare `Err` of this type on their own; only the
/// aggregate `ErroredNodes` does, from `RunHandle::start`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("dag references nodes absent from the topology: {0:?}")]
    MissingSpecNodes(Vec<NodeName>),

    #[error("resume called with no snapshot to resume from")]
    MissingSnapshot,

    #[error("branching node `{node}` selected `{target}`, which is not a declared dependent")]
    BranchNotFound { node: NodeName, target: NodeName },

    #[error("one or more nodes errored: {0:?}")]
    ErroredNodes(Vec<NodeName>),

    #[error("topology is not a dag, cycle runs through: {0:?}")]
    CyclicTopology(Vec<NodeName>),

    #[error("node `{0}` has a declared shape but no registered action")]
    MissingAction(NodeName),

    #[error("node `{node}` declared as `{declared:?}` but registered action is `{supplied:?}`")]
    ActionKindMismatch {
        node: NodeName,
        declared: NodeKind,
        supplied: NodeKind,
    },
}
