//! Node definitions: the tagged variant a topology is built out of.

use std::sync::Arc;

use topology_action::{BranchAction, NodeAction, SuspendAction};
use topology_types::{NodeKind, NodeName};

/// A node's definition as supplied by the caller building a topology.
///
/// Modeled as a sum type with per-case payloads, not a struct with
/// nullable fields. That keeps the node runner's dispatch total: there is
/// no state in which a branching node might also carry a work action.
pub enum NodeDef {
    Work {
        action: Arc<dyn NodeAction>,
        deps: Vec<NodeName>,
    },
    Branching {
        select: Arc<dyn BranchAction>,
        deps: Vec<NodeName>,
    },
    Suspension {
        action: Option<Arc<dyn SuspendAction>>,
        deps: Vec<NodeName>,
    },
}

impl NodeDef {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Work { .. } => NodeKind::Work,
            Self::Branching { .. } => NodeKind::Branching,
            Self::Suspension { .. } => NodeKind::Suspension,
        }
    }

    pub fn deps(&self) -> &[NodeName] {
        match self {
            Self::Work { deps, .. } => deps,
            Self::Branching { deps, .. } => deps,
            Self::Suspension { deps, .. } => deps,
        }
    }
}

/// A fully defined topology: every node's name mapped to its definition.
/// This is the immutable, per-run input the DAG is derived from.
pub type Topology = std::collections::BTreeMap<NodeName, NodeDef>;

/// A single DAG node's shape, with actions stripped away. What survives
/// filtering, and what gets persisted into `NodeData.deps`/`NodeData.kind`
/// so resume can reconstruct the DAG without the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub deps: Vec<NodeName>,
    pub kind: NodeKind,
}

/// The derived, possibly-filtered DAG: name -> `{deps, kind}`.
pub type Dag = std::collections::BTreeMap<NodeName, DagNode>;
