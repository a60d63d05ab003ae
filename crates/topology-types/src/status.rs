//! Status types shared by nodes and runs.

use serde::{Deserialize, Serialize};

/// Status of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Errored,
    Suspended,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Errored | Self::Suspended | Self::Skipped
        )
    }
}

/// Status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Errored,
    Suspended,
}

/// Declared type of a node, persisted alongside `deps` so resume does not
/// need to re-derive the graph's shape from the topology definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Work,
    Branching,
    Suspension,
}

impl Default for NodeKind {
    fn default() -> Self {
        Self::Work
    }
}
