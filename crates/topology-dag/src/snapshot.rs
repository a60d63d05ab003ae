//! The live snapshot: a run's complete observable state, and the per-node
//! record it is built out of.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use topology_types::{NodeKind, NodeName, NodeStatus, RunStatus};

/// A node's error, captured with message + stack + whatever extra fields
/// came along for the ride, so round-tripping through JSON preserves the
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeError {
    pub message: String,
    pub stack: String,
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, Value>,
}

impl NodeError {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            stack: format!("{err:#}"),
            extra: serde_json::Map::new(),
        }
    }

    pub fn cancelled(node: &NodeName) -> Self {
        Self {
            message: format!("node `{node}` cancelled"),
            stack: format!("node `{node}` observed the cancellation signal and stopped"),
            extra: serde_json::Map::new(),
        }
    }
}

/// For branching nodes, what got selected: either a named dependent or
/// the "none" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selected {
    None,
    Node(NodeName),
}

/// Per-node state persisted in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: NodeKind,
    pub deps: Vec<NodeName>,
    pub status: NodeStatus,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Option<Vec<Value>>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub error: Option<NodeError>,
    #[serde(default)]
    pub selected: Option<Selected>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl NodeData {
    pub fn pending(deps: Vec<NodeName>, kind: NodeKind) -> Self {
        Self {
            kind,
            deps,
            status: NodeStatus::Pending,
            started: None,
            finished: None,
            input: None,
            output: None,
            state: None,
            error: None,
            selected: None,
            reason: None,
        }
    }
}

/// The complete observable state of a run.
///
/// Mutated in place; every reference handed to a subscriber aliases this
/// same value. Enforced here by handing subscribers an
/// `Arc<Mutex<Snapshot>>` rather than a clone: a `MutexGuard` they take
/// from it is a read into the live state, not a copy, and the type system
/// (no `&mut` exposed outside this crate) prevents them from mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: RunStatus,
    pub started: DateTime<Utc>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
    pub data: BTreeMap<NodeName, NodeData>,
}

impl Snapshot {
    pub fn new(data: BTreeMap<NodeName, NodeData>) -> Self {
        Self {
            status: RunStatus::Running,
            started: Utc::now(),
            finished: None,
            data,
        }
    }
}
