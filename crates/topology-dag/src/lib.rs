//! A DAG-based reactive execution engine: nodes run as soon as their
//! declared dependencies complete, actions are supplied by the caller
//! behind a small trait contract, and the whole run is observable (and
//! resumable) through a single live snapshot.

mod builder;
mod error;
mod events;
mod input;
mod node;
mod readiness;
mod resume;
mod runner;
mod scheduler;
mod snapshot;
mod spec;
mod store;

pub use builder::FilterOptions;
pub use error::Error;
pub use events::Event;
pub use node::{Dag, DagNode, NodeDef, Topology};
pub use resume::{get_resume_snapshot, resume_topology, ResumeOptions};
pub use scheduler::{run_topology, RunHandle, StartOptions};
pub use snapshot::{NodeData, NodeError, Selected, Snapshot};
pub use spec::{topology_from_spec, ActionRegistry, NodeShape, RegisteredAction, TopologySpec};
pub use store::{FileSnapshotStore, SnapshotStore};

pub use topology_action::{
    ActionContext, BranchAction, BranchOutcome, FnBranchAction, FnNodeAction, FnSuspendAction,
    NodeAction, Signal, StateUpdater, SuspendAction,
};
pub use topology_types::{NodeKind, NodeName, NodeStatus, RunStatus};
