//! Loading a topology's *shape* from data instead of code.
//!
//! Action callbacks can't be serialized ([`crate::node::NodeDef`] holds
//! trait objects), so a topology loaded from JSON/YAML only ever carries
//! names, kinds, and deps. This mirrors how `vwf-core::config::StepConfig`
//! separates a step's declared shape from the runtime behavior a step kind
//! dispatches to. The caller supplies the actual actions through an
//! [`ActionRegistry`] and [`topology_from_spec`] joins the two, failing if
//! either side names a node the other doesn't.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use topology_action::{BranchAction, NodeAction, SuspendAction};
use topology_types::{NodeKind, NodeName};

use crate::error::Error;
use crate::node::{NodeDef, Topology};

/// One node's declared shape: its type and its dependency list. Everything
/// a `TopologySpec` needs to describe; the action itself is supplied
/// separately, by name, through an [`ActionRegistry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeShape {
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub deps: Vec<NodeName>,
}

/// The on-disk/JSON representation of a topology's node shape. Loaded with
/// `serde_json`/`serde_yaml`; joined with an [`ActionRegistry`] via
/// [`topology_from_spec`] to produce a runnable [`Topology`].
pub type TopologySpec = BTreeMap<NodeName, NodeShape>;

/// The action a caller supplies for one named node. Kept distinct from
/// [`NodeDef`] because a registry entry is keyed purely by node name; its
/// `kind` is asserted against the matching [`NodeShape`] at join time,
/// rather than declared twice.
pub enum RegisteredAction {
    Work(Arc<dyn NodeAction>),
    Branching(Arc<dyn BranchAction>),
    Suspension(Option<Arc<dyn SuspendAction>>),
}

impl RegisteredAction {
    fn kind(&self) -> NodeKind {
        match self {
            Self::Work(_) => NodeKind::Work,
            Self::Branching(_) => NodeKind::Branching,
            Self::Suspension(_) => NodeKind::Suspension,
        }
    }
}

/// Caller-supplied actions, keyed by the node name they belong to.
pub type ActionRegistry = BTreeMap<NodeName, RegisteredAction>;

/// Join a loaded `TopologySpec` with a caller's `ActionRegistry` into a
/// runnable [`Topology`]. Fails if a node in the spec has no matching
/// registry entry, or if a registry entry's kind doesn't match the shape
/// the spec declared for that node.
pub fn topology_from_spec(
    spec: &TopologySpec,
    mut actions: ActionRegistry,
) -> Result<Topology, Error> {
    let mut topology = Topology::new();
    for (name, shape) in spec {
        let action = actions
            .remove(name)
            .ok_or_else(|| Error::MissingAction(name.clone()))?;
        if action.kind() != shape.kind {
            return Err(Error::ActionKindMismatch {
                node: name.clone(),
                declared: shape.kind,
                supplied: action.kind(),
            });
        }
        let def = match action {
            RegisteredAction::Work(action) => NodeDef::Work {
                action,
                deps: shape.deps.clone(),
            },
            RegisteredAction::Branching(select) => NodeDef::Branching {
                select,
                deps: shape.deps.clone(),
            },
            RegisteredAction::Suspension(action) => NodeDef::Suspension {
                action,
                deps: shape.deps.clone(),
            },
        };
        topology.insert(name.clone(), def);
    }
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_action::ActionContext;
    use serde_json::Value;

    struct Echo;
    #[async_trait::async_trait]
    impl NodeAction for Echo {
        async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value> {
            Ok(ctx.data.first().cloned().unwrap_or(Value::Null))
        }
    }

    fn n(s: &str) -> NodeName {
        NodeName::from(s)
    }

    #[test]
    fn joins_matching_shape_and_action() {
        let mut spec = TopologySpec::new();
        spec.insert(
            n("a"),
            NodeShape {
                kind: NodeKind::Work,
                deps: vec![],
            },
        );

        let mut actions = ActionRegistry::new();
        actions.insert(n("a"), RegisteredAction::Work(Arc::new(Echo)));

        let topology = topology_from_spec(&spec, actions).unwrap();
        assert!(matches!(topology.get(&n("a")), Some(NodeDef::Work { .. })));
    }

    #[test]
    fn missing_action_is_an_error() {
        let mut spec = TopologySpec::new();
        spec.insert(
            n("a"),
            NodeShape {
                kind: NodeKind::Work,
                deps: vec![],
            },
        );

        let err = topology_from_spec(&spec, ActionRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::MissingAction(name) if name == n("a")));
    }

    #[test]
    fn mismatched_kind_is_an_error() {
        let mut spec = TopologySpec::new();
        spec.insert(
            n("a"),
            NodeShape {
                kind: NodeKind::Branching,
                deps: vec![],
            },
        );

        let mut actions = ActionRegistry::new();
        actions.insert(n("a"), RegisteredAction::Work(Arc::new(Echo)));

        let err = topology_from_spec(&spec, actions).unwrap_err();
        assert!(matches!(err, Error::ActionKindMismatch { .. }));
    }
}
