//! Readiness oracle.

use std::collections::BTreeMap;

use crate::node::Dag;
use crate::snapshot::NodeData;
use topology_types::{NodeName, NodeStatus};

/// A node is ready iff it is (or defaults to) `pending` and every one of
/// its declared dependencies is `completed`. Dependencies that are
/// `suspended`, `skipped`, `errored`, or `running` do not unblock it. The
/// node runner's propagation rules (branching skip, suspension cascade)
/// are what give those dependents a terminal status of their own instead
/// of leaving them waiting forever.
pub fn ready_to_run(dag: &Dag, data: &BTreeMap<NodeName, NodeData>) -> Vec<NodeName> {
    dag.iter()
        .filter(|(name, node)| {
            let is_pending = data
                .get(*name)
                .map(|d| d.status == NodeStatus::Pending)
                .unwrap_or(true);
            is_pending
                && node.deps.iter().all(|dep| {
                    data.get(dep)
                        .map(|d| d.status == NodeStatus::Completed)
                        .unwrap_or(false)
                })
        })
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DagNode;
    use topology_types::NodeKind;

    fn n(s: &str) -> NodeName {
        NodeName::from(s)
    }

    #[test]
    fn root_node_with_no_deps_is_ready() {
        let mut dag = Dag::new();
        dag.insert(
            n("a"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Work,
            },
        );
        let data = BTreeMap::new();
        assert_eq!(ready_to_run(&dag, &data), vec![n("a")]);
    }

    #[test]
    fn dependent_waits_for_completed_dependency() {
        let mut dag = Dag::new();
        dag.insert(
            n("a"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Work,
            },
        );
        dag.insert(
            n("b"),
            DagNode {
                deps: vec![n("a")],
                kind: NodeKind::Work,
            },
        );

        let mut data = BTreeMap::new();
        data.insert(n("a"), NodeData::pending(vec![], NodeKind::Work));
        assert_eq!(ready_to_run(&dag, &data), vec![n("a")]);

        data.get_mut(&n("a")).unwrap().status = NodeStatus::Running;
        assert!(ready_to_run(&dag, &data).is_empty());

        data.get_mut(&n("a")).unwrap().status = NodeStatus::Completed;
        assert_eq!(ready_to_run(&dag, &data), vec![n("b")]);
    }

    #[test]
    fn suspended_or_skipped_dependency_never_unblocks() {
        let mut dag = Dag::new();
        dag.insert(
            n("a"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Suspension,
            },
        );
        dag.insert(
            n("b"),
            DagNode {
                deps: vec![n("a")],
                kind: NodeKind::Work,
            },
        );

        for status in [NodeStatus::Suspended, NodeStatus::Skipped, NodeStatus::Errored] {
            let mut data = BTreeMap::new();
            let mut a = NodeData::pending(vec![], NodeKind::Suspension);
            a.status = status;
            data.insert(n("a"), a);
            assert!(ready_to_run(&dag, &data).is_empty(), "status {status:?} should not unblock");
        }
    }
}
