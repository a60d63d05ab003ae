//! Input materialization.

use std::collections::BTreeMap;

use serde_json::Value;

use topology_types::{NodeKind, NodeName};

use crate::node::Dag;
use crate::snapshot::NodeData;

/// Compute node `name`'s materialized input. Caches nothing itself; the
/// caller is responsible for writing the result into `data[name].input`
/// exactly once: computed lazily, on first dispatch, and cached from then
/// on.
///
/// Walks `deps` in declared order. A work dependency contributes its
/// `output`; a branching/suspension dependency contributes the elements
/// of *its own* materialized input, spread rather than nested, so data
/// flows through control-flow nodes that produce no output of their own.
pub fn materialize_input(
    dag: &Dag,
    data: &BTreeMap<NodeName, NodeData>,
    name: &NodeName,
    initial_data: Option<&Value>,
) -> Vec<Value> {
    let Some(node) = dag.get(name) else {
        return Vec::new();
    };

    if node.deps.is_empty() {
        return match initial_data {
            Some(v) => vec![v.clone()],
            None => Vec::new(),
        };
    }

    let mut input = Vec::with_capacity(node.deps.len());
    for dep in &node.deps {
        let Some(dep_data) = data.get(dep) else {
            continue;
        };
        match dep_data.kind {
            NodeKind::Work => {
                if let Some(output) = &dep_data.output {
                    input.push(output.clone());
                }
            }
            NodeKind::Branching | NodeKind::Suspension => {
                if let Some(dep_input) = &dep_data.input {
                    input.extend(dep_input.iter().cloned());
                }
            }
        }
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DagNode;
    use topology_types::NodeStatus;

    fn n(s: &str) -> NodeName {
        NodeName::from(s)
    }

    #[test]
    fn root_node_with_no_initial_data_gets_empty_input() {
        let mut dag = Dag::new();
        dag.insert(
            n("a"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Work,
            },
        );
        let data = BTreeMap::new();
        assert_eq!(materialize_input(&dag, &data, &n("a"), None), Vec::<Value>::new());
    }

    #[test]
    fn root_node_with_initial_data_gets_single_element_input() {
        let mut dag = Dag::new();
        dag.insert(
            n("a"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Work,
            },
        );
        let data = BTreeMap::new();
        let initial = serde_json::json!({"episode": 17});
        assert_eq!(
            materialize_input(&dag, &data, &n("a"), Some(&initial)),
            vec![initial]
        );
    }

    #[test]
    fn work_dependency_contributes_its_output() {
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
        let mut a = NodeData::pending(vec![], NodeKind::Work);
        a.status = NodeStatus::Completed;
        a.output = Some(serde_json::json!([1, 2, 3]));
        data.insert(n("a"), a);

        assert_eq!(
            materialize_input(&dag, &data, &n("b"), None),
            vec![serde_json::json!([1, 2, 3])]
        );
    }

    #[test]
    fn suspension_dependency_spreads_its_own_input_through() {
        let mut dag = Dag::new();
        dag.insert(
            n("input"),
            DagNode {
                deps: vec![],
                kind: NodeKind::Work,
            },
        );
        dag.insert(
            n("authorization"),
            DagNode {
                deps: vec![n("input")],
                kind: NodeKind::Suspension,
            },
        );
        dag.insert(
            n("email"),
            DagNode {
                deps: vec![n("authorization")],
                kind: NodeKind::Work,
            },
        );

        let mut data = BTreeMap::new();
        let mut input_node = NodeData::pending(vec![], NodeKind::Work);
        input_node.status = NodeStatus::Completed;
        input_node.output = Some(serde_json::json!("payload"));
        data.insert(n("input"), input_node);

        let mut auth = NodeData::pending(vec![n("input")], NodeKind::Suspension);
        auth.status = NodeStatus::Completed;
        auth.input = Some(vec![serde_json::json!("payload")]);
        data.insert(n("authorization"), auth);

        assert_eq!(
            materialize_input(&dag, &data, &n("email"), None),
            vec![serde_json::json!("payload")]
        );
    }
}
