//! DAG builder & filter.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;
use crate::node::{Dag, DagNode, Topology};
use topology_types::NodeName;

/// Derive the runtime DAG from a topology: project each node to its
/// `{deps, kind}` shape.
pub fn extract_dag(topology: &Topology) -> Dag {
    topology
        .iter()
        .map(|(name, def)| {
            (
                name.clone(),
                DagNode {
                    deps: def.deps().to_vec(),
                    kind: def.kind(),
                },
            )
        })
        .collect()
}

/// Which nodes to keep. Exactly one of `include`/`exclude` is honored:
/// `exclude` wins if both are supplied. Callers who want an error on
/// ambiguous input should validate before calling `filter`; the engine
/// does not.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub include: Option<Vec<NodeName>>,
    pub exclude: Option<Vec<NodeName>>,
}

impl FilterOptions {
    pub fn is_noop(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }
}

/// Filtering is deliberately lenient: it only rewrites `deps` so
/// references within the surviving sub-DAG stay well-formed. It does not
/// check whether the resulting sub-DAG is still semantically meaningful.
pub fn filter(dag: &Dag, options: &FilterOptions) -> Dag {
    if let Some(exclude) = &options.exclude {
        let excluded: BTreeSet<&NodeName> = exclude.iter().collect();
        return dag
            .iter()
            .filter(|(name, _)| !excluded.contains(name))
            .map(|(name, node)| {
                let deps = node
                    .deps
                    .iter()
                    .filter(|d| !excluded.contains(d))
                    .cloned()
                    .collect();
                (
                    name.clone(),
                    DagNode {
                        deps,
                        kind: node.kind,
                    },
                )
            })
            .collect();
    }

    if let Some(include) = &options.include {
        let kept: BTreeSet<&NodeName> = include.iter().collect();
        return dag
            .iter()
            .filter(|(name, _)| kept.contains(name))
            .map(|(name, node)| {
                let deps = node
                    .deps
                    .iter()
                    .filter(|d| kept.contains(d))
                    .cloned()
                    .collect();
                (
                    name.clone(),
                    DagNode {
                        deps,
                        kind: node.kind,
                    },
                )
            })
            .collect();
    }

    dag.clone()
}

/// Fail if the DAG references any node the topology doesn't define.
pub fn validate_spec_coverage(topology: &Topology, dag: &Dag) -> Result<(), Error> {
    let missing: Vec<NodeName> = dag
        .keys()
        .filter(|name| !topology.contains_key(*name))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingSpecNodes(missing))
    }
}

/// Reject structurally impossible topologies. A dag whose deps form a
/// cycle can never become ready under [`crate::readiness::ready_to_run`]:
/// every node on the cycle waits forever for a dependency that waits for
/// it in turn. Caught here, at startup, rather than as a silent hang.
///
/// Kahn's algorithm: repeatedly remove nodes with no unsatisfied
/// dependency; whatever is left once no more can be removed lies on (or
/// downstream of) a cycle.
pub fn reject_cycles(dag: &Dag) -> Result<(), Error> {
    let mut remaining_deps: BTreeMap<&NodeName, BTreeSet<&NodeName>> = dag
        .iter()
        .map(|(name, node)| (name, node.deps.iter().collect()))
        .collect();

    let mut queue: Vec<&NodeName> = remaining_deps
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(name, _)| *name)
        .collect();
    let mut resolved: BTreeSet<&NodeName> = BTreeSet::new();

    while let Some(name) = queue.pop() {
        if !resolved.insert(name) {
            continue;
        }
        for (other, deps) in remaining_deps.iter_mut() {
            if deps.remove(name) && deps.is_empty() && !resolved.contains(*other) {
                queue.push(other);
            }
        }
    }

    let cyclic: Vec<NodeName> = dag
        .keys()
        .filter(|name| !resolved.contains(*name))
        .cloned()
        .collect();

    if cyclic.is_empty() {
        Ok(())
    } else {
        Err(Error::CyclicTopology(cyclic))
    }
}
