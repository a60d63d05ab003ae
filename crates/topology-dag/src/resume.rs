//! Resuming a run from a previously captured snapshot.

use chrono::Utc;
use serde_json::Value;

use topology_types::{NodeStatus, RunStatus};

use crate::builder::{reject_cycles, validate_spec_coverage};
use crate::error::Error;
use crate::node::{Dag, DagNode, Topology};
use crate::scheduler::RunHandle;
use crate::snapshot::Snapshot;

/// Per-resume input. Unlike [`crate::scheduler::StartOptions`], there is no
/// `data` (the run is already past its root nodes) and no `filter` (the
/// snapshot is authoritative for which nodes exist).
#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    pub context: Option<Value>,
}

/// Roll a captured snapshot back to something the scheduler can pick up
/// again. Any node caught mid-flight (`running`, because the process that
/// held it died), paused (`suspended`), or `errored` goes back to
/// `pending`. The snapshot carries no reference to the action that
/// produced an error; that lives in the `Topology` the caller passes to
/// [`resume_topology`]. Retrying an errored node with a corrected action,
/// after the caller has patched whatever made it fail, is the only way
/// back. `completed` and `skipped` are left exactly as they were, so the
/// readiness oracle and input materializer see the same history a live
/// run would have produced.
///
/// Checkpoint `state` and already-materialized `input` are preserved
/// across the reset. A reset node still carries its last checkpoint
/// state, and the node runner's cache rule means its input is never
/// recomputed just because the node restarts.
pub fn get_resume_snapshot(old: &Snapshot) -> Snapshot {
    let mut data = old.data.clone();
    for nd in data.values_mut() {
        if matches!(
            nd.status,
            NodeStatus::Running | NodeStatus::Suspended | NodeStatus::Errored
        ) {
            nd.status = NodeStatus::Pending;
            nd.started = None;
            nd.finished = None;
            nd.output = None;
            nd.error = None;
            nd.selected = None;
            nd.reason = None;
        }
    }
    Snapshot {
        status: RunStatus::Running,
        started: Utc::now(),
        finished: None,
        data,
    }
}

/// Resume a topology from `snapshot`. Fails with [`Error::MissingSnapshot`]
/// if none is supplied. A snapshot already `completed` is idempotent: the
/// original snapshot is handed back unchanged, `wait()` resolves
/// immediately with `Ok(())`, and no event fires. Nothing short of that
/// early return is byte-identical, since `get_resume_snapshot` always
/// re-stamps `started` and the scheduler loop always re-stamps `finished`
/// and re-emits `done`.
///
/// The DAG driving this run is rebuilt from the snapshot's own
/// `{deps, kind}` per node, not re-derived from `topology`. A resumed run
/// honors whatever `FilterOptions` shaped the original run, even if the
/// caller's in-memory `topology` has since grown new nodes.
pub fn resume_topology(
    topology: Topology,
    snapshot: Option<&Snapshot>,
    options: ResumeOptions,
) -> Result<RunHandle, Error> {
    let Some(old) = snapshot else {
        return Err(Error::MissingSnapshot);
    };

    if old.status == RunStatus::Completed {
        return Ok(RunHandle::already_done(old.clone()));
    }

    let resumed = get_resume_snapshot(old);
    let dag: Dag = resumed
        .data
        .iter()
        .map(|(name, nd)| {
            (
                name.clone(),
                DagNode {
                    deps: nd.deps.clone(),
                    kind: nd.kind,
                },
            )
        })
        .collect();

    validate_spec_coverage(&topology, &dag)?;
    reject_cycles(&dag)?;

    Ok(RunHandle::spawn(topology, dag, resumed, None, options.context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::NodeData;
    use std::collections::BTreeMap;
    use topology_types::{NodeKind, NodeName};

    fn n(s: &str) -> NodeName {
        NodeName::from(s)
    }

    #[test]
    fn running_suspended_and_errored_nodes_reset_to_pending() {
        let mut data = BTreeMap::new();

        let mut completed = NodeData::pending(vec![], NodeKind::Work);
        completed.status = NodeStatus::Completed;
        completed.output = Some(serde_json::json!(1));
        data.insert(n("a"), completed.clone());

        let mut running = NodeData::pending(vec![n("a")], NodeKind::Work);
        running.status = NodeStatus::Running;
        running.input = Some(vec![serde_json::json!(1)]);
        data.insert(n("b"), running);

        let mut suspended = NodeData::pending(vec![n("a")], NodeKind::Work);
        suspended.status = NodeStatus::Suspended;
        suspended.finished = Some(Utc::now());
        data.insert(n("c"), suspended);

        let mut errored = NodeData::pending(vec![n("a")], NodeKind::Work);
        errored.status = NodeStatus::Errored;
        errored.error = Some(crate::snapshot::NodeError::cancelled(&n("d")));
        errored.finished = Some(Utc::now());
        data.insert(n("d"), errored);

        let old = Snapshot {
            status: RunStatus::Suspended,
            started: Utc::now(),
            finished: Some(Utc::now()),
            data,
        };

        let resumed = get_resume_snapshot(&old);
        assert_eq!(resumed.status, RunStatus::Running);
        assert_eq!(resumed.data[&n("a")].status, NodeStatus::Completed);
        assert_eq!(resumed.data[&n("b")].status, NodeStatus::Pending);
        assert_eq!(resumed.data[&n("b")].input, Some(vec![serde_json::json!(1)]));
        assert_eq!(resumed.data[&n("c")].status, NodeStatus::Pending);
        assert!(resumed.data[&n("c")].finished.is_none());
        assert_eq!(resumed.data[&n("d")].status, NodeStatus::Pending);
        assert!(resumed.data[&n("d")].error.is_none());
    }

    #[test]
    fn resume_without_snapshot_is_an_error() {
        let topology = Topology::new();
        let err = resume_topology(topology, None, ResumeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingSnapshot));
    }

    #[tokio::test]
    async fn resuming_a_completed_snapshot_is_a_byte_identical_no_op() {
        let mut data = BTreeMap::new();
        let mut a = NodeData::pending(vec![], NodeKind::Work);
        a.status = NodeStatus::Completed;
        a.output = Some(serde_json::json!(1));
        data.insert(n("a"), a);

        let old = Snapshot {
            status: RunStatus::Completed,
            started: Utc::now(),
            finished: Some(Utc::now()),
            data,
        };

        let handle =
            resume_topology(Topology::new(), Some(&old), ResumeOptions::default()).unwrap();
        handle.wait().await.unwrap();

        let after = handle.get_snapshot();
        assert_eq!(
            serde_json::to_string(&after).unwrap(),
            serde_json::to_string(&old).unwrap()
        );
    }
}
