//! The node runner: drives one node from `running` to a
//! terminal status and propagates branching/suspension effects onto its
//! direct dependents. The scheduler spawns one of these per ready node and
//! tracks it in a `JoinSet`; this module owns every status transition.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use topology_action::{ActionContext, Signal, StateUpdater};
use topology_types::{NodeKind, NodeName, NodeStatus};

use crate::error::Error;
use crate::events::{EventBus, SharedSnapshot};
use crate::input::materialize_input;
use crate::node::{Dag, NodeDef, Topology};
use crate::snapshot::{NodeError, Selected};

/// Everything a dispatched node needs that doesn't fit in its own stack
/// frame: the shape of the graph, the definitions that carry the actual
/// actions, and the shared run-wide plumbing. One instance per run,
/// `Arc`-shared across every spawned node task.
pub(crate) struct RunState {
    pub dag: Dag,
    pub topology: Topology,
    pub snapshot: SharedSnapshot,
    pub signal: Signal,
    pub initial_data: Option<Value>,
    pub context: Option<Value>,
    pub events: Arc<EventBus>,
}

fn direct_dependents(dag: &Dag, name: &NodeName) -> Vec<NodeName> {
    dag.iter()
        .filter(|(_, node)| node.deps.contains(name))
        .map(|(dependent, _)| dependent.clone())
        .collect()
}

fn state_updater(state: &Arc<RunState>, name: NodeName) -> StateUpdater {
    let snapshot = state.snapshot.clone();
    let events = state.events.clone();
    StateUpdater::new(move |value: Value| {
        {
            let mut snap = snapshot.lock().unwrap();
            if let Some(nd) = snap.data.get_mut(&name) {
                nd.state = Some(value);
            }
        }
        events.emit_data(&snapshot);
    })
}

/// Transition every node in `ready` to `running` in one locked pass,
/// materializing each one's input if this is its first dispatch
/// (computed lazily, once, and cached). Doing the whole
/// batch under a single lock is what keeps two scheduler-loop iterations
/// from racing to dispatch the same node: by the time the lock is
/// released every returned node is already `running`, so the next
/// readiness check can't see it as pending.
pub(crate) fn begin_many(
    state: &Arc<RunState>,
    ready: Vec<NodeName>,
) -> Vec<(NodeName, Vec<Value>, Option<Value>)> {
    if ready.is_empty() {
        return Vec::new();
    }
    let mut dispatched = Vec::with_capacity(ready.len());
    {
        let mut snap = state.snapshot.lock().unwrap();
        for name in ready {
            let input = match snap.data.get(&name).and_then(|nd| nd.input.clone()) {
                Some(cached) => cached,
                None => materialize_input(&state.dag, &snap.data, &name, state.initial_data.as_ref()),
            };
            let mut carried_state = None;
            if let Some(nd) = snap.data.get_mut(&name) {
                carried_state = nd.state.clone();
                nd.status = NodeStatus::Running;
                nd.started = Some(Utc::now());
                nd.input = Some(input.clone());
            }
            dispatched.push((name, input, carried_state));
        }
    }
    state.events.emit_data(&state.snapshot);
    dispatched
}

fn finish_ok(state: &Arc<RunState>, name: &NodeName, output: Option<Value>) {
    {
        let mut snap = state.snapshot.lock().unwrap();
        if let Some(nd) = snap.data.get_mut(name) {
            nd.status = NodeStatus::Completed;
            nd.output = output;
            nd.finished = Some(Utc::now());
        }
    }
    state.events.emit_data(&state.snapshot);
}

fn finish_err(state: &Arc<RunState>, name: &NodeName, error: NodeError) {
    tracing::warn!(node = %name, message = %error.message, "node errored");
    {
        let mut snap = state.snapshot.lock().unwrap();
        if let Some(nd) = snap.data.get_mut(name) {
            nd.status = NodeStatus::Errored;
            nd.error = Some(error);
            nd.finished = Some(Utc::now());
        }
    }
    state.events.emit_data(&state.snapshot);
}

async fn run_work(
    state: &Arc<RunState>,
    name: &NodeName,
    input: Vec<Value>,
    carried_state: Option<Value>,
) {
    let Some(NodeDef::Work { action, .. }) = state.topology.get(name) else {
        return;
    };
    let ctx = ActionContext::new(
        name.clone(),
        input,
        carried_state,
        state.context.clone(),
        state.signal.clone(),
        state_updater(state, name.clone()),
    );
    match action.run(ctx).await {
        Ok(output) => finish_ok(state, name, Some(output)),
        Err(err) => finish_err(state, name, NodeError::from_anyhow(&err)),
    }
}

/// Mark every direct dependent still `pending` as `skipped`, in one locked
/// pass so the set of skipped nodes is consistent with the branching node's
/// own terminal status.
fn skip_dependents_except(state: &Arc<RunState>, name: &NodeName, keep: Option<&NodeName>) {
    let dependents = direct_dependents(&state.dag, name);
    let mut snap = state.snapshot.lock().unwrap();
    for dependent in &dependents {
        if Some(dependent) == keep {
            continue;
        }
        if let Some(dd) = snap.data.get_mut(dependent) {
            if dd.status == NodeStatus::Pending {
                dd.status = NodeStatus::Skipped;
            }
        }
    }
}

async fn run_branching(state: &Arc<RunState>, name: &NodeName, input: Vec<Value>) {
    let Some(NodeDef::Branching { select, .. }) = state.topology.get(name) else {
        return;
    };
    let ctx = ActionContext::new(
        name.clone(),
        input,
        None,
        state.context.clone(),
        state.signal.clone(),
        state_updater(state, name.clone()),
    );
    let outcome = select.select(&ctx);

    match outcome {
        topology_action::BranchOutcome::None { reason } => {
            {
                let mut snap = state.snapshot.lock().unwrap();
                if let Some(nd) = snap.data.get_mut(name) {
                    nd.status = NodeStatus::Completed;
                    nd.selected = Some(Selected::None);
                    nd.reason = reason;
                    nd.finished = Some(Utc::now());
                }
            }
            skip_dependents_except(state, name, None);
            state.events.emit_data(&state.snapshot);
        }
        topology_action::BranchOutcome::Branch { target, reason } => {
            let dependents = direct_dependents(&state.dag, name);
            if !dependents.contains(&target) {
                let err = Error::BranchNotFound {
                    node: name.clone(),
                    target: target.clone(),
                };
                finish_err(
                    state,
                    name,
                    NodeError {
                        message: err.to_string(),
                        stack: err.to_string(),
                        extra: Default::default(),
                    },
                );
                return;
            }
            {
                let mut snap = state.snapshot.lock().unwrap();
                if let Some(nd) = snap.data.get_mut(name) {
                    nd.status = NodeStatus::Completed;
                    nd.selected = Some(Selected::Node(target.clone()));
                    nd.reason = reason;
                    nd.finished = Some(Utc::now());
                }
            }
            skip_dependents_except(state, name, Some(&target));
            state.events.emit_data(&state.snapshot);
        }
    }
}

/// Suspend every direct dependent still `pending`, stamping a `finished`
/// time even though the dependent never ran.
fn suspend_dependents(state: &Arc<RunState>, name: &NodeName) {
    let dependents = direct_dependents(&state.dag, name);
    let mut snap = state.snapshot.lock().unwrap();
    for dependent in &dependents {
        if let Some(dd) = snap.data.get_mut(dependent) {
            if dd.status == NodeStatus::Pending {
                dd.status = NodeStatus::Suspended;
                dd.finished = Some(Utc::now());
            }
        }
    }
}

async fn run_suspension(
    state: &Arc<RunState>,
    name: &NodeName,
    input: Vec<Value>,
    carried_state: Option<Value>,
) {
    let Some(NodeDef::Suspension { action, .. }) = state.topology.get(name) else {
        return;
    };

    let result = match action {
        Some(action) => {
            let ctx = ActionContext::new(
                name.clone(),
                input,
                carried_state,
                state.context.clone(),
                state.signal.clone(),
                state_updater(state, name.clone()),
            );
            action.run(ctx).await
        }
        None => Ok(()),
    };

    match result {
        Ok(()) => {
            finish_ok(state, name, None);
            suspend_dependents(state, name);
            state.events.emit_data(&state.snapshot);
        }
        Err(err) => finish_err(state, name, NodeError::from_anyhow(&err)),
    }
}

/// Run one already-`running` node to a terminal status: dispatches on
/// node kind, runs the user action (if any), and propagates branching or
/// suspension effects onto dependents. Spawned by the scheduler and
/// tracked in a `JoinSet`; panics from user actions are caught by Tokio at
/// the `JoinHandle` and surfaced to the scheduler as a join error, not by
/// this function. Expects [`begin_many`] to have already flipped `name` to
/// `running` and recorded its input.
pub(crate) async fn run_dispatched(
    state: Arc<RunState>,
    name: NodeName,
    input: Vec<Value>,
    carried_state: Option<Value>,
) {
    let kind = state.dag.get(&name).map(|n| n.kind);
    match kind {
        Some(NodeKind::Work) => run_work(&state, &name, input, carried_state).await,
        Some(NodeKind::Branching) => run_branching(&state, &name, input).await,
        Some(NodeKind::Suspension) => run_suspension(&state, &name, input, carried_state).await,
        None => {}
    }
}
