//! The scheduler loop and its public handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinSet;

use topology_types::{NodeName, NodeStatus, RunStatus};

use crate::builder::{extract_dag, filter, reject_cycles, validate_spec_coverage, FilterOptions};
use crate::error::Error;
use crate::events::{Event, EventBus, SharedSnapshot};
use crate::node::Topology;
use crate::readiness::ready_to_run;
use crate::runner::{self, RunState};
use crate::snapshot::{NodeData, Snapshot};

/// Per-run input beyond the topology itself.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub data: Option<Value>,
    pub context: Option<Value>,
    pub filter: FilterOptions,
}

fn terminal_status(data: &BTreeMap<NodeName, NodeData>) -> RunStatus {
    let any_errored = data.values().any(|d| d.status == NodeStatus::Errored);
    let any_suspended = data.values().any(|d| d.status == NodeStatus::Suspended);
    if any_errored {
        RunStatus::Errored
    } else if any_suspended {
        RunStatus::Suspended
    } else {
        RunStatus::Completed
    }
}

/// Sweep every node still `pending` once the run has settled on a terminal
/// status. A `suspended` run carries them forward as `suspended`. A
/// `completed` run marks them `skipped` (never reached: a branch never
/// selected them, or they sat downstream of one that wasn't). An `errored`
/// run leaves them exactly as `pending`, to record that they never ran.
fn finalize_pending(data: &mut BTreeMap<NodeName, NodeData>, terminal: RunStatus) {
    for nd in data.values_mut() {
        if nd.status != NodeStatus::Pending {
            continue;
        }
        match terminal {
            RunStatus::Suspended => {
                nd.status = NodeStatus::Suspended;
                nd.finished = Some(Utc::now());
            }
            RunStatus::Completed => {
                nd.status = NodeStatus::Skipped;
            }
            RunStatus::Errored | RunStatus::Running => {}
        }
    }
}

/// Where a completed run's `wait()` result lands. `RunHandle` hands this
/// out to any number of callers without consuming itself; `get_snapshot`
/// and `events` stay usable on the same handle after `wait` returns, and
/// remain valid before, during, and after termination.
struct Outcome {
    result: Mutex<Option<Result<(), Error>>>,
    notify: tokio::sync::Notify,
}

impl Outcome {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            notify: tokio::sync::Notify::new(),
        }
    }

    fn settle(&self, result: Result<(), Error>) {
        *self.result.lock().unwrap() = Some(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> Result<(), Error> {
        loop {
            if let Some(result) = self.result.lock().unwrap().clone() {
                return result;
            }
            let notified = self.notify.notified();
            if self.result.lock().unwrap().is_some() {
                continue;
            }
            notified.await;
        }
    }
}

async fn run_loop(state: Arc<RunState>, outcome: Arc<Outcome>) {
    outcome.settle(run_loop_inner(state).await);
}

async fn run_loop_inner(state: Arc<RunState>) -> Result<(), Error> {
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        let ready = {
            let snap = state.snapshot.lock().unwrap();
            if state.signal.is_cancelled() {
                Vec::new()
            } else {
                ready_to_run(&state.dag, &snap.data)
            }
        };

        if !ready.is_empty() {
            tracing::debug!(nodes = ?ready, "dispatching ready nodes");
        }

        for (name, input, carried_state) in runner::begin_many(&state, ready) {
            let st = state.clone();
            in_flight.spawn(runner::run_dispatched(st, name, input, carried_state));
        }

        if in_flight.is_empty() {
            break;
        }
        in_flight.join_next().await;
    }

    let final_status = {
        let mut snap = state.snapshot.lock().unwrap();
        let status = terminal_status(&snap.data);
        finalize_pending(&mut snap.data, status);
        snap.status = status;
        snap.finished = Some(Utc::now());
        status
    };

    tracing::info!(status = ?final_status, "run reached terminal status");

    if final_status == RunStatus::Errored {
        state.events.emit_error(&state.snapshot);
    } else {
        state.events.emit_done(&state.snapshot);
    }

    if final_status == RunStatus::Errored {
        let errored: Vec<NodeName> = state
            .snapshot
            .lock()
            .unwrap()
            .data
            .iter()
            .filter(|(_, d)| d.status == NodeStatus::Errored)
            .map(|(name, _)| name.clone())
            .collect();
        return Err(Error::ErroredNodes(errored));
    }
    Ok(())
}

fn initial_data(dag: &crate::node::Dag) -> BTreeMap<NodeName, NodeData> {
    dag.iter()
        .map(|(name, node)| (name.clone(), NodeData::pending(node.deps.clone(), node.kind)))
        .collect()
}

/// A running (or finished) topology execution. Construct with
/// [`RunHandle::start`] or [`crate::resume::resume_topology`].
pub struct RunHandle {
    snapshot: SharedSnapshot,
    events: Arc<EventBus>,
    signal: topology_action::Signal,
    outcome: Arc<Outcome>,
}

impl RunHandle {
    /// Validate, derive the (possibly filtered) DAG, build a fresh
    /// snapshot, and spawn the scheduler loop.
    pub fn start(topology: Topology, options: StartOptions) -> Result<Self, Error> {
        let dag = extract_dag(&topology);
        let dag = if options.filter.is_noop() {
            dag
        } else {
            filter(&dag, &options.filter)
        };
        validate_spec_coverage(&topology, &dag)?;
        reject_cycles(&dag)?;

        let data = initial_data(&dag);
        let snapshot = Snapshot::new(data);
        Ok(Self::spawn(topology, dag, snapshot, options.data, options.context))
    }

    /// Resume entry point (`crate::resume::resume_topology`). The DAG shape
    /// comes from the already-persisted snapshot, not from re-deriving it
    /// off `topology`, so a resumed run stays faithful to whatever filter
    /// produced the original snapshot.
    pub(crate) fn spawn(
        topology: Topology,
        dag: crate::node::Dag,
        snapshot: Snapshot,
        initial_data: Option<Value>,
        context: Option<Value>,
    ) -> Self {
        let snapshot: SharedSnapshot = Arc::new(Mutex::new(snapshot));
        let events = Arc::new(EventBus::new());
        let signal = topology_action::Signal::new();
        let outcome = Arc::new(Outcome::new());

        let state = Arc::new(RunState {
            dag,
            topology,
            snapshot: snapshot.clone(),
            signal: signal.clone(),
            initial_data,
            context,
            events: events.clone(),
        });

        tokio::spawn(run_loop(state, outcome.clone()));

        Self {
            snapshot,
            events,
            signal,
            outcome,
        }
    }

    /// A handle over an already-`completed` snapshot, for
    /// [`crate::resume::resume_topology`]'s idempotent case: nothing is
    /// mutated, no event fires, and `wait()` resolves immediately.
    pub(crate) fn already_done(snapshot: Snapshot) -> Self {
        let snapshot: SharedSnapshot = Arc::new(Mutex::new(snapshot));
        let events = Arc::new(EventBus::new());
        let signal = topology_action::Signal::new();
        let outcome = Arc::new(Outcome::new());
        outcome.settle(Ok(()));

        Self {
            snapshot,
            events,
            signal,
            outcome,
        }
    }

    /// A deep copy of the current state. Cheap enough to poll; the live
    /// reference itself only ever leaves this crate through `events`.
    pub fn get_snapshot(&self) -> Snapshot {
        self.snapshot.lock().unwrap().clone()
    }

    /// Subscribe to `data`/`error`/`done`. Each call gets an independent
    /// receiver; events emitted before subscribing are not replayed.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Request graceful cancellation: no new nodes are dispatched after this
    /// call, but nodes already running are left to finish or fail on their
    /// own.
    pub fn stop(&self) {
        self.signal.cancel();
    }

    /// Wait for the run to reach a terminal status. Resolves to
    /// `Err(Error::ErroredNodes)` if any node errored, `Ok(())` otherwise
    /// (a suspended or gracefully-stopped run is not an error). Takes `&self`
    /// so `get_snapshot`/`events` stay usable afterward, and so more than one
    /// caller can wait on the same run.
    pub async fn wait(&self) -> Result<(), Error> {
        self.outcome.wait().await
    }
}

/// Build a fresh run from a topology. A thin free function alongside
/// [`RunHandle::start`] so callers can pair it with
/// [`crate::resume::resume_topology`] at the same call site without naming
/// the type that owns the constructor.
pub fn run_topology(topology: Topology, options: StartOptions) -> Result<RunHandle, Error> {
    RunHandle::start(topology, options)
}
