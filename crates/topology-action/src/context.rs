//! The value a running node's action receives.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use topology_types::NodeName;

/// Cooperative cancellation token, passed to every work/suspension action
/// as `signal`. A thin re-export so collaborators don't need to depend on
/// `tokio-util` themselves to check `is_cancelled()`.
pub type Signal = tokio_util::sync::CancellationToken;

/// Handle an action uses to checkpoint progress via `updateState`
/// Cloning is cheap; every clone writes through to the same node's `state`
/// slot in the live snapshot.
#[derive(Clone)]
pub struct StateUpdater(Arc<dyn Fn(Value) + Send + Sync>);

impl StateUpdater {
    pub fn new(f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Overwrite the node's checkpoint state and emit a `data` event.
    pub fn update(&self, state: Value) {
        (self.0)(state)
    }
}

/// Everything an action needs: materialized input, last checkpoint state,
/// the caller-supplied context blob, a cancellation signal, and the hook to
/// record further checkpoints. Built fresh by the node runner for every
/// dispatch.
#[derive(Clone)]
pub struct ActionContext {
    pub node: NodeName,
    pub data: Vec<Value>,
    pub state: Option<Value>,
    pub context: Option<Value>,
    pub signal: Signal,
    update_state: StateUpdater,
}

impl ActionContext {
    pub fn new(
        node: NodeName,
        data: Vec<Value>,
        state: Option<Value>,
        context: Option<Value>,
        signal: Signal,
        update_state: StateUpdater,
    ) -> Self {
        Self {
            node,
            data,
            state,
            context,
            signal,
            update_state,
        }
    }

    pub fn update_state(&self, state: Value) {
        self.update_state.update(state);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}

/// Boxed future type used by the `fn_*` action adapters below.
pub type ActionFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
