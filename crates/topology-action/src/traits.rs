//! The action contract. The engine only ever calls through these traits.
//! It has no idea what a concrete work/branching/suspension action does.
//! User-supplied callbacks are a collaborator; the engine only defines
//! their shape and never implements one itself.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::context::{ActionContext, ActionFuture};
use topology_types::NodeName;

/// A work node's action. Returns the value that becomes the node's
/// `output`.
#[async_trait]
pub trait NodeAction: Send + Sync {
    async fn run(&self, ctx: ActionContext) -> Result<Value>;
}

/// A suspension node's optional action. Side-effect only; has no output.
#[async_trait]
pub trait SuspendAction: Send + Sync {
    async fn run(&self, ctx: ActionContext) -> Result<()>;
}

/// What a branching node's synchronous selector decided.
#[derive(Debug, Clone)]
pub enum BranchOutcome {
    /// Activate the dependent subgraph rooted at `target`.
    Branch {
        target: NodeName,
        reason: Option<String>,
    },
    /// Activate nothing; every direct dependent is skipped.
    None { reason: Option<String> },
}

impl BranchOutcome {
    pub fn branch(target: impl Into<NodeName>, reason: Option<impl Into<String>>) -> Self {
        Self::Branch {
            target: target.into(),
            reason: reason.map(Into::into),
        }
    }

    pub fn none(reason: Option<impl Into<String>>) -> Self {
        Self::None {
            reason: reason.map(Into::into),
        }
    }
}

/// A branching node's selector. Synchronous by design: a branch decision
/// is a pure function of its input, not an I/O-bound step.
pub trait BranchAction: Send + Sync {
    fn select(&self, ctx: &ActionContext) -> BranchOutcome;
}

/// Adapts a boxed async closure into a [`NodeAction`], for tests and small
/// demo topologies that don't want to name a type per node.
pub struct FnNodeAction<F>(F)
where
    F: Fn(ActionContext) -> ActionFuture<Result<Value>> + Send + Sync;

impl<F> FnNodeAction<F>
where
    F: Fn(ActionContext) -> ActionFuture<Result<Value>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> NodeAction for FnNodeAction<F>
where
    F: Fn(ActionContext) -> ActionFuture<Result<Value>> + Send + Sync,
{
    async fn run(&self, ctx: ActionContext) -> Result<Value> {
        (self.0)(ctx).await
    }
}

/// Adapts a plain closure into a [`BranchAction`].
pub struct FnBranchAction<F>(F)
where
    F: Fn(&ActionContext) -> BranchOutcome + Send + Sync;

impl<F> FnBranchAction<F>
where
    F: Fn(&ActionContext) -> BranchOutcome + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> BranchAction for FnBranchAction<F>
where
    F: Fn(&ActionContext) -> BranchOutcome + Send + Sync,
{
    fn select(&self, ctx: &ActionContext) -> BranchOutcome {
        (self.0)(ctx)
    }
}

/// Adapts a boxed async closure into a [`SuspendAction`].
pub struct FnSuspendAction<F>(F)
where
    F: Fn(ActionContext) -> ActionFuture<Result<()>> + Send + Sync;

impl<F> FnSuspendAction<F>
where
    F: Fn(ActionContext) -> ActionFuture<Result<()>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> SuspendAction for FnSuspendAction<F>
where
    F: Fn(ActionContext) -> ActionFuture<Result<()>> + Send + Sync,
{
    async fn run(&self, ctx: ActionContext) -> Result<()> {
        (self.0)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Signal, StateUpdater};
    use serde_json::json;

    fn ctx(data: Vec<Value>) -> ActionContext {
        ActionContext::new(
            topology_types::NodeName::from("n"),
            data,
            None,
            None,
            Signal::new(),
            StateUpdater::new(|_| {}),
        )
    }

    #[tokio::test]
    async fn fn_node_action_runs_the_closure() {
        let action = FnNodeAction::new(|ctx: ActionContext| {
            Box::pin(async move { Ok(ctx.data.first().cloned().unwrap_or(Value::Null)) })
        });
        let out = action.run(ctx(vec![json!(42)])).await.unwrap();
        assert_eq!(out, json!(42));
    }

    #[tokio::test]
    async fn fn_suspend_action_runs_to_completion() {
        let action = FnSuspendAction::new(|_ctx: ActionContext| Box::pin(async move { Ok(()) }));
        action.run(ctx(vec![])).await.unwrap();
    }

    #[test]
    fn fn_branch_action_returns_the_closures_outcome() {
        let action = FnBranchAction::new(|_ctx: &ActionContext| {
            BranchOutcome::branch("next", Some("because"))
        });
        match action.select(&ctx(vec![])) {
            BranchOutcome::Branch { target, reason } => {
                assert_eq!(target, topology_types::NodeName::from("next"));
                assert_eq!(reason.as_deref(), Some("because"));
            }
            BranchOutcome::None { .. } => panic!("expected branch outcome"),
        }
    }
}
