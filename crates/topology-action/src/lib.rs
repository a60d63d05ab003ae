//! Action contract for the topology engine.
//!
//! This crate defines *what a node's action looks like*; it contains no
//! scheduling logic and no side-effect implementations of its own. The
//! engine (`topology-dag`) depends on this crate, not the other way
//! around, so that collaborators can implement `NodeAction` without
//! pulling in the scheduler.

mod context;
mod traits;

pub use context::{ActionContext, ActionFuture, Signal, StateUpdater};
pub use traits::{
    BranchAction, BranchOutcome, FnBranchAction, FnNodeAction, FnSuspendAction, NodeAction,
    SuspendAction,
};
