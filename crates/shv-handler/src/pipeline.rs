//! The handler pipeline (§4.4): an ordered list of stages, each of which
//! may optionally supply `ls`/`dir`/`msg` callbacks plus `idle`/`reset`
//! hooks. Dispatch walks the stages in order; the first one to return
//! [`Outcome::Handled`] ends the walk, [`Outcome::Skip`] moves to the next
//! stage, and [`Outcome::Stop`] aborts the walk early (used for messages a
//! stage recognizes as malformed and wants no one else to touch).

use std::sync::Arc;

use shv_proto::{MethodDescription, RpcMessage};

/// The result of one stage's attempt to handle a callback.
pub enum Outcome<T> {
    Handled(T),
    Skip,
    Stop,
}

/// Shared, read-only-ish context threaded through every stage callback.
/// Stages that need mutable state own it themselves (typically behind a
/// `parking_lot::Mutex`), since the pipeline itself is invoked from
/// whichever thread owns the `Client`.
pub struct Context {
    pub peer_name: String,
}

/// One stage in the pipeline. All methods default to `Skip`/no-op so a
/// stage only needs to implement what it cares about.
pub trait HandlerStage: Send + Sync {
    fn name(&self) -> &str;

    fn ls(&self, _ctx: &Context, _path: &str) -> Outcome<Vec<String>> {
        Outcome::Skip
    }

    fn dir(&self, _ctx: &Context, _path: &str) -> Outcome<Vec<MethodDescription>> {
        Outcome::Skip
    }

    /// Handle one inbound message. Returning `Handled(Some(reply))` sends
    /// `reply` back to the peer; `Handled(None)` means the stage fully
    /// consumed the message (typical for signals) with nothing to send.
    fn msg(&self, _ctx: &Context, _msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        Outcome::Skip
    }

    /// Called periodically (driven by the caller's idle-ping loop,
    /// spec.md §5) so stages can expire pending state.
    fn idle(&self, _ctx: &Context) {}

    /// Called once the connection is torn down so stages can clear
    /// per-connection state (pending calls, subscriptions, login state).
    fn reset(&self, _ctx: &Context) {}
}

/// An ordered list of stages, walked on every inbound message and on
/// every `ls`/`dir` browse request.
pub struct Pipeline {
    stages: Vec<Arc<dyn HandlerStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { stages: Vec::new() }
    }

    pub fn push(&mut self, stage: Arc<dyn HandlerStage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Returns `None` if no stage handled the message, `Some(reply)`
    /// (possibly `Some(None)`) once one did.
    pub fn dispatch_msg(&self, ctx: &Context, msg: &RpcMessage) -> Option<Option<RpcMessage>> {
        for stage in &self.stages {
            match stage.msg(ctx, msg) {
                Outcome::Handled(reply) => {
                    tracing::debug!(stage = stage.name(), "message handled");
                    return Some(reply);
                }
                Outcome::Stop => {
                    tracing::debug!(stage = stage.name(), "message dispatch stopped");
                    return None;
                }
                Outcome::Skip => continue,
            }
        }
        None
    }

    pub fn dispatch_ls(&self, ctx: &Context, path: &str) -> Option<Vec<String>> {
        for stage in &self.stages {
            if let Outcome::Handled(names) = stage.ls(ctx, path) {
                return Some(names);
            }
        }
        None
    }

    pub fn dispatch_dir(&self, ctx: &Context, path: &str) -> Option<Vec<MethodDescription>> {
        for stage in &self.stages {
            if let Outcome::Handled(methods) = stage.dir(ctx, path) {
                return Some(methods);
            }
        }
        None
    }

    pub fn run_idle(&self, ctx: &Context) {
        for stage in &self.stages {
            stage.idle(ctx);
        }
    }

    pub fn run_reset(&self, ctx: &Context) {
        for stage in &self.stages {
            stage.reset(ctx);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
