//! Subscribe/unsubscribe bookkeeping for signal delivery (spec.md §4.4.4),
//! grounded on `original_source/include/shv/rpchandler_signals.h`'s
//! `subscribe`/`unsubscribe`/`status`/`wait` API shape — `wait` there lets
//! a caller block until the subscription list changes, reproduced here
//! with a `parking_lot::Condvar`.

use parking_lot::{Condvar, Mutex};
use shv_chainpack::{RpcValue, Value};
use shv_proto::{ResourceId, RpcMessage};
use std::time::Duration;

use crate::pipeline::{Context, HandlerStage, Outcome};

struct State {
    subscriptions: Vec<ResourceId>,
    generation: u64,
}

pub struct SignalsStage {
    state: Mutex<State>,
    changed: Condvar,
}

impl SignalsStage {
    pub fn new() -> Self {
        SignalsStage {
            state: Mutex::new(State {
                subscriptions: Vec::new(),
                generation: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn subscribe(&self, ri: ResourceId) {
        let mut state = self.state.lock();
        if !state.subscriptions.contains(&ri) {
            state.subscriptions.push(ri);
            state.generation += 1;
            self.changed.notify_all();
        }
    }

    pub fn unsubscribe(&self, ri: &ResourceId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s != ri);
        let removed = state.subscriptions.len() != before;
        if removed {
            state.generation += 1;
            self.changed.notify_all();
        }
        removed
    }

    pub fn subscriptions(&self) -> Vec<ResourceId> {
        self.state.lock().subscriptions.clone()
    }

    pub fn should_deliver(&self, path: &str, signal: &str) -> bool {
        self.state
            .lock()
            .subscriptions
            .iter()
            .any(|ri| ri.matches(path, "*", Some(signal)) || ri.matches(path, "chng", Some(signal)))
    }

    /// Block until the subscription list changes or `timeout` elapses;
    /// returns the new generation counter.
    pub fn wait_for_change(&self, since_generation: u64, timeout: Duration) -> u64 {
        let mut state = self.state.lock();
        if state.generation != since_generation {
            return state.generation;
        }
        let _ = self.changed.wait_for(&mut state, timeout);
        state.generation
    }
}

impl Default for SignalsStage {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerStage for SignalsStage {
    fn name(&self) -> &str {
        "signals"
    }

    fn msg(&self, _ctx: &Context, msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        let RpcMessage::Request {
            request_id,
            shv_path,
            method,
            params,
            ..
        } = msg
        else {
            return Outcome::Skip;
        };
        if shv_path != ".broker/currentClient" {
            return Outcome::Skip;
        }
        let ri_text = params.as_str().unwrap_or_default();
        match method.as_str() {
            "subscribe" => {
                let Ok(ri) = ResourceId::parse(ri_text) else {
                    return Outcome::Handled(Some(invalid_ri(*request_id, ri_text)));
                };
                self.subscribe(ri);
                Outcome::Handled(Some(ok(*request_id, Value::Bool(true))))
            }
            "unsubscribe" => {
                let Ok(ri) = ResourceId::parse(ri_text) else {
                    return Outcome::Handled(Some(invalid_ri(*request_id, ri_text)));
                };
                let removed = self.unsubscribe(&ri);
                Outcome::Handled(Some(ok(*request_id, Value::Bool(removed))))
            }
            _ => Outcome::Skip,
        }
    }
}

fn ok(request_id: u64, value: Value) -> RpcMessage {
    RpcMessage::Response {
        request_id,
        caller_ids: vec![],
        result: Ok(RpcValue::new(value)),
    }
}

fn invalid_ri(request_id: u64, text: &str) -> RpcMessage {
    RpcMessage::Response {
        request_id,
        caller_ids: vec![],
        result: Err(shv_proto::RpcError::InvalidParam(format!(
            "malformed resource identifier: {text}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_unsubscribe() {
        let stage = SignalsStage::new();
        let ri = ResourceId::parse("test/**:*:chng").unwrap();
        stage.subscribe(ri.clone());
        assert_eq!(stage.subscriptions().len(), 1);
        assert!(stage.should_deliver("test/device", "chng"));
        assert!(stage.unsubscribe(&ri));
        assert_eq!(stage.subscriptions().len(), 0);
    }
}
