//! Await-reply bookkeeping for the synchronous call helper (spec.md
//! §4.4.4, §4.5): a map of in-flight `request_id`s, each woken by a
//! `parking_lot::Condvar` once its response arrives.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use shv_chainpack::RpcValue;
use shv_proto::{RpcError, RpcMessage};

use crate::pipeline::{Context, HandlerStage, Outcome};

type CallResult = Result<RpcValue, RpcError>;

struct Pending {
    result: Option<CallResult>,
}

pub struct ResponsesStage {
    pending: Mutex<HashMap<u64, Pending>>,
    arrived: Condvar,
}

impl ResponsesStage {
    pub fn new() -> Self {
        ResponsesStage {
            pending: Mutex::new(HashMap::new()),
            arrived: Condvar::new(),
        }
    }

    /// Register interest in a response before the request is sent, so no
    /// reply can race ahead of the waiter.
    pub fn register(&self, request_id: u64) {
        self.pending.lock().insert(request_id, Pending { result: None });
    }

    pub fn cancel(&self, request_id: u64) {
        self.pending.lock().remove(&request_id);
    }

    /// Block until the response for `request_id` arrives or `timeout`
    /// elapses (spec.md §7: a caller-side timeout yields
    /// `RpcError::MethodCallTimeout`).
    pub fn wait(&self, request_id: u64, timeout: Duration) -> CallResult {
        let mut guard = self.pending.lock();
        let deadline = Instant::now() + timeout;
        loop {
            match guard.get_mut(&request_id) {
                None => {
                    return Err(RpcError::MethodCallCancelled(
                        "response awaiter was cancelled".to_string(),
                    ))
                }
                Some(pending) => {
                    if let Some(result) = pending.result.take() {
                        guard.remove(&request_id);
                        return result;
                    }
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                guard.remove(&request_id);
                return Err(RpcError::MethodCallTimeout(format!(
                    "no response for request {request_id}"
                )));
            }
            self.arrived.wait_for(&mut guard, remaining);
        }
    }
}

impl Default for ResponsesStage {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerStage for ResponsesStage {
    fn name(&self) -> &str {
        "responses"
    }

    fn msg(&self, _ctx: &Context, msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        let RpcMessage::Response { request_id, result, .. } = msg else {
            return Outcome::Skip;
        };
        let mut guard = self.pending.lock();
        match guard.get_mut(request_id) {
            Some(pending) => {
                pending.result = Some(result.clone());
                self.arrived.notify_all();
                Outcome::Handled(None)
            }
            None => Outcome::Skip,
        }
    }

    fn reset(&self, _ctx: &Context) {
        let mut guard = self.pending.lock();
        for pending in guard.values_mut() {
            pending.result = Some(Err(RpcError::MethodCallCancelled("connection reset".to_string())));
        }
        self.arrived.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Context;
    use shv_chainpack::Value;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_unblocks_on_matching_response() {
        let stage = Arc::new(ResponsesStage::new());
        stage.register(5);
        let stage2 = stage.clone();
        let handle = thread::spawn(move || stage2.wait(5, Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        let ctx = Context {
            peer_name: "t".to_string(),
        };
        let resp = RpcMessage::Response {
            request_id: 5,
            caller_ids: vec![],
            result: Ok(RpcValue::new(Value::Int(7))),
        };
        stage.msg(&ctx, &resp);
        let result = handle.join().unwrap();
        assert_eq!(result.unwrap().value, Value::Int(7));
    }

    #[test]
    fn wait_times_out_with_no_response() {
        let stage = ResponsesStage::new();
        stage.register(9);
        let result = stage.wait(9, Duration::from_millis(10));
        assert!(matches!(result, Err(RpcError::MethodCallTimeout(_))));
    }
}
