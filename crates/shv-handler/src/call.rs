//! The synchronous call helper (spec.md §4.5): allocate a request id
//! once, then loop up to `attempts` times sending a REQUEST and blocking
//! until the matching RESULT/error arrives or the per-attempt timeout
//! elapses, retrying on timeout and giving up immediately on a transport
//! error. Grounded on `rapace`'s request/response correlation in its
//! client connection type, adapted from async futures to a blocking
//! `Condvar` wait since this workspace is thread-based end to end
//! (spec.md §5).

use std::time::Duration;

use parking_lot::Mutex;
use shv_chainpack::chainpack::pack_to_vec;
use shv_chainpack::RpcValue;
use shv_proto::{AccessLevel, RpcError, RpcMessage};
use shv_transport::{Client, TransportError};

use crate::request_id::RequestIdAllocator;
use crate::stages::ResponsesStage;

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to encode request: {0}")]
    Encode(#[from] shv_chainpack::EncodeError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_ATTEMPTS: u32 = 1;

/// Sends a request to `shv_path`/`method` with `params` and blocks until
/// its response arrives, is rejected, or every attempt times out.
///
/// `responses` must be wired into the same [`crate::pipeline::Pipeline`]
/// that processes everything `client` receives, on whichever thread runs
/// that receive loop; this function only sends and waits.
pub fn call(
    client: &Mutex<Client>,
    responses: &ResponsesStage,
    ids: &RequestIdAllocator,
    shv_path: impl Into<String>,
    method: impl Into<String>,
    params: RpcValue,
    timeout: Duration,
) -> Result<RpcValue, CallError> {
    call_with_retries(
        client,
        responses,
        ids,
        shv_path,
        method,
        params,
        None,
        timeout,
        DEFAULT_CALL_ATTEMPTS,
    )
}

/// Like [`call`] but lets a broker stamp an access level on behalf of
/// the caller (used when relaying a call made by one of its own
/// connected clients).
pub fn call_as(
    client: &Mutex<Client>,
    responses: &ResponsesStage,
    ids: &RequestIdAllocator,
    shv_path: impl Into<String>,
    method: impl Into<String>,
    params: RpcValue,
    access_level: Option<AccessLevel>,
    timeout: Duration,
) -> Result<RpcValue, CallError> {
    call_with_retries(
        client,
        responses,
        ids,
        shv_path,
        method,
        params,
        access_level,
        timeout,
        DEFAULT_CALL_ATTEMPTS,
    )
}

/// The full four-phase call described in spec.md §4.5: REQUEST (send),
/// RESULT (decode), DONE (success) or TIMERR (retry up to `attempts`
/// times) / COMERR (give up immediately, transport is no longer usable).
#[allow(clippy::too_many_arguments)]
pub fn call_with_retries(
    client: &Mutex<Client>,
    responses: &ResponsesStage,
    ids: &RequestIdAllocator,
    shv_path: impl Into<String>,
    method: impl Into<String>,
    params: RpcValue,
    access_level: Option<AccessLevel>,
    timeout: Duration,
    attempts: u32,
) -> Result<RpcValue, CallError> {
    let request_id = ids.allocate();
    let shv_path = shv_path.into();
    let method = method.into();
    let request = RpcMessage::Request {
        request_id,
        shv_path,
        method,
        caller_ids: vec![],
        access_level,
        user_id: None,
        params,
    };
    let bytes = pack_to_vec(&request.to_rpcvalue())?;

    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        responses.register(request_id);
        if let Err(err) = client.lock().send_message(&bytes) {
            responses.cancel(request_id);
            return Err(err.into());
        }
        match responses.wait(request_id, timeout) {
            Ok(result) => return Ok(result),
            Err(RpcError::MethodCallTimeout(_)) if attempt < attempts => {
                tracing::debug!(request_id, attempt, "call timed out, retrying");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    unreachable!("loop always returns on its last iteration")
}
