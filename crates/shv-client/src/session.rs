//! `Session`: a dialed, logged-in connection plus the background thread
//! that keeps reading from it (spec.md §4.3's connect → hello → login →
//! steady state with idle pings → reset lifecycle), so a caller just
//! gets `call`/`subscribe` without hand-wiring the pipeline itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use shv_chainpack::chainpack::{pack_to_vec, unpack_from_slice};
use shv_chainpack::{RpcValue, Value};
use shv_handler::{
    call_with_retries, CallError, Context, HandlerStage, LoginType, Outcome, Pipeline,
    RequestIdAllocator, ResponsesStage, DEFAULT_CALL_ATTEMPTS, DEFAULT_CALL_TIMEOUT,
};
use shv_proto::RpcMessage;
use shv_transport::Client;

use crate::connect::{dial, ClientError, DEFAULT_POLL_INTERVAL};
use crate::url::ConnectUrl;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("login rejected: {0}")]
    LoginRejected(String),
    #[error("malformed response from peer: {0}")]
    Malformed(String),
}

/// What to log in as, and what device identity (if any) to announce.
#[derive(Clone, Debug, Default)]
pub struct LoginOptions {
    pub username: String,
    pub password: String,
    pub login_type: Option<LoginType>,
    pub device_id: Option<String>,
    pub device_mount_point: Option<String>,
    pub call_timeout: Duration,
    pub call_attempts: u32,
}

impl LoginOptions {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        LoginOptions {
            username: username.into(),
            password: password.into(),
            login_type: None,
            device_id: None,
            device_mount_point: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            call_attempts: DEFAULT_CALL_ATTEMPTS,
        }
    }
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Forwards inbound signals to a user callback; every other message
/// type is left for other stages (here, just [`ResponsesStage`]).
struct SignalSink {
    callback: Box<dyn Fn(&RpcMessage) + Send + Sync>,
}

impl HandlerStage for SignalSink {
    fn name(&self) -> &str {
        "signal-sink"
    }

    fn msg(&self, _ctx: &Context, msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        if let RpcMessage::Signal { .. } = msg {
            (self.callback)(msg);
            Outcome::Handled(None)
        } else {
            Outcome::Skip
        }
    }
}

pub struct Session {
    client: Arc<Mutex<Client>>,
    responses: Arc<ResponsesStage>,
    ids: Arc<RequestIdAllocator>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    call_timeout: Duration,
    call_attempts: u32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Dials `url`, performs the hello/login handshake with `login`, and
    /// starts the background receive loop. `on_signal`, if given, is
    /// invoked (from the receive thread) for every inbound signal.
    pub fn connect(
        url: &str,
        login: LoginOptions,
        on_signal: Option<Box<dyn Fn(&RpcMessage) + Send + Sync>>,
    ) -> Result<Self, SessionError> {
        let parsed = ConnectUrl::parse(url).map_err(ClientError::from)?;
        let mut client = dial(&parsed)?;
        client.set_read_timeout(Some(DEFAULT_POLL_INTERVAL)).ok();
        Self::from_client(client, &parsed, login, on_signal)
    }

    /// Like [`Session::connect`], but takes an already-built `Client`
    /// instead of dialing one — used by `shv-testkit`'s in-process mock
    /// broker, which hands over a `MemTransport`-backed `Client` that was
    /// never reached through a URL.
    pub fn from_client(
        client: Client,
        url_for_login: &ConnectUrl,
        login: LoginOptions,
        on_signal: Option<Box<dyn Fn(&RpcMessage) + Send + Sync>>,
    ) -> Result<Self, SessionError> {
        let parsed = url_for_login;
        let peer_name = client.peer_name();
        let client = Arc::new(Mutex::new(client));

        let responses = Arc::new(ResponsesStage::new());
        let mut pipeline = Pipeline::new();
        pipeline.push(responses.clone());
        if let Some(callback) = on_signal {
            pipeline.push(Arc::new(SignalSink { callback }));
        }
        let pipeline = Arc::new(pipeline);
        let ids = Arc::new(RequestIdAllocator::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let reader = {
            let client = client.clone();
            let pipeline = pipeline.clone();
            let shutdown = shutdown.clone();
            let ctx = Context { peer_name: peer_name.clone() };
            std::thread::spawn(move || receive_loop(client, pipeline, shutdown, ctx))
        };

        let mut session = Session {
            client,
            responses,
            ids,
            shutdown,
            reader: Some(reader),
            call_timeout: login.call_timeout,
            call_attempts: login.call_attempts,
        };

        session.login(parsed, &login)?;
        Ok(session)
    }

    fn login(&mut self, url: &ConnectUrl, login: &LoginOptions) -> Result<(), SessionError> {
        let hello = self.call_raw("", "hello", RpcValue::null())?;
        let nonce = hello
            .map_get("nonce")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Malformed("hello response missing 'nonce'".to_string()))?
            .to_string();

        let login_type = login.login_type.clone().unwrap_or(LoginType::Sha1);
        let password_field = match login_type {
            LoginType::Plain => login.password.clone(),
            LoginType::Sha1 => sha1_hex(format!("{}{}", nonce, sha1_hex(login.password.as_bytes())).as_bytes()),
        };
        let type_str = match login_type {
            LoginType::Plain => "PLAIN",
            LoginType::Sha1 => "SHA1",
        };

        let mut login_map = vec![
            ("user".to_string(), RpcValue::new(Value::String(login.username.clone()))),
            ("password".to_string(), RpcValue::new(Value::String(password_field))),
            ("type".to_string(), RpcValue::new(Value::String(type_str.to_string()))),
        ];
        let _ = url; // reserved for future option-driven login fields (e.g. per-url overrides)
        login_map.sort_by(|a, b| a.0.cmp(&b.0));

        let mut options = vec![];
        if login.device_id.is_some() || login.device_mount_point.is_some() {
            let mut device = vec![];
            if let Some(id) = &login.device_id {
                device.push(("id".to_string(), RpcValue::new(Value::String(id.clone()))));
            }
            if let Some(mp) = &login.device_mount_point {
                device.push(("mountPoint".to_string(), RpcValue::new(Value::String(mp.clone()))));
            }
            options.push(("device".to_string(), RpcValue::new(Value::Map(device))));
        }

        let mut params = vec![("login".to_string(), RpcValue::new(Value::Map(login_map)))];
        if !options.is_empty() {
            params.push(("options".to_string(), RpcValue::new(Value::Map(options))));
        }

        let result = self.call_raw("", "login", RpcValue::new(Value::Map(params)));
        match result {
            Ok(_) => {
                tracing::info!(user = %login.username, "session logged in");
                Ok(())
            }
            Err(SessionError::Call(CallError::Rpc(err))) => Err(SessionError::LoginRejected(err.to_string())),
            Err(other) => Err(other),
        }
    }

    fn call_raw(
        &self,
        shv_path: impl Into<String>,
        method: impl Into<String>,
        params: RpcValue,
    ) -> Result<RpcValue, SessionError> {
        Ok(call_with_retries(
            &self.client,
            &self.responses,
            &self.ids,
            shv_path,
            method,
            params,
            None,
            self.call_timeout,
            self.call_attempts,
        )?)
    }

    /// Calls a method at `shv_path` and blocks for the result.
    pub fn call(
        &self,
        shv_path: impl Into<String>,
        method: impl Into<String>,
        params: RpcValue,
    ) -> Result<RpcValue, SessionError> {
        self.call_raw(shv_path, method, params)
    }

    /// Subscribes to a resource identifier on `.broker/currentClient`.
    pub fn subscribe(&self, ri: &str) -> Result<(), SessionError> {
        self.call_raw(
            ".broker/currentClient",
            "subscribe",
            RpcValue::new(Value::String(ri.to_string())),
        )
        .map(|_| ())
    }

    pub fn unsubscribe(&self, ri: &str) -> Result<bool, SessionError> {
        let result = self.call_raw(
            ".broker/currentClient",
            "unsubscribe",
            RpcValue::new(Value::String(ri.to_string())),
        )?;
        Ok(matches!(result.value, Value::Bool(true)))
    }

    pub fn peer_name(&self) -> String {
        self.client.lock().peer_name()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.client.lock().reset().ok();
        if let Some(handle) = self.reader.take() {
            handle.join().ok();
        }
    }
}

fn receive_loop(client: Arc<Mutex<Client>>, pipeline: Arc<Pipeline>, shutdown: Arc<AtomicBool>, ctx: Context) {
    while !shutdown.load(Ordering::Relaxed) {
        let received = client.lock().try_recv_message();
        match received {
            Ok(Some(bytes)) => match unpack_from_slice(&bytes) {
                Ok(rv) => match RpcMessage::from_rpcvalue(&rv) {
                    Ok(msg) => {
                        if let Some(Some(reply)) = pipeline.dispatch_msg(&ctx, &msg) {
                            if let Ok(bytes) = pack_to_vec(&reply.to_rpcvalue()) {
                                client.lock().send_message(&bytes).ok();
                            }
                        }
                    }
                    Err(err) => tracing::warn!(peer = %ctx.peer_name, error = %err, "dropping unparseable message"),
                },
                Err(err) => tracing::warn!(peer = %ctx.peer_name, error = %err, "dropping malformed frame"),
            },
            Ok(None) => pipeline.run_idle(&ctx),
            Err(err) => {
                tracing::info!(peer = %ctx.peer_name, error = %err, "connection closed, stopping receive loop");
                shutdown.store(true, Ordering::Relaxed);
                pipeline.run_reset(&ctx);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 scenario 1: nonce "abcd", password "p", SHA1 login.
    #[test]
    fn sha1_login_password_matches_nonce_then_hash_order() {
        let password_hash = sha1_hex(b"p");
        assert_eq!(password_hash, "516b9783fca517eecbd1d064da2d165310b19759");
        let transmitted = sha1_hex(format!("abcd{password_hash}").as_bytes());
        assert_eq!(transmitted, "db8a83ea561bd006f9a7278a99038008d9e91df7");
    }
}
