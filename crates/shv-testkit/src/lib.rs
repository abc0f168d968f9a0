//! An in-process mock broker for exercising [`shv_client::Session`]
//! without a real socket.
//!
//! Wires `shv_transport::MemTransport::pair()` to `shv_client::server`'s
//! serve loop on one side and `Session::from_client` on the other. The
//! teacher's own `rapace-testkit` is a credit/flow-control session
//! wrapper rather than a mock-server harness, so this module doesn't
//! carry over one analogue from it; it's a composition of
//! `shv-transport`, `shv-handler` and `shv-client` pieces that are each
//! independently grounded in their own crates.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use shv_handler::{AppStage, HandlerStage, InMemoryUserDb, LoginStage, Pipeline, SignalsStage};
use shv_proto::{AccessLevel, RpcMessage};
use shv_transport::{BlockFramer, Client, MemTransport};

use shv_client::server::serve_shared;
use shv_client::session::{LoginOptions, Session, SessionError};
use shv_client::url::{ConnectUrl, Scheme};

/// The running broker half of a mock connection. Dropping it detaches the
/// broker thread; call [`MockBroker::join`] to wait for a clean shutdown
/// (e.g. after dropping the paired `Session`).
pub struct MockBroker {
    handle: Option<JoinHandle<()>>,
    client: Arc<Mutex<Client>>,
}

impl std::fmt::Debug for MockBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBroker").finish_non_exhaustive()
    }
}

impl MockBroker {
    /// Blocks until the broker's serve loop exits, which happens once the
    /// paired `Session` is dropped and its half of the `MemTransport`
    /// pair closes.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }

    /// Sends a signal to the connected client outside of any request it
    /// issued — for tests exercising `Session::connect`'s `on_signal`
    /// callback or `SignalsStage`-gated delivery.
    pub fn emit_signal(&self, shv_path: impl Into<String>, signal: impl Into<String>, params: shv_chainpack::RpcValue) {
        let msg = RpcMessage::Signal {
            shv_path: shv_path.into(),
            signal: signal.into(),
            source: Some("chng".to_string()),
            access_level: Some(AccessLevel::READ),
            params,
        };
        if let Ok(bytes) = shv_chainpack::chainpack::pack_to_vec(&msg.to_rpcvalue()) {
            self.client.lock().send_message(&bytes).ok();
        }
    }
}

/// Builds a [`MockBroker`] with a user table and, optionally, extra
/// handler stages beyond the default `.app`/login/signals set every mock
/// broker carries.
pub struct MockBrokerBuilder {
    user_db: InMemoryUserDb,
    extra_stages: Vec<Arc<dyn HandlerStage>>,
}

impl MockBrokerBuilder {
    pub fn new() -> Self {
        MockBrokerBuilder {
            user_db: InMemoryUserDb::new(),
            extra_stages: Vec::new(),
        }
    }

    pub fn add_user(mut self, username: &str, password: &str, access: AccessLevel) -> Self {
        self.user_db.add_user(username, password, access);
        self
    }

    /// Appends a stage after the built-in login/.app/signals stages, so
    /// it sees messages those didn't already claim.
    pub fn with_stage(mut self, stage: Arc<dyn HandlerStage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// Spawns the broker on one half of an in-process transport pair and
    /// returns it alongside a `Session` dialed over the other half,
    /// already logged in as `username`/`password` (which must have been
    /// registered via [`MockBrokerBuilder::add_user`] or be the implicit
    /// default — `test`/`test` at [`AccessLevel::ADMIN`] — if
    /// `add_user` was never called).
    pub fn connect(self, username: &str, password: &str) -> Result<(MockBroker, Session), SessionError> {
        self.connect_with_signals(username, password, None)
    }

    /// Like [`MockBrokerBuilder::connect`], additionally forwarding every
    /// inbound signal on the new session to `on_signal`.
    pub fn connect_with_signals(
        self,
        username: &str,
        password: &str,
        on_signal: Option<Box<dyn Fn(&RpcMessage) + Send + Sync>>,
    ) -> Result<(MockBroker, Session), SessionError> {
        let login = LoginOptions::new(username, password);
        self.connect_with_login(login, on_signal)
    }

    /// The fully general entry point: spawns the broker and dials it with
    /// a caller-built [`LoginOptions`] and an optional signal callback.
    pub fn connect_with_login(
        mut self,
        login: LoginOptions,
        on_signal: Option<Box<dyn Fn(&RpcMessage) + Send + Sync>>,
    ) -> Result<(MockBroker, Session), SessionError> {
        if self.user_db.is_empty() {
            self.user_db.add_user("test", "test", AccessLevel::ADMIN);
        }

        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(LoginStage::new(Arc::new(self.user_db))));
        pipeline.push(Arc::new(AppStage::new("shv-testkit-broker", env!("CARGO_PKG_VERSION"))));
        pipeline.push(Arc::new(SignalsStage::new()));
        for stage in self.extra_stages {
            pipeline.push(stage);
        }
        let pipeline = Arc::new(pipeline);

        let (broker_transport, client_transport) = MemTransport::pair();
        let broker_client = Arc::new(Mutex::new(Client::new(
            Box::new(broker_transport),
            Box::new(BlockFramer::default()),
        )));
        let handle = {
            let broker_client = broker_client.clone();
            std::thread::spawn(move || {
                if let Err(err) = serve_shared(broker_client, pipeline) {
                    tracing::debug!(error = %err, "mock broker connection ended");
                }
            })
        };

        let client = Client::new(Box::new(client_transport), Box::new(BlockFramer::default()));
        let url = mem_url();
        let session = Session::from_client(client, &url, login, on_signal)?;

        Ok((MockBroker { handle: Some(handle), client: broker_client }, session))
    }
}

impl Default for MockBrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A placeholder URL for `Session::from_client`'s login step, which
/// doesn't actually dereference any field of it — `MemTransport` has no
/// URL of its own.
fn mem_url() -> ConnectUrl {
    ConnectUrl {
        scheme: Scheme::Tcp,
        host_or_path: "mem".to_string(),
        port: None,
        user: None,
        password: None,
        devid: None,
        devmount: None,
        timeout: None,
        baudrate: None,
        local_address: None,
        ca: None,
        key: None,
        cert: None,
    }
}

/// Shorthand for `MockBrokerBuilder::new().connect(username, password)`.
pub fn mock_broker(username: &str, password: &str) -> Result<(MockBroker, Session), SessionError> {
    MockBrokerBuilder::new().connect(username, password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shv_chainpack::RpcValue;

    #[test]
    fn hello_login_and_app_call_round_trip() {
        let (_broker, session) = mock_broker("test", "test").expect("mock broker should accept default creds");
        let name = session.call(".app", "name", RpcValue::null()).expect("name call should succeed");
        assert_eq!(name.as_str(), Some("shv-testkit-broker"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let result = MockBrokerBuilder::new()
            .add_user("alice", "secret", AccessLevel::READ)
            .connect("alice", "wrong");
        assert!(matches!(result, Err(SessionError::LoginRejected(_))));
    }

    #[test]
    fn subscribe_is_acknowledged() {
        let (_broker, session) = mock_broker("test", "test").unwrap();
        let ok = session.subscribe("test/**:*:chng");
        assert!(ok.is_ok());
    }
}
