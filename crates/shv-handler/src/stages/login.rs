//! The login handshake stage (spec.md §4.4.4): `hello` issues a nonce,
//! `login` verifies a PLAIN or SHA1-hashed password against it.
//!
//! Grounded on `original_source/include/shv/rpclogin.h`'s `rpclogin`
//! struct (`username`, `password`, `login_type`, `idle_timeout`,
//! `device_id`, `device_mountpoint`) and `SHV_NONCE_MAXLEN`/
//! `SHV_IDLE_TIMEOUT_DEFAULT`.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use sha1::{Digest, Sha1};
use shv_chainpack::{RpcValue, Value};
use shv_proto::{AccessLevel, RpcError, RpcMessage};

use crate::pipeline::{Context, HandlerStage, Outcome};

pub const NONCE_MAXLEN: usize = 32;
pub const IDLE_TIMEOUT_DEFAULT_SECS: u64 = 180;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginType {
    Plain,
    Sha1,
}

/// Verifies credentials and hands back the access level to grant. Kept as
/// a trait so a broker can back it with any user store.
pub trait UserDb: Send + Sync {
    /// `password_sha1` is the SHA1 hex digest of the plaintext password,
    /// independent of which `LoginType` the client used to prove it.
    fn validate(&self, username: &str, password_sha1: &str) -> Option<AccessLevel>;

    /// Verify a `LoginType::Sha1` login: the client sends
    /// `sha1_hex(nonce + sha1_hex(password))` as `client_hash` without ever
    /// putting the plaintext password or its bare hash on the wire. Only
    /// the db itself holds the stored `sha1_hex(password)` needed to
    /// redo that mixing, so (unlike `validate`) this can't be expressed in
    /// terms of a value the caller already has.
    fn validate_nonce(&self, username: &str, nonce: &str, client_hash: &str) -> Option<AccessLevel>;
}

/// An in-memory user table, handy for tests and small deployments.
pub struct InMemoryUserDb {
    users: Vec<(String, String, AccessLevel)>,
}

impl InMemoryUserDb {
    pub fn new() -> Self {
        InMemoryUserDb { users: Vec::new() }
    }

    pub fn add_user(&mut self, username: impl Into<String>, password: &str, access: AccessLevel) -> &mut Self {
        let sha1 = sha1_hex(password.as_bytes());
        self.users.push((username.into(), sha1, access));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for InMemoryUserDb {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDb for InMemoryUserDb {
    fn validate(&self, username: &str, password_sha1: &str) -> Option<AccessLevel> {
        self.users
            .iter()
            .find(|(u, p, _)| u == username && p.eq_ignore_ascii_case(password_sha1))
            .map(|(_, _, access)| *access)
    }

    fn validate_nonce(&self, username: &str, nonce: &str, client_hash: &str) -> Option<AccessLevel> {
        self.users
            .iter()
            .find(|(u, stored_sha1, _)| {
                u == username && sha1_hex(format!("{nonce}{stored_sha1}").as_bytes()).eq_ignore_ascii_case(client_hash)
            })
            .map(|(_, _, access)| *access)
    }
}

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn random_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let c = rng.gen_range(0..36);
            std::char::from_digit(c, 36).unwrap()
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
enum State {
    NeedHello,
    NeedLogin { nonce: String },
    LoggedIn { user: String, access: AccessLevel },
    Failed,
}

pub struct LoginStage {
    state: Mutex<State>,
    user_db: Arc<dyn UserDb>,
}

impl LoginStage {
    pub fn new(user_db: Arc<dyn UserDb>) -> Self {
        LoginStage {
            state: Mutex::new(State::NeedHello),
            user_db,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(&*self.state.lock(), State::LoggedIn { .. })
    }

    pub fn access_level(&self) -> Option<AccessLevel> {
        match &*self.state.lock() {
            State::LoggedIn { access, .. } => Some(*access),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<String> {
        match &*self.state.lock() {
            State::LoggedIn { user, .. } => Some(user.clone()),
            _ => None,
        }
    }

    fn handle_hello(&self, request_id: u64) -> RpcMessage {
        let nonce = random_nonce();
        *self.state.lock() = State::NeedLogin { nonce: nonce.clone() };
        RpcMessage::Response {
            request_id,
            caller_ids: vec![],
            result: Ok(RpcValue::new(Value::Map(vec![(
                "nonce".to_string(),
                RpcValue::new(Value::String(nonce)),
            )]))),
        }
    }

    fn handle_login(&self, request_id: u64, params: &RpcValue) -> RpcMessage {
        let mut state = self.state.lock();
        let nonce = match &*state {
            State::NeedLogin { nonce } => nonce.clone(),
            _ => {
                return error_response(
                    request_id,
                    RpcError::InvalidRequest("login without hello".to_string()),
                )
            }
        };
        let login = params.map_get("login");
        let username = login
            .and_then(|l| l.map_get("user"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let password = login
            .and_then(|l| l.map_get("password"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let login_type = login
            .and_then(|l| l.map_get("type"))
            .and_then(|v| v.as_str())
            .map(|s| if s.eq_ignore_ascii_case("plain") { LoginType::Plain } else { LoginType::Sha1 })
            .unwrap_or(LoginType::Sha1);

        let access = match login_type {
            LoginType::Plain => self.user_db.validate(&username, &sha1_hex(password.as_bytes())),
            LoginType::Sha1 => self.user_db.validate_nonce(&username, &nonce, password),
        };

        match access {
            Some(access) => {
                *state = State::LoggedIn {
                    user: username.clone(),
                    access,
                };
                tracing::info!(user = %username, "login succeeded");
                RpcMessage::Response {
                    request_id,
                    caller_ids: vec![],
                    result: Ok(RpcValue::new(Value::Map(vec![(
                        "clientId".to_string(),
                        RpcValue::new(Value::Int(1)),
                    )]))),
                }
            }
            None => {
                *state = State::Failed;
                tracing::warn!(user = %username, "login failed");
                error_response(request_id, RpcError::LoginRequired("invalid credentials".to_string()))
            }
        }
    }
}

fn error_response(request_id: u64, err: RpcError) -> RpcMessage {
    RpcMessage::Response {
        request_id,
        caller_ids: vec![],
        result: Err(err),
    }
}

impl HandlerStage for LoginStage {
    fn name(&self) -> &str {
        "login"
    }

    fn msg(&self, _ctx: &Context, msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        if let RpcMessage::Request {
            request_id,
            method,
            params,
            ..
        } = msg
        {
            match method.as_str() {
                "hello" => return Outcome::Handled(Some(self.handle_hello(*request_id))),
                "login" => return Outcome::Handled(Some(self.handle_login(*request_id, params))),
                _ => {
                    if !self.is_logged_in() {
                        return Outcome::Handled(Some(error_response(
                            *request_id,
                            RpcError::LoginRequired("login required".to_string()),
                        )));
                    }
                }
            }
        }
        Outcome::Skip
    }

    fn reset(&self, _ctx: &Context) {
        *self.state.lock() = State::NeedHello;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Context;

    fn ctx() -> Context {
        Context {
            peer_name: "test".to_string(),
        }
    }

    #[test]
    fn plain_login_succeeds_with_correct_password() {
        let mut db = InMemoryUserDb::new();
        db.add_user("alice", "secret", AccessLevel::WRITE);
        let stage = LoginStage::new(Arc::new(db));

        let hello = RpcMessage::Request {
            request_id: 1,
            shv_path: String::new(),
            method: "hello".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: RpcValue::null(),
        };
        let Outcome::Handled(Some(RpcMessage::Response { result: Ok(_), .. })) = stage.msg(&ctx(), &hello) else {
            panic!("expected hello to succeed");
        };

        let login_params = RpcValue::new(Value::Map(vec![(
            "login".to_string(),
            RpcValue::new(Value::Map(vec![
                ("user".to_string(), RpcValue::new(Value::String("alice".to_string()))),
                ("password".to_string(), RpcValue::new(Value::String("secret".to_string()))),
                ("type".to_string(), RpcValue::new(Value::String("plain".to_string()))),
            ])),
        )]));
        let login = RpcMessage::Request {
            request_id: 2,
            shv_path: String::new(),
            method: "login".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: login_params,
        };
        let Outcome::Handled(Some(RpcMessage::Response { result, .. })) = stage.msg(&ctx(), &login) else {
            panic!("expected login response");
        };
        assert!(result.is_ok());
        assert!(stage.is_logged_in());
        assert_eq!(stage.access_level(), Some(AccessLevel::WRITE));
    }

    #[test]
    fn sha1_login_succeeds_with_correct_password() {
        let mut db = InMemoryUserDb::new();
        db.add_user("alice", "secret", AccessLevel::WRITE);
        let stage = LoginStage::new(Arc::new(db));

        let hello = RpcMessage::Request {
            request_id: 1,
            shv_path: String::new(),
            method: "hello".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: RpcValue::null(),
        };
        let Outcome::Handled(Some(RpcMessage::Response { result: Ok(resp), .. })) = stage.msg(&ctx(), &hello) else {
            panic!("expected hello to succeed");
        };
        let nonce = resp.map_get("nonce").and_then(|v| v.as_str()).unwrap().to_string();
        let client_hash = sha1_hex(format!("{nonce}{}", sha1_hex(b"secret")).as_bytes());

        let login_params = RpcValue::new(Value::Map(vec![(
            "login".to_string(),
            RpcValue::new(Value::Map(vec![
                ("user".to_string(), RpcValue::new(Value::String("alice".to_string()))),
                ("password".to_string(), RpcValue::new(Value::String(client_hash))),
                ("type".to_string(), RpcValue::new(Value::String("sha1".to_string()))),
            ])),
        )]));
        let login = RpcMessage::Request {
            request_id: 2,
            shv_path: String::new(),
            method: "login".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: login_params,
        };
        let Outcome::Handled(Some(RpcMessage::Response { result, .. })) = stage.msg(&ctx(), &login) else {
            panic!("expected login response");
        };
        assert!(result.is_ok());
        assert!(stage.is_logged_in());
        assert_eq!(stage.access_level(), Some(AccessLevel::WRITE));
    }

    #[test]
    fn wrong_password_fails() {
        let mut db = InMemoryUserDb::new();
        db.add_user("alice", "secret", AccessLevel::WRITE);
        let stage = LoginStage::new(Arc::new(db));
        stage.handle_hello(1);
        let login_params = RpcValue::new(Value::Map(vec![(
            "login".to_string(),
            RpcValue::new(Value::Map(vec![
                ("user".to_string(), RpcValue::new(Value::String("alice".to_string()))),
                ("password".to_string(), RpcValue::new(Value::String("wrong".to_string()))),
                ("type".to_string(), RpcValue::new(Value::String("plain".to_string()))),
            ])),
        )]));
        let resp = stage.handle_login(2, &login_params);
        match resp {
            RpcMessage::Response { result: Err(_), .. } => {}
            _ => panic!("expected an error response"),
        }
        assert!(!stage.is_logged_in());
    }
}
