//! End-to-end `Session` behavior against `shv-testkit`'s in-process mock
//! broker: login, calls, subscribe/unsubscribe, and signal delivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use shv_chainpack::{RpcValue, Value};
use shv_client::session::LoginOptions;
use shv_client::SessionError;
use shv_proto::RpcMessage;
use shv_testkit::{mock_broker, MockBrokerBuilder};

#[test]
fn logs_in_and_calls_app_methods() {
    let (_broker, session) = mock_broker("test", "test").expect("login should succeed");
    let name = session.call(".app", "name", RpcValue::null()).unwrap();
    assert_eq!(name.as_str(), Some("shv-testkit-broker"));
    let version = session.call(".app", "version", RpcValue::null()).unwrap();
    assert_eq!(version.as_str(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn wrong_credentials_are_rejected() {
    let result = MockBrokerBuilder::new()
        .add_user("bob", "hunter2", shv_proto::AccessLevel::READ)
        .connect("bob", "not-hunter2");
    match result {
        Err(SessionError::LoginRejected(_)) => {}
        other => panic!("expected a rejected login, got {other:?}"),
    }
}

#[test]
fn subscribe_then_unsubscribe_round_trip() {
    let (_broker, session) = mock_broker("test", "test").unwrap();
    session.subscribe("test/**:*:chng").expect("subscribe should be acknowledged");
    let removed = session.unsubscribe("test/**:*:chng").expect("unsubscribe should succeed");
    assert!(removed);
    let removed_again = session.unsubscribe("test/**:*:chng").unwrap();
    assert!(!removed_again, "second unsubscribe of the same RI should report nothing removed");
}

#[test]
fn device_login_options_are_accepted() {
    let mut login = LoginOptions::new("test", "test");
    login.device_id = Some("dev-1".to_string());
    login.device_mount_point = Some("test/device1".to_string());
    let (_broker, session) = MockBrokerBuilder::new().connect_with_login(login, None).unwrap();
    let name = session.call(".app", "name", RpcValue::null()).unwrap();
    assert_eq!(name.as_str(), Some("shv-testkit-broker"));
}

#[test]
fn unsolicited_signal_reaches_the_on_signal_callback() {
    let received: Arc<Mutex<Vec<RpcMessage>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_callback = received.clone();
    let (broker, session) = MockBrokerBuilder::new()
        .connect_with_signals(
            "test",
            "test",
            Some(Box::new(move |msg: &RpcMessage| {
                received_for_callback.lock().unwrap().push(msg.clone());
            })),
        )
        .unwrap();

    broker.emit_signal("test/device1", "chng", RpcValue::new(Value::Int(42)));

    let mut attempts = 0;
    while received.lock().unwrap().is_empty() && attempts < 50 {
        std::thread::sleep(Duration::from_millis(20));
        attempts += 1;
    }

    let signals = received.lock().unwrap();
    assert_eq!(signals.len(), 1, "expected exactly one delivered signal");
    match &signals[0] {
        RpcMessage::Signal { shv_path, signal, .. } => {
            assert_eq!(shv_path, "test/device1");
            assert_eq!(signal, "chng");
        }
        other => panic!("expected a Signal message, got {other:?}"),
    }
    drop(session);
}
