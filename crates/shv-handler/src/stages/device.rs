//! The `.device` node stage, including the `.device/alerts` sub-node
//! (SPEC_FULL.md §10, grounded on `rpcalerts.h`-equivalent behavior in
//! `original_source/`): a list of `(timestamp, level, id)` alert records a
//! device exposes about its own health.

use parking_lot::Mutex;
use shv_chainpack::{DateTime, RpcValue, Value};
use shv_proto::{AccessLevel, MethodDescription, RpcMessage};

use crate::pipeline::{Context, HandlerStage, Outcome};

#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub timestamp: DateTime,
    pub level: i32,
    pub id: String,
}

impl Alert {
    fn to_value(&self) -> Value {
        Value::Map(vec![
            ("timestamp".to_string(), RpcValue::new(Value::DateTime(self.timestamp))),
            ("level".to_string(), RpcValue::new(Value::Int(self.level as i64))),
            ("id".to_string(), RpcValue::new(Value::String(self.id.clone()))),
        ])
    }
}

pub struct DeviceStage {
    name: String,
    mount_point: String,
    alerts: Mutex<Vec<Alert>>,
}

const PATH: &str = ".device";
const ALERTS_PATH: &str = ".device/alerts";

impl DeviceStage {
    pub fn new(name: impl Into<String>, mount_point: impl Into<String>) -> Self {
        DeviceStage {
            name: name.into(),
            mount_point: mount_point.into(),
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_alert(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}

impl HandlerStage for DeviceStage {
    fn name(&self) -> &str {
        "device"
    }

    fn ls(&self, _ctx: &Context, path: &str) -> Outcome<Vec<String>> {
        match path {
            PATH => Outcome::Handled(vec!["alerts".to_string()]),
            _ => Outcome::Skip,
        }
    }

    fn dir(&self, _ctx: &Context, path: &str) -> Outcome<Vec<MethodDescription>> {
        match path {
            PATH => Outcome::Handled(vec![
                MethodDescription::new("name", AccessLevel::BROWSE),
                MethodDescription::new("mountPoint", AccessLevel::BROWSE),
            ]),
            ALERTS_PATH => Outcome::Handled(vec![MethodDescription::new("get", AccessLevel::READ)]),
            _ => Outcome::Skip,
        }
    }

    fn msg(&self, _ctx: &Context, msg: &RpcMessage) -> Outcome<Option<RpcMessage>> {
        let RpcMessage::Request {
            request_id,
            shv_path,
            method,
            ..
        } = msg
        else {
            return Outcome::Skip;
        };
        match (shv_path.as_str(), method.as_str()) {
            (PATH, "name") => Outcome::Handled(Some(ok(*request_id, Value::String(self.name.clone())))),
            (PATH, "mountPoint") => {
                Outcome::Handled(Some(ok(*request_id, Value::String(self.mount_point.clone()))))
            }
            (ALERTS_PATH, "get") => {
                let alerts = self.alerts.lock();
                let list = alerts.iter().map(|a| RpcValue::new(a.to_value())).collect();
                Outcome::Handled(Some(ok(*request_id, Value::List(list))))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Context;
    use shv_chainpack::CHAINPACK_EPOCH_MSEC;

    #[test]
    fn alerts_list_grows() {
        let stage = DeviceStage::new("dev1", "test/device");
        stage.push_alert(Alert {
            timestamp: DateTime::utc(CHAINPACK_EPOCH_MSEC),
            level: 3,
            id: "overheat".to_string(),
        });
        let ctx = Context {
            peer_name: "t".to_string(),
        };
        let msg = RpcMessage::Request {
            request_id: 1,
            shv_path: ALERTS_PATH.to_string(),
            method: "get".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: RpcValue::null(),
        };
        let Outcome::Handled(Some(RpcMessage::Response { result: Ok(v), .. })) = stage.msg(&ctx, &msg) else {
            panic!("expected alerts list");
        };
        assert_eq!(v.as_list().unwrap().len(), 1);
    }
}
