//! The `.app` node stage: name/version/ping, present on every connection
//! regardless of what else is mounted (spec.md §4.4.4).

use std::time::Instant;

use shv_chainpack::{RpcValue, Value};
use shv_proto::{AccessLevel, MethodDescription, RpcMessage};

use crate::pipeline::{Context, HandlerStage, Outcome};

pub struct AppStage {
    name: String,
    version: String,
    started_at: Instant,
}

impl AppStage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        AppStage {
            name: name.into(),
            version: version.into(),
            started_at: Instant::now(),
        }
    }
}

const PATH: &str = ".app";

impl HandlerStage for AppStage {
    fn name(&self) -> &str {
        "app"
    }

    fn dir(&self, _ctx: &Context, path: &str) -> Outcome<Vec<MethodDescription>> {
        if path != PATH {
            return Outcome::Skip;
        }
        Outcome::Handled(vec![
            MethodDescription::new("name", AccessLevel::BROWSE),
            MethodDescription::new("version", AccessLevel::BROWSE),
            MethodDescription::new("ping", AccessLevel::BROWSE),
            MethodDescription::new("uptime", AccessLevel::BROWSE),
        ])
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
        if shv_path != PATH {
            return Outcome::Skip;
        }
        let result = match method.as_str() {
            "name" => Value::String(self.name.clone()),
            "version" => Value::String(self.version.clone()),
            "ping" => Value::Null,
            "uptime" => Value::UInt(self.started_at.elapsed().as_secs()),
            _ => return Outcome::Skip,
        };
        Outcome::Handled(Some(RpcMessage::Response {
            request_id: *request_id,
            caller_ids: vec![],
            result: Ok(RpcValue::new(result)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Context;

    #[test]
    fn ping_replies_null() {
        let stage = AppStage::new("shvapp", "1.0.0");
        let ctx = Context {
            peer_name: "t".to_string(),
        };
        let msg = RpcMessage::Request {
            request_id: 1,
            shv_path: ".app".to_string(),
            method: "ping".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params: RpcValue::null(),
        };
        let Outcome::Handled(Some(RpcMessage::Response { result: Ok(v), .. })) = stage.msg(&ctx, &msg) else {
            panic!("expected handled ping");
        };
        assert!(v.is_null());
    }
}
