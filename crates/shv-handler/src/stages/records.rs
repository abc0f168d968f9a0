//! History/records stage (spec.md §4.4.4): exposes a `.records` node
//! backed by caller-supplied callbacks rather than any particular
//! on-disk log format, so a broker can plug in whatever storage it
//! already has. Grounded on `original_source/include/shv/rpcrecords.h`'s
//! `pack_record`/`get_index_range` callback pair.

use shv_chainpack::{DateTime, RpcValue, Value};
use shv_proto::{AccessLevel, MethodDescription, RpcError, RpcMessage};

use crate::pipeline::{Context, HandlerStage, Outcome};

/// One logged value change.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub timestamp: DateTime,
    pub shv_path: String,
    pub value: RpcValue,
}

impl Record {
    fn to_value(&self) -> Value {
        Value::Map(vec![
            ("timestamp".to_string(), RpcValue::new(Value::DateTime(self.timestamp))),
            ("path".to_string(), RpcValue::new(Value::String(self.shv_path.clone()))),
            ("value".to_string(), self.value.clone()),
        ])
    }
}

/// Storage backend for the records stage. A broker supplies its own
/// implementation; this crate carries no log file format of its own.
pub trait RecordsStore: Send + Sync {
    fn pack_record(&self, record: Record);
    fn get_index_range(&self, shv_path: &str, since: DateTime, until: DateTime) -> Vec<Record>;
}

const PATH: &str = ".records";

pub struct RecordsStage<S> {
    store: S,
}

impl<S: RecordsStore> RecordsStage<S> {
    pub fn new(store: S) -> Self {
        RecordsStage { store }
    }

    /// Called by a broker (or by the client-side change-tracking layer)
    /// whenever a `chng` signal passes through, to feed the store.
    pub fn record_signal(&self, shv_path: &str, timestamp: DateTime, value: RpcValue) {
        self.store.pack_record(Record {
            timestamp,
            shv_path: shv_path.to_string(),
            value,
        });
    }
}

impl<S: RecordsStore> HandlerStage for RecordsStage<S> {
    fn name(&self) -> &str {
        "records"
    }

    fn dir(&self, _ctx: &Context, path: &str) -> Outcome<Vec<MethodDescription>> {
        if path != PATH {
            return Outcome::Skip;
        }
        Outcome::Handled(vec![MethodDescription::new("getSince", AccessLevel::READ)])
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
        if shv_path != PATH || method != "getSince" {
            return Outcome::Skip;
        }
        let Some(path) = params.map_get("path").and_then(|v| v.as_str()).map(str::to_string) else {
            return Outcome::Handled(Some(error(*request_id, "missing 'path' parameter")));
        };
        let since = params.map_get("since").and_then(|v| match v.value {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        });
        let until = params.map_get("until").and_then(|v| match v.value {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        });
        let (Some(since), Some(until)) = (since, until) else {
            return Outcome::Handled(Some(error(*request_id, "missing 'since'/'until' parameters")));
        };
        let records = self.store.get_index_range(&path, since, until);
        let list = records.iter().map(|r| RpcValue::new(r.to_value())).collect();
        Outcome::Handled(Some(RpcMessage::Response {
            request_id: *request_id,
            caller_ids: vec![],
            result: Ok(RpcValue::new(Value::List(list))),
        }))
    }
}

fn error(request_id: u64, msg: &str) -> RpcMessage {
    RpcMessage::Response {
        request_id,
        caller_ids: vec![],
        result: Err(RpcError::InvalidParam(msg.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shv_chainpack::CHAINPACK_EPOCH_MSEC;

    struct MemStore {
        records: Mutex<Vec<Record>>,
    }

    impl RecordsStore for MemStore {
        fn pack_record(&self, record: Record) {
            self.records.lock().push(record);
        }

        fn get_index_range(&self, shv_path: &str, _since: DateTime, _until: DateTime) -> Vec<Record> {
            self.records
                .lock()
                .iter()
                .filter(|r| r.shv_path == shv_path)
                .cloned()
                .collect()
        }
    }

    #[test]
    fn get_since_returns_matching_records() {
        let store = MemStore {
            records: Mutex::new(Vec::new()),
        };
        let stage = RecordsStage::new(store);
        let ts = DateTime::utc(CHAINPACK_EPOCH_MSEC);
        stage.record_signal("test/device", ts, RpcValue::new(Value::Int(1)));

        let ctx = Context {
            peer_name: "t".to_string(),
        };
        let params = RpcValue::new(Value::Map(vec![
            ("path".to_string(), RpcValue::new(Value::String("test/device".to_string()))),
            ("since".to_string(), RpcValue::new(Value::DateTime(ts))),
            ("until".to_string(), RpcValue::new(Value::DateTime(ts))),
        ]));
        let msg = RpcMessage::Request {
            request_id: 1,
            shv_path: PATH.to_string(),
            method: "getSince".to_string(),
            caller_ids: vec![],
            access_level: None,
            user_id: None,
            params,
        };
        let Outcome::Handled(Some(RpcMessage::Response { result: Ok(v), .. })) = stage.msg(&ctx, &msg) else {
            panic!("expected a records list");
        };
        assert_eq!(v.as_list().unwrap().len(), 1);
    }
}
