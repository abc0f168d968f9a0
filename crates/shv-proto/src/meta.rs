//! The message envelope (§3.3): a small set of META fields that turn a
//! plain [`RpcValue`] into a request, response, or signal.

use shv_chainpack::{MetaKey, MetaMap, RpcValue, Value};

use crate::access::AccessLevel;
use crate::error::ProtoError;
use crate::rpcerror::RpcError;

pub mod key {
    pub const TYPE_ID: i64 = 1;
    pub const REQUEST_ID: i64 = 2;
    pub const SHV_PATH: i64 = 3;
    pub const METHOD: i64 = 4;
    pub const CALLER_IDS: i64 = 5;
    pub const ACCESS_LEVEL: i64 = 6;
    pub const USER_ID: i64 = 7;
    pub const SIGNAL: i64 = 8;
    pub const SOURCE: i64 = 9;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Request = 1,
    Response = 2,
    Signal = 3,
}

impl MessageType {
    fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(MessageType::Request),
            2 => Some(MessageType::Response),
            3 => Some(MessageType::Signal),
            _ => None,
        }
    }
}

/// A fully decoded RPC message: the envelope plus its payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcMessage {
    Request {
        request_id: u64,
        shv_path: String,
        method: String,
        caller_ids: Vec<u64>,
        access_level: Option<AccessLevel>,
        user_id: Option<String>,
        params: RpcValue,
    },
    Response {
        request_id: u64,
        caller_ids: Vec<u64>,
        result: Result<RpcValue, RpcError>,
    },
    Signal {
        shv_path: String,
        signal: String,
        source: Option<String>,
        access_level: Option<AccessLevel>,
        params: RpcValue,
    },
}

impl RpcMessage {
    pub fn request_id(&self) -> Option<u64> {
        match self {
            RpcMessage::Request { request_id, .. } | RpcMessage::Response { request_id, .. } => {
                Some(*request_id)
            }
            RpcMessage::Signal { .. } => None,
        }
    }

    pub fn to_rpcvalue(&self) -> RpcValue {
        let mut meta = MetaMap::new();
        match self {
            RpcMessage::Request {
                request_id,
                shv_path,
                method,
                caller_ids,
                access_level,
                user_id,
                params,
            } => {
                meta.insert(key::TYPE_ID, Value::Int(MessageType::Request as i64));
                meta.insert(key::REQUEST_ID, Value::UInt(*request_id));
                meta.insert(key::SHV_PATH, Value::String(shv_path.clone()));
                meta.insert(key::METHOD, Value::String(method.clone()));
                if !caller_ids.is_empty() {
                    meta.insert(
                        key::CALLER_IDS,
                        Value::List(caller_ids.iter().map(|c| RpcValue::new(Value::UInt(*c))).collect()),
                    );
                }
                if let Some(level) = access_level {
                    meta.insert(key::ACCESS_LEVEL, Value::Int(level.0 as i64));
                }
                if let Some(uid) = user_id {
                    meta.insert(key::USER_ID, Value::String(uid.clone()));
                }
                RpcValue::with_meta(meta, params.value.clone())
            }
            RpcMessage::Response {
                request_id,
                caller_ids,
                result,
            } => {
                meta.insert(key::TYPE_ID, Value::Int(MessageType::Response as i64));
                meta.insert(key::REQUEST_ID, Value::UInt(*request_id));
                if !caller_ids.is_empty() {
                    meta.insert(
                        key::CALLER_IDS,
                        Value::List(caller_ids.iter().map(|c| RpcValue::new(Value::UInt(*c))).collect()),
                    );
                }
                let value = match result {
                    Ok(v) => v.value.clone(),
                    Err(e) => e.to_value(),
                };
                if result.is_err() {
                    meta.insert("error", Value::Bool(true));
                }
                RpcValue::with_meta(meta, value)
            }
            RpcMessage::Signal {
                shv_path,
                signal,
                source,
                access_level,
                params,
            } => {
                meta.insert(key::TYPE_ID, Value::Int(MessageType::Signal as i64));
                meta.insert(key::SHV_PATH, Value::String(shv_path.clone()));
                meta.insert(key::SIGNAL, Value::String(signal.clone()));
                if let Some(src) = source {
                    meta.insert(key::SOURCE, Value::String(src.clone()));
                }
                if let Some(level) = access_level {
                    meta.insert(key::ACCESS_LEVEL, Value::Int(level.0 as i64));
                }
                RpcValue::with_meta(meta, params.value.clone())
            }
        }
    }

    pub fn from_rpcvalue(rv: &RpcValue) -> Result<Self, ProtoError> {
        let meta = &rv.meta;
        let type_id = meta
            .get_int(key::TYPE_ID)
            .and_then(|v| v.as_int_like())
            .ok_or(ProtoError::MissingMetaKey("typeId"))?;
        let msg_type =
            MessageType::from_i64(type_id).ok_or_else(|| ProtoError::WrongMetaType {
                key: "typeId",
                detail: format!("unknown type id {type_id}"),
            })?;
        let caller_ids = meta
            .get_int(key::CALLER_IDS)
            .and_then(|v| v.as_list())
            .map(|l| l.iter().filter_map(|v| v.as_uint()).collect())
            .unwrap_or_default();
        let access_level = meta
            .get_int(key::ACCESS_LEVEL)
            .and_then(|v| v.as_int())
            .map(|i| AccessLevel(i as i32));

        match msg_type {
            MessageType::Request => {
                let request_id = meta
                    .get_int(key::REQUEST_ID)
                    .and_then(|v| v.as_uint())
                    .ok_or(ProtoError::MissingMetaKey("requestId"))?;
                let shv_path = meta
                    .get_int(key::SHV_PATH)
                    .and_then(value_as_str)
                    .unwrap_or_default()
                    .to_string();
                let method = meta
                    .get_int(key::METHOD)
                    .and_then(value_as_str)
                    .ok_or(ProtoError::MissingMetaKey("method"))?
                    .to_string();
                let user_id = meta.get_int(key::USER_ID).and_then(value_as_str).map(str::to_string);
                Ok(RpcMessage::Request {
                    request_id,
                    shv_path,
                    method,
                    caller_ids,
                    access_level,
                    user_id,
                    params: RpcValue::new(rv.value.clone()),
                })
            }
            MessageType::Response => {
                let request_id = meta
                    .get_int(key::REQUEST_ID)
                    .and_then(|v| v.as_uint())
                    .ok_or(ProtoError::MissingMetaKey("requestId"))?;
                let is_error = matches!(meta.get(&MetaKey::Str("error".to_string())), Some(Value::Bool(true)));
                let result = if is_error {
                    Err(RpcError::from_value(&rv.value).unwrap_or_else(|| {
                        RpcError::InternalErr("malformed error payload".to_string())
                    }))
                } else {
                    Ok(RpcValue::new(rv.value.clone()))
                };
                Ok(RpcMessage::Response {
                    request_id,
                    caller_ids,
                    result,
                })
            }
            MessageType::Signal => {
                let shv_path = meta
                    .get_int(key::SHV_PATH)
                    .and_then(value_as_str)
                    .unwrap_or_default()
                    .to_string();
                let signal = meta
                    .get_int(key::SIGNAL)
                    .and_then(value_as_str)
                    .ok_or(ProtoError::MissingMetaKey("signal"))?
                    .to_string();
                let source = meta.get_int(key::SOURCE).and_then(value_as_str).map(str::to_string);
                Ok(RpcMessage::Signal {
                    shv_path,
                    signal,
                    source,
                    access_level,
                    params: RpcValue::new(rv.value.clone()),
                })
            }
        }
    }
}

fn value_as_str(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

trait ValueExt {
    fn as_int_like(&self) -> Option<i64>;
    fn as_int(&self) -> Option<i64>;
    fn as_uint(&self) -> Option<u64>;
    fn as_list(&self) -> Option<&[RpcValue]>;
}

impl ValueExt for Value {
    fn as_int_like(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
    fn as_int(&self) -> Option<i64> {
        self.as_int_like()
    }
    fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
    fn as_list(&self) -> Option<&[RpcValue]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips() {
        let msg = RpcMessage::Request {
            request_id: 42,
            shv_path: "test/device".to_string(),
            method: "get".to_string(),
            caller_ids: vec![1, 2],
            access_level: Some(AccessLevel::READ),
            user_id: Some("alice".to_string()),
            params: RpcValue::new(Value::Int(1)),
        };
        let rv = msg.to_rpcvalue();
        assert_eq!(RpcMessage::from_rpcvalue(&rv).unwrap(), msg);
    }

    #[test]
    fn error_response_roundtrips() {
        let msg = RpcMessage::Response {
            request_id: 7,
            caller_ids: vec![],
            result: Err(RpcError::MethodNotFound("get".to_string())),
        };
        let rv = msg.to_rpcvalue();
        assert_eq!(RpcMessage::from_rpcvalue(&rv).unwrap(), msg);
    }

    #[test]
    fn signal_roundtrips() {
        let msg = RpcMessage::Signal {
            shv_path: "test/device".to_string(),
            signal: "chng".to_string(),
            source: Some("get".to_string()),
            access_level: Some(AccessLevel::READ),
            params: RpcValue::new(Value::Int(5)),
        };
        let rv = msg.to_rpcvalue();
        assert_eq!(RpcMessage::from_rpcvalue(&rv).unwrap(), msg);
    }
}
