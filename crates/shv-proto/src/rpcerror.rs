//! The RPC error taxonomy (§7) and its wire representation as an IMap
//! carried in a message's value, keyed per `original_source/include/shv/
//! rpcerror.h`'s `rpcerror_keys` (`CODE=1`, `MESSAGE=2`).

use shv_chainpack::{RpcValue, Value};

pub const KEY_CODE: i64 = 1;
pub const KEY_MESSAGE: i64 = 2;

/// A protocol-level RPC failure. `UserCode` covers application-defined
/// codes, which start at 32 per spec.md §7.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
    #[error("internal error: {0}")]
    InternalErr(String),
    #[error("parse error: {0}")]
    ParseErr(String),
    #[error("method call timeout: {0}")]
    MethodCallTimeout(String),
    #[error("method call cancelled: {0}")]
    MethodCallCancelled(String),
    #[error("method call exception: {0}")]
    MethodCallException(String),
    #[error("login required: {0}")]
    LoginRequired(String),
    #[error("user id required: {0}")]
    UserIdRequired(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("error {code}: {message}")]
    UserCode { code: u32, message: String },
}

impl RpcError {
    fn code(&self) -> u32 {
        match self {
            RpcError::InvalidRequest(_) => 1,
            RpcError::MethodNotFound(_) => 2,
            RpcError::InvalidParam(_) => 3,
            RpcError::InternalErr(_) => 4,
            RpcError::ParseErr(_) => 5,
            RpcError::MethodCallTimeout(_) => 6,
            RpcError::MethodCallCancelled(_) => 7,
            RpcError::MethodCallException(_) => 8,
            RpcError::LoginRequired(_) => 9,
            RpcError::UserIdRequired(_) => 10,
            RpcError::NotImplemented(_) => 11,
            RpcError::UserCode { code, .. } => *code,
        }
    }

    fn message(&self) -> &str {
        match self {
            RpcError::InvalidRequest(m)
            | RpcError::MethodNotFound(m)
            | RpcError::InvalidParam(m)
            | RpcError::InternalErr(m)
            | RpcError::ParseErr(m)
            | RpcError::MethodCallTimeout(m)
            | RpcError::MethodCallCancelled(m)
            | RpcError::MethodCallException(m)
            | RpcError::LoginRequired(m)
            | RpcError::UserIdRequired(m)
            | RpcError::NotImplemented(m) => m,
            RpcError::UserCode { message, .. } => message,
        }
    }

    pub fn from_code(code: u32, message: String) -> Self {
        match code {
            1 => RpcError::InvalidRequest(message),
            2 => RpcError::MethodNotFound(message),
            3 => RpcError::InvalidParam(message),
            4 => RpcError::InternalErr(message),
            5 => RpcError::ParseErr(message),
            6 => RpcError::MethodCallTimeout(message),
            7 => RpcError::MethodCallCancelled(message),
            8 => RpcError::MethodCallException(message),
            9 => RpcError::LoginRequired(message),
            10 => RpcError::UserIdRequired(message),
            11 => RpcError::NotImplemented(message),
            code => RpcError::UserCode { code, message },
        }
    }

    pub fn to_value(&self) -> Value {
        Value::IMap(vec![
            (KEY_CODE, RpcValue::new(Value::UInt(self.code() as u64))),
            (
                KEY_MESSAGE,
                RpcValue::new(Value::String(self.message().to_string())),
            ),
        ])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::IMap(entries) = value else {
            return None;
        };
        let code = entries
            .iter()
            .find(|(k, _)| *k == KEY_CODE)?
            .1
            .as_uint()? as u32;
        let message = entries
            .iter()
            .find(|(k, _)| *k == KEY_MESSAGE)
            .and_then(|(_, v)| v.as_str())
            .unwrap_or_default()
            .to_string();
        Some(RpcError::from_code(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_value() {
        let err = RpcError::MethodNotFound("foo".to_string());
        let v = err.to_value();
        assert_eq!(RpcError::from_value(&v), Some(err));
    }

    #[test]
    fn user_codes_start_at_32() {
        let err = RpcError::UserCode {
            code: 32,
            message: "custom".to_string(),
        };
        let v = err.to_value();
        assert_eq!(RpcError::from_value(&v), Some(err));
    }
}
