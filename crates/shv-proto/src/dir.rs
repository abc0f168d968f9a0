//! Method (and signal) descriptions as returned by the `dir` method
//! (§3.5), grounded on `original_source/include/shv/rpcdir.h`.

use bitflags::bitflags;
use shv_chainpack::{MapKey, RpcValue, Value};

use crate::access::AccessLevel;

pub mod key {
    pub const NAME: i64 = 1;
    pub const FLAGS: i64 = 2;
    pub const PARAM: i64 = 3;
    pub const RESULT: i64 = 4;
    pub const ACCESS: i64 = 5;
    pub const SIGNALS: i64 = 6;
    pub const EXTRA: i64 = 63;
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct MethodFlags: u32 {
        const NOT_CALLABLE  = 1 << 0;
        const GETTER        = 1 << 1;
        const SETTER        = 1 << 2;
        const LARGE_RESULT  = 1 << 3;
        const NOT_IDEMPOTENT = 1 << 4;
        const USERID_REQUIRED = 1 << 5;
    }
}

/// One signal a method may emit, with an optional parameter type hint.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SignalDescription {
    pub name: String,
    pub param_type: Option<String>,
}

/// The description of one callable (or property-style getter/setter)
/// method on a SHV node, as returned by `dir`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MethodDescription {
    pub name: String,
    pub flags: MethodFlags,
    pub param_type: Option<String>,
    pub result_type: Option<String>,
    pub access: AccessLevel,
    pub signals: Vec<SignalDescription>,
    pub extra: Option<Value>,
}

impl MethodDescription {
    pub fn new(name: impl Into<String>, access: AccessLevel) -> Self {
        MethodDescription {
            name: name.into(),
            flags: MethodFlags::empty(),
            param_type: None,
            result_type: None,
            access,
            signals: Vec::new(),
            extra: None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            (key::NAME, RpcValue::new(Value::String(self.name.clone()))),
            (key::FLAGS, RpcValue::new(Value::UInt(self.flags.bits() as u64))),
            (key::ACCESS, RpcValue::new(Value::Int(self.access.0 as i64))),
        ];
        if let Some(p) = &self.param_type {
            entries.push((key::PARAM, RpcValue::new(Value::String(p.clone()))));
        }
        if let Some(r) = &self.result_type {
            entries.push((key::RESULT, RpcValue::new(Value::String(r.clone()))));
        }
        if !self.signals.is_empty() {
            let sigs = self
                .signals
                .iter()
                .map(|s| {
                    let mut m: Vec<(MapKey, RpcValue)> =
                        vec![("name".to_string(), RpcValue::new(Value::String(s.name.clone())))];
                    if let Some(t) = &s.param_type {
                        m.push(("param".to_string(), RpcValue::new(Value::String(t.clone()))));
                    }
                    RpcValue::new(Value::Map(m))
                })
                .collect();
            entries.push((key::SIGNALS, RpcValue::new(Value::List(sigs))));
        }
        if let Some(extra) = &self.extra {
            entries.push((key::EXTRA, RpcValue::new(extra.clone())));
        }
        Value::IMap(entries)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::IMap(entries) = value else {
            return None;
        };
        let get = |k: i64| entries.iter().find(|(ek, _)| *ek == k).map(|(_, v)| v);
        let name = get(key::NAME)?.as_str()?.to_string();
        let flags = get(key::FLAGS)
            .and_then(|v| v.as_uint())
            .map(|b| MethodFlags::from_bits_truncate(b as u32))
            .unwrap_or_default();
        let access = get(key::ACCESS)
            .and_then(|v| v.as_int())
            .map(|i| AccessLevel(i as i32))
            .unwrap_or(AccessLevel::NONE);
        let param_type = get(key::PARAM).and_then(|v| v.as_str()).map(str::to_string);
        let result_type = get(key::RESULT).and_then(|v| v.as_str()).map(str::to_string);
        let signals = get(key::SIGNALS)
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|item| {
                        let name = item.map_get("name")?.as_str()?.to_string();
                        let param_type = item.map_get("param").and_then(|v| v.as_str()).map(str::to_string);
                        Some(SignalDescription { name, param_type })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let extra = get(key::EXTRA).map(|v| v.value.clone());
        Some(MethodDescription {
            name,
            flags,
            param_type,
            result_type,
            access,
            signals,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_value() {
        let mut m = MethodDescription::new("get", AccessLevel::READ);
        m.flags = MethodFlags::GETTER;
        m.result_type = Some("Int".to_string());
        m.signals.push(SignalDescription {
            name: "chng".to_string(),
            param_type: Some("Int".to_string()),
        });
        let v = m.to_value();
        let back = MethodDescription::from_value(&v).unwrap();
        assert_eq!(back, m);
    }
}
