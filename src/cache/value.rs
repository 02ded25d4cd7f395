//! Payload type stored by every driver.
//!
//! `CacheValue` covers the JSON-like value space (null, booleans, numbers,
//! strings, lists and string-keyed maps) plus an opaque `Blob` for payloads
//! that only the general encoding can carry.

// Author: kelexine (https://github.com/kelexine)

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CacheValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
    Blob(Vec<u8>),
}

impl CacheValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CacheValue::Null)
    }

    /// Whether the value fits the compact (JSON) encoding: no blobs anywhere
    /// and no NaN/infinite floats.
    pub fn is_compact(&self) -> bool {
        match self {
            CacheValue::Null | CacheValue::Bool(_) | CacheValue::Int(_) | CacheValue::String(_) => {
                true
            }
            CacheValue::Float(f) => f.is_finite(),
            CacheValue::List(items) => items.iter().all(CacheValue::is_compact),
            CacheValue::Map(map) => map.values().all(CacheValue::is_compact),
            CacheValue::Blob(_) => false,
        }
    }

    /// Integer view used by counters. Anything without a sensible integer
    /// reading counts as 0.
    pub fn as_counter(&self) -> i64 {
        match self {
            CacheValue::Int(i) => *i,
            CacheValue::Float(f) if f.is_finite() => f.trunc() as i64,
            CacheValue::Bool(b) => i64::from(*b),
            CacheValue::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CacheValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CacheValue>> {
        match self {
            CacheValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert any serde-serializable type into a cache value.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Rebuild a typed value from a compact cache value.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_compact() {
            return Err(CacheError::Codec(
                "value contains data outside the JSON value space".to_string(),
            ));
        }
        Ok(serde_json::from_value(self.to_json())?)
    }

    /// JSON rendering. Blobs become base64 strings, non-finite floats null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            CacheValue::Null => Value::Null,
            CacheValue::Bool(b) => Value::Bool(*b),
            CacheValue::Int(i) => Value::from(*i),
            CacheValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CacheValue::String(s) => Value::String(s.clone()),
            CacheValue::List(items) => Value::Array(items.iter().map(CacheValue::to_json).collect()),
            CacheValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            CacheValue::Blob(bytes) => Value::String(BASE64.encode(bytes)),
        }
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => CacheValue::Null,
            Value::Bool(b) => CacheValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CacheValue::Int(i),
                None => CacheValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => CacheValue::String(s),
            Value::Array(items) => CacheValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                CacheValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Bool(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Int(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        CacheValue::Int(i64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        CacheValue::Int(i64::from(value))
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Float(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::String(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::String(value)
    }
}

impl<T: Into<CacheValue>> From<Vec<T>> for CacheValue {
    fn from(items: Vec<T>) -> Self {
        CacheValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<CacheValue>> From<Option<T>> for CacheValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CacheValue::Null, Into::into)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(map: BTreeMap<String, CacheValue>) -> Self {
        CacheValue::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compact_predicate() {
        assert!(CacheValue::from(json!({"user": {"id": 1, "tags": ["a", null]}})).is_compact());
        assert!(!CacheValue::Blob(vec![1, 2, 3]).is_compact());
        assert!(!CacheValue::List(vec![CacheValue::Int(1), CacheValue::Blob(vec![])]).is_compact());
        assert!(!CacheValue::Float(f64::NAN).is_compact());
    }

    #[test]
    fn test_counter_coercion() {
        assert_eq!(CacheValue::Int(7).as_counter(), 7);
        assert_eq!(CacheValue::Float(3.9).as_counter(), 3);
        assert_eq!(CacheValue::from(" 12 ").as_counter(), 12);
        assert_eq!(CacheValue::from("2.5").as_counter(), 2);
        assert_eq!(CacheValue::from("abc").as_counter(), 0);
        assert_eq!(CacheValue::Bool(true).as_counter(), 1);
        assert_eq!(CacheValue::Null.as_counter(), 0);
    }

    #[test]
    fn test_typed_conversion() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct User {
            id: u32,
            name: String,
        }

        let user = User { id: 1, name: "Alice".to_string() };
        let value = CacheValue::from_serializable(&user).unwrap();
        assert_eq!(value.as_map().unwrap()["name"], CacheValue::from("Alice"));
        assert_eq!(value.deserialize_into::<User>().unwrap(), user);
    }

    #[test]
    fn test_blob_cannot_deserialize_into_typed() {
        let result = CacheValue::Blob(vec![0xff]).deserialize_into::<String>();
        assert!(matches!(result, Err(CacheError::Codec(_))));
    }
}
