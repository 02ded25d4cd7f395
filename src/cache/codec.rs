//! Record encodings for persisted cache entries.
//!
//! Two codecs share the [`RecordCodec`] interface:
//!
//! - [`CompactCodec`]: JSON, used whenever the payload passes
//!   [`CacheValue::is_compact`].
//! - [`GeneralCodec`]: bincode over the full `CacheValue` enum, used for
//!   everything else (blobs, non-finite floats).
//!
//! Readers never need to know which codec wrote a record: [`decode_record`]
//! tries the compact form first and falls back to the general one.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::entry::CacheEntry;
use super::value::CacheValue;
use crate::error::{CacheError, Result};

/// Persisted form of a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub expires: Option<i64>,
    /// Namespace of the driver that wrote the record.
    pub prefix: String,
    pub value: CacheValue,
}

impl Record {
    pub fn from_entry(entry: &CacheEntry, prefix: &str) -> Self {
        Self {
            expires: entry.expires_at,
            prefix: prefix.to_string(),
            value: entry.value.clone(),
        }
    }

    pub fn into_entry(self) -> CacheEntry {
        CacheEntry::new(self.value, self.expires)
    }
}

pub trait RecordCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Record>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralCodec;

impl RecordCodec for CompactCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        if !record.value.is_compact() {
            return Err(CacheError::Codec(
                "payload is not representable in the compact encoding".to_string(),
            ));
        }

        let doc = json!({
            "expires": record.expires,
            "prefix": record.prefix,
            "value": record.value.to_json(),
        });
        Ok(serde_json::to_vec(&doc)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record> {
        let doc: serde_json::Value = serde_json::from_slice(bytes)?;
        let mut obj = match doc {
            serde_json::Value::Object(obj) => obj,
            _ => return Err(CacheError::Codec("record is not an object".to_string())),
        };

        // Both fields must be present; `expires: null` is valid, absent is not.
        let expires = match obj.remove("expires") {
            Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) => Some(
                n.as_i64()
                    .ok_or_else(|| CacheError::Codec("expires is not an integer".to_string()))?,
            ),
            Some(_) => return Err(CacheError::Codec("expires has the wrong type".to_string())),
            None => return Err(CacheError::Codec("record has no expires field".to_string())),
        };
        let value = obj
            .remove("value")
            .ok_or_else(|| CacheError::Codec("record has no value field".to_string()))?;
        let prefix = match obj.remove("prefix") {
            Some(serde_json::Value::String(p)) => p,
            _ => String::new(),
        };

        Ok(Record {
            expires,
            prefix,
            value: value.into(),
        })
    }
}

impl GeneralCodec {
    /// Encode a bare value (no expiry envelope), as sent to remote stores.
    pub fn encode_value(value: &CacheValue) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CacheError::Codec(e.to_string()))
    }

    pub fn decode_value(bytes: &[u8]) -> Result<CacheValue> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Codec(e.to_string()))
    }
}

impl RecordCodec for GeneralCodec {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        bincode::serialize(record).map_err(|e| CacheError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Codec(e.to_string()))
    }
}

/// Encode with the compact codec when the payload allows it.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    if record.value.is_compact() {
        CompactCodec.encode(record)
    } else {
        GeneralCodec.encode(record)
    }
}

/// Compact first, general second.
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    CompactCodec
        .decode(bytes)
        .or_else(|_| GeneralCodec.decode(bytes))
        .map_err(|e| CacheError::Codec(format!("malformed record: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(value: CacheValue) -> Record {
        Record {
            expires: Some(1_700_000_000),
            prefix: "app:".to_string(),
            value,
        }
    }

    #[test]
    fn test_compact_payload_is_json() {
        let rec = record(CacheValue::from(serde_json::json!({"name": "Alice", "ids": [1, 2]})));
        let bytes = encode_record(&rec).unwrap();

        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\"expires\":1700000000"));
        assert_eq!(decode_record(&bytes).unwrap(), rec);
    }

    #[test]
    fn test_general_payload_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("raw".to_string(), CacheValue::Blob(vec![0, 159, 146, 150]));
        map.insert("ratio".to_string(), CacheValue::Float(f64::INFINITY));
        let rec = record(CacheValue::Map(map));

        let bytes = encode_record(&rec).unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
        assert_eq!(decode_record(&bytes).unwrap(), rec);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        assert!(decode_record(br#"{"value": 1}"#).is_err());
        assert!(decode_record(br#"{"expires": null}"#).is_err());
        assert!(decode_record(br#"[1, 2, 3]"#).is_err());
        assert!(decode_record(b"").is_err());
    }

    #[test]
    fn test_null_expiry_and_missing_prefix_accepted() {
        let rec = decode_record(br#"{"expires": null, "value": "x"}"#).unwrap();
        assert_eq!(rec.expires, None);
        assert_eq!(rec.prefix, "");
        assert_eq!(rec.value, CacheValue::from("x"));
    }

    #[test]
    fn test_compact_codec_rejects_blob() {
        assert!(CompactCodec.encode(&record(CacheValue::Blob(vec![1]))).is_err());
    }
}
