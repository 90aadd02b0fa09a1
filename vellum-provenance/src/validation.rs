//! Metadata validation shared by provenance records and audit events.
//!
//! `serde_json::Value` is a strict tree in Rust — it cannot actually contain
//! a cycle, since there is no shared mutable ownership through which one
//! could be constructed. The depth and element-count bounds below are what
//! actually guard against a malicious caller handing us a pathologically
//! deep or wide document; they serve the same purpose a cycle check would.

use serde_json::Value;
use vellum_core::{EngineError, EngineResult, ProvenanceError};

pub const MAX_SERIALIZED_BYTES: usize = 10_000;
pub const MAX_NESTING_DEPTH: usize = 5;
pub const MAX_TOTAL_ELEMENTS: usize = 500;
pub const MAX_TOP_LEVEL_KEYS: usize = 100;
pub const MAX_KEY_BYTES: usize = 256;
pub const MAX_STRING_VALUE_BYTES: usize = 10_000;
pub const MAX_IDENTIFIER_BYTES: usize = 256;

/// Validate a metadata document against every DoS bound. The caller should
/// deep-copy (`value.clone()`) before calling this so that nothing about the
/// original can mutate between the check and the store.
pub fn validate_metadata(value: &Value) -> EngineResult<()> {
    let serialized = serde_json::to_vec(value).map_err(|e| {
        EngineError::Provenance(ProvenanceError::InvalidMetadata {
            reason: format!("metadata not serializable: {e}"),
        })
    })?;
    if serialized.len() > MAX_SERIALIZED_BYTES {
        return invalid(format!(
            "serialized metadata is {} bytes, exceeds {}",
            serialized.len(),
            MAX_SERIALIZED_BYTES
        ));
    }

    if let Value::Object(map) = value {
        if map.len() > MAX_TOP_LEVEL_KEYS {
            return invalid(format!(
                "{} top-level keys exceeds {}",
                map.len(),
                MAX_TOP_LEVEL_KEYS
            ));
        }
    }

    let mut element_count = 0usize;
    walk(value, 1, &mut element_count)?;

    Ok(())
}

fn walk(value: &Value, depth: usize, element_count: &mut usize) -> EngineResult<()> {
    if depth > MAX_NESTING_DEPTH {
        return invalid(format!("nesting depth exceeds {}", MAX_NESTING_DEPTH));
    }
    *element_count += 1;
    if *element_count > MAX_TOTAL_ELEMENTS {
        return invalid(format!(
            "total element count exceeds {}",
            MAX_TOTAL_ELEMENTS
        ));
    }

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        Value::String(s) => {
            if s.len() > MAX_STRING_VALUE_BYTES {
                return invalid(format!(
                    "string value of {} bytes exceeds {}",
                    s.len(),
                    MAX_STRING_VALUE_BYTES
                ));
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, element_count)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, val) in map {
                if key.len() > MAX_KEY_BYTES {
                    return invalid(format!(
                        "metadata key {:?} is {} bytes, exceeds {}",
                        key,
                        key.len(),
                        MAX_KEY_BYTES
                    ));
                }
                walk(val, depth + 1, element_count)?;
            }
            Ok(())
        }
    }
}

/// Validate a free-form identifier (actor id, source id) against the
/// separate, shorter identifier bound.
pub fn validate_identifier(id: &str) -> EngineResult<()> {
    if id.len() > MAX_IDENTIFIER_BYTES {
        return invalid(format!(
            "identifier of {} bytes exceeds {}",
            id.len(),
            MAX_IDENTIFIER_BYTES
        ));
    }
    Ok(())
}

fn invalid(reason: String) -> EngineResult<()> {
    Err(EngineError::Provenance(ProvenanceError::InvalidMetadata { reason }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_reasonable_metadata() {
        let value = json!({"reason": "merged", "pr": 42, "flags": ["a", "b"]});
        assert!(validate_metadata(&value).is_ok());
    }

    #[test]
    fn rejects_excess_nesting_depth() {
        let value = json!({"a": {"b": {"c": {"d": {"e": {"f": 1}}}}}});
        assert!(validate_metadata(&value).is_err());
    }

    #[test]
    fn rejects_too_many_top_level_keys() {
        let mut map = serde_json::Map::new();
        for i in 0..200 {
            map.insert(format!("k{i}"), json!(i));
        }
        let value = Value::Object(map);
        assert!(validate_metadata(&value).is_err());
    }

    #[test]
    fn rejects_oversize_key() {
        let key = "k".repeat(300);
        let value = json!({ key: 1 });
        assert!(validate_metadata(&value).is_err());
    }

    #[test]
    fn rejects_oversize_string_value() {
        let value = json!({ "s": "x".repeat(20_000) });
        assert!(validate_metadata(&value).is_err());
    }

    #[test]
    fn rejects_too_many_total_elements() {
        let items: Vec<Value> = (0..600).map(|i| json!(i)).collect();
        let value = json!({ "items": items });
        assert!(validate_metadata(&value).is_err());
    }

    #[test]
    fn identifier_bound_is_separate_from_metadata_bound() {
        assert!(validate_identifier(&"a".repeat(256)).is_ok());
        assert!(validate_identifier(&"a".repeat(257)).is_err());
    }
}
