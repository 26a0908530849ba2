//! Canonical JSON and SHA-256 digests of line item plans.
//!
//! Two runs with the same settings and price ranges produce the same plan
//! digest, regardless of map ordering or `1.0` vs `1` number rendering.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use crate::domain::error::{Result, SetupError};

fn canonicalize(value: &Value) -> Result<Value> {
    Ok(match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key])?);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(canonicalize).collect::<Result<_>>()?)
        }
        Value::Number(n) if !(n.is_i64() || n.is_u64()) => match n.as_f64() {
            Some(f) if !f.is_finite() => {
                return Err(SetupError::config("non-finite number in line item plan"))
            }
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::Number(Number::from(f as i64))
            }
            _ => Value::Number(n.clone()),
        },
        other => other.clone(),
    })
}

/// Compact JSON with sorted object keys and integral floats as integers.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&canonicalize(value)?)?)
}

/// SHA-256 hex digest of the canonical JSON form of `value`.
pub fn compute_digest(value: &Value) -> Result<String> {
    let canonical = canonical_json(value)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Digest of an ordered list of line item descriptors.
pub fn plan_digest<T: Serialize>(descriptors: &[T]) -> Result<String> {
    compute_digest(&serde_json::to_value(descriptors)?)
}
