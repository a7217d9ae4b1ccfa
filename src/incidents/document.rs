//! Structural validation and conversion of stored rule documents.
//!
//! Documents are JSON objects as the store hands them out:
//!
//! ```json
//! { "name": "disk-full", "timerange": "300",
//!   "conditions": [ { "type": 1, "subtype": 3, "value": "ERROR" } ] }
//! ```
//!
//! Nothing here logs. Callers decide how to report a rejected document.

use serde_json::Value;
use thiserror::Error;

use super::{Condition, ConditionValue, Connector, Subtype};

/// Why a document or a condition element was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("incomplete fields (need name, timerange and conditions)")]
    IncompleteDocument,

    #[error("name is not a non-empty string")]
    InvalidTitle,

    #[error("timerange {0:?} is not a positive integer")]
    InvalidTimerange(String),

    #[error("conditions is not a list")]
    ConditionsNotAList,

    #[error("condition has incomplete or out-of-range fields")]
    InvalidCondition,
}

/// True iff `doc` is an object carrying `name`, `timerange` and `conditions`.
/// Field types are not checked here.
pub fn validate_incident_document_structure(doc: &Value) -> bool {
    match doc.as_object() {
        Some(obj) => {
            obj.contains_key("name") && obj.contains_key("timerange") && obj.contains_key("conditions")
        }
        None => false,
    }
}

/// True iff `doc` is a usable condition: `type`, `subtype` and `value` are
/// present, `type` is a known connector code, `subtype` is a known subtype
/// code and `value` is a string or a floating point number.
pub fn validate_condition_document_structure(doc: &Value) -> bool {
    parse_condition(doc).is_some()
}

/// Convert a condition element into a [`Condition`], or `None` if it fails
/// validation.
pub fn parse_condition(doc: &Value) -> Option<Condition> {
    let obj = doc.as_object()?;
    let connector = Connector::from_code(coerce_int(obj.get("type")?)?)?;
    let subtype = Subtype::from_code(coerce_int(obj.get("subtype")?)?)?;
    let value = match obj.get("value")? {
        Value::String(s) => ConditionValue::Text(s.clone()),
        // Integer-typed numbers are rejected; only doubles are accepted.
        Value::Number(n) if n.is_f64() => ConditionValue::Number(n.as_f64()?),
        _ => return None,
    };

    Some(Condition {
        connector,
        subtype,
        value,
    })
}

/// Read the rule title from `name`.
pub fn extract_title(doc: &Value) -> Result<String, SkipReason> {
    match doc.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(SkipReason::InvalidTitle),
    }
}

/// Read the look-back window in seconds from `timerange`.
pub fn extract_timerange(doc: &Value) -> Result<u32, SkipReason> {
    let raw = doc.get("timerange").cloned().unwrap_or(Value::Null);
    coerce_int(&raw)
        .filter(|secs| *secs > 0)
        .and_then(|secs| u32::try_from(secs).ok())
        .ok_or_else(|| SkipReason::InvalidTimerange(display_raw(&raw)))
}

/// Integer view of a stored scalar. Accepts JSON integers, whole-valued
/// floats and strings holding a decimal integer.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
