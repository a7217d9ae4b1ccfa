//! Incident descriptions: the persisted rule model and its loader.

pub mod document;
pub mod loader;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use loader::{fetch_incident_descriptions, DescriptionStore, SkipEvent, SkipReport};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("description store unavailable: {0}")]
    StoreUnavailable(String),
}

/// How a condition combines with the verdict accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    /// Map a stored connector code to its variant.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Connector::And),
            1 => Some(Connector::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::And => write!(f, "AND"),
            Connector::Or => write!(f, "OR"),
        }
    }
}

/// Selects which matcher evaluates a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subtype {
    None,
    Substring,
    Host,
    Severity,
    Regex,
}

impl Subtype {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Subtype::None),
            1 => Some(Subtype::Substring),
            2 => Some(Subtype::Host),
            3 => Some(Subtype::Severity),
            4 => Some(Subtype::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subtype::None => write!(f, "none"),
            Subtype::Substring => write!(f, "substring"),
            Subtype::Host => write!(f, "host"),
            Subtype::Severity => write!(f, "severity"),
            Subtype::Regex => write!(f, "regex"),
        }
    }
}

/// Comparison operand of a condition. Only text and floating point values
/// survive validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Text(s) => write!(f, "{}", s),
            ConditionValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A single typed predicate of an incident description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub connector: Connector,
    pub subtype: Subtype,
    pub value: ConditionValue,
}

/// A named rule: a look-back window plus the conditions evaluated over it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentDescription {
    pub title: String,
    /// Look-back window in seconds.
    pub timerange: u32,
    pub conditions: Vec<Condition>,
}
