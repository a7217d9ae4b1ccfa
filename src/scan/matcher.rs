//! Per-subtype matching logic.

use regex::Regex;

use super::{LogMessage, ScanError};
use crate::incidents::{Condition, ConditionValue, Subtype};

/// A condition compiled into the data its subtype needs.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Any message inside the window.
    None,
    Substring(String),
    /// Host name, compared ASCII case-insensitively.
    Host(String),
    /// Messages at or above this severity (syslog level at or below).
    Severity(u8),
    Regex(Regex),
}

impl Matcher {
    pub fn from_condition(condition: &Condition) -> Result<Self, ScanError> {
        let matcher = match condition.subtype {
            Subtype::None => Matcher::None,
            Subtype::Substring => Matcher::Substring(condition.value.to_string()),
            Subtype::Host => Matcher::Host(condition.value.to_string()),
            Subtype::Severity => Matcher::Severity(severity_threshold(&condition.value)?),
            Subtype::Regex => {
                let pattern = condition.value.to_string();
                let re = Regex::new(&pattern).map_err(|e| invalid(Subtype::Regex, e.to_string()))?;
                Matcher::Regex(re)
            }
        };
        Ok(matcher)
    }

    pub fn matches(&self, message: &LogMessage) -> bool {
        match self {
            Matcher::None => true,
            Matcher::Substring(needle) => message.message.contains(needle.as_str()),
            Matcher::Host(host) => message.host.eq_ignore_ascii_case(host),
            Matcher::Severity(threshold) => message.level <= *threshold,
            Matcher::Regex(re) => re.is_match(&message.message),
        }
    }
}

fn invalid(subtype: Subtype, reason: String) -> ScanError {
    ScanError::InvalidStrategy {
        subtype: subtype.to_string(),
        reason,
    }
}

/// Syslog level named or numbered by a severity condition.
fn severity_threshold(value: &ConditionValue) -> Result<u8, ScanError> {
    match value {
        ConditionValue::Number(n) => {
            if n.fract() == 0.0 && (0.0..=7.0).contains(n) {
                Ok(*n as u8)
            } else {
                Err(invalid(Subtype::Severity, format!("level {} outside 0-7", n)))
            }
        }
        ConditionValue::Text(name) => {
            let trimmed = name.trim();
            if let Ok(level) = trimmed.parse::<u8>() {
                if level <= 7 {
                    return Ok(level);
                }
            }
            level_from_name(trimmed)
                .ok_or_else(|| invalid(Subtype::Severity, format!("unknown severity {:?}", name)))
        }
    }
}

fn level_from_name(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "emerg" | "emergency" | "panic" => Some(0),
        "alert" => Some(1),
        "crit" | "critical" => Some(2),
        "err" | "error" => Some(3),
        "warn" | "warning" => Some(4),
        "notice" => Some(5),
        "info" | "informational" => Some(6),
        "debug" => Some(7),
        _ => None,
    }
}
