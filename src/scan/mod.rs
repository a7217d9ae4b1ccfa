//! Scan strategies: evaluate incident conditions against recent log messages.

pub mod aggregate;
pub mod matcher;
pub mod runner;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::incidents::{Condition, IncidentDescription};

pub use aggregate::aggregate;
pub use matcher::Matcher;
pub use runner::{DescriptionReport, ScanRunner};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("result read before any scan completed")]
    NotScannedYet,

    #[error("invalid {subtype} strategy: {reason}")]
    InvalidStrategy { subtype: String, reason: String },

    #[error("log source failed: {0}")]
    Source(String),

    #[error("scan timed out after {}ms", .after.as_millis())]
    TimedOut { after: std::time::Duration },

    #[error("scan aborted: {0}")]
    Aborted(String),
}

/// One log message as the scan strategies see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogMessage {
    pub host: String,
    /// Syslog level, 0 (emergency) to 7 (debug).
    pub level: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Read access to stored log messages.
pub trait MessageSource: Send + Sync {
    /// Messages created at or after `cutoff`.
    fn messages_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<LogMessage>, ScanError>;
}

impl MessageSource for Vec<LogMessage> {
    fn messages_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<LogMessage>, ScanError> {
        Ok(self.iter().filter(|m| m.created_at >= cutoff).cloned().collect())
    }
}

/// Lifecycle of a strategy instance. `scan()` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unscanned,
    Scanned(bool),
}

/// Contract every condition matcher fulfils.
pub trait ScanStrategy {
    /// Run the check against the log source. A failure leaves the previous
    /// state untouched.
    fn scan(&mut self) -> Result<(), ScanError>;

    /// Verdict of the most recent successful scan.
    /// Fails with [`ScanError::NotScannedYet`] before the first scan.
    fn result(&self) -> Result<bool, ScanError>;

    /// Info log line tagged with the owning description and subtype.
    fn incident_log(&self, message: &str);
}

/// Scan of one condition of one description.
pub struct ConditionScan<'a> {
    title: &'a str,
    timerange: u32,
    condition: &'a Condition,
    source: &'a dyn MessageSource,
    state: ScanState,
}

impl<'a> ConditionScan<'a> {
    pub fn new(description: &'a IncidentDescription, condition: &'a Condition, source: &'a dyn MessageSource) -> Self {
        Self {
            title: &description.title,
            timerange: description.timerange,
            condition,
            source,
            state: ScanState::Unscanned,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }
}

impl ScanStrategy for ConditionScan<'_> {
    fn scan(&mut self) -> Result<(), ScanError> {
        let matcher = Matcher::from_condition(self.condition)?;
        let cutoff = Utc::now() - Duration::seconds(i64::from(self.timerange));
        let messages = self.source.messages_since(cutoff)?;

        let hit = messages.iter().find(|m| matcher.matches(m));
        if let Some(m) = hit {
            self.incident_log(&format!(
                "Matched message from {} at {}: {}",
                m.host,
                m.created_at.to_rfc3339(),
                m.message
            ));
        }

        self.state = ScanState::Scanned(hit.is_some());
        Ok(())
    }

    fn result(&self) -> Result<bool, ScanError> {
        match self.state {
            ScanState::Scanned(verdict) => Ok(verdict),
            ScanState::Unscanned => Err(ScanError::NotScannedYet),
        }
    }

    fn incident_log(&self, message: &str) {
        info!(
            description = %self.title,
            subtype = %self.condition.subtype,
            "{}",
            message
        );
    }
}

/// Evaluate a whole description: scan each condition as the fold needs it
/// and combine the verdicts.
pub fn evaluate_description(description: &IncidentDescription, source: &dyn MessageSource) -> Result<bool, ScanError> {
    aggregate(&description.conditions, |condition| {
        let mut scan = ConditionScan::new(description, condition, source);
        scan.scan()?;
        scan.result()
    })
}
