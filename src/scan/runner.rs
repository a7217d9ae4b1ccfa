//! One scan cycle over a set of incident descriptions.

use std::sync::Arc;
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{evaluate_description, MessageSource, ScanError};
use crate::config::ScanConfig;
use crate::incidents::IncidentDescription;

/// Outcome of evaluating one description in a cycle.
#[derive(Debug)]
pub struct DescriptionReport {
    pub title: String,
    pub conditions: usize,
    /// `Ok(true)` fires an incident, `Ok(false)` is clear, `Err` means the
    /// check could not run.
    pub outcome: Result<bool, ScanError>,
}

impl DescriptionReport {
    pub fn fired(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }

    pub fn status(&self) -> &'static str {
        match self.outcome {
            Ok(true) => "incident",
            Ok(false) => "clear",
            Err(_) => "failed",
        }
    }
}

impl Serialize for DescriptionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DescriptionReport", 4)?;
        s.serialize_field("title", &self.title)?;
        s.serialize_field("conditions", &self.conditions)?;
        s.serialize_field("status", self.status())?;
        let error = self.outcome.as_ref().err().map(|e| e.to_string());
        s.serialize_field("error", &error)?;
        s.end()
    }
}

/// Runs every description of a cycle on the blocking pool, at most
/// `parallelism` at a time, each bounded by `timeout`.
#[derive(Clone)]
pub struct ScanRunner {
    source: Arc<dyn MessageSource>,
    parallelism: usize,
    timeout: Duration,
}

impl ScanRunner {
    pub fn new(source: Arc<dyn MessageSource>, parallelism: usize, timeout: Duration) -> Self {
        Self {
            source,
            parallelism: parallelism.max(1),
            timeout,
        }
    }

    pub fn from_config(source: Arc<dyn MessageSource>, config: &ScanConfig) -> Self {
        Self::new(source, config.parallelism, Duration::from_secs(config.timeout_secs))
    }

    /// Evaluate all descriptions. Reports come back in input order.
    pub async fn run_cycle(&self, descriptions: Vec<IncidentDescription>) -> Vec<DescriptionReport> {
        let cycle = Uuid::new_v4();
        info!(%cycle, descriptions = descriptions.len(), "Starting scan cycle");

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let tasks = descriptions.into_iter().map(|description| {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.timeout;
            async move {
                let title = description.title.clone();
                let conditions = description.conditions.len();
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        // The permit lives as long as the blocking work, so a timed-out
                        // scan keeps its slot until the thread actually returns.
                        let handle = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            evaluate_description(&description, source.as_ref())
                        });
                        match tokio::time::timeout(timeout, handle).await {
                            Ok(Ok(result)) => result,
                            Ok(Err(join_err)) => Err(ScanError::Aborted(join_err.to_string())),
                            Err(_) => Err(ScanError::TimedOut { after: timeout }),
                        }
                    }
                    Err(e) => Err(ScanError::Aborted(e.to_string())),
                };
                DescriptionReport {
                    title,
                    conditions,
                    outcome,
                }
            }
        });

        let reports = futures::future::join_all(tasks).await;

        for report in &reports {
            match &report.outcome {
                Ok(true) => warn!(%cycle, description = %report.title, "Incident condition met"),
                Ok(false) => debug!(%cycle, description = %report.title, "No incident"),
                Err(e) => error!(%cycle, description = %report.title, "Scan failed: {}", e),
            }
        }

        let fired = reports.iter().filter(|r| r.fired()).count();
        let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
        info!(%cycle, fired, failed, total = reports.len(), "Scan cycle finished");

        reports
    }
}
