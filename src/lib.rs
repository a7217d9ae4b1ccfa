//! logwatch-incidents -- rule-driven incident checks over recent log messages.
//!
//! Incident descriptions are stored as JSON documents. Each load validates
//! them, drops what is malformed, and each scan cycle evaluates the
//! remaining descriptions' conditions against the log messages inside their
//! time window.

pub mod config;
pub mod incidents;
pub mod scan;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::incidents::{IncidentDescription, SkipReport};
use crate::scan::{DescriptionReport, ScanRunner};
use crate::storage::SqliteStore;

/// Result of one `check` invocation.
#[derive(Debug, serde::Serialize)]
pub struct CheckOutcome {
    pub reports: Vec<DescriptionReport>,
    pub skipped: SkipReport,
}

/// Open the configured database.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    tracing::info!(db_path = %config.storage.db_path.display(), "Opening database");
    let pool = storage::open_pool(&config.storage.db_path)?;
    Ok(SqliteStore::new(pool))
}

/// Load all valid incident descriptions from the store.
pub async fn load_descriptions(store: &SqliteStore) -> Result<(Vec<IncidentDescription>, SkipReport)> {
    let store = store.clone();
    tokio::task::spawn_blocking(move || -> Result<(Vec<IncidentDescription>, SkipReport)> {
        let mut report = SkipReport::new();
        let descriptions = incidents::fetch_incident_descriptions(&store, &mut report)?;
        Ok((descriptions, report))
    })
    .await
    .context("description loader task failed")?
}

/// Load descriptions and run one scan cycle over them.
pub async fn run_check(config: &Config) -> Result<CheckOutcome> {
    let store = open_store(config)?;
    let (descriptions, skipped) = load_descriptions(&store).await?;

    let runner = ScanRunner::from_config(Arc::new(store), &config.scan);
    let reports = runner.run_cycle(descriptions).await;

    Ok(CheckOutcome { reports, skipped })
}
