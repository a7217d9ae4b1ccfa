//! Load incident descriptions from the rule store.
//!
//! Malformed documents and condition elements are skipped, recorded in a
//! [`SkipReport`] and logged at info level. Only an unreachable store fails
//! the load.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::document::{
    extract_timerange, extract_title, parse_condition, validate_incident_document_structure, SkipReason,
};
use super::{IncidentDescription, LoadError};

/// Read access to the raw rule documents.
pub trait DescriptionStore {
    /// Return every stored rule document, in store iteration order.
    fn fetch_documents(&self) -> Result<Vec<Value>, LoadError>;
}

impl DescriptionStore for Vec<Value> {
    fn fetch_documents(&self) -> Result<Vec<Value>, LoadError> {
        Ok(self.clone())
    }
}

/// One skipped document or condition element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipEvent {
    /// Title of the owning description, when it could be read.
    pub description: Option<String>,
    /// Position of the rejected element in the `conditions` list.
    pub condition_index: Option<usize>,
    #[serde(serialize_with = "reason_as_string")]
    pub reason: SkipReason,
}

fn reason_as_string<S: serde::Serializer>(reason: &SkipReason, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&reason.to_string())
}

/// Collects every skip of a load call.
#[derive(Debug, Default, Serialize)]
pub struct SkipReport {
    pub events: Vec<SkipEvent>,
}

impl SkipReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Count of whole documents dropped.
    pub fn skipped_documents(&self) -> usize {
        self.events.iter().filter(|e| e.condition_index.is_none()).count()
    }

    /// Count of individual conditions dropped from otherwise valid documents.
    pub fn skipped_conditions(&self) -> usize {
        self.events.iter().filter(|e| e.condition_index.is_some()).count()
    }

    fn skip_document(&mut self, description: Option<&str>, reason: SkipReason) {
        info!(
            description = description.unwrap_or("<unnamed>"),
            %reason,
            "Skipping incident description"
        );
        self.events.push(SkipEvent {
            description: description.map(str::to_string),
            condition_index: None,
            reason,
        });
    }

    fn skip_condition(&mut self, description: &str, index: usize) {
        let reason = SkipReason::InvalidCondition;
        info!(description = %description, index, %reason, "Skipping incident condition");
        self.events.push(SkipEvent {
            description: Some(description.to_string()),
            condition_index: Some(index),
            reason,
        });
    }
}

/// Fetch all incident descriptions, dropping anything structurally unsound.
///
/// Returns descriptions in store order. An empty store yields an empty list.
pub fn fetch_incident_descriptions<S: DescriptionStore + ?Sized>(
    store: &S,
    report: &mut SkipReport,
) -> Result<Vec<IncidentDescription>, LoadError> {
    let documents = store.fetch_documents()?;
    debug!(count = documents.len(), "Fetched incident documents");

    let mut descriptions = Vec::with_capacity(documents.len());
    for doc in &documents {
        if let Some(description) = build_description(doc, report) {
            descriptions.push(description);
        }
    }

    info!(
        loaded = descriptions.len(),
        skipped = report.len(),
        "Incident descriptions loaded"
    );
    Ok(descriptions)
}

fn build_description(doc: &Value, report: &mut SkipReport) -> Option<IncidentDescription> {
    let name_hint = doc.get("name").and_then(Value::as_str);

    if !validate_incident_document_structure(doc) {
        report.skip_document(name_hint, SkipReason::IncompleteDocument);
        return None;
    }

    let title = match extract_title(doc) {
        Ok(t) => t,
        Err(reason) => {
            report.skip_document(None, reason);
            return None;
        }
    };

    let timerange = match extract_timerange(doc) {
        Ok(t) => t,
        Err(reason) => {
            report.skip_document(Some(&title), reason);
            return None;
        }
    };

    let elements = match doc.get("conditions").and_then(Value::as_array) {
        Some(list) => list,
        None => {
            report.skip_document(Some(&title), SkipReason::ConditionsNotAList);
            return None;
        }
    };

    let mut conditions = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match parse_condition(element) {
            Some(c) => conditions.push(c),
            None => report.skip_condition(&title, index),
        }
    }

    Some(IncidentDescription {
        title,
        timerange,
        conditions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::{Condition, ConditionValue, Connector, Subtype};
    use serde_json::json;

    struct DownStore;

    impl DescriptionStore for DownStore {
        fn fetch_documents(&self) -> Result<Vec<Value>, LoadError> {
            Err(LoadError::StoreUnavailable("connection refused".into()))
        }
    }

    fn good(name: &str) -> Value {
        json!({
            "name": name,
            "timerange": "60",
            "conditions": [{ "type": 0, "subtype": 1, "value": "timeout" }]
        })
    }

    #[test]
    fn test_disk_full_scenario() {
        let store = vec![json!({
            "name": "disk-full",
            "timerange": "300",
            "conditions": [{ "type": 1, "subtype": 3, "value": "ERROR" }]
        })];
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();

        assert!(report.is_empty());
        assert_eq!(
            loaded,
            vec![IncidentDescription {
                title: "disk-full".into(),
                timerange: 300,
                conditions: vec![Condition {
                    connector: Connector::Or,
                    subtype: Subtype::Severity,
                    value: ConditionValue::Text("ERROR".into()),
                }],
            }]
        );
    }

    #[test]
    fn test_partial_conditions_survive() {
        let store = vec![json!({
            "name": "mixed",
            "timerange": "120",
            "conditions": [
                { "type": 0, "subtype": 1, "value": "panic" },
                { "type": 7, "subtype": 1, "value": "bad connector" },
                { "type": 1, "subtype": 2, "value": "db01" }
            ]
        })];
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].conditions.len(), 2);
        assert_eq!(loaded[0].conditions[1].subtype, Subtype::Host);
        assert_eq!(report.len(), 1);
        assert_eq!(report.events[0].description.as_deref(), Some("mixed"));
        assert_eq!(report.events[0].condition_index, Some(1));
        assert_eq!(report.skipped_conditions(), 1);
    }

    #[test]
    fn test_missing_conditions_skips_document() {
        let store = vec![json!({ "name": "no-conditions", "timerange": "60" })];
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();

        assert!(loaded.is_empty());
        assert_eq!(report.len(), 1);
        assert_eq!(report.events[0].reason, SkipReason::IncompleteDocument);
        assert_eq!(report.events[0].description.as_deref(), Some("no-conditions"));
    }

    #[test]
    fn test_good_and_bad_documents() {
        let store = vec![
            good("a"),
            json!({ "timerange": "60", "conditions": [] }),
            good("b"),
            json!({ "name": "bad-range", "timerange": "soon", "conditions": [] }),
            json!({ "name": "not-a-list", "timerange": "60", "conditions": { "type": 0 } }),
            json!({ "name": "", "timerange": "60", "conditions": [] }),
            Value::Null,
            good("c"),
        ];
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();

        let titles: Vec<&str> = loaded.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert_eq!(report.skipped_documents(), 5);
        assert!(report
            .events
            .iter()
            .any(|e| e.reason == SkipReason::InvalidTimerange("soon".into())));
        assert!(report.events.iter().any(|e| e.reason == SkipReason::ConditionsNotAList));
        assert!(report.events.iter().any(|e| e.reason == SkipReason::InvalidTitle));
    }

    #[test]
    fn test_all_conditions_invalid_keeps_empty_description() {
        let store = vec![json!({
            "name": "hollow",
            "timerange": 30,
            "conditions": [{ "type": 0, "subtype": 1, "value": true }]
        })];
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].conditions.is_empty());
        assert_eq!(report.skipped_conditions(), 1);
    }

    #[test]
    fn test_empty_store() {
        let store: Vec<Value> = Vec::new();
        let mut report = SkipReport::new();
        let loaded = fetch_incident_descriptions(&store, &mut report).unwrap();
        assert!(loaded.is_empty());
        assert!(report.is_empty());
    }

    #[test]
    fn test_store_unavailable_propagates() {
        let mut report = SkipReport::new();
        let err = fetch_incident_descriptions(&DownStore, &mut report).unwrap_err();
        assert!(matches!(err, LoadError::StoreUnavailable(_)));
        assert!(report.is_empty());
    }

    /// Shared buffer the fmt subscriber writes into.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Load `store` under a capturing subscriber and return the emitted log lines.
    fn load_with_logs(store: Vec<Value>) -> Vec<String> {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut report = SkipReport::new();
            fetch_incident_descriptions(&store, &mut report).unwrap();
        });

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
    }

    fn count_containing(lines: &[String], needle: &str) -> usize {
        lines.iter().filter(|l| l.contains(needle)).count()
    }

    #[test]
    fn test_one_info_line_per_skipped_condition() {
        let lines = load_with_logs(vec![json!({
            "name": "auth-failures",
            "timerange": "600",
            "conditions": [
                { "type": 0, "subtype": 4, "value": "Failed password" },
                { "type": 0, "subtype": 2, "value": 42 },
                { "type": 1, "subtype": 3, "value": 2.0 }
            ]
        })]);

        let skips: Vec<&String> = lines
            .iter()
            .filter(|l| l.contains("Skipping incident condition"))
            .collect();
        assert_eq!(skips.len(), 1);
        assert!(skips[0].contains("INFO"));
        assert!(skips[0].contains("auth-failures"));
        assert_eq!(count_containing(&lines, "Skipping incident description"), 0);
    }

    #[test]
    fn test_one_info_line_per_skipped_document() {
        let lines = load_with_logs(vec![
            json!({ "name": "no-conditions", "timerange": "60" }),
            good("kept"),
        ]);

        let skips: Vec<&String> = lines
            .iter()
            .filter(|l| l.contains("Skipping incident description"))
            .collect();
        assert_eq!(skips.len(), 1);
        assert!(skips[0].contains("INFO"));
        assert!(skips[0].contains("no-conditions"));
        assert_eq!(count_containing(&lines, "Skipping incident condition"), 0);
    }
}
