use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::domain::{Record, STRAIN, TIMESTAMP};
use crate::error::VdbError;
use crate::normalize::NormalizedIndex;

/// Fields that never make a stored record dirty.
const IGNORED_ON_UPDATE: &[&str] = &[STRAIN, TIMESTAMP];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub to_insert: Vec<Record>,
    pub to_update: Vec<Record>,
    pub merged: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    fallback_timestamp: Value,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(chrono::Utc::now().timestamp())
    }
}

impl Reconciler {
    /// `fallback_timestamp` is stamped on updated records whose incoming
    /// counterpart carries no timestamp of its own.
    pub fn new(fallback_timestamp: impl Into<Value>) -> Self {
        Self {
            fallback_timestamp: fallback_timestamp.into(),
        }
    }

    pub fn reconcile(
        &self,
        incoming: Vec<Record>,
        existing: &IndexMap<String, Record>,
        index: &NormalizedIndex,
    ) -> Result<ReconcileOutcome, VdbError> {
        let mut matched: IndexMap<String, Record> = IndexMap::new();
        let mut to_insert: IndexMap<String, Record> = IndexMap::new();
        let mut merged = 0;

        for record in incoming {
            let strain = record.strain()?.to_string();
            let effective = index
                .lookup(&strain)
                .map(str::to_string)
                .unwrap_or_else(|| strain.clone());

            if existing.contains_key(&effective) {
                matched.insert(effective, record);
            } else if let Some(pending) = to_insert.get_mut(&effective) {
                let added = pending.merge_missing(&record);
                debug!(strain = %effective, added, "merged duplicate incoming record");
                merged += 1;
            } else {
                to_insert.insert(strain, record);
            }
        }

        let mut to_update = Vec::new();
        let mut unchanged = 0;
        for (db_strain, update) in matched {
            let Some(stored) = existing.get(&db_strain) else {
                continue;
            };
            let mut document = stored.clone();
            if apply_changes(&mut document, &update) {
                let stamp = update
                    .get(TIMESTAMP)
                    .cloned()
                    .unwrap_or_else(|| self.fallback_timestamp.clone());
                document.insert(TIMESTAMP, stamp);
                to_update.push(document);
            } else {
                unchanged += 1;
            }
        }

        Ok(ReconcileOutcome {
            to_insert: to_insert.into_values().collect(),
            to_update,
            merged,
            unchanged,
        })
    }
}

pub fn index_by_strain(records: Vec<Record>) -> Result<IndexMap<String, Record>, VdbError> {
    let mut by_strain = IndexMap::with_capacity(records.len());
    for record in records {
        let strain = record.strain()?.to_string();
        by_strain.insert(strain, record);
    }
    Ok(by_strain)
}

fn apply_changes(document: &mut Record, update: &Record) -> bool {
    let mut dirty = false;
    for (field, value) in update.fields() {
        if value.is_null() || IGNORED_ON_UPDATE.contains(&field.as_str()) {
            continue;
        }
        if document.get(field) != Some(value) {
            document.insert(field.clone(), value.clone());
            dirty = true;
        }
    }
    dirty
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_incoming_values_do_not_erase() {
        let mut stored: Record = [("strain", json!("A1")), ("country", json!("brazil"))]
            .into_iter()
            .collect();
        let update: Record = [("strain", json!("A1")), ("country", Value::Null)]
            .into_iter()
            .collect();
        assert!(!apply_changes(&mut stored, &update));
        assert_eq!(stored.get_str("country"), Some("brazil"));
    }

    #[test]
    fn last_incoming_wins_for_same_stored_strain() {
        let stored: Record = [("strain", json!("A1")), ("country", json!("peru"))]
            .into_iter()
            .collect();
        let existing = index_by_strain(vec![stored]).unwrap();
        let index = NormalizedIndex::build(existing.values()).unwrap();
        let first: Record = [("strain", json!("A1")), ("country", json!("chile"))]
            .into_iter()
            .collect();
        let second: Record = [("strain", json!("A1")), ("country", json!("bolivia"))]
            .into_iter()
            .collect();

        let outcome = Reconciler::new(7)
            .reconcile(vec![first, second], &existing, &index)
            .unwrap();
        assert_eq!(outcome.to_update.len(), 1);
        assert_eq!(outcome.to_update[0].get_str("country"), Some("bolivia"));
        assert_eq!(outcome.to_update[0].get("timestamp"), Some(&json!(7)));
    }
}
