//! # Batch Result Accumulator
//!
//! Concurrent keyed accumulator written by every worker of a run. Successful
//! outcomes are keyed by business key; unsuccessful outcomes and page-level
//! faults go to an append-only failure list. Once every worker has finished,
//! the coordinator freezes it into an ordered, immutable [`FrozenBatchResult`].

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use super::{FailureDescriptor, MutationOutcome};

/// What happened when an outcome was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDisposition {
    /// First successful outcome for this key
    Recorded,
    /// Unsuccessful outcome, appended to the failure list
    Failed,
    /// Key already held an outcome from a different entity; last write wins
    /// and the displaced outcome is appended to the failure list
    DuplicateKey { previous_entity_id: String },
}

#[derive(Debug, Default)]
pub struct BatchResult {
    outcomes: DashMap<String, MutationOutcome>,
    failures: Mutex<Vec<FailureDescriptor>>,
    duplicate_keys: Mutex<Vec<String>>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal mutation outcome.
    ///
    /// A passing row lands in exactly one place: the keyed map on success, the
    /// failure list otherwise.
    pub fn record_outcome(&self, outcome: MutationOutcome) -> RecordDisposition {
        if !outcome.success {
            self.record_failure(FailureDescriptor::from_outcome(&outcome));
            return RecordDisposition::Failed;
        }

        let key = outcome.business_key.clone();
        let entity_id = outcome.entity_id.clone();
        match self.outcomes.insert(key.clone(), outcome) {
            Some(previous) if previous.entity_id != entity_id => {
                error!(
                    business_key = %key,
                    previous_entity_id = %previous.entity_id,
                    entity_id = %entity_id,
                    "Duplicate business key across entities - data source integrity defect"
                );
                self.duplicate_keys.lock().push(key);
                self.record_failure(FailureDescriptor::duplicate_key(&previous));
                RecordDisposition::DuplicateKey {
                    previous_entity_id: previous.entity_id,
                }
            }
            _ => RecordDisposition::Recorded,
        }
    }

    pub fn record_failure(&self, failure: FailureDescriptor) {
        self.failures.lock().push(failure);
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty() && self.failures.lock().is_empty()
    }

    /// Snapshot into an immutable, key-ordered result
    pub fn freeze(&self) -> FrozenBatchResult {
        let outcomes = self
            .outcomes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        FrozenBatchResult {
            outcomes,
            failures: self.failures.lock().clone(),
            duplicate_keys: self.duplicate_keys.lock().clone(),
        }
    }
}

/// Immutable view of a finished run, iterated in business-key order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrozenBatchResult {
    pub outcomes: BTreeMap<String, MutationOutcome>,
    pub failures: Vec<FailureDescriptor>,
    /// Keys that were written by more than one entity
    pub duplicate_keys: Vec<String>,
}

impl FrozenBatchResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn get(&self, business_key: &str) -> Option<&MutationOutcome> {
        self.outcomes.get(business_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MutationOutcome)> {
        self.outcomes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, ItemKind, QueryRow};
    use chrono::NaiveDate;

    fn row(entity_id: &str, key: &str) -> QueryRow {
        QueryRow {
            entity_id: entity_id.to_string(),
            business_key: key.to_string(),
            kind: ItemKind::Assembly,
            display_name: format!("Item {key}"),
            available_quantity: 1,
            minimum_threshold: 5,
            buildable_quantity: 2,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_success_and_failure_land_in_separate_places() {
        let result = BatchResult::new();
        assert!(result.is_empty());

        let ok = result.record_outcome(MutationOutcome::succeeded(row("1", "K-1"), today()));
        let bad = result.record_outcome(MutationOutcome::failed(
            row("2", "K-2"),
            today(),
            "save rejected",
        ));

        assert_eq!(ok, RecordDisposition::Recorded);
        assert_eq!(bad, RecordDisposition::Failed);

        let frozen = result.freeze();
        assert_eq!(frozen.success_count(), 1);
        assert!(frozen.get("K-2").is_none());
        assert_eq!(frozen.failures.len(), 1);
        assert_eq!(frozen.failures[0].kind, FailureKind::MutationPersist);
        assert_eq!(frozen.failures[0].detail, "save rejected");
    }

    #[test]
    fn test_duplicate_key_from_distinct_entity_is_detected() {
        let result = BatchResult::new();
        result.record_outcome(MutationOutcome::succeeded(row("1", "K-1"), today()));
        let disposition =
            result.record_outcome(MutationOutcome::succeeded(row("9", "K-1"), today()));

        assert_eq!(
            disposition,
            RecordDisposition::DuplicateKey {
                previous_entity_id: "1".to_string()
            }
        );

        let frozen = result.freeze();
        assert_eq!(frozen.success_count(), 1);
        assert_eq!(frozen.get("K-1").unwrap().entity_id, "9");
        assert_eq!(frozen.duplicate_keys, vec!["K-1".to_string()]);

        // The displaced entity is stamped too, so it must still be reported
        assert_eq!(frozen.failures.len(), 1);
        assert_eq!(frozen.failures[0].kind, FailureKind::DuplicateKey);
        assert_eq!(
            frozen.failures[0].origin,
            crate::models::FailureOrigin::Row {
                business_key: "K-1".to_string(),
                entity_id: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_frozen_iteration_is_key_ordered() {
        let result = BatchResult::new();
        for (id, key) in [("3", "K-C"), ("1", "K-A"), ("2", "K-B")] {
            result.record_outcome(MutationOutcome::succeeded(row(id, key), today()));
        }
        let keys: Vec<_> = result.freeze().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["K-A", "K-B", "K-C"]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_outcomes() {
        let result = std::sync::Arc::new(BatchResult::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let result = result.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("K-{i:03}");
                result.record_outcome(MutationOutcome::succeeded(
                    row(&i.to_string(), &key),
                    today(),
                ));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(result.success_count(), 64);
        assert_eq!(result.failure_count(), 0);
    }
}
