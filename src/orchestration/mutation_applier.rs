//! # Mutation Applier
//!
//! Stamps the marker field on one qualifying entity and persists it. Every
//! load or save error is folded into an unsuccessful [`MutationOutcome`]; the
//! applier never retries and never fails the batch. Submitting each entity
//! at most once per run is the coordinator's job.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::models::{MutationOutcome, QueryRow};
use crate::store::{EntityStore, StoreError};

#[derive(Clone)]
pub struct MutationApplier {
    store: Arc<dyn EntityStore>,
    marker_field: String,
}

impl MutationApplier {
    pub fn new(store: Arc<dyn EntityStore>, marker_field: impl Into<String>) -> Self {
        Self {
            store,
            marker_field: marker_field.into(),
        }
    }

    pub fn marker_field(&self) -> &str {
        &self.marker_field
    }

    #[instrument(skip(self, row), fields(business_key = %row.business_key, entity_id = %row.entity_id))]
    pub async fn apply(&self, row: &QueryRow, marker_date: NaiveDate) -> MutationOutcome {
        let started = Instant::now();
        match self.stamp(row, marker_date).await {
            Ok(saved_id) => {
                crate::log_mutation!(debug, "Marker stamped",
                    business_key: row.business_key,
                    entity_id: saved_id,
                    marker_date: marker_date.to_string(),
                    duration_ms: started.elapsed().as_millis()
                );
                MutationOutcome::succeeded(row.clone(), marker_date)
            }
            Err(error) => {
                crate::log_mutation!(warn, "Marker mutation failed",
                    business_key: row.business_key,
                    entity_id: row.entity_id,
                    error: error.to_string(),
                    duration_ms: started.elapsed().as_millis()
                );
                MutationOutcome::failed(row.clone(), marker_date, error.to_string())
            }
        }
    }

    async fn stamp(&self, row: &QueryRow, marker_date: NaiveDate) -> Result<String, StoreError> {
        let mut entity = self.store.load(row.kind, &row.entity_id).await?;
        entity.set_field(
            self.marker_field.clone(),
            marker_date.format("%Y-%m-%d").to_string(),
        );
        self.store.save(&entity).await
    }
}

impl std::fmt::Debug for MutationApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationApplier")
            .field("marker_field", &self.marker_field)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogItem, ItemCatalog};
    use crate::models::ItemKind;
    use serde_json::Value;

    fn catalog() -> Arc<ItemCatalog> {
        Arc::new(ItemCatalog::with_items([CatalogItem::assembly(
            "100", "K-A100", "Pomade Kit",
        )
        .available_at("1", 3)
        .with_field("notify_min_quantity", 5)]))
    }

    fn row() -> QueryRow {
        QueryRow {
            entity_id: "100".to_string(),
            business_key: "K-A100".to_string(),
            kind: ItemKind::Assembly,
            display_name: "Pomade Kit".to_string(),
            available_quantity: 3,
            minimum_threshold: 5,
            buildable_quantity: 1,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[tokio::test]
    async fn test_apply_stamps_marker() {
        let catalog = catalog();
        let applier = MutationApplier::new(catalog.clone(), "notify_date_added");

        let outcome = applier.apply(&row(), date()).await;

        assert!(outcome.success);
        assert_eq!(outcome.business_key, "K-A100");
        assert_eq!(outcome.marker_date_string(), "2026-10-19");
        assert_eq!(
            catalog.field_value("100", "notify_date_added"),
            Some(Value::from("2026-10-19"))
        );
    }

    #[tokio::test]
    async fn test_persist_failure_becomes_failed_outcome() {
        let catalog = catalog();
        catalog.fail_save("100", "record locked by another user");
        let applier = MutationApplier::new(catalog.clone(), "notify_date_added");

        let outcome = applier.apply(&row(), date()).await;

        assert!(!outcome.success);
        assert!(outcome
            .error_detail
            .as_deref()
            .unwrap()
            .contains("record locked by another user"));
    }

    #[tokio::test]
    async fn test_missing_entity_becomes_failed_outcome() {
        let applier = MutationApplier::new(Arc::new(ItemCatalog::new()), "notify_date_added");
        let outcome = applier.apply(&row(), date()).await;
        assert!(!outcome.success);
        assert!(outcome.error_detail.unwrap().contains("not found"));
    }
}
