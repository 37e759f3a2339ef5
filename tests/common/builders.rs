//! Catalog fixtures and job wiring shared by the integration tests

use assembly_notifier::catalog::{CatalogItem, ItemCatalog};
use assembly_notifier::config::NotifierConfig;
use assembly_notifier::orchestration::{AssemblyNotificationJob, RowEvaluator};
use chrono::NaiveDate;
use std::sync::Arc;

use super::RecordingSink;

pub const LOCATION: &str = "1";
pub const THRESHOLD_FIELD: &str = "notify_min_quantity";
pub const MARKER_FIELD: &str = "notify_date_added";

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

/// Config with fast retries and a single recipient
pub fn test_config() -> NotifierConfig {
    let mut config = NotifierConfig::default();
    config.notification.recipients = vec!["planning@example.com".to_string()];
    config.notification.bcc = vec!["ops@example.com".to_string()];
    config.batch.retry_backoff_ms = 1;
    config.batch.max_backoff_ms = 2;
    config
}

/// Catalog holding one plentiful component part (id "1")
pub fn catalog_with_component() -> ItemCatalog {
    let catalog = ItemCatalog::new();
    catalog.insert(CatalogItem::part("1", "P-TIN", "Tin").available_at(LOCATION, 40));
    catalog
}

/// In-house assembly built from component "1", ten per unit
pub fn assembly(id: &str, sku: &str, available: u32, minimum: u32) -> CatalogItem {
    CatalogItem::assembly(id, sku, format!("Kit {sku}"))
        .available_at(LOCATION, available)
        .with_field(THRESHOLD_FIELD, minimum)
        .with_component("1", 10.0)
}

pub fn job_for(
    catalog: &Arc<ItemCatalog>,
    sink: &Arc<RecordingSink>,
    config: &NotifierConfig,
) -> AssemblyNotificationJob {
    AssemblyNotificationJob::with_evaluator(
        config,
        catalog.clone(),
        catalog.clone(),
        sink.clone(),
        RowEvaluator::fixed(run_date()),
    )
}
