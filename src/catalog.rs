//! # In-Process Item Catalog
//!
//! An item catalog held in memory that serves both sides of the batch: it
//! answers the availability query ([`PagedQuerySource`]) with the same filter
//! and buildable-quantity rules as the database source, and it loads and
//! saves item records ([`EntityStore`]). Because both views share one set of
//! items, a stamped marker written through the store removes the item from
//! the next query, exactly as in production.
//!
//! Fault injection hooks (failing open, failing pages, failing saves, save
//! latency) let tests drive every error path of the coordinator.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::models::{ItemKind, QueryRow};
use crate::source::{
    buildable_quantity, ComponentAvailability, FilterSpec, PageHandle, PagedQuerySource,
    SourceError,
};
use crate::store::{Entity, EntityStore, StoreError};

/// One member line of an assembly
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentLine {
    pub item_id: String,
    pub quantity_per_unit: f64,
}

/// An item record as held by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub sku: String,
    pub kind: ItemKind,
    pub display_name: String,
    pub assembled_in_house: bool,
    /// Quantity available per location id
    pub location_quantities: HashMap<String, u32>,
    pub fields: HashMap<String, Value>,
    pub components: Vec<ComponentLine>,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        sku: impl Into<String>,
        kind: ItemKind,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            kind,
            display_name: display_name.into(),
            assembled_in_house: false,
            location_quantities: HashMap::new(),
            fields: HashMap::new(),
            components: Vec::new(),
        }
    }

    pub fn assembly(id: impl Into<String>, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, sku, ItemKind::Assembly, name).assembled_in_house(true)
    }

    pub fn part(id: impl Into<String>, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, sku, ItemKind::InventoryPart, name)
    }

    pub fn assembled_in_house(mut self, in_house: bool) -> Self {
        self.assembled_in_house = in_house;
        self
    }

    pub fn available_at(mut self, location_id: impl Into<String>, quantity: u32) -> Self {
        self.location_quantities.insert(location_id.into(), quantity);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_component(mut self, item_id: impl Into<String>, quantity_per_unit: f64) -> Self {
        self.components.push(ComponentLine {
            item_id: item_id.into(),
            quantity_per_unit,
        });
        self
    }
}

/// Whether a field value counts as populated for ISEMPTY/ISNOTEMPTY filters
fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

fn as_quantity(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => parse_decimal_quantity(text.trim()),
        _ => None,
    }
}

/// Plain `digits[.digits]` text, truncated toward zero
fn parse_decimal_quantity(text: &str) -> Option<u32> {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !fraction.map_or(true, digits) {
        return None;
    }
    whole.parse::<u32>().ok()
}

#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: RwLock<BTreeMap<String, CatalogItem>>,
    snapshots: DashMap<Uuid, Arc<Vec<QueryRow>>>,
    open_failure: Mutex<Option<String>>,
    page_failures: DashMap<usize, u32>,
    save_failures: DashMap<String, String>,
    save_latency: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    save_calls: AtomicUsize,
    saves_in_flight: AtomicUsize,
    max_saves_in_flight: AtomicUsize,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    pub fn insert(&self, item: CatalogItem) {
        self.items.write().insert(item.id.clone(), item);
    }

    pub fn item(&self, id: &str) -> Option<CatalogItem> {
        self.items.read().get(id).cloned()
    }

    pub fn field_value(&self, id: &str, field: &str) -> Option<Value> {
        self.items
            .read()
            .get(id)
            .and_then(|item| item.fields.get(field).cloned())
    }

    /// Make the next `open` fail with `SourceUnavailable`
    pub fn fail_open(&self, reason: impl Into<String>) {
        *self.open_failure.lock() = Some(reason.into());
    }

    /// Make the next `times` fetches of `page_index` fail
    pub fn fail_page(&self, page_index: usize, times: u32) {
        self.page_failures.insert(page_index, times);
    }

    /// Make every save of `entity_id` fail
    pub fn fail_save(&self, entity_id: impl Into<String>, reason: impl Into<String>) {
        self.save_failures.insert(entity_id.into(), reason.into());
    }

    /// Delay every save to simulate a slow store
    pub fn set_save_latency(&self, latency: Duration) {
        *self.save_latency.lock() = Some(latency);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Queries opened and not yet closed
    pub fn open_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Highest number of saves observed in flight at once
    pub fn max_saves_in_flight(&self) -> usize {
        self.max_saves_in_flight.load(Ordering::SeqCst)
    }

    /// Evaluate the availability query against the current items
    pub fn query(&self, filter: &FilterSpec) -> Vec<QueryRow> {
        let items = self.items.read();
        items
            .values()
            .filter_map(|item| Self::row_for(item, &items, filter))
            .collect()
    }

    fn row_for(
        item: &CatalogItem,
        items: &BTreeMap<String, CatalogItem>,
        filter: &FilterSpec,
    ) -> Option<QueryRow> {
        if !filter.item_kinds.contains(&item.kind) {
            return None;
        }
        if filter.assembled_in_house && !item.assembled_in_house {
            return None;
        }
        let available_quantity = *item.location_quantities.get(&filter.location_id)?;
        if is_populated(item.fields.get(&filter.marker_field)) {
            return None;
        }
        let threshold = item.fields.get(&filter.threshold_field);
        if !is_populated(threshold) {
            return None;
        }
        let Some(minimum_threshold) = threshold.and_then(as_quantity) else {
            debug!(
                item_id = %item.id,
                field = %filter.threshold_field,
                "Ignoring item with non-numeric minimum"
            );
            return None;
        };

        let components: Vec<ComponentAvailability> = item
            .components
            .iter()
            .filter_map(|line| {
                let member = items.get(&line.item_id)?;
                if !filter.component_kinds.contains(&member.kind) {
                    return None;
                }
                let available = *member
                    .location_quantities
                    .get(&filter.component_location_id)?;
                Some(ComponentAvailability {
                    available,
                    quantity_per_unit: line.quantity_per_unit,
                })
            })
            .collect();
        let buildable = buildable_quantity(&components)?;

        Some(QueryRow {
            entity_id: item.id.clone(),
            business_key: item.sku.clone(),
            kind: item.kind,
            display_name: item.display_name.clone(),
            available_quantity,
            minimum_threshold,
            buildable_quantity: buildable,
        })
    }
}

#[async_trait]
impl PagedQuerySource for ItemCatalog {
    fn source_name(&self) -> &'static str {
        "item_catalog"
    }

    async fn open(&self, filter: &FilterSpec) -> Result<PageHandle, SourceError> {
        if let Some(reason) = self.open_failure.lock().take() {
            return Err(SourceError::Unavailable(reason));
        }
        if filter.page_size == 0 {
            return Err(SourceError::Unavailable("page size must be positive".into()));
        }

        let rows = self.query(filter);
        let handle = PageHandle::new(filter.page_size, rows.len());
        self.snapshots.insert(handle.query_id, Arc::new(rows));
        Ok(handle)
    }

    async fn fetch(
        &self,
        handle: &PageHandle,
        page_index: usize,
    ) -> Result<Vec<QueryRow>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        handle.check_page(page_index)?;

        if let Some(mut remaining) = self.page_failures.get_mut(&page_index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SourceError::PageFetch {
                    page_index,
                    reason: "injected page failure".to_string(),
                });
            }
        }

        let snapshot = self
            .snapshots
            .get(&handle.query_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SourceError::UnknownHandle(handle.query_id))?;

        Ok(handle.pagination(page_index).slice(&snapshot).to_vec())
    }

    async fn close(&self, handle: &PageHandle) {
        self.snapshots.remove(&handle.query_id);
    }
}

#[async_trait]
impl EntityStore for ItemCatalog {
    async fn load(&self, kind: ItemKind, id: &str) -> Result<Entity, StoreError> {
        let items = self.items.read();
        match items.get(id) {
            Some(item) if item.kind == kind => {
                Ok(Entity::with_fields(kind, id, item.fields.clone()))
            }
            _ => Err(StoreError::NotFound {
                kind,
                entity_id: id.to_string(),
            }),
        }
    }

    async fn save(&self, entity: &Entity) -> Result<String, StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.saves_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_saves_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let latency = *self.save_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let result = self.write_changes(entity);
        self.saves_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ItemCatalog {
    fn write_changes(&self, entity: &Entity) -> Result<String, StoreError> {
        if let Some(reason) = self.save_failures.get(entity.id()) {
            return Err(StoreError::Persist {
                entity_id: entity.id().to_string(),
                reason: reason.value().clone(),
            });
        }

        let mut items = self.items.write();
        let item = items
            .get_mut(entity.id())
            .ok_or_else(|| StoreError::NotFound {
                kind: entity.kind(),
                entity_id: entity.id().to_string(),
            })?;
        for (name, value) in entity.changed_fields() {
            item.fields.insert(name.to_string(), value.clone());
        }
        Ok(item.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> ItemCatalog {
        ItemCatalog::with_items([
            CatalogItem::part("10", "P-BOLT", "Bolt").available_at("1", 40),
            CatalogItem::part("11", "P-NUT", "Nut").available_at("1", 9),
            CatalogItem::part("12", "P-REMOTE", "Remote part").available_at("2", 500),
            CatalogItem::assembly("100", "K-A100", "Pomade Kit")
                .available_at("1", 3)
                .with_field("notify_min_quantity", 5)
                .with_component("10", 4.0)
                .with_component("11", 6.0),
            // Already notified
            CatalogItem::assembly("101", "K-A101", "Gel Kit")
                .available_at("1", 0)
                .with_field("notify_min_quantity", 5)
                .with_field("notify_date_added", "2026-01-02")
                .with_component("10", 1.0),
            // No minimum configured
            CatalogItem::assembly("102", "K-A102", "Comb Kit")
                .available_at("1", 0)
                .with_component("10", 1.0),
            // Bought in, not assembled in-house
            CatalogItem::assembly("103", "K-A103", "Outsourced Kit")
                .assembled_in_house(false)
                .available_at("1", 0)
                .with_field("notify_min_quantity", 5)
                .with_component("10", 1.0),
            // Only component stocked at another location
            CatalogItem::assembly("104", "K-A104", "Remote Kit")
                .available_at("1", 0)
                .with_field("notify_min_quantity", 5)
                .with_component("12", 1.0),
        ])
    }

    #[test]
    fn test_query_applies_every_filter() {
        let rows = sample_catalog().query(&FilterSpec::default());
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.business_key, "K-A100");
        assert_eq!(row.available_quantity, 3);
        assert_eq!(row.minimum_threshold, 5);
        // min(round(40/4)=10, round(9/6)=2)
        assert_eq!(row.buildable_quantity, 2);
    }

    #[test]
    fn test_threshold_accepts_numeric_strings() {
        let catalog = ItemCatalog::with_items([
            CatalogItem::part("10", "P-BOLT", "Bolt").available_at("1", 4),
            CatalogItem::assembly("100", "K-A100", "Kit")
                .available_at("1", 1)
                .with_field("notify_min_quantity", "7")
                .with_component("10", 1.0),
        ]);
        let rows = catalog.query(&FilterSpec::default());
        assert_eq!(rows[0].minimum_threshold, 7);
    }

    #[test]
    fn test_decimal_threshold_truncates_like_the_database() {
        let catalog = ItemCatalog::with_items([
            CatalogItem::part("10", "P-BOLT", "Bolt").available_at("1", 4),
            CatalogItem::assembly("100", "K-A100", "Kit")
                .available_at("1", 1)
                .with_field("notify_min_quantity", "5.5")
                .with_component("10", 1.0),
            CatalogItem::assembly("101", "K-A101", "Kit")
                .available_at("1", 1)
                .with_field("notify_min_quantity", "5.")
                .with_component("10", 1.0),
            CatalogItem::assembly("102", "K-A102", "Kit")
                .available_at("1", 1)
                .with_field("notify_min_quantity", "-3")
                .with_component("10", 1.0),
        ]);
        let rows = catalog.query(&FilterSpec::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].business_key, "K-A100");
        assert_eq!(rows[0].minimum_threshold, 5);
    }

    #[tokio::test]
    async fn test_close_releases_snapshot() {
        let catalog = sample_catalog();
        let handle = catalog.open(&FilterSpec::default()).await.unwrap();
        assert_eq!(catalog.open_snapshots(), 1);

        catalog.close(&handle).await;

        assert_eq!(catalog.open_snapshots(), 0);
        let err = catalog.fetch(&handle, 0).await.unwrap_err();
        assert_eq!(err, SourceError::UnknownHandle(handle.query_id));
    }

    #[tokio::test]
    async fn test_pages_are_pinned_at_open() {
        let catalog = sample_catalog();
        let filter = FilterSpec {
            page_size: 1,
            ..FilterSpec::default()
        };
        let handle = catalog.open(&filter).await.unwrap();
        assert_eq!(catalog.page_count(&handle), 1);

        // Stamping the marker after open does not change the pinned page
        let mut entity = catalog.load(ItemKind::Assembly, "100").await.unwrap();
        entity.set_field("notify_date_added", "2026-10-19");
        catalog.save(&entity).await.unwrap();

        let page = catalog.fetch(&handle, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert!(catalog.query(&filter).is_empty());
    }

    #[tokio::test]
    async fn test_injected_page_failures_are_consumed() {
        let catalog = sample_catalog();
        let handle = catalog.open(&FilterSpec::default()).await.unwrap();
        catalog.fail_page(0, 1);

        let first = catalog.fetch(&handle, 0).await;
        assert!(matches!(first, Err(SourceError::PageFetch { page_index: 0, .. })));
        assert_eq!(catalog.fetch(&handle, 0).await.unwrap().len(), 1);
        assert_eq!(catalog.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_open_failure() {
        let catalog = sample_catalog();
        catalog.fail_open("search service down");
        let err = catalog.open(&FilterSpec::default()).await.unwrap_err();
        assert_eq!(err, SourceError::Unavailable("search service down".into()));
    }

    #[tokio::test]
    async fn test_load_checks_kind() {
        let catalog = sample_catalog();
        let err = catalog.load(ItemKind::Kit, "100").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_failure_leaves_item_untouched() {
        let catalog = sample_catalog();
        catalog.fail_save("100", "record locked");

        let mut entity = catalog.load(ItemKind::Assembly, "100").await.unwrap();
        entity.set_field("notify_date_added", "2026-10-19");
        let err = catalog.save(&entity).await.unwrap_err();

        assert!(matches!(err, StoreError::Persist { .. }));
        assert!(catalog.field_value("100", "notify_date_added").is_none());
    }
}
