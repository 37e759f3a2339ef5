//! PostgreSQL availability query.
//!
//! `open` runs the filtered, grouped query once and pins the ordered item ids
//! that qualified. `fetch` re-reads one page of those ids with the buildable
//! formula, without re-applying the marker filter, so stamping items during
//! the run does not move rows between pages.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ItemKind, QueryRow};
use crate::source::{FilterSpec, PageHandle, PagedQuerySource, SourceError};

/// Matches a populated, non-negative numeric custom field value
const NUMERIC_PATTERN: &str = r"^[0-9]+(\.[0-9]+)?$";

const OPEN_SQL: &str = r#"
SELECT i.id
FROM items i
JOIN item_locations il ON il.item_id = i.id AND il.location_id = $1
JOIN item_members m ON m.parent_id = i.id
JOIN items c ON c.id = m.member_id AND c.item_kind = ANY($2)
JOIN item_locations cl ON cl.item_id = c.id AND cl.location_id = $3
WHERE i.item_kind = ANY($4)
  AND ($5 = FALSE OR i.assembled_in_house)
  AND BTRIM(i.custom_fields ->> $6) ~ $8
  AND NULLIF(BTRIM(i.custom_fields ->> $7), '') IS NULL
GROUP BY i.id
ORDER BY i.id
"#;

const PAGE_SQL: &str = r#"
SELECT
    i.id::TEXT AS entity_id,
    i.sku AS business_key,
    i.item_kind,
    i.display_name,
    il.quantity_available::BIGINT AS available_quantity,
    TRUNC((BTRIM(i.custom_fields ->> $5))::NUMERIC)::BIGINT AS minimum_threshold,
    MIN(
        CASE WHEN m.quantity > 0
             THEN ROUND(GREATEST(cl.quantity_available, 0)::NUMERIC / m.quantity)
             ELSE 0
        END
    )::BIGINT AS buildable_quantity
FROM items i
JOIN item_locations il ON il.item_id = i.id AND il.location_id = $2
JOIN item_members m ON m.parent_id = i.id
JOIN items c ON c.id = m.member_id AND c.item_kind = ANY($3)
JOIN item_locations cl ON cl.item_id = c.id AND cl.location_id = $4
WHERE i.id = ANY($1)
GROUP BY i.id, i.sku, i.item_kind, i.display_name, il.quantity_available
ORDER BY i.id
"#;

#[derive(Debug, FromRow)]
struct AvailabilityRow {
    entity_id: String,
    business_key: String,
    item_kind: String,
    display_name: String,
    available_quantity: i64,
    minimum_threshold: i64,
    buildable_quantity: i64,
}

fn clamp_quantity(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl AvailabilityRow {
    fn into_query_row(self, page_index: usize) -> Result<QueryRow, SourceError> {
        let kind: ItemKind = self
            .item_kind
            .parse()
            .map_err(|reason: String| SourceError::PageFetch {
                page_index,
                reason: format!("item {}: {reason}", self.entity_id),
            })?;

        Ok(QueryRow {
            entity_id: self.entity_id,
            business_key: self.business_key,
            kind,
            display_name: self.display_name,
            available_quantity: clamp_quantity(self.available_quantity),
            minimum_threshold: clamp_quantity(self.minimum_threshold),
            buildable_quantity: clamp_quantity(self.buildable_quantity),
        })
    }
}

/// Ids and filter pinned by `open`
#[derive(Debug)]
struct PinnedQuery {
    filter: FilterSpec,
    ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct PgItemSource {
    pool: PgPool,
    pinned: Arc<DashMap<Uuid, Arc<PinnedQuery>>>,
}

impl PgItemSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            pinned: Arc::new(DashMap::new()),
        }
    }

    /// Queries opened and not yet closed
    pub fn open_queries(&self) -> usize {
        self.pinned.len()
    }
}

fn kind_codes(kinds: &[ItemKind]) -> Vec<String> {
    kinds.iter().map(|kind| kind.code().to_string()).collect()
}

#[async_trait]
impl PagedQuerySource for PgItemSource {
    fn source_name(&self) -> &'static str {
        "postgres_items"
    }

    async fn open(&self, filter: &FilterSpec) -> Result<PageHandle, SourceError> {
        if filter.page_size == 0 {
            return Err(SourceError::Unavailable("page size must be positive".into()));
        }

        let ids: Vec<i64> = sqlx::query_scalar(OPEN_SQL)
            .bind(&filter.location_id)
            .bind(kind_codes(&filter.component_kinds))
            .bind(&filter.component_location_id)
            .bind(kind_codes(&filter.item_kinds))
            .bind(filter.assembled_in_house)
            .bind(&filter.threshold_field)
            .bind(&filter.marker_field)
            .bind(NUMERIC_PATTERN)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let handle = PageHandle::new(filter.page_size, ids.len());
        tracing::debug!(
            query_id = %handle.query_id,
            total_rows = handle.total_rows,
            page_count = handle.page_count,
            "Availability query pinned"
        );
        self.pinned.insert(
            handle.query_id,
            Arc::new(PinnedQuery {
                filter: filter.clone(),
                ids,
            }),
        );
        Ok(handle)
    }

    async fn fetch(
        &self,
        handle: &PageHandle,
        page_index: usize,
    ) -> Result<Vec<QueryRow>, SourceError> {
        handle.check_page(page_index)?;

        let pinned = self
            .pinned
            .get(&handle.query_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SourceError::UnknownHandle(handle.query_id))?;
        let page_ids = handle.pagination(page_index).slice(&pinned.ids).to_vec();
        let filter = &pinned.filter;

        let rows: Vec<AvailabilityRow> = sqlx::query_as::<_, AvailabilityRow>(PAGE_SQL)
            .bind(page_ids)
            .bind(&filter.location_id)
            .bind(kind_codes(&filter.component_kinds))
            .bind(&filter.component_location_id)
            .bind(&filter.threshold_field)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::PageFetch {
                page_index,
                reason: e.to_string(),
            })?;

        rows.into_iter()
            .map(|row| row.into_query_row(page_index))
            .collect()
    }

    async fn close(&self, handle: &PageHandle) {
        self.pinned.remove(&handle.query_id);
    }
}
