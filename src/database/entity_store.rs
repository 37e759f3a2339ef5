//! PostgreSQL entity store over `items.custom_fields`.
//!
//! Only fields named at construction may be written; the notifier passes its
//! marker field so nothing else on the item can change.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeSet, HashMap};

use crate::models::ItemKind;
use crate::store::{Entity, EntityStore, StoreError};

#[derive(Debug, FromRow)]
struct ItemRecord {
    item_kind: String,
    custom_fields: Json<HashMap<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
    writable_fields: BTreeSet<String>,
}

impl PgEntityStore {
    pub fn new(pool: PgPool, writable_fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            pool,
            writable_fields: writable_fields.into_iter().map(Into::into).collect(),
        }
    }

    fn parse_id(kind: ItemKind, id: &str) -> Result<i64, StoreError> {
        id.parse().map_err(|_| StoreError::NotFound {
            kind,
            entity_id: id.to_string(),
        })
    }

    fn changes(&self, entity: &Entity) -> Result<Map<String, Value>, StoreError> {
        let mut changes = Map::new();
        for (field, value) in entity.changed_fields() {
            if !self.writable_fields.contains(field) {
                return Err(StoreError::UnsupportedField {
                    kind: entity.kind(),
                    field: field.to_string(),
                });
            }
            changes.insert(field.to_string(), value.clone());
        }
        Ok(changes)
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn load(&self, kind: ItemKind, id: &str) -> Result<Entity, StoreError> {
        let item_id = Self::parse_id(kind, id)?;

        let record: Option<ItemRecord> =
            sqlx::query_as("SELECT item_kind, custom_fields FROM items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

        match record {
            Some(record) if record.item_kind == kind.code() => {
                Ok(Entity::with_fields(kind, id, record.custom_fields.0))
            }
            _ => Err(StoreError::NotFound {
                kind,
                entity_id: id.to_string(),
            }),
        }
    }

    async fn save(&self, entity: &Entity) -> Result<String, StoreError> {
        let item_id = Self::parse_id(entity.kind(), entity.id())?;
        let changes = self.changes(entity)?;
        if changes.is_empty() {
            return Ok(entity.id().to_string());
        }

        let result = sqlx::query(
            "UPDATE items SET custom_fields = custom_fields || $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(item_id)
        .bind(Json(Value::Object(changes)))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Persist {
            entity_id: entity.id().to_string(),
            reason: e.to_string(),
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: entity.kind(),
                entity_id: entity.id().to_string(),
            });
        }

        Ok(entity.id().to_string())
    }
}
