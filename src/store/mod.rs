//! # Entity Store
//!
//! Narrow load/modify/save interface to the ERP record store. The notifier
//! only ever changes one field per entity, but the interface is field-generic
//! so stores can reject fields they do not know how to persist.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::models::ItemKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{kind} {entity_id} not found")]
    NotFound { kind: ItemKind, entity_id: String },
    #[error("failed to save {entity_id}: {reason}")]
    Persist { entity_id: String, reason: String },
    #[error("field '{field}' cannot be written on {kind}")]
    UnsupportedField { kind: ItemKind, field: String },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A loaded record with tracked field changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    kind: ItemKind,
    id: String,
    fields: HashMap<String, Value>,
    #[serde(skip)]
    changed: BTreeSet<String>,
}

impl Entity {
    /// Build an entity from stored values, with no pending changes
    pub fn with_fields(kind: ItemKind, id: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        Self {
            kind,
            id: id.into(),
            fields,
            changed: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.fields.insert(name.clone(), value.into());
        self.changed.insert(name);
    }

    /// Fields set since load, in name order
    pub fn changed_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.changed
            .iter()
            .filter_map(|name| self.fields.get(name).map(|value| (name.as_str(), value)))
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Record store used by the mutation applier. `save` may block on I/O.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load(&self, kind: ItemKind, id: &str) -> Result<Entity, StoreError>;

    /// Persist changed fields; returns the saved entity id
    async fn save(&self, entity: &Entity) -> Result<String, StoreError>;
}
