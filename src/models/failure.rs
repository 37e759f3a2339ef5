use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::MutationOutcome;

/// Where in the batch a failure originated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FailureOrigin {
    Page { page_index: usize },
    Row { business_key: String, entity_id: String },
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page { page_index } => write!(f, "page {page_index}"),
            Self::Row {
                business_key,
                entity_id,
            } => write!(f, "{business_key} (entity {entity_id})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Page could not be fetched after all retries
    PageFetch,
    /// Entity load or save failed
    MutationPersist,
    /// Entity id was offered a second time in the same run
    DuplicateEntity,
    /// Stamped entity displaced from the result by another entity with the
    /// same business key
    DuplicateKey,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageFetch => write!(f, "page_fetch"),
            Self::MutationPersist => write!(f, "mutation_persist"),
            Self::DuplicateEntity => write!(f, "duplicate_entity"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDescriptor {
    pub origin: FailureOrigin,
    pub kind: FailureKind,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl FailureDescriptor {
    pub fn page_fetch(page_index: usize, detail: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Page { page_index },
            kind: FailureKind::PageFetch,
            detail: detail.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn duplicate_entity(
        business_key: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            origin: FailureOrigin::Row {
                business_key: business_key.into(),
                entity_id: entity_id.into(),
            },
            kind: FailureKind::DuplicateEntity,
            detail: "entity already submitted for mutation in this run".to_string(),
            occurred_at: Utc::now(),
        }
    }

    /// Failure descriptor for a successful outcome that lost its business key
    /// to another entity. The entity is stamped, so it must be reported here.
    pub fn duplicate_key(displaced: &MutationOutcome) -> Self {
        Self {
            origin: FailureOrigin::Row {
                business_key: displaced.business_key.clone(),
                entity_id: displaced.entity_id.clone(),
            },
            kind: FailureKind::DuplicateKey,
            detail: format!(
                "business key shared with another entity; marker {} was written but the row was displaced",
                displaced.marker_date_string()
            ),
            occurred_at: Utc::now(),
        }
    }

    /// Failure descriptor for an unsuccessful mutation outcome
    pub fn from_outcome(outcome: &MutationOutcome) -> Self {
        Self {
            origin: FailureOrigin::Row {
                business_key: outcome.business_key.clone(),
                entity_id: outcome.entity_id.clone(),
            },
            kind: FailureKind::MutationPersist,
            detail: outcome
                .error_detail
                .clone()
                .unwrap_or_else(|| "unknown persistence failure".to_string()),
            occurred_at: outcome.applied_at,
        }
    }
}

impl fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.origin, self.detail)
    }
}
