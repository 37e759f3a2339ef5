//! Error types for the assembly notifier.
//!
//! Each collaborator boundary has its own error enum (`SourceError`,
//! `StoreError`, `NotificationError`, `ConfigurationError`); they all convert
//! into [`NotifierError`], which is what the job surfaces to its invoker.

use crate::config::ConfigurationError;
use crate::notification::NotificationError;
use crate::source::SourceError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotifierError {
    /// The query could not be opened. Fatal: nothing has been mutated yet.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Page {page_index} fetch failed: {reason}")]
    PageFetch { page_index: usize, reason: String },
    #[error("Failed to persist entity {entity_id}: {reason}")]
    MutationPersist { entity_id: String, reason: String },
    #[error("Entity not found: {kind} {entity_id}")]
    EntityNotFound { kind: String, entity_id: String },
    #[error("Notification send failed: {0}")]
    NotificationSend(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<SourceError> for NotifierError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Unavailable(reason) => NotifierError::SourceUnavailable(reason),
            SourceError::PageFetch { page_index, reason } => {
                NotifierError::PageFetch { page_index, reason }
            }
            SourceError::PageOutOfRange {
                page_index,
                page_count,
            } => NotifierError::PageFetch {
                page_index,
                reason: format!("page index out of range (page_count={page_count})"),
            },
            SourceError::UnknownHandle(query_id) => {
                NotifierError::InvalidState(format!("unknown page handle {query_id}"))
            }
        }
    }
}

impl From<StoreError> for NotifierError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { kind, entity_id } => NotifierError::EntityNotFound {
                kind: kind.to_string(),
                entity_id,
            },
            StoreError::Persist { entity_id, reason } => {
                NotifierError::MutationPersist { entity_id, reason }
            }
            StoreError::UnsupportedField { field, .. } => {
                NotifierError::Configuration(format!("unsupported entity field '{field}'"))
            }
            StoreError::Backend(reason) => NotifierError::Database(reason),
        }
    }
}

impl From<NotificationError> for NotifierError {
    fn from(error: NotificationError) -> Self {
        NotifierError::NotificationSend(error.to_string())
    }
}

impl From<ConfigurationError> for NotifierError {
    fn from(error: ConfigurationError) -> Self {
        NotifierError::Configuration(error.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for NotifierError {
    fn from(err: sqlx::Error) -> Self {
        NotifierError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifierError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    #[test]
    fn test_source_errors_map_to_taxonomy() {
        let fatal: NotifierError = SourceError::Unavailable("connection refused".into()).into();
        assert_eq!(
            fatal,
            NotifierError::SourceUnavailable("connection refused".into())
        );

        let page: NotifierError = SourceError::PageFetch {
            page_index: 3,
            reason: "timeout".into(),
        }
        .into();
        assert!(matches!(page, NotifierError::PageFetch { page_index: 3, .. }));
    }

    #[test]
    fn test_store_not_found_keeps_kind() {
        let err: NotifierError = StoreError::NotFound {
            kind: ItemKind::Assembly,
            entity_id: "42".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Entity not found: Assembly 42");
    }
}
