//! # Paged Query Source
//!
//! The item availability query the batch ingests. A source is opened once per
//! run with a [`FilterSpec`], reports how many fixed-size pages the result
//! has, and serves those pages independently so they can be fetched
//! concurrently.
//!
//! Implementations must pin the row set at [`PagedQuerySource::open`]: the
//! batch stamps the marker field on rows as it goes, which removes them from
//! the filter, and live offset paging would then skip rows on later pages.

pub mod formula;
pub mod pagination;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::models::{ItemKind, QueryRow};

pub use formula::{buildable_quantity, ComponentAvailability};
pub use pagination::Pagination;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The query could not be opened at all
    #[error("query source unavailable: {0}")]
    Unavailable(String),
    /// One page failed; retryable
    #[error("failed to fetch page {page_index}: {reason}")]
    PageFetch { page_index: usize, reason: String },
    #[error("page {page_index} out of range (page_count={page_count})")]
    PageOutOfRange { page_index: usize, page_count: usize },
    #[error("unknown page handle {0}")]
    UnknownHandle(Uuid),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PageFetch { .. })
    }
}

/// Filters applied by the availability query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub item_kinds: Vec<ItemKind>,
    pub location_id: String,
    pub assembled_in_house: bool,
    /// Must be populated on the item
    pub threshold_field: String,
    /// Must be empty on the item; stamped items were already notified
    pub marker_field: String,
    /// Component join filters used by the buildable formula
    pub component_kinds: Vec<ItemKind>,
    pub component_location_id: String,
    pub page_size: usize,
}

impl FilterSpec {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            item_kinds: config.item_kinds.clone(),
            location_id: config.location_id.clone(),
            assembled_in_house: config.assembled_in_house,
            threshold_field: config.threshold_field.clone(),
            marker_field: config.marker_field.clone(),
            component_kinds: config.component_kinds.clone(),
            component_location_id: config.component_location().to_string(),
            page_size: config.page_size,
        }
    }
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

/// An opened query: identity plus page plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHandle {
    pub query_id: Uuid,
    pub page_size: usize,
    pub total_rows: usize,
    pub page_count: usize,
}

impl PageHandle {
    pub fn new(page_size: usize, total_rows: usize) -> Self {
        let pagination = Pagination::new(1, page_size);
        Self {
            query_id: Uuid::new_v4(),
            page_size,
            total_rows,
            page_count: pagination.total_pages(total_rows),
        }
    }

    /// Pagination window for a zero-based page index
    pub fn pagination(&self, page_index: usize) -> Pagination {
        Pagination::new(page_index + 1, self.page_size)
    }

    pub fn check_page(&self, page_index: usize) -> Result<(), SourceError> {
        if page_index >= self.page_count {
            return Err(SourceError::PageOutOfRange {
                page_index,
                page_count: self.page_count,
            });
        }
        Ok(())
    }
}

/// Paginated item availability query
#[async_trait]
pub trait PagedQuerySource: Send + Sync {
    /// Source name for logging
    fn source_name(&self) -> &'static str;

    /// Run the query and pin its row set
    async fn open(&self, filter: &FilterSpec) -> Result<PageHandle, SourceError>;

    /// Number of pages in an opened query
    fn page_count(&self, handle: &PageHandle) -> usize {
        handle.page_count
    }

    /// Fetch one page (zero-based)
    async fn fetch(
        &self,
        handle: &PageHandle,
        page_index: usize,
    ) -> Result<Vec<QueryRow>, SourceError>;

    /// Release whatever `open` pinned for this handle. Called once every page
    /// has been processed; later fetches on the handle fail.
    async fn close(&self, _handle: &PageHandle) {}
}
