use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::QueryRow;

/// Result of one marker mutation attempt.
///
/// Carries the row it was produced from so the report can be rendered from
/// outcomes alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub business_key: String,
    pub entity_id: String,
    pub applied_at: DateTime<Utc>,
    pub success: bool,
    pub error_detail: Option<String>,
    pub marker_date: NaiveDate,
    pub row: QueryRow,
}

impl MutationOutcome {
    pub fn succeeded(row: QueryRow, marker_date: NaiveDate) -> Self {
        Self {
            business_key: row.business_key.clone(),
            entity_id: row.entity_id.clone(),
            applied_at: Utc::now(),
            success: true,
            error_detail: None,
            marker_date,
            row,
        }
    }

    pub fn failed(row: QueryRow, marker_date: NaiveDate, error_detail: impl Into<String>) -> Self {
        Self {
            business_key: row.business_key.clone(),
            entity_id: row.entity_id.clone(),
            applied_at: Utc::now(),
            success: false,
            error_detail: Some(error_detail.into()),
            marker_date,
            row,
        }
    }

    /// Marker date as written to the entity (ISO 8601 calendar date)
    pub fn marker_date_string(&self) -> String {
        self.marker_date.format("%Y-%m-%d").to_string()
    }
}
