//! # Report Aggregator
//!
//! Turns a finalized batch result into the alert: one table row per stamped
//! item in business-key order, failures logged and counted, and a single
//! notification when at least one row was stamped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::models::{FailureDescriptor, FrozenBatchResult};
use crate::notification::{html, Notification, NotificationError};

/// One line of the alert table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub business_key: String,
    pub name: String,
    pub available: u32,
    pub minimum: u32,
    pub buildable: u32,
    pub marker_date: NaiveDate,
}

/// Summary of one finalized run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Number of successfully stamped items
    pub row_count: usize,
    pub table_rows: Vec<TableRow>,
    pub any_failures: bool,
    pub failures: Vec<FailureDescriptor>,
    pub duplicate_keys: Vec<String>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

#[derive(Debug, Clone)]
pub struct ReportAggregator {
    config: NotificationConfig,
}

impl ReportAggregator {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Build the report. Every failure is logged here so operators see them
    /// even when no alert goes out.
    pub fn summarize(&self, result: &FrozenBatchResult) -> Report {
        for failure in &result.failures {
            tracing::error!(
                kind = %failure.kind,
                origin = %failure.origin,
                detail = %failure.detail,
                occurred_at = %failure.occurred_at.to_rfc3339(),
                "Batch failure"
            );
        }

        let table_rows: Vec<TableRow> = result
            .iter()
            .map(|(key, outcome)| TableRow {
                business_key: key.clone(),
                name: outcome.row.display_name.clone(),
                available: outcome.row.available_quantity,
                minimum: outcome.row.minimum_threshold,
                buildable: outcome.row.buildable_quantity,
                marker_date: outcome.marker_date,
            })
            .collect();

        let report = Report {
            row_count: table_rows.len(),
            table_rows,
            any_failures: result.has_failures(),
            failures: result.failures.clone(),
            duplicate_keys: result.duplicate_keys.clone(),
        };

        crate::log_notification!(info, "Report summarized",
            row_count: report.row_count,
            failures: report.failures.len(),
            duplicate_keys: report.duplicate_keys.len()
        );

        report
    }

    pub fn should_notify(&self, report: &Report) -> bool {
        report.row_count > 0
    }

    /// The alert for this report, or `None` when nothing was stamped
    pub fn notification(&self, report: &Report) -> Result<Option<Notification>, NotificationError> {
        if !self.should_notify(report) {
            return Ok(None);
        }

        Ok(Some(Notification {
            author: self.config.author.clone(),
            recipients: self.config.recipients.clone(),
            bcc: self.config.bcc.clone(),
            reply_to: self.config.reply_to.clone(),
            subject: self.config.subject_for(report.row_count),
            body_html: html::render_body(&report.table_rows)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchResult, FailureKind, ItemKind, MutationOutcome, QueryRow};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn row(entity_id: &str, key: &str, available: u32, minimum: u32) -> QueryRow {
        QueryRow {
            entity_id: entity_id.to_string(),
            business_key: key.to_string(),
            kind: ItemKind::Assembly,
            display_name: format!("Kit {key}"),
            available_quantity: available,
            minimum_threshold: minimum,
            buildable_quantity: 4,
        }
    }

    fn aggregator() -> ReportAggregator {
        ReportAggregator::new(NotificationConfig {
            recipients: vec!["planning@example.com".to_string()],
            bcc: vec!["ops@example.com".to_string()],
            reply_to: Some("noreply@example.com".to_string()),
            ..NotificationConfig::default()
        })
    }

    #[test]
    fn test_single_row_report() {
        let result = BatchResult::new();
        result.record_outcome(MutationOutcome::succeeded(row("42", "K-A100", 3, 5), date()));

        let aggregator = aggregator();
        let report = aggregator.summarize(&result.freeze());

        assert_eq!(report.row_count, 1);
        assert!(!report.any_failures);
        assert_eq!(
            report.table_rows[0],
            TableRow {
                business_key: "K-A100".to_string(),
                name: "Kit K-A100".to_string(),
                available: 3,
                minimum: 5,
                buildable: 4,
                marker_date: date(),
            }
        );

        let notification = aggregator.notification(&report).unwrap().unwrap();
        assert_eq!(
            notification.subject,
            "Alert: Main Warehouse Assemblies Below Availability Limit (1)"
        );
        assert_eq!(notification.bcc, vec!["ops@example.com"]);
        assert!(notification.body_html.contains("K-A100"));
    }

    #[test]
    fn test_rows_are_ordered_by_business_key() {
        let result = BatchResult::new();
        result.record_outcome(MutationOutcome::succeeded(row("2", "K-B", 1, 5), date()));
        result.record_outcome(MutationOutcome::succeeded(row("1", "K-A", 1, 5), date()));

        let report = aggregator().summarize(&result.freeze());
        let keys: Vec<&str> = report
            .table_rows
            .iter()
            .map(|r| r.business_key.as_str())
            .collect();
        assert_eq!(keys, vec!["K-A", "K-B"]);
    }

    #[test]
    fn test_failures_are_reported_but_not_tabled() {
        let result = BatchResult::new();
        result.record_outcome(MutationOutcome::succeeded(row("1", "K-A", 1, 5), date()));
        result.record_outcome(MutationOutcome::failed(
            row("2", "K-B", 1, 5),
            date(),
            "record locked",
        ));

        let report = aggregator().summarize(&result.freeze());

        assert_eq!(report.row_count, 1);
        assert!(report.any_failures);
        assert_eq!(report.failures[0].kind, FailureKind::MutationPersist);
        assert!(aggregator().should_notify(&report));
    }

    #[test]
    fn test_empty_result_sends_nothing() {
        let aggregator = aggregator();
        let report = aggregator.summarize(&FrozenBatchResult::default());
        assert!(report.is_empty());
        assert!(!aggregator.should_notify(&report));
        assert!(aggregator.notification(&report).unwrap().is_none());
    }

    #[test]
    fn test_failures_alone_do_not_notify() {
        let result = BatchResult::new();
        result.record_failure(FailureDescriptor::page_fetch(0, "timeout"));

        let aggregator = aggregator();
        let report = aggregator.summarize(&result.freeze());
        assert!(report.any_failures);
        assert!(aggregator.notification(&report).unwrap().is_none());
    }
}
