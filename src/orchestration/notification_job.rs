//! # Assembly Notification Job
//!
//! One-shot entry point for a scheduled run. Wires the batch coordinator, the
//! report aggregator and a notification sink together and returns a single
//! [`JobOutcome`].
//!
//! Failure policy: only an unavailable source fails the job. Page and row
//! failures are carried in the report, and a failed send is logged and
//! reported without touching the markers already written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::batch_coordinator::{BatchCoordinator, RunStats};
use super::mutation_applier::MutationApplier;
use super::report_aggregator::{Report, ReportAggregator};
use super::row_evaluator::RowEvaluator;
use crate::config::NotifierConfig;
use crate::error::{NotifierError, Result};
use crate::notification::{NotificationError, NotificationSink};
use crate::source::{FilterSpec, PagedQuerySource};
use crate::state_machine::BatchState;
use crate::store::EntityStore;

/// What happened to the alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Nothing was stamped
    NotRequired,
    Sent { recipients: usize },
    Failed { reason: String },
}

/// Terminal outcome of one job run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub run_id: Uuid,
    pub stats: RunStats,
    pub report: Report,
    pub notification: NotificationStatus,
}

impl JobOutcome {
    pub fn notification_sent(&self) -> bool {
        matches!(self.notification, NotificationStatus::Sent { .. })
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Finalized with {} successes, {} failures",
            self.report.row_count,
            self.report.failures.len()
        )?;
        match &self.notification {
            NotificationStatus::NotRequired => write!(f, "; no notification required"),
            NotificationStatus::Sent { recipients } => {
                write!(f, "; notification sent to {recipients} recipient(s)")
            }
            NotificationStatus::Failed { reason } => {
                write!(f, "; notification failed: {reason}")
            }
        }
    }
}

pub struct AssemblyNotificationJob {
    coordinator: BatchCoordinator,
    aggregator: ReportAggregator,
    sink: Arc<dyn NotificationSink>,
}

impl AssemblyNotificationJob {
    pub fn new(
        config: &NotifierConfig,
        source: Arc<dyn PagedQuerySource>,
        store: Arc<dyn EntityStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::with_evaluator(config, source, store, sink, RowEvaluator::new())
    }

    /// Same as [`new`](Self::new) with an explicit evaluator clock
    pub fn with_evaluator(
        config: &NotifierConfig,
        source: Arc<dyn PagedQuerySource>,
        store: Arc<dyn EntityStore>,
        sink: Arc<dyn NotificationSink>,
        evaluator: RowEvaluator,
    ) -> Self {
        let filter = FilterSpec::from_config(&config.source);
        let applier = MutationApplier::new(store, filter.marker_field.clone());
        let coordinator = BatchCoordinator::with_evaluator(
            source,
            applier,
            evaluator,
            filter,
            config.batch.clone(),
        );

        Self {
            coordinator,
            aggregator: ReportAggregator::new(config.notification.clone()),
            sink,
        }
    }

    pub fn state(&self) -> BatchState {
        self.coordinator.state()
    }

    /// Run the batch, summarize it and send the alert if anything was stamped
    pub async fn run(&self) -> Result<JobOutcome> {
        let run = self.coordinator.run().await?;
        let report = self.aggregator.summarize(&run.result);

        let notification = match self.aggregator.notification(&report) {
            Ok(None) => {
                crate::log_notification!(info, "No rows below minimum - notification skipped",
                    run_id: run.run_id.to_string()
                );
                NotificationStatus::NotRequired
            }
            Ok(Some(message)) => match self.sink.send(&message).await {
                Ok(()) => {
                    crate::log_notification!(info, "Notification sent",
                        run_id: run.run_id.to_string(),
                        sink: self.sink.sink_name(),
                        subject: message.subject,
                        rows: report.row_count
                    );
                    NotificationStatus::Sent {
                        recipients: message.recipients.len() + message.bcc.len(),
                    }
                }
                Err(error) => self.notification_failed(run.run_id, report.row_count, error),
            },
            Err(error) => self.notification_failed(run.run_id, report.row_count, error),
        };

        let outcome = JobOutcome {
            run_id: run.run_id,
            stats: run.stats,
            report,
            notification,
        };
        tracing::info!(run_id = %outcome.run_id, "{outcome}");
        Ok(outcome)
    }
}

impl AssemblyNotificationJob {
    fn notification_failed(
        &self,
        run_id: Uuid,
        rows: usize,
        error: NotificationError,
    ) -> NotificationStatus {
        let error = NotifierError::from(error);
        crate::log_notification!(error, "Notification failed - markers stay applied",
            run_id: run_id.to_string(),
            sink: self.sink.sink_name(),
            error: error.to_string(),
            rows: rows
        );
        NotificationStatus::Failed {
            reason: error.to_string(),
        }
    }
}

impl fmt::Debug for AssemblyNotificationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyNotificationJob")
            .field("coordinator", &self.coordinator)
            .field("sink", &self.sink.sink_name())
            .finish()
    }
}
