//! # Notifier Orchestration
//!
//! The batch pipeline for one notifier run.
//!
//! ## Core Components
//!
//! - **RowEvaluator**: pure per-row rule (`available < minimum`)
//! - **MutationApplier**: stamps the marker date on a qualifying entity
//! - **BatchCoordinator**: pages, fan-out, retries and the keyed accumulator
//! - **ReportAggregator**: frozen result to report and alert
//! - **AssemblyNotificationJob**: the scheduled entry point wiring them together

pub mod batch_coordinator;
pub mod mutation_applier;
pub mod notification_job;
pub mod report_aggregator;
pub mod row_evaluator;

pub use batch_coordinator::{retry_delay, BatchCoordinator, BatchRun, RunStats};
pub use mutation_applier::MutationApplier;
pub use notification_job::{AssemblyNotificationJob, JobOutcome, NotificationStatus};
pub use report_aggregator::{Report, ReportAggregator, TableRow};
pub use row_evaluator::{Decision, RowEvaluator};
