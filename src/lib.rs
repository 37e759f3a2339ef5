#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Assembly Availability Notifier
//!
//! Scheduled batch job that finds in-house assemblies whose available quantity
//! at the main warehouse has dropped below their configured minimum, stamps
//! each one with the date it was reported, and sends one consolidated alert.
//!
//! ## Pipeline
//!
//! ```text
//! PagedQuerySource ──▶ RowEvaluator ──▶ MutationApplier ──▶ BatchResult
//!                                                               │
//!                      NotificationSink ◀── ReportAggregator ◀──┘
//! ```
//!
//! Stamped items are excluded from later queries, so each item is reported
//! once until the marker is cleared.
//!
//! ## Module Organization
//!
//! - [`source`] - Paged query contract, filter spec, buildable formula
//! - [`store`] - Entity load/save contract
//! - [`catalog`] - In-process item catalog implementing both contracts
//! - [`database`] - PostgreSQL implementations (feature `postgres`)
//! - [`orchestration`] - Evaluator, applier, coordinator, aggregator, job
//! - [`notification`] - Alert message, sinks and HTML rendering
//! - [`models`] - Rows, outcomes, failures and the batch accumulator
//! - [`state_machine`] - Batch lifecycle states
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing setup and domain log macros
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assembly_notifier::catalog::ItemCatalog;
//! use assembly_notifier::config::ConfigManager;
//! use assembly_notifier::notification::LoggingNotificationSink;
//! use assembly_notifier::orchestration::AssemblyNotificationJob;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let catalog = Arc::new(ItemCatalog::new());
//! let job = AssemblyNotificationJob::new(
//!     manager.config(),
//!     catalog.clone(),
//!     catalog,
//!     Arc::new(LoggingNotificationSink),
//! );
//! let outcome = job.run().await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod notification;
pub mod orchestration;
pub mod source;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, NotifierConfig};
pub use error::{NotifierError, Result};
pub use models::{FrozenBatchResult, ItemKind, MutationOutcome, QueryRow};
pub use notification::{Notification, NotificationSink};
pub use orchestration::{AssemblyNotificationJob, JobOutcome, Report};
pub use source::{FilterSpec, PagedQuerySource};
pub use store::EntityStore;
