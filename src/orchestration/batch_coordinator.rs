//! # Batch Coordinator
//!
//! Drives one notifier run: open the query, fan out over its pages, evaluate
//! every row, stamp the qualifying entities, and collect every terminal
//! outcome into a [`BatchResult`].
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──▶ Ingesting ──▶ EvaluatingAndMutating ──▶ Finalized
//!              │
//!              └── open failed ──▶ Idle (SourceUnavailable)
//! ```
//!
//! The result is only handed out once every page has been processed, so no
//! partially finalized state is observable.
//!
//! ## Concurrency
//!
//! - Pages run concurrently up to `batch.page_concurrency`.
//! - Rows within a page run concurrently; entity saves are bounded across the
//!   whole run by a semaphore of `batch.mutation_concurrency` permits.
//! - Each entity id is claimed before mutation, so an entity offered twice in
//!   one run is mutated once and the repeat is recorded as a failure.
//!
//! ## Failure policy
//!
//! Only a failed `open` aborts the run. A page that still fails after
//! `batch.page_fetch_retries` retries is recorded as one failure; a row whose
//! save fails is recorded as one failure. The run continues in both cases.
//!
//! ## Preconditions
//!
//! One run at a time per source. Overlapping runs must be prevented by the
//! scheduler; a coordinator asked to start while its own run is active
//! returns `InvalidState`.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{instrument, Instrument};
use uuid::Uuid;

use super::mutation_applier::MutationApplier;
use super::row_evaluator::{Decision, RowEvaluator};
use crate::config::BatchConfig;
use crate::error::{NotifierError, Result};
use crate::models::{
    BatchResult, FailureDescriptor, FrozenBatchResult, MutationOutcome, QueryRow,
    RecordDisposition,
};
use crate::source::{FilterSpec, PageHandle, PagedQuerySource, SourceError};
use crate::state_machine::{BatchState, BatchStateCell};

/// Counters for one finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub pages_total: usize,
    pub pages_failed: usize,
    pub page_fetch_attempts: usize,
    pub rows_scanned: usize,
    pub rows_skipped: usize,
    pub rows_mutated: usize,
    pub rows_failed: usize,
    /// Entities offered more than once in the run
    pub duplicate_entities: usize,
    /// Business keys written by more than one entity
    pub duplicate_keys: usize,
    pub elapsed: Duration,
}

impl RunStats {
    /// Rows that qualified for mutation, whatever the outcome
    pub fn rows_qualified(&self) -> usize {
        self.rows_mutated + self.rows_failed + self.duplicate_entities
    }
}

/// A finalized run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub marker_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: FrozenBatchResult,
    pub stats: RunStats,
}

#[derive(Debug, Default)]
struct RunCounters {
    pages_failed: AtomicUsize,
    page_fetch_attempts: AtomicUsize,
    rows_scanned: AtomicUsize,
    rows_skipped: AtomicUsize,
    rows_mutated: AtomicUsize,
    rows_failed: AtomicUsize,
    duplicate_entities: AtomicUsize,
    duplicate_keys: AtomicUsize,
}

impl RunCounters {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn read(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// State shared by the workers of one run
struct RunContext {
    run_id: Uuid,
    marker_date: NaiveDate,
    handle: PageHandle,
    result: BatchResult,
    /// entity id -> business key of the row that claimed it
    claimed: DashMap<String, String>,
    mutation_permits: Semaphore,
    counters: RunCounters,
}

impl RunContext {
    /// First claim of an entity id in this run wins
    fn claim(&self, row: &QueryRow) -> bool {
        match self.claimed.entry(row.entity_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(row.business_key.clone());
                true
            }
        }
    }
}

/// Resets the state cell if a run is dropped before it finalizes
struct ActiveRun<'a> {
    state: &'a BatchStateCell,
    finished: bool,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.reset();
        }
    }
}

/// Delay before retry `attempt` (1-based): exponential from the base, capped
pub fn retry_delay(config: &BatchConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = config.retry_backoff_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(config.max_backoff_ms))
}

pub struct BatchCoordinator {
    source: Arc<dyn PagedQuerySource>,
    applier: MutationApplier,
    evaluator: RowEvaluator,
    filter: FilterSpec,
    config: BatchConfig,
    state: BatchStateCell,
}

impl BatchCoordinator {
    pub fn new(
        source: Arc<dyn PagedQuerySource>,
        applier: MutationApplier,
        filter: FilterSpec,
        config: BatchConfig,
    ) -> Self {
        Self::with_evaluator(source, applier, RowEvaluator::new(), filter, config)
    }

    pub fn with_evaluator(
        source: Arc<dyn PagedQuerySource>,
        applier: MutationApplier,
        evaluator: RowEvaluator,
        filter: FilterSpec,
        config: BatchConfig,
    ) -> Self {
        Self {
            source,
            applier,
            evaluator,
            filter,
            config,
            state: BatchStateCell::new(),
        }
    }

    pub fn state(&self) -> BatchState {
        self.state.current()
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Execute one complete run
    pub async fn run(&self) -> Result<BatchRun> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("batch_run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<BatchRun> {
        let started = Instant::now();
        let started_at = Utc::now();
        // One marker date for the whole run, even across midnight
        let marker_date = self.evaluator.today();

        self.state.transition(BatchState::Ingesting)?;
        let mut active = ActiveRun {
            state: &self.state,
            finished: false,
        };

        crate::log_batch!(info, "Batch run started",
            run_id: run_id,
            source: self.source.source_name(),
            location_id: self.filter.location_id,
            page_size: self.filter.page_size,
            marker_date: marker_date.to_string()
        );

        let handle = match self.source.open(&self.filter).await {
            Ok(handle) => handle,
            Err(error) => {
                let reason = match error {
                    SourceError::Unavailable(reason) => reason,
                    other => other.to_string(),
                };
                crate::log_batch!(error, "Query source unavailable - aborting run",
                    run_id: run_id,
                    error: reason
                );
                return Err(NotifierError::SourceUnavailable(reason));
            }
        };

        let page_count = self.source.page_count(&handle);
        crate::log_batch!(info, "Query opened",
            run_id: run_id,
            total_rows: handle.total_rows,
            page_count: page_count
        );

        self.state.transition(BatchState::EvaluatingAndMutating)?;

        let context = RunContext {
            run_id,
            marker_date,
            handle,
            result: BatchResult::new(),
            claimed: DashMap::new(),
            mutation_permits: Semaphore::new(self.config.mutation_concurrency.max(1)),
            counters: RunCounters::default(),
        };

        stream::iter(0..page_count)
            .map(|page_index| self.process_page(&context, page_index))
            .buffer_unordered(self.config.page_concurrency.max(1))
            .collect::<Vec<()>>()
            .await;
        self.source.close(&context.handle).await;

        let result = context.result.freeze();
        self.state.transition(BatchState::Finalized)?;
        active.finished = true;

        let counters = &context.counters;
        let stats = RunStats {
            pages_total: page_count,
            pages_failed: RunCounters::read(&counters.pages_failed),
            page_fetch_attempts: RunCounters::read(&counters.page_fetch_attempts),
            rows_scanned: RunCounters::read(&counters.rows_scanned),
            rows_skipped: RunCounters::read(&counters.rows_skipped),
            rows_mutated: RunCounters::read(&counters.rows_mutated),
            rows_failed: RunCounters::read(&counters.rows_failed),
            duplicate_entities: RunCounters::read(&counters.duplicate_entities),
            duplicate_keys: RunCounters::read(&counters.duplicate_keys),
            elapsed: started.elapsed(),
        };

        crate::log_batch!(info, "Batch run finalized",
            run_id: run_id,
            pages: stats.pages_total,
            pages_failed: stats.pages_failed,
            rows_scanned: stats.rows_scanned,
            rows_skipped: stats.rows_skipped,
            rows_qualified: stats.rows_qualified(),
            rows_mutated: stats.rows_mutated,
            rows_failed: stats.rows_failed,
            duplicate_keys: stats.duplicate_keys,
            elapsed_ms: stats.elapsed.as_millis()
        );

        Ok(BatchRun {
            run_id,
            marker_date,
            started_at,
            finished_at: Utc::now(),
            result,
            stats,
        })
    }

    #[instrument(skip(self, context), fields(run_id = %context.run_id))]
    async fn process_page(&self, context: &RunContext, page_index: usize) {
        let rows = match self.fetch_with_retry(context, page_index).await {
            Ok(rows) => rows,
            Err(error) => {
                RunCounters::bump(&context.counters.pages_failed, 1);
                crate::log_batch!(error, "Page abandoned after retries",
                    run_id: context.run_id,
                    page_index: page_index,
                    error: error.to_string()
                );
                context
                    .result
                    .record_failure(FailureDescriptor::page_fetch(page_index, error.to_string()));
                return;
            }
        };

        RunCounters::bump(&context.counters.rows_scanned, rows.len());
        tracing::debug!(page_index, rows = rows.len(), "Page fetched");

        join_all(rows.into_iter().map(|row| self.process_row(context, row))).await;
    }

    async fn fetch_with_retry(
        &self,
        context: &RunContext,
        page_index: usize,
    ) -> std::result::Result<Vec<QueryRow>, SourceError> {
        let mut attempt: u32 = 0;
        loop {
            RunCounters::bump(&context.counters.page_fetch_attempts, 1);
            match self.source.fetch(&context.handle, page_index).await {
                Ok(rows) => return Ok(rows),
                Err(error) if error.is_retryable() && attempt < self.config.page_fetch_retries => {
                    attempt += 1;
                    let delay = retry_delay(&self.config, attempt);
                    tracing::warn!(
                        page_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Page fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn process_row(&self, context: &RunContext, row: QueryRow) {
        let (row, marker_date) = match RowEvaluator::evaluate_on(&row, context.marker_date) {
            Decision::Skip => {
                RunCounters::bump(&context.counters.rows_skipped, 1);
                return;
            }
            Decision::NotifyAndMutate { row, marker_date } => (row, marker_date),
        };

        if !context.claim(&row) {
            RunCounters::bump(&context.counters.duplicate_entities, 1);
            crate::log_mutation!(error, "Entity offered twice in one run - not mutated again",
                business_key: row.business_key,
                entity_id: row.entity_id,
            );
            context.result.record_failure(FailureDescriptor::duplicate_entity(
                row.business_key,
                row.entity_id,
            ));
            return;
        }

        let outcome = match context.mutation_permits.acquire().await {
            Ok(_permit) => self.applier.apply(&row, marker_date).await,
            Err(error) => MutationOutcome::failed(
                row,
                marker_date,
                format!("mutation limiter unavailable: {error}"),
            ),
        };

        match context.result.record_outcome(outcome) {
            RecordDisposition::Recorded => {
                RunCounters::bump(&context.counters.rows_mutated, 1);
            }
            RecordDisposition::Failed => {
                RunCounters::bump(&context.counters.rows_failed, 1);
            }
            RecordDisposition::DuplicateKey { .. } => {
                RunCounters::bump(&context.counters.rows_mutated, 1);
                RunCounters::bump(&context.counters.duplicate_keys, 1);
            }
        }
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("source", &self.source.source_name())
            .field("filter", &self.filter)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
