//! # Row Evaluator
//!
//! The business rule applied to every query row: an item whose availability
//! at the warehouse is below its configured minimum gets stamped and reported.
//! Pure apart from reading the evaluator's clock for the marker date.

use chrono::{NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;

use crate::models::QueryRow;

/// What to do with one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    NotifyAndMutate {
        row: QueryRow,
        /// Calendar date to stamp on the entity
        marker_date: NaiveDate,
    },
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct RowEvaluator {
    clock: Clock,
}

impl RowEvaluator {
    /// Evaluator stamping today's UTC date
    pub fn new() -> Self {
        Self {
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Evaluator stamping a fixed date
    pub fn fixed(date: NaiveDate) -> Self {
        Self {
            clock: Arc::new(move || date),
        }
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn evaluate(&self, row: &QueryRow) -> Decision {
        Self::evaluate_on(row, self.today())
    }

    /// `available < minimum` ⇒ notify; everything else is skipped
    pub fn evaluate_on(row: &QueryRow, marker_date: NaiveDate) -> Decision {
        if row.is_below_minimum() {
            Decision::NotifyAndMutate {
                row: row.clone(),
                marker_date,
            }
        } else {
            Decision::Skip
        }
    }
}

impl Default for RowEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RowEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowEvaluator")
            .field("today", &self.today())
            .finish()
    }
}
