use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{NotifierError, Result};

/// Lifecycle of one batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// No run in progress
    Idle = 0,
    /// Opening the query and planning pages
    Ingesting = 1,
    /// Pages are being fetched, rows evaluated and mutated
    EvaluatingAndMutating = 2,
    /// Every row has a terminal outcome and the result is frozen
    Finalized = 3,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ingesting | Self::EvaluatingAndMutating)
    }

    /// Allowed forward transitions. A failed open returns a run to `Idle`.
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Ingesting)
                | (Self::Finalized, Self::Ingesting)
                | (Self::Ingesting, Self::EvaluatingAndMutating)
                | (Self::Ingesting, Self::Idle)
                | (Self::EvaluatingAndMutating, Self::Finalized)
        )
    }
}

impl From<u8> for BatchState {
    fn from(value: u8) -> Self {
        match value {
            0 => BatchState::Idle,
            1 => BatchState::Ingesting,
            2 => BatchState::EvaluatingAndMutating,
            _ => BatchState::Finalized,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Ingesting => write!(f, "ingesting"),
            Self::EvaluatingAndMutating => write!(f, "evaluating_and_mutating"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "ingesting" => Ok(Self::Ingesting),
            "evaluating_and_mutating" => Ok(Self::EvaluatingAndMutating),
            "finalized" => Ok(Self::Finalized),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}

/// Atomic holder for the current [`BatchState`]
#[derive(Debug)]
pub struct BatchStateCell {
    state: AtomicU8,
}

impl BatchStateCell {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(BatchState::Idle as u8),
        }
    }

    pub fn current(&self) -> BatchState {
        BatchState::from(self.state.load(Ordering::Acquire))
    }

    /// Return to `Idle` regardless of the current state (abandoned run)
    pub fn reset(&self) {
        self.state.store(BatchState::Idle as u8, Ordering::Release);
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&self, next: BatchState) -> Result<BatchState> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(NotifierError::InvalidState(format!(
                "cannot transition batch from {current} to {next}"
            )));
        }
        self.state
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(BatchState::from)
            .map_err(|actual| {
                NotifierError::InvalidState(format!(
                    "concurrent batch transition: expected {current}, found {}",
                    BatchState::from(actual)
                ))
            })
    }
}

impl Default for BatchStateCell {
    fn default() -> Self {
        Self::new()
    }
}
