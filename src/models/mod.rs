//! # Batch Data Model
//!
//! Value types that flow through one notifier run: the rows produced by the
//! query source, the outcome of each marker mutation, the failures collected
//! along the way, and the keyed accumulator that holds all of them until the
//! run is finalized.

pub mod batch_result;
pub mod failure;
pub mod item_kind;
pub mod mutation_outcome;
pub mod query_row;

pub use batch_result::{BatchResult, FrozenBatchResult, RecordDisposition};
pub use failure::{FailureDescriptor, FailureKind, FailureOrigin};
pub use item_kind::ItemKind;
pub use mutation_outcome::MutationOutcome;
pub use query_row::QueryRow;
