// Batch run lifecycle
//
// A run moves strictly forward through its states; the coordinator owns the
// transitions and exposes the current state for observation.

pub mod states;

pub use states::{BatchState, BatchStateCell};
