//! tally-reconcile
//!
//! Reconciliation engine for time-tracking records.
//!
//! Given the previously persisted snapshot and a freshly fetched record set,
//! the engine:
//! - classifies differences into created / removed / modified change sets
//! - upserts fetched records into the snapshot
//! - propagates upstream deletions, but only inside the queried window
//! - prunes records that aged out of the retention horizon
//!
//! Deterministic, pure logic. No IO. No HTTP calls.

mod engine;
pub mod record_adapter;
pub mod summary;
mod types;
pub mod window;

pub use engine::{classify, merge, MergeOutcome, MergeStats};
pub use types::*;
pub use window::{date_key, retention_cutoff, InvalidWindow, Window, DATE_FORMAT};
