//! tally-runtime
//!
//! Drives a reconciliation pass end to end and maps trigger events to
//! status-coded responses. Binaries (CLI, daemon) sit on top of [`Runner`].

pub mod display;
mod error;
mod pass;
mod trigger;

pub use error::PassError;
pub use pass::{run_pass, PassDeps, PassSummary};
pub use trigger::{deps_from_config, ConfiguredPass, PassBuilder, Runner, TriggerResponse};
