//! CLI command implementations.

pub mod check;
pub mod run;
pub mod status;

pub use check::{CheckCommand, CheckReport};
pub use run::{RunCommand, RunOutcome};
pub use status::StatusCommand;
